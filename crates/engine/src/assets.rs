//! Asset scoring: the single best representative frame per character,
//! location and prop in a scene.
//!
//! Every appearance is scored from the shot's framing label plus bonuses, and
//! an incumbent is only replaced by a strictly higher score, so ties keep the
//! first-seen frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::scene::{is_placeholder_name, CharacterReference, SceneDocument, Shot};

pub const DEFAULT_FRAMING: &str = "MS";
pub const UNLISTED_FRAMING_SCORE: i32 = 50;
pub const GROUP_PENALTY: i32 = 15;
pub const PRIMARY_BONUS: i32 = 30;
pub const SOLO_BONUS: i32 = 20;
pub const INTERACTION_BONUS: i32 = 20;
pub const DEFAULT_ASPECT_RATIO: &str = "2.35:1";

/// Framing label markers that indicate more than one person in frame.
pub const GROUP_MARKERS: [&str; 2] = ["GROUP", "TWO_SHOT"];

/// Ordered base-framing → score lookup.
#[derive(Debug, Clone, Copy)]
pub struct FramingTable(pub &'static [(&'static str, i32)]);

impl FramingTable {
    pub fn score(&self, base_framing: &str) -> i32 {
        self.0
            .iter()
            .find(|(label, _)| *label == base_framing)
            .map(|(_, score)| *score)
            .unwrap_or(UNLISTED_FRAMING_SCORE)
    }
}

/// Tight framings read a face best.
pub const CHARACTER_FRAMING: FramingTable = FramingTable(&[
    ("BCU", 100),
    ("ECU", 100),
    ("CU", 90),
    ("MCU", 80),
    ("MS", 60),
    ("MWS", 40),
    ("WS", 20),
    ("EWS", 10),
    ("OTS", 50),
    ("POV", 5),
]);

/// Wide framings establish a set best.
pub const LOCATION_FRAMING: FramingTable = FramingTable(&[
    ("EWS", 100),
    ("WS", 90),
    ("MWS", 80),
    ("MW", 70),
    ("MS", 50),
    ("MCU", 30),
    ("CU", 20),
    ("BCU", 10),
]);

pub const PROP_FRAMING: FramingTable = FramingTable(&[
    ("ECU", 100),
    ("BCU", 95),
    ("CU", 90),
    ("MCU", 80),
    ("MS", 60),
    ("MWS", 40),
    ("WS", 20),
]);

/// Names that are body parts, set dressing or characters rather than props.
pub const PROP_DENYLIST: [&str; 19] = [
    "finger", "thumb", "hand", "hands", "foot", "shoe", "shoes", "feet", "door", "window", "wall",
    "floor", "ceiling", "table", "chair", "couch", "sofa", "zombie", "body",
];

/// Canonical prop → synonyms, checked in this order; first match wins.
pub const PROP_GROUPS: [(&str, &[&str]); 3] = [
    (
        "car",
        &["car_door_handle", "key", "gas_pedal", "red_car", "red_megane", "steering_wheel", "car_key"],
    ),
    ("mug", &["tea_mug", "mug", "cool_mug"]),
    ("pint_glass", &["pint_glass", "lager", "beer"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    /// Uppercased label as tagged, e.g. `MS_GROUP`.
    pub label: String,
    /// Leading component, e.g. `MS`.
    pub base: String,
}

impl Framing {
    pub fn of(shot: &Shot) -> Self {
        let label = shot.start_framing().unwrap_or(DEFAULT_FRAMING).to_uppercase();
        let base = label.split('_').next().unwrap_or_default().to_string();
        Framing { label, base }
    }

    pub fn is_group(&self) -> bool {
        GROUP_MARKERS.iter().any(|m| self.label.contains(m))
    }
}

pub fn is_denied_prop(name: &str) -> bool {
    let lowered = name.to_lowercase();
    PROP_DENYLIST.iter().any(|deny| lowered.contains(deny))
}

/// Canonical group for a raw prop name: bidirectional substring match against
/// each synonym, groups in [`PROP_GROUPS`] order.
pub fn canonical_prop(name: &str) -> Option<&'static str> {
    let lowered = name.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    PROP_GROUPS
        .iter()
        .find(|(_, members)| {
            members
                .iter()
                .any(|m| lowered.contains(m) || m.contains(lowered.as_str()))
        })
        .map(|(group, _)| *group)
}

trait Scored {
    fn score(&self) -> i32;
}

fn keep_best<T: Scored>(map: &mut BTreeMap<String, T>, key: &str, candidate: T) {
    match map.get(key) {
        Some(incumbent) if candidate.score() <= incumbent.score() => {}
        _ => {
            map.insert(key.to_string(), candidate);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterAsset {
    pub frame: String,
    pub shot_id: String,
    pub framing: String,
    pub score: i32,
    pub is_primary: bool,
    pub is_solo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAsset {
    pub frame: String,
    pub shot_id: String,
    pub elements: Vec<String>,
    pub framing: String,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropAsset {
    pub name: String,
    pub frame: String,
    pub shot_id: String,
    pub interaction: Option<String>,
    pub framing: String,
    pub score: i32,
    /// Raw names merged into this entry, in order of first appearance.
    pub variants: Vec<String>,
}

impl Scored for CharacterAsset {
    fn score(&self) -> i32 {
        self.score
    }
}

impl Scored for LocationAsset {
    fn score(&self) -> i32 {
        self.score
    }
}

impl Scored for PropAsset {
    fn score(&self) -> i32 {
        self.score
    }
}

/// A declared scene character with its chosen screenshot attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    #[serde(flatten)]
    pub reference: CharacterReference,
    pub screenshot: Option<String>,
    pub best_shot: Option<String>,
    pub shot_framing: Option<String>,
    pub is_solo_shot: bool,
    pub selection_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub scene_id: String,
    pub characters: BTreeMap<String, CharacterAsset>,
    pub locations: BTreeMap<String, LocationAsset>,
    pub props: BTreeMap<String, PropAsset>,
    pub character_sheets: BTreeMap<String, CharacterSheet>,
    pub visual_style: Option<Value>,
    pub style_suffix: String,
}

fn valid_names<'a>(names: Vec<&'a str>) -> Vec<&'a str> {
    names
        .into_iter()
        .map(str::trim)
        .filter(|n| !is_placeholder_name(n))
        .collect()
}

fn score_characters(shot: &Shot, frame: &str, framing: &Framing, out: &mut BTreeMap<String, CharacterAsset>) {
    let mut base = CHARACTER_FRAMING.score(&framing.base);
    if framing.is_group() {
        base -= GROUP_PENALTY;
    }

    let primary = valid_names(shot.primary_names());
    let secondary = valid_names(shot.secondary_names());
    let solo = primary.len() == 1 && secondary.is_empty();

    for name in &primary {
        let mut score = base + PRIMARY_BONUS;
        if solo {
            score += SOLO_BONUS;
        }
        let candidate = CharacterAsset {
            frame: frame.to_string(),
            shot_id: shot.shot_id.clone(),
            framing: framing.label.clone(),
            score,
            is_primary: true,
            is_solo: solo,
        };
        keep_best(out, &name.to_lowercase(), candidate);
    }

    for name in &secondary {
        let candidate = CharacterAsset {
            frame: frame.to_string(),
            shot_id: shot.shot_id.clone(),
            framing: framing.label.clone(),
            score: base,
            is_primary: false,
            is_solo: false,
        };
        keep_best(out, &name.to_lowercase(), candidate);
    }
}

fn score_location(shot: &Shot, frame: &str, framing: &Framing, out: &mut BTreeMap<String, LocationAsset>) {
    let Some(location) = shot.location_name() else {
        return;
    };
    let candidate = LocationAsset {
        frame: frame.to_string(),
        shot_id: shot.shot_id.clone(),
        elements: shot
            .environment
            .as_ref()
            .map(|e| e.visible_elements.clone())
            .unwrap_or_default(),
        framing: framing.label.clone(),
        score: LOCATION_FRAMING.score(&framing.base),
    };
    keep_best(out, location, candidate);
}

fn score_props(shot: &Shot, frame: &str, framing: &Framing, out: &mut BTreeMap<String, PropAsset>) {
    let interaction = shot.prop_interaction();
    let score = PROP_FRAMING.score(&framing.base) + if interaction.is_some() { INTERACTION_BONUS } else { 0 };

    for raw in shot.prop_items() {
        let raw = raw.trim();
        if raw.is_empty() || is_denied_prop(raw) {
            continue;
        }
        let key = canonical_prop(raw).unwrap_or(raw).to_string();

        let mut variants = out.get(&key).map(|p| p.variants.clone()).unwrap_or_default();
        if !variants.iter().any(|v| v == raw) {
            variants.push(raw.to_string());
        }

        let candidate = PropAsset {
            name: key.clone(),
            frame: frame.to_string(),
            shot_id: shot.shot_id.clone(),
            interaction: interaction.map(str::to_string),
            framing: framing.label.clone(),
            score,
            variants: variants.clone(),
        };
        keep_best(out, &key, candidate);
        if let Some(entry) = out.get_mut(&key) {
            entry.variants = variants;
        }
    }
}

fn character_sheets(
    scene: &SceneDocument,
    characters: &BTreeMap<String, CharacterAsset>,
) -> BTreeMap<String, CharacterSheet> {
    scene
        .character_references
        .iter()
        .map(|(id, reference)| {
            let best = characters.get(id).or_else(|| {
                reference
                    .name
                    .as_ref()
                    .and_then(|name| characters.get(&name.trim().to_lowercase()))
            });
            let sheet = CharacterSheet {
                reference: reference.clone(),
                screenshot: best.map(|b| b.frame.clone()),
                best_shot: best.map(|b| b.shot_id.clone()),
                shot_framing: best.map(|b| b.framing.clone()),
                is_solo_shot: best.map(|b| b.is_solo).unwrap_or(false),
                selection_score: best.map(|b| b.score).unwrap_or(0),
            };
            (id.clone(), sheet)
        })
        .collect()
}

fn style_suffix(scene: &SceneDocument) -> String {
    scene
        .visual_style
        .as_ref()
        .and_then(|style| style.get("style_suffix"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let aspect = scene.aspect_ratio.as_deref().unwrap_or(DEFAULT_ASPECT_RATIO);
            format!("{} cinematic", aspect)
        })
}

/// Scans every shot once. Shots without a start frame have no frame to offer
/// and are skipped.
pub fn score_scene_assets(scene: &SceneDocument) -> AssetManifest {
    let mut characters = BTreeMap::new();
    let mut locations = BTreeMap::new();
    let mut props = BTreeMap::new();

    for shot in &scene.shots {
        let Some(start) = shot.start_frame_index() else {
            continue;
        };
        let frame = scene.analysis_frame(start);
        let framing = Framing::of(shot);

        score_characters(shot, &frame, &framing, &mut characters);
        score_location(shot, &frame, &framing, &mut locations);
        score_props(shot, &frame, &framing, &mut props);
    }

    AssetManifest {
        scene_id: scene.scene_id.clone(),
        character_sheets: character_sheets(scene, &characters),
        characters,
        locations,
        props,
        visual_style: scene.visual_style.clone(),
        style_suffix: style_suffix(scene),
    }
}
