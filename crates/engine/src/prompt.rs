//! Natural-language prompt composition for image and motion generation.
//!
//! Segments are emitted in a fixed order and joined with ", ". Values equal to
//! their everyday default (clear weather, static camera, subject looking at
//! camera, 16:9) are not restated.

use crate::index::ReferenceShot;
use crate::scene::{SceneDocument, Shot};

pub const DEFAULT_WEATHER: &str = "clear";
pub const DEFAULT_MOVEMENT: &str = "static";
pub const DEFAULT_EYE_DIRECTION: &str = "at-camera";
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_COSTUME_CONDITION: &str = "pristine";

pub const CONTINUATION_MARKER: &str = ", then";
pub const SETTLE_CLAUSE: &str = "then settles";
pub const IDLE_MOTION: &str = "subtle movement, then holds";

/// Lighting type → light-source description.
pub const LIGHTING_PHRASES: [(&str, &str); 15] = [
    ("natural", "natural daylight streaming from window on left"),
    ("three-point", "key light from front-left with soft fill from right"),
    ("rembrandt", "single key light from 45° left creating triangle shadow on cheek"),
    ("silhouette", "strong backlight from behind, subject in silhouette"),
    ("neon", "neon signs casting pink and blue glow from sides"),
    ("harsh-sun", "harsh midday sun from directly above casting sharp shadows"),
    ("candlelight", "warm flickering candlelight from below-left"),
    ("moonlight", "cool blue moonlight from above-right"),
    ("volumetric", "god rays streaming through dusty atmosphere from behind"),
    ("spotlight", "single hard spotlight from directly above"),
    ("film-noir", "venetian blind shadows with single hard key from side"),
    ("rim-light", "strong rim light from behind outlining subject"),
    ("golden-hour", "warm golden sunset light from low left angle"),
    ("fireplace", "warm orange fireplace glow from lower left"),
    ("fluorescent", "cold overhead fluorescent tubes casting flat even light"),
];

pub const SPEAKING_PHRASES: [&str; 4] = [
    "speaks expressively, mouth moving naturally",
    "talks animatedly, gesturing",
    "speaks with emphasis, facial expressions",
    "delivers line with conviction, mouth moving",
];

const SPEAKING_WORDS: [&str; 5] = ["speak", "talk", "mouth", "say", "deliver"];
const SUBJECT_NOUNS: [&str; 5] = ["character", "man", "woman", "person", "figure"];

pub fn lighting_phrase(lighting_type: &str) -> Option<&'static str> {
    let key = lighting_type.trim().to_lowercase();
    LIGHTING_PHRASES
        .iter()
        .find(|(kind, _)| *kind == key)
        .map(|(_, phrase)| *phrase)
}

/// Scene-level fallbacks for fields a catalog shot does not provide.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneContext<'a> {
    pub location: Option<&'a str>,
    pub time_of_day: Option<&'a str>,
    pub mood: Option<&'a str>,
}

impl<'a> SceneContext<'a> {
    pub fn from_scene(scene: &'a SceneDocument) -> Self {
        SceneContext {
            location: present(scene.location.as_deref()),
            time_of_day: present(scene.time_of_day.as_deref()),
            mood: present(scene.mood.as_deref()),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn not_default<'a>(value: Option<&'a str>, default: &str) -> Option<&'a str> {
    present(value).filter(|v| !v.eq_ignore_ascii_case(default))
}

fn subject_label(subject_type: &str) -> String {
    match subject_type.to_lowercase().as_str() {
        "character" => "CHARACTER".to_string(),
        "object" | "vehicle" => "OBJECT".to_string(),
        "animal" => "ANIMAL".to_string(),
        "scene" | "background" => "SCENE".to_string(),
        other => other.to_uppercase(),
    }
}

fn subject_segment(reference: &ReferenceShot) -> String {
    let subject_type = present(reference.subject_type.as_deref()).unwrap_or("character");
    let is_character = subject_type.eq_ignore_ascii_case("character");
    let mut description =
        present(reference.subject_description.as_deref()).unwrap_or("subject").to_string();

    if is_character {
        if let Some(costume) = &reference.costume {
            let mut pieces = Vec::new();
            if !costume.key_pieces.is_empty() {
                pieces.push(costume.key_pieces.join(", "));
            }
            if let Some(condition) = not_default(costume.condition.as_deref(), DEFAULT_COSTUME_CONDITION) {
                pieces.push(condition.to_string());
            }
            if !pieces.is_empty() {
                description.push_str(" wearing ");
                description.push_str(&pieces.join(", "));
            }
        }
    }

    let mut segment = format!("[{}: {}]", subject_label(subject_type), description);

    if let Some(pose) = &reference.character_pose {
        if let Some(posture) = present(pose.posture.as_deref()) {
            segment.push(' ');
            segment.push_str(posture);
        }
        if let Some(gesture) = present(pose.gesture.as_deref()) {
            segment.push_str(", ");
            segment.push_str(gesture);
        }
    }
    if let Some(placement) = present(reference.subject_placement.as_deref()) {
        segment.push_str(" positioned ");
        segment.push_str(placement);
    }
    if let Some(eyes) = not_default(reference.eye_direction.as_deref(), DEFAULT_EYE_DIRECTION) {
        segment.push_str(" looking ");
        segment.push_str(eyes);
    }
    segment
}

fn environment_segment(
    shot: Option<&Shot>,
    reference: Option<&ReferenceShot>,
    context: &SceneContext,
) -> Option<String> {
    let location = reference
        .and_then(|r| present(r.location.as_deref()))
        .or_else(|| shot.and_then(Shot::location_name))
        .or(context.location);

    let mut words = Vec::new();
    match location {
        Some(location) => words.push(format!("in {}", location)),
        None => {
            if let Some(env) = reference.and_then(|r| present(r.environment.as_deref())) {
                words.push(format!("in {} setting", env));
            }
        }
    }

    let time = reference
        .and_then(|r| present(r.time_of_day.as_deref()))
        .or(context.time_of_day);
    if let Some(time) = time {
        words.push(format!("at {}", time));
    }
    if let Some(weather) = reference.and_then(|r| not_default(r.weather.as_deref(), DEFAULT_WEATHER)) {
        words.push(format!("with {}", weather));
    }

    (!words.is_empty()).then(|| words.join(" "))
}

fn emotion_segment(reference: Option<&ReferenceShot>, context: &SceneContext) -> Option<String> {
    let emotion = reference
        .and_then(|r| present(r.emotion.as_deref()))
        .or(context.mood)?;
    match reference.and_then(|r| present(r.emotion_intensity.as_deref())) {
        Some(intensity) => Some(format!("{} mood ({})", emotion, intensity)),
        None => Some(format!("{} mood", emotion)),
    }
}

fn camera_segment(reference: &ReferenceShot) -> Option<String> {
    let mut words = Vec::new();
    if let Some(shot) = present(reference.shot.as_deref()) {
        words.push(format!("{} shot", shot));
    }
    words.extend(present(reference.lens.as_deref()).map(str::to_string));
    words.extend(present(reference.depth.as_deref()).map(str::to_string));
    (!words.is_empty()).then(|| words.join(" "))
}

fn lighting_segment(reference: &ReferenceShot) -> Option<String> {
    if let Some(source) = present(reference.lighting_source.as_deref()) {
        return Some(source.to_string());
    }
    let kind = present(reference.lighting.as_deref())?;
    Some(
        lighting_phrase(kind)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} lighting", kind)),
    )
}

fn color_segment(reference: &ReferenceShot) -> Option<String> {
    if let Some(palette) = present(reference.color_palette.as_deref()) {
        return Some(format!("{} color grade", palette));
    }
    present(reference.lighting_color.as_deref()).map(|tone| format!("{} tones", tone))
}

fn compose(shot: Option<&Shot>, reference: Option<&ReferenceShot>, context: &SceneContext) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(r) = reference {
        parts.push(subject_segment(r));
    }
    parts.extend(environment_segment(shot, reference, context));
    parts.extend(emotion_segment(reference, context));

    if let Some(r) = reference {
        parts.extend(
            r.camera3d
                .as_ref()
                .and_then(|c| present(c.description.as_deref()))
                .map(str::to_string),
        );
        parts.extend(present(r.framing.as_deref()).map(|f| format!("{} composition", f)));
        parts.extend(camera_segment(r));
    }

    let movement = reference
        .and_then(|r| present(r.movement.as_deref()))
        .or_else(|| shot.and_then(|s| s.camera.as_ref()).and_then(|c| present(c.movement.as_deref())));
    parts.extend(not_default(movement, DEFAULT_MOVEMENT).map(|m| format!("{} camera", m)));

    if let Some(r) = reference {
        parts.extend(lighting_segment(r));
        parts.extend(color_segment(r));
        parts.extend(
            not_default(r.aspect_ratio.as_deref(), DEFAULT_ASPECT_RATIO)
                .map(|ar| format!("{} aspect ratio", ar)),
        );
        parts.extend(
            r.narrative
                .as_ref()
                .and_then(|n| present(n.story_context.as_deref()))
                .map(|ctx| format!("[STORY: {}]", ctx)),
        );
    }

    parts.join(", ")
}

/// Image prompt for a scene shot, drawing on its catalog reference when one
/// was found. Without a reference only environment, mood and movement remain.
pub fn compose_shot_prompt(
    shot: &Shot,
    reference: Option<&ReferenceShot>,
    context: &SceneContext,
) -> String {
    compose(Some(shot), reference, context)
}

/// Prompt for a catalog entry on its own.
pub fn catalog_prompt(reference: &ReferenceShot) -> String {
    compose(None, Some(reference), &SceneContext::default())
}

/// Guarantees the motion prompt ends in a resting state.
pub fn compose_motion_prompt(motion: Option<&str>) -> String {
    match present(motion) {
        Some(motion) if motion.contains(CONTINUATION_MARKER) => motion.to_string(),
        Some(motion) => format!("{}, {}", motion, SETTLE_CLAUSE),
        None => IDLE_MOTION.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueDirection {
    pub motion_prompt: Option<String>,
    pub note: String,
}

/// Adds on-camera speaking direction to a motion prompt, or marks the shot
/// as voiceover when the speaker is not visible. The phrase is picked by
/// shot order so repeated builds agree.
pub fn direct_dialogue(motion: Option<&str>, speaker: &str, on_screen: bool, order: u32) -> DialogueDirection {
    let speaker_tag = speaker.trim().to_uppercase();
    let motion = present(motion);

    if !on_screen {
        return DialogueDirection {
            motion_prompt: motion.map(str::to_string),
            note: format!("{} voiceover (OFF SCREEN) - no lip sync", speaker_tag),
        };
    }

    let note = format!("{} speaking ON SCREEN - lip sync needed", speaker_tag);
    let lowered = motion.map(str::to_ascii_lowercase).unwrap_or_default();
    if SPEAKING_WORDS.iter().any(|w| lowered.contains(w)) {
        return DialogueDirection { motion_prompt: motion.map(str::to_string), note };
    }

    let phrase = SPEAKING_PHRASES[order as usize % SPEAKING_PHRASES.len()];
    let motion_prompt = match motion {
        None => format!("Character {}, then settles", phrase),
        Some(motion) => insert_after_subject(motion, &lowered, phrase),
    };
    DialogueDirection { motion_prompt: Some(motion_prompt), note }
}

/// Inserts `phrase` before the first comma following the earliest subject
/// noun. Leaves the prompt untouched when there is no such comma.
fn insert_after_subject(motion: &str, lowered: &str, phrase: &str) -> String {
    let noun_at = SUBJECT_NOUNS.iter().filter_map(|n| lowered.find(n)).min();
    let comma_at = noun_at.and_then(|start| lowered[start..].find(',').map(|offset| start + offset));
    match comma_at {
        Some(comma) => format!("{}, {}{}", &motion[..comma], phrase, &motion[comma..]),
        None => motion.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Costume, Narrative};
    use serde_json::json;

    fn office_reference() -> ReferenceShot {
        ReferenceShot {
            id: "ref-1".into(),
            image: "ref-1.jpg".into(),
            film: "Michael Clayton".into(),
            subject_type: Some("character".into()),
            subject_description: Some("man in suit".into()),
            costume: Some(Costume { key_pieces: vec!["tie".into()], ..Default::default() }),
            location: Some("office".into()),
            time_of_day: Some("night".into()),
            lighting: Some("rembrandt".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_office_prompt() {
        let prompt = catalog_prompt(&office_reference());
        assert!(prompt.starts_with("[CHARACTER: man in suit wearing tie], in office at night"));
        assert!(prompt.ends_with("single key light from 45° left creating triangle shadow on cheek"));
    }

    #[test]
    fn test_defaults_are_not_restated() {
        let mut reference = office_reference();
        reference.weather = Some("clear".into());
        reference.movement = Some("static".into());
        reference.eye_direction = Some("at-camera".into());
        reference.aspect_ratio = Some("16:9".into());
        let prompt = catalog_prompt(&reference);
        assert!(!prompt.contains("with clear"));
        assert!(!prompt.contains("camera,") && !prompt.contains("static"));
        assert!(!prompt.contains("looking"));
        assert!(!prompt.contains("aspect ratio"));

        reference.weather = Some("heavy rain".into());
        reference.movement = Some("handheld".into());
        reference.eye_direction = Some("left".into());
        reference.aspect_ratio = Some("2.39:1".into());
        let prompt = catalog_prompt(&reference);
        assert!(prompt.contains("in office at night with heavy rain"));
        assert!(prompt.contains("handheld camera"));
        assert!(prompt.contains("looking left"));
        assert!(prompt.contains("2.39:1 aspect ratio"));
    }

    #[test]
    fn test_segment_order() {
        let reference = ReferenceShot {
            subject_type: Some("vehicle".into()),
            subject_description: Some("vintage red car".into()),
            subject_placement: Some("left-third".into()),
            environment: Some("urban".into()),
            emotion: Some("tense".into()),
            emotion_intensity: Some("strong".into()),
            framing: Some("rule-of-thirds".into()),
            shot: Some("wide".into()),
            lens: Some("35mm".into()),
            depth: Some("deep focus".into()),
            lighting: Some("sodium vapor".into()),
            lighting_color: Some("amber".into()),
            narrative: Some(Narrative { story_context: Some("the getaway".into()), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(
            catalog_prompt(&reference),
            "[OBJECT: vintage red car] positioned left-third, in urban setting, tense mood (strong), \
             rule-of-thirds composition, wide shot 35mm deep focus, sodium vapor lighting, amber tones, \
             [STORY: the getaway]"
        );
    }

    #[test]
    fn test_costume_only_for_characters() {
        let mut reference = office_reference();
        reference.subject_type = Some("animal".into());
        reference.subject_description = Some("dog".into());
        assert!(catalog_prompt(&reference).starts_with("[ANIMAL: dog]"));

        let mut worn = office_reference();
        worn.costume.as_mut().unwrap().condition = Some("torn".into());
        assert!(catalog_prompt(&worn).starts_with("[CHARACTER: man in suit wearing tie, torn]"));
    }

    #[test]
    fn test_missing_reference_degrades_to_scene_context() {
        let scene: SceneDocument = serde_json::from_value(json!({
            "scene_id": "s",
            "location": "pub",
            "time_of_day": "night",
            "mood": "uneasy",
            "shots": [{"shot_id": "a"}]
        }))
        .unwrap();
        let context = SceneContext::from_scene(&scene);
        let prompt = compose_shot_prompt(&scene.shots[0], None, &context);
        assert_eq!(prompt, "in pub at night, uneasy mood");

        let empty = compose_shot_prompt(&scene.shots[0], None, &SceneContext::default());
        assert_eq!(empty, "");
    }

    #[test]
    fn test_explicit_lighting_source_wins() {
        let mut reference = office_reference();
        reference.lighting_source = Some("desk lamp from right".into());
        assert!(catalog_prompt(&reference).ends_with("desk lamp from right"));
    }

    #[test]
    fn test_motion_prompt_always_settles() {
        assert_eq!(compose_motion_prompt(Some("slow dolly in")), "slow dolly in, then settles");
        assert_eq!(
            compose_motion_prompt(Some("car pulls away, then stops")),
            "car pulls away, then stops"
        );
        assert_eq!(compose_motion_prompt(None), IDLE_MOTION);
        assert_eq!(compose_motion_prompt(Some("   ")), IDLE_MOTION);
    }

    #[test]
    fn test_dialogue_direction() {
        let fresh = direct_dialogue(None, "shaun", true, 0);
        assert_eq!(
            fresh.motion_prompt.as_deref(),
            Some("Character speaks expressively, mouth moving naturally, then settles")
        );
        assert_eq!(fresh.note, "SHAUN speaking ON SCREEN - lip sync needed");

        let inserted = direct_dialogue(Some("Man in kitchen leans on counter, then settles"), "shaun", true, 1);
        assert_eq!(
            inserted.motion_prompt.as_deref(),
            Some("Man in kitchen leans on counter, talks animatedly, gesturing, then settles")
        );

        let already = direct_dialogue(Some("woman talks quietly"), "liz", true, 2);
        assert_eq!(already.motion_prompt.as_deref(), Some("woman talks quietly"));

        let voiceover = direct_dialogue(Some("rain on window"), "ed", false, 0);
        assert_eq!(voiceover.motion_prompt.as_deref(), Some("rain on window"));
        assert!(voiceover.note.contains("voiceover"));
    }
}
