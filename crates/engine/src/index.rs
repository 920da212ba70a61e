//! Shot Index: the flat catalog of tagged reference shots.
//!
//! Records are keyed by `id` and never change once indexed. The index also
//! carries the filter enumeration the browser uses to build its dropdowns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::scene::null_as_default;

pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceShot {
    pub id: String,
    /// Image path relative to the data root.
    pub image: String,
    pub film: String,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub shot: Option<String>,
    #[serde(default)]
    pub angle: Option<String>,
    #[serde(default)]
    pub movement: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub emotion_intensity: Option<String>,
    #[serde(default)]
    pub lighting: Option<String>,
    #[serde(default)]
    pub lighting_source: Option<String>,
    #[serde(default)]
    pub lighting_color: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genre: Vec<String>,
    #[serde(default)]
    pub decade: Option<String>,
    #[serde(default)]
    pub lens: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default)]
    pub framing: Option<String>,
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub composition_notes: Option<String>,
    #[serde(default)]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub subject_description: Option<String>,
    #[serde(default)]
    pub subject_placement: Option<String>,
    #[serde(default)]
    pub eye_direction: Option<String>,
    #[serde(default)]
    pub pose: Option<String>,
    #[serde(default)]
    pub color_palette: Option<String>,
    #[serde(default)]
    pub film_stock: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub camera3d: Option<Camera3d>,
    #[serde(default)]
    pub costume: Option<Costume>,
    #[serde(default)]
    pub character_pose: Option<CharacterPose>,
    #[serde(default)]
    pub production_design: Option<ProductionDesign>,
    #[serde(default)]
    pub narrative: Option<Narrative>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera3d {
    #[serde(default)]
    pub azimuth: Option<f64>,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Costume {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_pieces: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterPose {
    #[serde(default)]
    pub posture: Option<String>,
    #[serde(default)]
    pub body_language: Option<String>,
    #[serde(default)]
    pub gesture: Option<String>,
    #[serde(default)]
    pub head_position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionDesign {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_props: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub practical_lights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    #[serde(default)]
    pub shot_purpose: Option<String>,
    #[serde(default)]
    pub narrative_beat: Option<String>,
    #[serde(default)]
    pub emotional_function: Option<String>,
    #[serde(default)]
    pub story_context: Option<String>,
}

/// Raw tag record as written next to each screenshot by the tagger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedShot {
    #[serde(rename = "_needsTagging", default)]
    pub needs_tagging: Option<bool>,
    #[serde(default)]
    pub film: Option<TaggedFilm>,
    #[serde(default)]
    pub director_style: Option<String>,
    #[serde(default)]
    pub shot: Option<TaggedCamera>,
    #[serde(default)]
    pub emotion: Option<TaggedEmotion>,
    #[serde(default)]
    pub lighting: Option<TaggedLighting>,
    #[serde(default)]
    pub environment: Option<TaggedEnvironment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genre: Vec<String>,
    #[serde(default)]
    pub decade: Option<String>,
    #[serde(default)]
    pub lens: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prompt_keywords: Option<String>,
    #[serde(default)]
    pub composition: Option<TaggedComposition>,
    #[serde(default)]
    pub subject: Option<TaggedSubject>,
    #[serde(default)]
    pub color_palette: Option<String>,
    #[serde(default)]
    pub film_stock: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub camera3d: Option<Camera3d>,
    #[serde(default)]
    pub costume: Option<TaggedCostume>,
    #[serde(default)]
    pub character_pose: Option<TaggedPose>,
    #[serde(default)]
    pub production_design: Option<TaggedProductionDesign>,
    #[serde(default)]
    pub narrative: Option<TaggedNarrative>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedFilm {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedCamera {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub angle: Option<String>,
    #[serde(default)]
    pub movement: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedEmotion {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub intensity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedLighting {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub color_temp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedEnvironment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedComposition {
    #[serde(default)]
    pub framing: Option<String>,
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedSubject {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub placement: Option<String>,
    #[serde(default)]
    pub eye_direction: Option<String>,
    #[serde(default)]
    pub pose: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedCostume {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub era: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_pieces: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedPose {
    #[serde(default)]
    pub posture: Option<String>,
    #[serde(default)]
    pub body_language: Option<String>,
    #[serde(default)]
    pub gesture: Option<String>,
    #[serde(default)]
    pub head_position: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedProductionDesign {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_props: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub practical_lights: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedNarrative {
    #[serde(default)]
    pub shot_purpose: Option<String>,
    #[serde(default)]
    pub narrative_beat: Option<String>,
    #[serde(default)]
    pub emotional_function: Option<String>,
    #[serde(default)]
    pub story_context: Option<String>,
}

impl TaggedShot {
    /// Only records the tagger has finished with make it into the index.
    pub fn is_tagged(&self) -> bool {
        self.needs_tagging == Some(false)
    }
}

impl ReferenceShot {
    pub fn from_tagged(id: impl Into<String>, image: impl Into<String>, tagged: TaggedShot) -> Self {
        let film = tagged.film.unwrap_or_default();
        let camera = tagged.shot.unwrap_or_default();
        let emotion = tagged.emotion.unwrap_or_default();
        let lighting = tagged.lighting.unwrap_or_default();
        let environment = tagged.environment.unwrap_or_default();
        let composition = tagged.composition.unwrap_or_default();
        let subject = tagged.subject.unwrap_or_default();

        ReferenceShot {
            id: id.into(),
            image: image.into(),
            film: film.title.unwrap_or_else(|| "Unknown".to_string()),
            year: film.year,
            director: tagged.director_style,
            shot: camera.kind,
            angle: camera.angle,
            movement: camera.movement,
            emotion: emotion.primary,
            emotion_intensity: emotion.intensity,
            lighting: lighting.kind,
            lighting_source: lighting.source,
            lighting_color: lighting.color_temp,
            environment: environment.kind,
            location: environment.location,
            weather: environment.weather,
            time_of_day: environment.time_of_day,
            genre: tagged.genre,
            decade: tagged.decade,
            lens: tagged.lens,
            tags: tagged.tags,
            prompt: tagged.prompt_keywords.unwrap_or_default(),
            framing: composition.framing,
            depth: composition.depth,
            composition_notes: composition.notes,
            subject_type: subject.kind,
            subject_description: subject.description,
            subject_placement: subject.placement,
            eye_direction: subject.eye_direction,
            pose: subject.pose,
            color_palette: tagged.color_palette,
            film_stock: tagged.film_stock,
            aspect_ratio: tagged.aspect_ratio,
            camera3d: tagged.camera3d,
            costume: tagged.costume.map(|c| Costume {
                style: c.style,
                era: c.era,
                key_pieces: c.key_pieces,
                condition: c.condition,
                colors: c.colors,
            }),
            character_pose: tagged.character_pose.map(|p| CharacterPose {
                posture: p.posture,
                body_language: p.body_language,
                gesture: p.gesture,
                head_position: p.head_position,
            }),
            production_design: tagged.production_design.map(|d| ProductionDesign {
                style: d.style,
                key_props: d.key_props,
                materials: d.materials,
                practical_lights: d.practical_lights,
            }),
            narrative: tagged.narrative.map(|n| Narrative {
                shot_purpose: n.shot_purpose,
                narrative_beat: n.narrative_beat,
                emotional_function: n.emotional_function,
                story_context: n.story_context,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShotFilters {
    pub directors: Vec<String>,
    pub emotions: Vec<String>,
    pub lighting: Vec<String>,
    pub shot_types: Vec<String>,
    pub environments: Vec<String>,
    pub decades: Vec<String>,
    pub films: Vec<String>,
    pub lenses: Vec<String>,
    pub angles: Vec<String>,
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
    values
        .flatten()
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl ShotFilters {
    pub fn from_shots(shots: &[ReferenceShot]) -> Self {
        ShotFilters {
            directors: distinct(shots.iter().map(|s| s.director.as_ref())),
            emotions: distinct(shots.iter().map(|s| s.emotion.as_ref())),
            lighting: distinct(shots.iter().map(|s| s.lighting.as_ref())),
            shot_types: distinct(shots.iter().map(|s| s.shot.as_ref())),
            environments: distinct(shots.iter().map(|s| s.environment.as_ref())),
            decades: distinct(shots.iter().map(|s| s.decade.as_ref())),
            films: distinct(shots.iter().map(|s| Some(&s.film))),
            lenses: distinct(shots.iter().map(|s| s.lens.as_ref())),
            angles: distinct(shots.iter().map(|s| s.angle.as_ref())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotIndex {
    #[serde(default)]
    pub generated: Option<String>,
    pub count: usize,
    #[serde(default)]
    pub filters: ShotFilters,
    pub shots: Vec<ReferenceShot>,
}

/// Catalog filters. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShotQuery {
    pub director: Option<String>,
    pub emotion: Option<String>,
    pub lighting: Option<String>,
    pub shot: Option<String>,
    pub lens: Option<String>,
    pub film: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

fn exact(filter: &Option<String>, value: &Option<String>) -> bool {
    match filter.as_deref().filter(|f| !f.is_empty()) {
        Some(f) => value.as_deref() == Some(f),
        None => true,
    }
}

impl ShotQuery {
    pub fn matches(&self, shot: &ReferenceShot) -> bool {
        if !(exact(&self.director, &shot.director)
            && exact(&self.emotion, &shot.emotion)
            && exact(&self.lighting, &shot.lighting)
            && exact(&self.shot, &shot.shot)
            && exact(&self.lens, &shot.lens))
        {
            return false;
        }

        if let Some(film) = self.film.as_deref().filter(|f| !f.is_empty()) {
            if !shot.film.to_lowercase().contains(&film.to_lowercase()) {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let mut fields: Vec<&str> = vec![shot.film.as_str()];
            for value in [&shot.director, &shot.emotion, &shot.lighting, &shot.shot, &shot.location] {
                fields.push(value.as_deref().unwrap_or(""));
            }
            fields.extend(shot.tags.iter().map(String::as_str));
            let haystack = fields.join(" ").to_lowercase();
            if !haystack.contains(&search.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

impl ShotIndex {
    pub fn from_shots(shots: Vec<ReferenceShot>) -> Self {
        ShotIndex {
            generated: None,
            count: shots.len(),
            filters: ShotFilters::from_shots(&shots),
            shots,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ReferenceShot> {
        self.shots.iter().find(|s| s.id == id)
    }

    pub fn query(&self, query: &ShotQuery) -> Vec<&ReferenceShot> {
        self.shots
            .iter()
            .filter(|s| query.matches(s))
            .take(query.limit.unwrap_or(DEFAULT_QUERY_LIMIT))
            .collect()
    }
}
