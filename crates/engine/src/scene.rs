use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_TRANSITION: &str = "cut";

/// Tagged documents write `null` where a field is unknown; read it as the
/// field's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A scene: an ordered list of shots plus scene-level defaults.
///
/// Fields the engine does not interpret are kept in `extra` so a document can
/// be read, annotated and written back without losing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub scene_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_cue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_estimate: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub character_references: BTreeMap<String, CharacterReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_style: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shots: Vec<Shot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub shot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain_from_previous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_ref: Option<ChainRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<Camera>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_primary: Option<SubjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_secondary: Option<SubjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Props>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_out: Option<String>,
    /// Explicit model override; `"auto"` means let the selector decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_on_screen: Option<bool>,
    /// Explicit starting image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<String>,
    /// Terminal image reference the clip must land on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "std::ops::Not::not")]
    pub needs_end_frame: bool,
    /// Catalog shot id in the Shot Index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_shot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Legacy top-level dialogue; `audio.dialog` wins when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_prompt_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_beat: Option<String>,
    /// Legacy top-level location; `environment.location` wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRef {
    pub from_shot: String,
    pub use_frame: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_duration_sec: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_framing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_framing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    #[serde(default)]
    pub dialog: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `who` is either a single name or a list of names. Lists may hold `null`
/// entries; they are kept for round-tripping and skipped by [`Who::names`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Who {
    One(String),
    Many(Vec<Option<String>>),
}

impl Who {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Who::One(name) => vec![name.as_str()],
            Who::Many(names) => names.iter().flatten().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectRef {
    #[serde(default)]
    pub who: Option<Who>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub visible_elements: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Props {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Transition markers, blur markers and underscore-joined technical labels
/// show up in `who` lists but are not characters.
pub fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    name.is_empty() || name.contains('_') || name.contains("blur") || name.contains("transition")
}

impl Shot {
    /// Order used for sequencing; falls back to the 1-based position.
    pub fn effective_order(&self, position: usize) -> u32 {
        self.order.unwrap_or(position as u32 + 1)
    }

    pub fn dialogue(&self) -> Option<&str> {
        non_empty(self.audio.as_ref().and_then(|a| a.dialog.as_ref()))
            .or_else(|| non_empty(self.dialog.as_ref()))
    }

    pub fn speaker(&self) -> Option<&str> {
        non_empty(self.audio.as_ref().and_then(|a| a.speaker.as_ref()))
    }

    /// Movement text used for camera-motion detection: the tagged camera
    /// movement, or the free-form motion prompt when untagged.
    pub fn movement_text(&self) -> Option<&str> {
        non_empty(self.camera.as_ref().and_then(|c| c.movement.as_ref()))
            .or_else(|| non_empty(self.motion_prompt.as_ref()))
    }

    pub fn start_framing(&self) -> Option<&str> {
        non_empty(self.camera.as_ref().and_then(|c| c.start_framing.as_ref()))
    }

    pub fn location_name(&self) -> Option<&str> {
        non_empty(self.environment.as_ref().and_then(|e| e.location.as_ref()))
            .or_else(|| non_empty(self.location.as_ref()))
    }

    pub fn start_frame_index(&self) -> Option<i64> {
        self.timing.as_ref().and_then(|t| t.start_frame)
    }

    pub fn end_frame_index(&self) -> Option<i64> {
        self.timing.as_ref().and_then(|t| t.end_frame)
    }

    pub fn transition_in(&self) -> &str {
        non_empty(self.transition_in.as_ref()).unwrap_or(DEFAULT_TRANSITION)
    }

    pub fn transition_out(&self) -> &str {
        non_empty(self.transition_out.as_ref()).unwrap_or(DEFAULT_TRANSITION)
    }

    pub fn explicit_model(&self) -> Option<&str> {
        non_empty(self.model.as_ref()).filter(|m| !m.eq_ignore_ascii_case("auto"))
    }

    pub fn has_end_frame(&self) -> bool {
        non_empty(self.end_frame.as_ref()).is_some()
    }

    pub fn primary_names(&self) -> Vec<&str> {
        who_names(self.subject_primary.as_ref())
    }

    pub fn secondary_names(&self) -> Vec<&str> {
        who_names(self.subject_secondary.as_ref())
    }

    /// Lowercased primary + secondary subject names with placeholders removed.
    pub fn characters(&self) -> Vec<String> {
        self.primary_names()
            .into_iter()
            .chain(self.secondary_names())
            .filter(|n| !is_placeholder_name(n))
            .map(|n| n.trim().to_lowercase())
            .collect()
    }

    pub fn prop_items(&self) -> &[String] {
        self.props.as_ref().map(|p| p.items.as_slice()).unwrap_or(&[])
    }

    pub fn prop_interaction(&self) -> Option<&str> {
        non_empty(self.props.as_ref().and_then(|p| p.interaction.as_ref()))
    }
}

fn who_names(subject: Option<&SubjectRef>) -> Vec<&str> {
    subject
        .and_then(|s| s.who.as_ref())
        .map(Who::names)
        .unwrap_or_default()
}

impl SceneDocument {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Checks the preconditions every engine operation assumes.
    pub fn validate(&self) -> EngineResult<()> {
        if self.scene_id.trim().is_empty() {
            return Err(EngineError::EmptySceneId);
        }

        let mut seen = HashSet::new();
        let mut previous: Option<u32> = None;
        for (position, shot) in self.shots.iter().enumerate() {
            if shot.shot_id.trim().is_empty() {
                return Err(EngineError::EmptyShotId(position));
            }
            if !seen.insert(shot.shot_id.as_str()) {
                return Err(EngineError::DuplicateShotId(shot.shot_id.clone()));
            }
            let order = shot.effective_order(position);
            if let Some(prev) = previous {
                if order <= prev {
                    return Err(EngineError::OutOfOrder {
                        shot_id: shot.shot_id.clone(),
                        order,
                        previous: prev,
                    });
                }
            }
            previous = Some(order);
        }
        Ok(())
    }

    pub fn shot(&self, shot_id: &str) -> Option<&Shot> {
        self.shots.iter().find(|s| s.shot_id == shot_id)
    }

    /// Path of an extracted analysis frame, served from the data root.
    pub fn analysis_frame(&self, frame: i64) -> String {
        format!("/scenes/{}/analysis_3fps/frame_{:04}.jpg", self.scene_id, frame)
    }
}
