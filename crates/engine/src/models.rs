//! Generation model catalog and per-shot model selection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scene::Shot;

/// Keywords that mark camera movement in a movement description.
pub const MOVEMENT_KEYWORDS: [&str; 9] = [
    "dolly", "orbit", "zoom", "push", "pull", "pan", "tilt", "track", "crane",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GenerationModel {
    /// Lip-sync capable.
    #[serde(rename = "seedance-1.5")]
    Seedance,
    /// Start + end frame transitions.
    #[serde(rename = "kling-o1")]
    KlingO1,
    /// Base image-to-video.
    #[serde(rename = "kling-2.6")]
    Kling26,
}

/// Fixed input schema and limits of a generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub endpoint: &'static str,
    pub image_param: &'static str,
    pub end_image_param: Option<&'static str>,
    pub supports_dialog: bool,
    pub max_duration: f64,
}

const SEEDANCE: ModelSpec = ModelSpec {
    endpoint: "fal-ai/seedance-1.5",
    image_param: "image_url",
    end_image_param: Some("end_image_url"),
    supports_dialog: true,
    max_duration: 5.0,
};

const KLING_O1: ModelSpec = ModelSpec {
    endpoint: "fal-ai/kling-video/o1",
    image_param: "start_image_url",
    end_image_param: Some("tail_image_url"),
    supports_dialog: false,
    max_duration: 10.0,
};

const KLING_26: ModelSpec = ModelSpec {
    endpoint: "fal-ai/kling-video/v2.6",
    image_param: "image_url",
    end_image_param: None,
    supports_dialog: false,
    max_duration: 10.0,
};

impl GenerationModel {
    pub const BASE: GenerationModel = GenerationModel::Kling26;

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationModel::Seedance => "seedance-1.5",
            GenerationModel::KlingO1 => "kling-o1",
            GenerationModel::Kling26 => "kling-2.6",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "seedance-1.5" => Some(GenerationModel::Seedance),
            "kling-o1" => Some(GenerationModel::KlingO1),
            "kling-2.6" => Some(GenerationModel::Kling26),
            _ => None,
        }
    }

    pub fn spec(&self) -> &'static ModelSpec {
        match self {
            GenerationModel::Seedance => &SEEDANCE,
            GenerationModel::KlingO1 => &KLING_O1,
            GenerationModel::Kling26 => &KLING_26,
        }
    }

    pub fn clamp_duration(&self, requested: f64) -> f64 {
        requested.min(self.spec().max_duration)
    }
}

impl fmt::Display for GenerationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    Explicit,
    OnScreenStatic { speaker: String },
    OnScreenMoving { speaker: String, movement: String },
    Voiceover { speaker: String },
    UnattributedDialogue,
    EndFrameWithMovement,
    EndFrame,
    Default,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::Explicit => write!(f, "Explicitly specified"),
            SelectionReason::OnScreenStatic { speaker } => {
                write!(f, "{} ON SCREEN, static camera - lip sync", speaker)
            }
            SelectionReason::OnScreenMoving { speaker, movement } => {
                write!(f, "{} ON SCREEN but camera moving ({})", speaker, movement)
            }
            SelectionReason::Voiceover { speaker } => write!(f, "{} OFF SCREEN - voiceover", speaker),
            SelectionReason::UnattributedDialogue => write!(f, "Has dialog - lip sync"),
            SelectionReason::EndFrameWithMovement => {
                write!(f, "Camera movement with end frame - start+end transition")
            }
            SelectionReason::EndFrame => write!(f, "Has end frame - start+end transition"),
            SelectionReason::Default => write!(f, "Default motion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    /// Model name as it appears in the plan. Explicit overrides are kept verbatim.
    pub name: String,
    /// Model whose parameter schema applies. Unknown overrides use the base model.
    pub model: GenerationModel,
    pub reason: SelectionReason,
    pub speaker_on_screen: bool,
}

impl ModelSelection {
    fn auto(model: GenerationModel, reason: SelectionReason, speaker_on_screen: bool) -> Self {
        ModelSelection {
            name: model.as_str().to_string(),
            model,
            reason,
            speaker_on_screen,
        }
    }
}

/// True when any word of `text` starts with one of [`MOVEMENT_KEYWORDS`],
/// so "tracking" and "zoom_in" count but "static" does not.
pub fn is_moving_camera(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| MOVEMENT_KEYWORDS.iter().any(|kw| word.starts_with(kw)))
}

/// Fuzzy visibility test: the speaker matches a visible subject when either
/// name contains the other, case-insensitively.
pub fn speaker_visible(speaker: &str, visible: &[String]) -> bool {
    let speaker = speaker.trim().to_lowercase();
    if speaker.is_empty() {
        return false;
    }
    visible
        .iter()
        .filter(|name| !name.is_empty())
        .any(|name| name.contains(&speaker) || speaker.contains(name.as_str()))
}

/// Picks the generation model for a shot. First matching rule wins:
///
/// 1. explicit non-`auto` override
/// 2. dialogue: on-screen speaker with a static camera gets the lip-sync
///    model, a moving camera gets the transition model, an off-screen speaker
///    is voiceover (transition model only if an end frame is needed)
/// 3. end frame + camera movement
/// 4. end frame
/// 5. base model
pub fn select_model(shot: &Shot) -> ModelSelection {
    if let Some(name) = shot.explicit_model() {
        return ModelSelection {
            name: name.to_string(),
            model: GenerationModel::from_name(name).unwrap_or(GenerationModel::BASE),
            reason: SelectionReason::Explicit,
            speaker_on_screen: shot
                .speaker()
                .map(|s| speaker_visible(s, &shot.characters()))
                .unwrap_or(false),
        };
    }

    let movement = shot.movement_text();
    let moving = movement.map(is_moving_camera).unwrap_or(false);
    let has_terminal_frame = shot.has_end_frame() || shot.needs_end_frame;

    if shot.dialogue().is_some() {
        let Some(speaker) = shot.speaker() else {
            return ModelSelection::auto(
                GenerationModel::Seedance,
                SelectionReason::UnattributedDialogue,
                false,
            );
        };

        let on_screen = speaker_visible(speaker, &shot.characters());
        return match (on_screen, moving) {
            (true, false) => ModelSelection::auto(
                GenerationModel::Seedance,
                SelectionReason::OnScreenStatic { speaker: speaker.to_string() },
                true,
            ),
            (true, true) => ModelSelection::auto(
                GenerationModel::KlingO1,
                SelectionReason::OnScreenMoving {
                    speaker: speaker.to_string(),
                    movement: movement.unwrap_or_default().to_string(),
                },
                true,
            ),
            (false, _) => {
                let model = if has_terminal_frame || moving {
                    GenerationModel::KlingO1
                } else {
                    GenerationModel::BASE
                };
                ModelSelection::auto(
                    model,
                    SelectionReason::Voiceover { speaker: speaker.to_string() },
                    false,
                )
            }
        };
    }

    if has_terminal_frame && moving {
        return ModelSelection::auto(GenerationModel::KlingO1, SelectionReason::EndFrameWithMovement, false);
    }
    if has_terminal_frame {
        return ModelSelection::auto(GenerationModel::KlingO1, SelectionReason::EndFrame, false);
    }
    ModelSelection::auto(GenerationModel::BASE, SelectionReason::Default, false)
}
