//! Execution plan builder: turns a scene into an ordered list of generation
//! requests.
//!
//! Building is a pure function of the scene, the shot index and
//! [`PlanOptions`]. The same input always serializes to the same bytes, so
//! every map in the output is a `BTreeMap`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::chain::resolve_chains;
use crate::index::ShotIndex;
use crate::models::select_model;
use crate::prompt::{compose_motion_prompt, compose_shot_prompt, direct_dialogue, SceneContext};
use crate::scene::{ChainRef, SceneDocument, Shot};

pub const DEFAULT_SHOT_DURATION: f64 = 5.0;
pub const DEFAULT_ASSET_BASE_URL: &str = "http://localhost:3333";

/// Checked before [`INTERIOR_KEYWORDS`]; anything unmatched is interior.
pub const EXTERIOR_KEYWORDS: [&str; 12] = [
    "street", "exterior", "driveway", "garden", "outside", "ext", "outdoor", "yard", "parking",
    "sidewalk", "road", "alley",
];

pub const INTERIOR_KEYWORDS: [&str; 15] = [
    "interior", "int", "inside", "room", "flat", "apartment", "house", "pub", "bar", "kitchen",
    "bedroom", "bathroom", "office", "hall", "corridor",
];

#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Prefix turning catalog image paths into fetchable URLs.
    pub asset_base_url: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions {
            asset_base_url: DEFAULT_ASSET_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntExt {
    #[serde(rename = "INT")]
    Interior,
    #[serde(rename = "EXT")]
    Exterior,
}

pub fn classify_location(location: Option<&str>) -> IntExt {
    let Some(location) = location else {
        return IntExt::Interior;
    };
    let lowered = location.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));
    mentions(&EXTERIOR_KEYWORDS)
        .then_some(IntExt::Exterior)
        .or_else(|| mentions(&INTERIOR_KEYWORDS).then_some(IntExt::Interior))
        .unwrap_or(IntExt::Interior)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRequirements {
    pub characters_needed: Vec<String>,
    pub location: Option<String>,
    pub int_ext: IntExt,
    pub props: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub shot_id: String,
    pub order: u32,
    pub model: String,
    pub model_reason: String,
    pub endpoint: String,
    pub duration: f64,
    pub inputs: BTreeMap<String, Value>,
    pub reference_shot: Option<String>,
    pub image_prompt: String,
    pub has_dialog: bool,
    pub dialog: Option<String>,
    pub dialog_voice: Option<String>,
    pub tts_required: bool,
    pub speaker_on_screen: bool,
    pub dialog_prompt_note: Option<String>,
    pub transition_in: String,
    pub transition_out: String,
    pub narrative_beat: Option<String>,
    pub chain_from_previous: bool,
    pub chain_ref: Option<ChainRef>,
    pub extract_last_frame: bool,
    #[serde(flatten)]
    pub assets: AssetRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessing {
    pub concat_videos: bool,
    pub add_transitions: bool,
    pub add_music: bool,
    pub music_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub scene_id: String,
    pub scene_name: Option<String>,
    pub description: Option<String>,
    pub total_shots: usize,
    pub estimated_duration: f64,
    pub shots: Vec<ExecutionStep>,
    pub post_processing: PostProcessing,
    /// Shots per model name for this plan only.
    pub model_tally: BTreeMap<String, usize>,
    pub chained_shots: usize,
}

/// Placeholder a runner substitutes with the last frame of a generated clip.
pub fn last_frame_placeholder(shot_id: &str) -> String {
    format!("{{output_{}_last_frame}}", shot_id)
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{}", seconds)
    }
}

fn requested_duration(shot: &Shot) -> f64 {
    shot.duration
        .or_else(|| shot.timing.as_ref().and_then(|t| t.generation_duration_sec))
        .filter(|d| *d > 0.0)
        .unwrap_or(DEFAULT_SHOT_DURATION)
}

fn present(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn build_execution_plan(scene: &SceneDocument, index: &ShotIndex, options: &PlanOptions) -> ExecutionPlan {
    let context = SceneContext::from_scene(scene);
    let links = resolve_chains(&scene.shots);
    let base_url = options.asset_base_url.trim_end_matches('/');

    let mut steps = Vec::with_capacity(scene.shots.len());
    let mut model_tally: BTreeMap<String, usize> = BTreeMap::new();
    let mut previous_output: Option<String> = None;
    let mut last_location: Option<String> = None;
    let mut estimated_duration = 0.0;
    let mut chained_shots = 0;

    for ((position, shot), link) in scene.shots.iter().enumerate().zip(links) {
        let order = shot.effective_order(position);
        let reference = shot.reference_shot.as_deref().and_then(|id| index.get(id));
        let selection = select_model(shot);
        let spec = selection.model.spec();

        let explicit_start = present(shot.start_frame.as_ref());
        let chain_ref = if explicit_start.is_some() { None } else { link };
        let chained = chain_ref.is_some();
        let start_frame = explicit_start
            .or_else(|| if chained { previous_output.clone() } else { None })
            .or_else(|| reference.map(|r| format!("{}/{}", base_url, r.image)))
            .or_else(|| shot.start_frame_index().map(|f| scene.analysis_frame(f)));

        let dialogue = shot.dialogue().map(str::to_string);
        let (motion, dialog_prompt_note) = match (dialogue.as_ref(), shot.speaker()) {
            (Some(_), Some(speaker)) => {
                let direction = direct_dialogue(
                    shot.motion_prompt.as_deref(),
                    speaker,
                    selection.speaker_on_screen,
                    order,
                );
                (direction.motion_prompt, Some(direction.note))
            }
            _ => (shot.motion_prompt.clone(), None),
        };

        let duration = selection.model.clamp_duration(requested_duration(shot));

        let mut inputs = BTreeMap::new();
        inputs.insert(
            spec.image_param.to_string(),
            start_frame.map(Value::String).unwrap_or(Value::Null),
        );
        inputs.insert("prompt".to_string(), Value::String(compose_motion_prompt(motion.as_deref())));
        inputs.insert("duration".to_string(), Value::String(format_seconds(duration)));
        if let (Some(end_param), Some(end_frame)) = (spec.end_image_param, present(shot.end_frame.as_ref())) {
            inputs.insert(end_param.to_string(), Value::String(end_frame));
        }

        let location = match shot.location_name() {
            Some(location) => {
                last_location = Some(location.to_string());
                Some(location.to_string())
            }
            None => last_location.clone(),
        };

        *model_tally.entry(selection.name.clone()).or_default() += 1;
        estimated_duration += duration;
        if chained {
            chained_shots += 1;
        }

        steps.push(ExecutionStep {
            shot_id: shot.shot_id.clone(),
            order,
            model: selection.name.clone(),
            model_reason: selection.reason.to_string(),
            endpoint: spec.endpoint.to_string(),
            duration,
            inputs,
            reference_shot: shot.reference_shot.clone(),
            image_prompt: compose_shot_prompt(shot, reference, &context),
            has_dialog: dialogue.is_some(),
            tts_required: dialogue.is_some(),
            dialog: dialogue,
            dialog_voice: present(shot.dialog_voice.as_ref()),
            speaker_on_screen: selection.speaker_on_screen,
            dialog_prompt_note,
            transition_in: shot.transition_in().to_string(),
            transition_out: shot.transition_out().to_string(),
            narrative_beat: present(shot.narrative_beat.as_ref()),
            chain_from_previous: chained,
            chain_ref,
            extract_last_frame: true,
            assets: AssetRequirements {
                characters_needed: shot.characters(),
                int_ext: classify_location(location.as_deref()),
                location,
                props: shot.prop_items().to_vec(),
            },
        });

        previous_output = Some(
            present(shot.end_frame.as_ref()).unwrap_or_else(|| last_frame_placeholder(&shot.shot_id)),
        );
    }

    let music_file = present(scene.music_cue.as_ref());
    ExecutionPlan {
        scene_id: scene.scene_id.clone(),
        scene_name: scene.name.clone(),
        description: scene.description.clone(),
        total_shots: steps.len(),
        estimated_duration,
        shots: steps,
        post_processing: PostProcessing {
            concat_videos: true,
            add_transitions: true,
            add_music: music_file.is_some(),
            music_file,
        },
        model_tally,
        chained_shots,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchShot {
    pub shot_id: String,
    pub model: String,
    pub endpoint: String,
    pub inputs: BTreeMap<String, Value>,
    pub duration: f64,
    pub tts: Option<TtsRequest>,
    pub transition_out: String,
}

/// Trimmed plan handed to a workflow runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub scene_id: String,
    pub scene_name: Option<String>,
    pub shots: Vec<DispatchShot>,
    pub post_processing: PostProcessing,
}

impl DispatchPayload {
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        DispatchPayload {
            scene_id: plan.scene_id.clone(),
            scene_name: plan.scene_name.clone(),
            shots: plan
                .shots
                .iter()
                .map(|step| DispatchShot {
                    shot_id: step.shot_id.clone(),
                    model: step.model.clone(),
                    endpoint: step.endpoint.clone(),
                    inputs: step.inputs.clone(),
                    duration: step.duration,
                    tts: step.dialog.as_ref().filter(|_| step.has_dialog).map(|text| TtsRequest {
                        text: text.clone(),
                        voice: step.dialog_voice.clone(),
                    }),
                    transition_out: step.transition_out.clone(),
                })
                .collect(),
            post_processing: plan.post_processing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ReferenceShot;
    use serde_json::json;

    fn scene(value: Value) -> SceneDocument {
        serde_json::from_value(value).unwrap()
    }

    fn index() -> ShotIndex {
        ShotIndex::from_shots(vec![ReferenceShot {
            id: "br2049-001".into(),
            image: "_source/film-grab/br2049/br2049-001.jpg".into(),
            film: "Blade Runner 2049".into(),
            subject_description: Some("replicant in long coat".into()),
            lighting: Some("volumetric".into()),
            ..Default::default()
        }])
    }

    #[test]
    fn test_dialogue_scene_selects_lip_sync_for_speaker() {
        let doc = scene(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "A", "order": 1},
                {"shot_id": "B", "order": 2, "audio": {"dialog": "hello", "speaker": "bob"},
                 "subject_primary": {"who": "bob"}, "camera": {"movement": "static"}}
            ]
        }));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        assert_eq!(plan.shots[0].model, "kling-2.6");
        assert_eq!(plan.shots[1].model, "seedance-1.5");
        assert!(plan.shots[1].has_dialog);
        assert!(!plan.shots[0].has_dialog);
        assert_eq!(plan.model_tally.get("kling-2.6"), Some(&1));
        assert_eq!(plan.model_tally.get("seedance-1.5"), Some(&1));
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let doc = scene(json!({
            "scene_id": "s",
            "music_cue": "dont_stop_me_now.mp3",
            "shots": [
                {"shot_id": "a", "reference_shot": "br2049-001", "timing": {"start_frame": 1, "end_frame": 4}},
                {"shot_id": "b", "timing": {"start_frame": 5, "end_frame": 9}, "motion_prompt": "slow push in",
                 "end_frame": "frames/b_end.jpg", "props": {"items": ["cricket bat"]}}
            ]
        }));
        let first = serde_json::to_string(&build_execution_plan(&doc, &index(), &PlanOptions::default())).unwrap();
        let second = serde_json::to_string(&build_execution_plan(&doc, &index(), &PlanOptions::default())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_start_frame_resolution() {
        let doc = scene(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "a", "reference_shot": "br2049-001", "timing": {"start_frame": 1, "end_frame": 4}},
                {"shot_id": "b", "timing": {"start_frame": 5, "end_frame": 9}},
                {"shot_id": "c", "start_frame": "frames/c.jpg", "timing": {"start_frame": 10, "end_frame": 12}},
                {"shot_id": "d", "reference_shot": "missing", "timing": {"start_frame": 40, "end_frame": 44}}
            ]
        }));
        let plan = build_execution_plan(&doc, &index(), &PlanOptions { asset_base_url: "http://cdn/".into() });

        assert_eq!(
            plan.shots[0].inputs["image_url"],
            json!("http://cdn/_source/film-grab/br2049/br2049-001.jpg")
        );
        assert!(!plan.shots[0].chain_from_previous);

        assert!(plan.shots[1].chain_from_previous);
        assert_eq!(plan.shots[1].inputs["image_url"], json!("{output_a_last_frame}"));
        assert_eq!(plan.shots[1].chain_ref.as_ref().unwrap().from_shot, "a");

        assert!(!plan.shots[2].chain_from_previous);
        assert_eq!(plan.shots[2].inputs["image_url"], json!("frames/c.jpg"));

        assert!(!plan.shots[3].chain_from_previous);
        assert_eq!(plan.shots[3].inputs["image_url"], json!("/scenes/s/analysis_3fps/frame_0040.jpg"));
        assert_eq!(plan.chained_shots, 1);
    }

    #[test]
    fn test_end_frame_only_when_model_accepts_it() {
        let doc = scene(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "a", "end_frame": "frames/a_end.jpg"},
                {"shot_id": "b", "model": "kling-2.6", "end_frame": "frames/b_end.jpg"}
            ]
        }));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        assert_eq!(plan.shots[0].model, "kling-o1");
        assert_eq!(plan.shots[0].inputs["tail_image_url"], json!("frames/a_end.jpg"));
        assert!(plan.shots[0].inputs.contains_key("start_image_url"));
        assert_eq!(plan.shots[1].inputs.len(), 3);
        assert!(!plan.shots[1].inputs.contains_key("tail_image_url"));
    }

    #[test]
    fn test_duration_clamped_and_summed() {
        let doc = scene(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "a", "duration": 8, "dialog": "hello there"},
                {"shot_id": "b", "duration": 12},
                {"shot_id": "c"}
            ]
        }));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        assert_eq!(plan.shots[0].duration, 5.0);
        assert_eq!(plan.shots[0].inputs["duration"], json!("5"));
        assert_eq!(plan.shots[1].duration, 10.0);
        assert_eq!(plan.shots[2].duration, 5.0);
        assert_eq!(plan.estimated_duration, 20.0);
    }

    #[test]
    fn test_location_carries_forward_and_classifies() {
        let doc = scene(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "a", "environment": {"location": "Shaun's street"}},
                {"shot_id": "b"},
                {"shot_id": "c", "environment": {"location": "Winchester pub"}},
                {"shot_id": "d", "location": "cellar"}
            ]
        }));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        assert_eq!(plan.shots[1].assets.location.as_deref(), Some("Shaun's street"));
        assert_eq!(plan.shots[1].assets.int_ext, IntExt::Exterior);
        assert_eq!(plan.shots[2].assets.int_ext, IntExt::Interior);
        assert_eq!(plan.shots[3].assets.location.as_deref(), Some("cellar"));
        assert_eq!(plan.shots[3].assets.int_ext, IntExt::Interior);
    }

    #[test]
    fn test_classify_location() {
        assert_eq!(classify_location(None), IntExt::Interior);
        assert_eq!(classify_location(Some("Back Garden")), IntExt::Exterior);
        assert_eq!(classify_location(Some("kitchen")), IntExt::Interior);
        assert_eq!(classify_location(Some("nowhere in particular")), IntExt::Interior);
    }

    #[test]
    fn test_post_processing_and_dispatch() {
        let doc = scene(json!({
            "scene_id": "s",
            "name": "The Plan",
            "music_cue": "music/queen.mp3",
            "shots": [
                {"shot_id": "a", "dialog": "cup of tea?", "dialog_voice": "shaun_voice", "transition_out": "wipe"},
                {"shot_id": "b"}
            ]
        }));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        assert!(plan.post_processing.add_music);
        assert_eq!(plan.post_processing.music_file.as_deref(), Some("music/queen.mp3"));
        assert_eq!(plan.shots[1].transition_in, "cut");

        let payload = DispatchPayload::from_plan(&plan);
        assert_eq!(payload.shots.len(), 2);
        let tts = payload.shots[0].tts.as_ref().unwrap();
        assert_eq!(tts.text, "cup of tea?");
        assert_eq!(tts.voice.as_deref(), Some("shaun_voice"));
        assert_eq!(payload.shots[0].transition_out, "wipe");
        assert!(payload.shots[1].tts.is_none());
    }

    #[test]
    fn test_on_screen_dialogue_gets_speaking_direction() {
        let doc = scene(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "a", "audio": {"dialog": "we take car", "speaker": "shaun"},
                 "subject_primary": {"who": "Shaun"}}
            ]
        }));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        let step = &plan.shots[0];
        assert!(step.speaker_on_screen);
        assert_eq!(step.dialog_prompt_note.as_deref(), Some("SHAUN speaking ON SCREEN - lip sync needed"));
        assert_eq!(
            step.inputs["prompt"],
            json!("Character talks animatedly, gesturing, then settles")
        );
    }

    #[test]
    fn test_step_serializes_flat_asset_fields() {
        let doc = scene(json!({"scene_id": "s", "shots": [{"shot_id": "a", "props": {"items": ["mug"]}}]}));
        let plan = build_execution_plan(&doc, &ShotIndex::default(), &PlanOptions::default());
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["shots"][0]["int_ext"], json!("INT"));
        assert_eq!(value["shots"][0]["props"], json!(["mug"]));
        assert_eq!(value["total_shots"], json!(1));
    }
}
