//! Splitting a speech transcript across shots by frame range, and reporting
//! which shots carry dialogue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scene::{is_placeholder_name, Audio, SceneDocument, Shot};

/// Rate the analysis frames were extracted at.
pub const ANALYSIS_FPS: f64 = 3.0;
/// Conversational speech rate used to spread a line's words over time.
pub const WORDS_PER_SECOND: f64 = 3.5;
pub const WHISPER_SOURCE: &str = "whisper_split";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub chunks: Vec<TranscriptChunk>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    #[serde(default)]
    pub lines: Vec<TranscriptLine>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
    /// Seconds from the start of the clip.
    pub approx_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitOptions {
    pub fps: f64,
    pub words_per_second: f64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions {
            fps: ANALYSIS_FPS,
            words_per_second: WORDS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedWord {
    pub word: String,
    pub speaker: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: i64,
    pub end_frame: i64,
}

fn frame_at(seconds: f64, fps: f64) -> i64 {
    (seconds * fps).floor() as i64 + 1
}

/// Every word of the transcript with an estimated time and frame span.
pub fn word_timeline(transcript: &Transcript, options: &SplitOptions) -> Vec<TimedWord> {
    let mut timeline = Vec::new();
    for line in transcript.chunks.iter().flat_map(|c| c.lines.iter()) {
        let words: Vec<&str> = line.text.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let per_word = 1.0 / options.words_per_second;
        for (i, word) in words.iter().enumerate() {
            let start_time = line.approx_time + i as f64 * per_word;
            let end_time = start_time + per_word;
            timeline.push(TimedWord {
                word: word.to_string(),
                speaker: line.speaker.clone(),
                start_time,
                end_time,
                start_frame: frame_at(start_time, options.fps),
                end_frame: frame_at(end_time, options.fps),
            });
        }
    }
    timeline
}

fn words_in_shot<'a>(timeline: &'a [TimedWord], shot: &Shot) -> Vec<&'a TimedWord> {
    let start = shot.start_frame_index().unwrap_or(0);
    let end = shot.end_frame_index().unwrap_or(0);
    timeline
        .iter()
        .filter(|w| w.start_frame <= end && w.end_frame >= start)
        .collect()
}

/// Rewrites each shot's audio from the transcript. Shots no word overlaps get
/// their dialogue cleared. Returns how many shots received dialogue.
pub fn split_transcript(scene: &mut SceneDocument, transcript: &Transcript, options: &SplitOptions) -> usize {
    let timeline = word_timeline(transcript, options);
    let mut updated = 0;

    for shot in &mut scene.shots {
        let words = words_in_shot(&timeline, shot);
        let audio = shot.audio.get_or_insert_with(Audio::default);

        if words.is_empty() {
            audio.dialog = None;
            audio.speaker = None;
            audio.word_count = Some(0);
            audio.dialog_source = None;
            continue;
        }

        let text = words.iter().map(|w| w.word.as_str()).collect::<Vec<_>>().join(" ");
        audio.dialog = Some(text);
        audio.speaker = words.iter().find_map(|w| w.speaker.clone());
        audio.word_count = Some(words.len() as u32);
        audio.dialog_source = Some(WHISPER_SOURCE.to_string());
        updated += 1;
    }

    updated
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpokenShot {
    pub shot_id: String,
    pub speaker: Option<String>,
    pub dialog: String,
    pub has_timestamp: bool,
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    pub start_frame: Option<i64>,
    pub end_frame: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilentShot {
    pub shot_id: String,
    pub characters: Vec<String>,
    pub start_frame: Option<i64>,
    pub end_frame: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueReport {
    pub scene_id: String,
    pub shots_with_dialogue: Vec<SpokenShot>,
    pub shots_unknown_dialogue: Vec<SilentShot>,
    pub transcript_exists: bool,
}

fn audio_extra<'a>(shot: &'a Shot, key: &str) -> Option<&'a Value> {
    shot.audio.as_ref().and_then(|a| a.extra.get(key))
}

/// Shots with dialogue, and shots showing characters whose lines are unknown.
pub fn dialogue_report(scene: &SceneDocument, transcript_exists: bool) -> DialogueReport {
    let mut spoken = Vec::new();
    let mut silent = Vec::new();

    for shot in &scene.shots {
        let start_frame = shot.start_frame_index();
        let end_frame = shot.end_frame_index();

        if let Some(dialog) = shot.audio.as_ref().and_then(|a| a.dialog.as_deref()).filter(|d| !d.is_empty()) {
            let start_time = audio_extra(shot, "dialog_start_time").cloned();
            spoken.push(SpokenShot {
                shot_id: shot.shot_id.clone(),
                speaker: shot
                    .speaker()
                    .or_else(|| shot.primary_names().into_iter().next())
                    .map(str::to_string),
                dialog: dialog.to_string(),
                has_timestamp: start_time.is_some(),
                start_time,
                end_time: audio_extra(shot, "dialog_end_time").cloned(),
                start_frame,
                end_frame,
            });
            continue;
        }

        let characters: Vec<String> = shot
            .primary_names()
            .into_iter()
            .chain(shot.secondary_names())
            .map(str::trim)
            .filter(|n| !is_placeholder_name(n))
            .map(str::to_string)
            .collect();
        if !characters.is_empty() {
            silent.push(SilentShot {
                shot_id: shot.shot_id.clone(),
                characters,
                start_frame,
                end_frame,
            });
        }
    }

    DialogueReport {
        scene_id: scene.scene_id.clone(),
        shots_with_dialogue: spoken,
        shots_unknown_dialogue: silent,
        transcript_exists,
    }
}
