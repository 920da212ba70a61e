//! Frame chaining: whether a shot continues from its predecessor's last frame.

use serde::Serialize;

use crate::scene::{ChainRef, SceneDocument, Shot};

/// Transitions that visibly break continuity on either boundary.
pub const BREAKING_TRANSITIONS: [&str; 4] = ["whip_pan", "wipe", "dissolve", "fade"];

pub const SAME_SPEAKER_MAX_GAP: i64 = 2;
pub const ADJACENT_MAX_GAP: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainRule {
    SharedLocationAndSubject,
    SameSpeaker,
    AdjacentFrames,
}

fn normalize_transition(label: &str) -> String {
    label.trim().to_lowercase().replace(['-', ' '], "_")
}

pub fn is_breaking_transition(label: &str) -> bool {
    let label = normalize_transition(label);
    BREAKING_TRANSITIONS.iter().any(|t| label.contains(t))
}

/// Frames between the previous shot's end and this shot's start. Unknown
/// when either side has no timing or the difference overflows.
pub fn frame_gap(previous: &Shot, current: &Shot) -> Option<i64> {
    current.start_frame_index()?.checked_sub(previous.end_frame_index()?)
}

fn shares_subject(previous: &[String], current: &[String]) -> bool {
    current
        .iter()
        .any(|c| previous.iter().any(|p| c.contains(p.as_str()) || p.contains(c.as_str())))
}

fn lowered(value: Option<&str>) -> Option<String> {
    value.map(str::to_lowercase)
}

/// Returns the rule under which `current` continues from `previous`, if any.
pub fn chain_rule(previous: &Shot, current: &Shot) -> Option<ChainRule> {
    if is_breaking_transition(previous.transition_out()) || is_breaking_transition(current.transition_in()) {
        return None;
    }

    let gap = frame_gap(previous, current);

    let same_location = match (lowered(previous.location_name()), lowered(current.location_name())) {
        (Some(p), Some(c)) => p == c,
        _ => false,
    };
    if same_location && shares_subject(&previous.characters(), &current.characters()) {
        return Some(ChainRule::SharedLocationAndSubject);
    }

    let same_speaker = match (lowered(previous.speaker()), lowered(current.speaker())) {
        (Some(p), Some(c)) => p == c,
        _ => false,
    };
    if same_speaker && gap.is_some_and(|g| g <= SAME_SPEAKER_MAX_GAP) {
        return Some(ChainRule::SameSpeaker);
    }

    if gap.is_some_and(|g| g <= ADJACENT_MAX_GAP) {
        return Some(ChainRule::AdjacentFrames);
    }

    None
}

/// Single left-to-right pass. Entry `i` is the link for `shots[i]`; the first
/// shot never chains.
pub fn resolve_chains(shots: &[Shot]) -> Vec<Option<ChainRef>> {
    let mut links = Vec::with_capacity(shots.len());
    for (i, shot) in shots.iter().enumerate() {
        let link = i
            .checked_sub(1)
            .map(|p| &shots[p])
            .filter(|previous| chain_rule(previous, shot).is_some())
            .map(|previous| ChainRef {
                from_shot: previous.shot_id.clone(),
                use_frame: previous.end_frame_index(),
            });
        links.push(link);
    }
    links
}

/// Writes `chain_from_previous` / `chain_ref` onto every shot of the scene and
/// returns the number of chained shots.
pub fn annotate_chains(scene: &mut SceneDocument) -> usize {
    let links = resolve_chains(&scene.shots);
    let mut chained = 0;
    for (shot, link) in scene.shots.iter_mut().zip(links) {
        shot.chain_from_previous = link.is_some();
        if link.is_some() {
            chained += 1;
        }
        shot.chain_ref = link;
    }
    chained
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shot(value: serde_json::Value) -> Shot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_adjacent_frames_always_chain() {
        let a = shot(json!({"shot_id": "a", "timing": {"start_frame": 1, "end_frame": 10},
            "environment": {"location": "pub"}, "subject_primary": {"who": "shaun"}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 11, "end_frame": 20},
            "environment": {"location": "street"}, "subject_primary": {"who": "liz"}}));
        assert_eq!(chain_rule(&a, &b), Some(ChainRule::AdjacentFrames));
    }

    #[test]
    fn test_breaking_transition_blocks_adjacent_chain() {
        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10}, "transition_out": "whip-pan"}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 10}}));
        assert_eq!(chain_rule(&a, &b), None);

        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 10}, "transition_in": "Cross Dissolve"}));
        assert_eq!(chain_rule(&a, &b), None);
    }

    #[test]
    fn test_shared_location_and_subject() {
        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10},
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Shaun Riley"}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 40},
            "environment": {"location": "winchester"}, "subject_secondary": {"who": ["shaun"]}}));
        assert_eq!(chain_rule(&a, &b), Some(ChainRule::SharedLocationAndSubject));
    }

    #[test]
    fn test_shared_location_needs_shared_subject() {
        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10},
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Shaun"}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 40},
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Barbara"}}));
        assert_eq!(chain_rule(&a, &b), None);
    }

    #[test]
    fn test_breaking_transition_blocks_shared_location() {
        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10}, "transition_out": "fade to black",
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Shaun"}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 11},
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Shaun"}}));
        assert_eq!(chain_rule(&a, &b), None);

        let a = shot(json!({"shot_id": "a",
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Shaun"}}));
        let b = shot(json!({"shot_id": "b", "transition_in": "wipe",
            "environment": {"location": "Winchester"}, "subject_primary": {"who": "Shaun"}}));
        assert_eq!(chain_rule(&a, &b), None);
    }

    #[test]
    fn test_same_speaker_needs_close_frames() {
        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10}, "audio": {"speaker": "Ed"}}));
        let close = shot(json!({"shot_id": "b", "timing": {"start_frame": 12}, "audio": {"speaker": "ed"}}));
        let far = shot(json!({"shot_id": "c", "timing": {"start_frame": 13}, "audio": {"speaker": "ed"}}));
        assert_eq!(chain_rule(&a, &close), Some(ChainRule::SameSpeaker));
        assert_eq!(chain_rule(&a, &far), None);
    }

    #[test]
    fn test_missing_timing_never_chains_on_gap() {
        let a = shot(json!({"shot_id": "a"}));
        let b = shot(json!({"shot_id": "b"}));
        assert_eq!(frame_gap(&a, &b), None);
        assert_eq!(chain_rule(&a, &b), None);
    }

    #[test]
    fn test_extreme_frames_have_no_gap() {
        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": i64::MAX}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": i64::MIN}}));
        assert_eq!(frame_gap(&a, &b), None);
        assert_eq!(chain_rule(&a, &b), None);

        let a = shot(json!({"shot_id": "a", "timing": {"end_frame": 10}}));
        let b = shot(json!({"shot_id": "b", "timing": {"start_frame": 4}}));
        assert_eq!(frame_gap(&a, &b), Some(-6));
    }

    #[test]
    fn test_annotate_first_shot_never_chains() {
        let mut scene: SceneDocument = serde_json::from_value(json!({
            "scene_id": "s",
            "shots": [
                {"shot_id": "a", "chain_from_previous": true, "timing": {"start_frame": 1, "end_frame": 5}},
                {"shot_id": "b", "timing": {"start_frame": 6, "end_frame": 9}},
                {"shot_id": "c", "timing": {"start_frame": 30, "end_frame": 40}}
            ]
        }))
        .unwrap();

        assert_eq!(annotate_chains(&mut scene), 1);
        assert!(!scene.shots[0].chain_from_previous);
        assert!(scene.shots[1].chain_from_previous);
        assert_eq!(
            scene.shots[1].chain_ref,
            Some(ChainRef { from_shot: "a".into(), use_frame: Some(5) })
        );
        assert!(!scene.shots[2].chain_from_previous);
        assert_eq!(scene.shots[2].chain_ref, None);
    }
}
