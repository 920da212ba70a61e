use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use engine::{ExecutionPlan, SceneDocument, ShotIndex, Transcript};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub mod catalog;

pub const INDEX_FILE: &str = "index.json";
pub const SCENES_DIR: &str = "scenes";
pub const PLAN_FILE: &str = "execution_plan.json";
pub const TRANSCRIPT_FILE: &str = "whisper_transcript.json";
/// Scene files with this marker are source material, not playable scenes.
pub const MASTER_MARKER: &str = "_master";

/// Flat JSON files under a single data root.
pub struct Store {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSummary {
    pub scene_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub shots: usize,
    pub duration: Option<Value>,
    pub file: String,
}

#[derive(Serialize)]
struct ExportedPlan<'a> {
    generated_at: String,
    #[serde(flatten)]
    plan: &'a ExecutionPlan,
}

/// Ids become file names; anything that could leave `scenes/` is rejected.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(raw))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Store { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scenes_dir(&self) -> PathBuf {
        self.root.join(SCENES_DIR)
    }

    pub fn scene_path(&self, scene_id: &str) -> PathBuf {
        self.scenes_dir().join(format!("{}.json", scene_id))
    }

    pub fn plan_path(&self, scene_id: &str) -> PathBuf {
        self.scenes_dir().join(scene_id).join(PLAN_FILE)
    }

    /// `None` until an index has been built. Count and filters are
    /// recomputed from the shots, so a hand-edited file cannot serve stale ones.
    pub fn load_index(&self) -> Result<Option<ShotIndex>> {
        let path = self.root.join(INDEX_FILE);
        match read_optional(&path)? {
            Some(raw) => {
                let stored: ShotIndex =
                    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
                let mut index = ShotIndex::from_shots(stored.shots);
                index.generated = stored.generated;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    pub fn save_index(&self, index: &ShotIndex) -> Result<()> {
        write_json(&self.root.join(INDEX_FILE), index)
    }

    /// Playable scenes, sorted by file name. Unreadable files are skipped.
    pub fn list_scenes(&self) -> Result<Vec<SceneSummary>> {
        let dir = self.scenes_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json") && !name.contains(MASTER_MARKER))
            .collect();
        files.sort();

        let mut scenes = Vec::new();
        for file in files {
            let raw = fs::read_to_string(dir.join(&file))?;
            let data: Value = match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Skipping unreadable scene file {}: {}", file, e);
                    continue;
                }
            };
            let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
            scenes.push(SceneSummary {
                scene_id: text("scene_id"),
                name: text("name"),
                description: text("description"),
                shots: data.get("shots").and_then(Value::as_array).map(Vec::len).unwrap_or(0),
                duration: data
                    .get("duration_estimate")
                    .or_else(|| data.pointer("/extraction/total_duration_sec"))
                    .cloned(),
                file,
            });
        }
        Ok(scenes)
    }

    /// Raw scene JSON; parsing is left to the caller so a malformed document
    /// can be reported differently from an I/O failure.
    pub fn read_scene(&self, scene_id: &str) -> Result<Option<String>> {
        if !is_safe_id(scene_id) {
            return Ok(None);
        }
        read_optional(&self.scene_path(scene_id))
    }

    /// Writes back to `scenes/<scene_id>.json`, the file the scene was read from.
    pub fn save_scene(&self, scene_id: &str, scene: &SceneDocument) -> Result<()> {
        anyhow::ensure!(is_safe_id(scene_id), "unsafe scene id {:?}", scene_id);
        write_json(&self.scene_path(scene_id), scene)
    }

    /// Writes `scenes/<scene_id>/execution_plan.json` for the scene file the
    /// plan was built from, whatever `scene_id` the document itself declares.
    pub fn save_plan(&self, scene_id: &str, plan: &ExecutionPlan, generated_at: DateTime<Utc>) -> Result<PathBuf> {
        anyhow::ensure!(is_safe_id(scene_id), "unsafe scene id {:?}", scene_id);
        let path = self.plan_path(scene_id);
        let exported = ExportedPlan {
            generated_at: generated_at.to_rfc3339(),
            plan,
        };
        write_json(&path, &exported)?;
        Ok(path)
    }

    pub fn transcript_exists(&self, scene_id: &str) -> bool {
        is_safe_id(scene_id) && self.scenes_dir().join(scene_id).join(TRANSCRIPT_FILE).exists()
    }

    pub fn load_transcript(&self, scene_id: &str) -> Result<Option<Transcript>> {
        if !is_safe_id(scene_id) {
            return Ok(None);
        }
        let path = self.scenes_dir().join(scene_id).join(TRANSCRIPT_FILE);
        match read_optional(&path)? {
            Some(raw) => {
                let transcript =
                    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
                Ok(Some(transcript))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{build_execution_plan, PlanOptions};
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, value: &Value) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    #[test]
    fn test_missing_index_is_none() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        assert!(store.load_index().unwrap().is_none());

        store.save_index(&ShotIndex::default()).unwrap();
        assert_eq!(store.load_index().unwrap(), Some(ShotIndex::default()));
    }

    #[test]
    fn test_load_index_recomputes_filters() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.json", &json!({
            "generated": "2026-01-01T00:00:00+00:00",
            "count": 7,
            "filters": {"directors": ["Stale"]},
            "shots": [
                {"id": "a", "image": "a.jpg", "film": "Heat", "director": "Michael Mann"},
                {"id": "b", "image": "b.jpg", "film": "Alien", "director": "Ridley Scott"}
            ]
        }));
        write(&dir, "other/index.json", &json!({
            "count": 1,
            "shots": [{"id": "c", "image": "c.jpg", "film": "Heat", "emotion": "tense"}]
        }));

        let index = Store::new(dir.path()).load_index().unwrap().unwrap();
        assert_eq!(index.count, 2);
        assert_eq!(index.generated.as_deref(), Some("2026-01-01T00:00:00+00:00"));
        assert_eq!(index.filters.directors, vec!["Michael Mann", "Ridley Scott"]);
        assert_eq!(index.filters.films, vec!["Alien", "Heat"]);

        let bare = Store::new(dir.path().join("other")).load_index().unwrap().unwrap();
        assert_eq!(bare.filters.emotions, vec!["tense"]);
    }

    #[test]
    fn test_list_scenes_skips_master_and_broken_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "scenes/b_scene.json", &json!({
            "scene_id": "b_scene", "name": "B", "extraction": {"total_duration_sec": 42.5},
            "shots": [{"shot_id": "1"}, {"shot_id": "2"}]
        }));
        write(&dir, "scenes/a_scene.json", &json!({"scene_id": "a_scene", "duration_estimate": 12}));
        write(&dir, "scenes/b_scene_master.json", &json!({"scene_id": "master"}));
        fs::write(dir.path().join("scenes/broken.json"), "{not json").unwrap();

        let scenes = Store::new(dir.path()).list_scenes().unwrap();
        let files: Vec<&str> = scenes.iter().map(|s| s.file.as_str()).collect();
        assert_eq!(files, vec!["a_scene.json", "b_scene.json"]);
        assert_eq!(scenes[0].duration, Some(json!(12)));
        assert_eq!(scenes[1].shots, 2);
        assert_eq!(scenes[1].duration, Some(json!(42.5)));
    }

    #[test]
    fn test_scene_round_trip_and_unsafe_ids() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let scene: SceneDocument =
            serde_json::from_value(json!({"scene_id": "plan", "mood": "tense", "shots": []})).unwrap();
        store.save_scene("plan", &scene).unwrap();

        let raw = store.read_scene("plan").unwrap().unwrap();
        assert_eq!(SceneDocument::from_json(&raw).unwrap(), scene);
        assert!(store.read_scene("missing").unwrap().is_none());
        assert!(store.read_scene("../secrets").unwrap().is_none());
    }

    #[test]
    fn test_save_plan_stamps_export() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let scene: SceneDocument =
            serde_json::from_value(json!({"scene_id": "plan", "shots": [{"shot_id": "a"}]})).unwrap();
        let plan = build_execution_plan(&scene, &ShotIndex::default(), &PlanOptions::default());

        let generated_at = "2026-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap();
        let path = store.save_plan("plan", &plan, generated_at).unwrap();
        assert_eq!(path, dir.path().join("scenes/plan/execution_plan.json"));
        assert!(store.save_plan("../plan", &plan, generated_at).is_err());

        let saved: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["generated_at"], json!("2026-01-02T03:04:05+00:00"));
        assert_eq!(saved["scene_id"], json!("plan"));
        assert_eq!(saved["shots"][0]["shot_id"], json!("a"));
    }

    #[test]
    fn test_transcript_lookup() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        assert!(!store.transcript_exists("plan"));
        assert!(store.load_transcript("plan").unwrap().is_none());

        write(&dir, "scenes/plan/whisper_transcript.json", &json!({
            "chunks": [{"lines": [{"text": "hi", "speaker": "ED", "approx_time": 1.0}]}]
        }));
        assert!(store.transcript_exists("plan"));
        let transcript = store.load_transcript("plan").unwrap().unwrap();
        assert_eq!(transcript.chunks[0].lines[0].text, "hi");
    }
}
