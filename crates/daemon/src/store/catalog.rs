//! Rebuilding `index.json` from the tagged screenshot sources.
//!
//! Every screenshot `foo.jpg` has a sibling `foo.txt` holding its tag record as
//! JSON. Only records marked as fully tagged make it into the index.

use anyhow::Result;
use chrono::Utc;
use engine::{ReferenceShot, ShotIndex, TaggedShot};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::Store;

const TAG_EXTENSION: &str = "txt";
const IMAGE_EXTENSION: &str = "jpg";

fn relative_image(root: &Path, tag_file: &Path) -> String {
    let image = tag_file.with_extension(IMAGE_EXTENSION);
    let relative = image.strip_prefix(root).unwrap_or(&image);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_tagged(path: &Path) -> Option<TaggedShot> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(tagged) => Some(tagged),
        Err(e) => {
            debug!("Skipping {}: not a tag record ({})", path.display(), e);
            None
        }
    }
}

/// Walks each source directory in file-name order. Missing directories are
/// skipped.
pub fn scan_sources(root: &Path, source_dirs: &[PathBuf]) -> Vec<ReferenceShot> {
    let mut shots = Vec::new();

    for dir in source_dirs {
        let dir = root.join(dir);
        if !dir.is_dir() {
            debug!("Source directory {} does not exist", dir.display());
            continue;
        }
        info!("Scanning {}", dir.display());

        for entry in WalkDir::new(&dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some(TAG_EXTENSION) {
                continue;
            }
            let Some(tagged) = read_tagged(path) else {
                continue;
            };
            if !tagged.is_tagged() {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            shots.push(ReferenceShot::from_tagged(id, relative_image(root, path), tagged));
        }
    }

    shots
}

/// Scans the sources, stamps the index and writes it to the store.
pub fn rebuild_index(store: &Store, source_dirs: &[PathBuf]) -> Result<ShotIndex> {
    let shots = scan_sources(store.root(), source_dirs);
    let mut index = ShotIndex::from_shots(shots);
    index.generated = Some(Utc::now().to_rfc3339());
    store.save_index(&index)?;
    info!("Indexed {} tagged shots", index.count);
    Ok(index)
}
