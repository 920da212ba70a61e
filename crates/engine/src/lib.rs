//! Shot catalog and scene planning engine.
//!
//! Everything here is pure: documents in, documents out. Reading and writing
//! the flat JSON store is the daemon's job.

pub mod assets;
pub mod chain;
pub mod dialogue;
pub mod error;
pub mod index;
pub mod models;
pub mod plan;
pub mod prompt;
pub mod scene;

pub use assets::{score_scene_assets, AssetManifest};
pub use chain::{annotate_chains, resolve_chains};
pub use dialogue::{dialogue_report, split_transcript, DialogueReport, SplitOptions, Transcript};
pub use error::{EngineError, EngineResult};
pub use index::{ReferenceShot, ShotFilters, ShotIndex, ShotQuery, TaggedShot};
pub use models::{select_model, GenerationModel, ModelSelection};
pub use plan::{build_execution_plan, DispatchPayload, ExecutionPlan, ExecutionStep, PlanOptions};
pub use prompt::{catalog_prompt, compose_shot_prompt, SceneContext};
pub use scene::{SceneDocument, Shot};
