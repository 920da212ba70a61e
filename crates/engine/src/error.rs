use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Precondition violations detected when a scene document enters the engine.
///
/// Core planning functions are total over validated input; these are raised
/// once at the boundary by [`crate::scene::SceneDocument::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("scene document has an empty scene_id")]
    EmptySceneId,

    #[error("shot at position {0} has an empty shot_id")]
    EmptyShotId(usize),

    #[error("duplicate shot_id '{0}'")]
    DuplicateShotId(String),

    #[error("shot '{shot_id}' has order {order} after order {previous}")]
    OutOfOrder {
        shot_id: String,
        order: u32,
        previous: u32,
    },
}
