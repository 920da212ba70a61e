use axum::Router;
use engine::ShotIndex;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::store::Store;

pub mod error;
pub mod scenes;
pub mod shots;

/// Shared handler state. The index is swapped wholesale on rebuild.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub index: Arc<RwLock<Option<Arc<ShotIndex>>>>,
}

impl AppState {
    pub fn new(config: Config, index: Option<ShotIndex>) -> Self {
        AppState {
            store: Arc::new(Store::new(config.root.clone())),
            config: Arc::new(config),
            index: Arc::new(RwLock::new(index.map(Arc::new))),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(shots::router(state.clone()))
        .merge(scenes::router(state))
}
