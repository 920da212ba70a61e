use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use engine::{catalog_prompt, ReferenceShot, ShotFilters, ShotIndex, ShotQuery};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::store::catalog::rebuild_index;

#[derive(Serialize)]
pub struct ShotsResponse {
    count: usize,
    shots: Vec<ReferenceShot>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    id: String,
    film: String,
    prompt: String,
    reference_image: String,
    shot: ReferenceShot,
}

#[derive(Serialize)]
pub struct RebuildResponse {
    count: usize,
    generated: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shots", get(list_shots))
        .route("/shot/:id", get(get_shot))
        .route("/prompt/:id", get(get_prompt))
        .route("/filters", get(get_filters))
        .route("/index/rebuild", post(rebuild))
        .with_state(state)
}

async fn loaded_index(state: &AppState) -> ApiResult<Arc<ShotIndex>> {
    state.index.read().await.clone().ok_or(ApiError::IndexNotLoaded)
}

async fn list_shots(
    State(state): State<AppState>,
    Query(query): Query<ShotQuery>,
) -> ApiResult<Json<ShotsResponse>> {
    let index = loaded_index(&state).await?;
    let shots: Vec<ReferenceShot> = index.query(&query).into_iter().cloned().collect();

    Ok(Json(ShotsResponse {
        count: shots.len(),
        shots,
    }))
}

async fn get_shot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReferenceShot>> {
    let index = loaded_index(&state).await?;
    let shot = index.get(&id).cloned().ok_or(ApiError::NotFound("Shot"))?;
    Ok(Json(shot))
}

async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PromptResponse>> {
    let index = loaded_index(&state).await?;
    let shot = index.get(&id).cloned().ok_or(ApiError::NotFound("Shot"))?;

    Ok(Json(PromptResponse {
        id: shot.id.clone(),
        film: shot.film.clone(),
        prompt: catalog_prompt(&shot),
        reference_image: format!("{}/{}", state.config.asset_base_url, shot.image),
        shot,
    }))
}

async fn get_filters(State(state): State<AppState>) -> ApiResult<Json<ShotFilters>> {
    let index = loaded_index(&state).await?;
    Ok(Json(index.filters.clone()))
}

async fn rebuild(State(state): State<AppState>) -> ApiResult<Json<RebuildResponse>> {
    let store = state.store.clone();
    let sources = state.config.source_dirs.clone();
    let index = tokio::task::spawn_blocking(move || rebuild_index(&store, &sources))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    let response = RebuildResponse {
        count: index.count,
        generated: index.generated.clone(),
    };
    *state.index.write().await = Some(Arc::new(index));
    Ok(Json(response))
}
