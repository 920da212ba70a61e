use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use engine::{
    annotate_chains, build_execution_plan, dialogue_report, score_scene_assets, split_transcript, AssetManifest,
    DialogueReport, DispatchPayload, ExecutionPlan, SceneDocument, ShotIndex, SplitOptions,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::store::SceneSummary;

#[derive(Serialize)]
pub struct ScenesResponse {
    count: usize,
    scenes: Vec<SceneSummary>,
}

#[derive(Serialize)]
pub struct ExportResponse {
    path: String,
    generated_at: String,
    total_shots: usize,
    model_tally: BTreeMap<String, usize>,
    dispatch: DispatchPayload,
}

#[derive(Serialize)]
pub struct ChainsResponse {
    scene_id: String,
    chained_shots: usize,
}

#[derive(Serialize)]
pub struct SplitResponse {
    scene_id: String,
    updated_shots: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scenes", get(list_scenes))
        .route("/scene/:id", get(get_scene))
        .route("/scene/:id/build", get(build_plan))
        .route("/scene/:id/export", post(export_plan))
        .route("/scene/:id/assets", get(get_assets))
        .route("/scene/:id/dialogue", get(get_dialogue))
        .route("/scene/:id/dialogue/split", post(split_dialogue))
        .route("/scene/:id/chains", post(mark_chains))
        .with_state(state)
}

/// Loads and validates a scene, so every planner entry point sees a
/// well-formed document.
fn load_scene(state: &AppState, scene_id: &str) -> ApiResult<SceneDocument> {
    let raw = state
        .store
        .read_scene(scene_id)?
        .ok_or(ApiError::NotFound("Scene"))?;
    let scene = SceneDocument::from_json(&raw)?;
    scene.validate()?;
    Ok(scene)
}

/// Planning works without a catalog; reference lookups just come back empty.
async fn index_or_empty(state: &AppState) -> Arc<ShotIndex> {
    match state.index.read().await.clone() {
        Some(index) => index,
        None => {
            debug!("Planning without a shot index");
            Arc::new(ShotIndex::default())
        }
    }
}

async fn plan_scene(state: &AppState, scene_id: &str) -> ApiResult<ExecutionPlan> {
    let scene = load_scene(state, scene_id)?;
    let index = index_or_empty(state).await;
    let plan = build_execution_plan(&scene, &index, &state.config.plan_options());
    info!(
        "Built plan for {}: {} shots, {} chained, models {:?}",
        plan.scene_id, plan.total_shots, plan.chained_shots, plan.model_tally
    );
    Ok(plan)
}

async fn list_scenes(State(state): State<AppState>) -> ApiResult<Json<ScenesResponse>> {
    let scenes = state.store.list_scenes()?;
    Ok(Json(ScenesResponse {
        count: scenes.len(),
        scenes,
    }))
}

async fn get_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<SceneDocument>> {
    Ok(Json(load_scene(&state, &scene_id)?))
}

async fn build_plan(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<ExecutionPlan>> {
    Ok(Json(plan_scene(&state, &scene_id).await?))
}

async fn export_plan(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<ExportResponse>> {
    let plan = plan_scene(&state, &scene_id).await?;
    let generated_at = Utc::now();
    let path = state.store.save_plan(&scene_id, &plan, generated_at)?;
    info!("Exported plan for {} to {}", plan.scene_id, path.display());

    Ok(Json(ExportResponse {
        path: path.display().to_string(),
        generated_at: generated_at.to_rfc3339(),
        total_shots: plan.total_shots,
        model_tally: plan.model_tally.clone(),
        dispatch: DispatchPayload::from_plan(&plan),
    }))
}

async fn get_assets(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<AssetManifest>> {
    let scene = load_scene(&state, &scene_id)?;
    Ok(Json(score_scene_assets(&scene)))
}

async fn get_dialogue(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<DialogueReport>> {
    let scene = load_scene(&state, &scene_id)?;
    let transcript_exists = state.store.transcript_exists(&scene_id);
    Ok(Json(dialogue_report(&scene, transcript_exists)))
}

async fn split_dialogue(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<SplitResponse>> {
    let mut scene = load_scene(&state, &scene_id)?;
    let transcript = state
        .store
        .load_transcript(&scene_id)?
        .ok_or(ApiError::NotFound("Transcript"))?;

    let updated_shots = split_transcript(&mut scene, &transcript, &SplitOptions::default());
    state.store.save_scene(&scene_id, &scene)?;
    info!("Split transcript across {} shots of {}", updated_shots, scene.scene_id);

    Ok(Json(SplitResponse {
        scene_id: scene.scene_id,
        updated_shots,
    }))
}

async fn mark_chains(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ApiResult<Json<ChainsResponse>> {
    let mut scene = load_scene(&state, &scene_id)?;
    let chained_shots = annotate_chains(&mut scene);
    state.store.save_scene(&scene_id, &scene)?;
    info!("Marked {} chained shots in {}", chained_shots, scene.scene_id);

    Ok(Json(ChainsResponse {
        scene_id: scene.scene_id,
        chained_shots,
    }))
}
