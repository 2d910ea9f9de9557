//! Scoring handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use recurrence_engine::{GlobalImportance, RiskAssessment};
use serde_json::{Map, Value};

use super::extract::AppJson;
use crate::{AppError, AppResult, AppState};

/// Score one patient and explain the result
pub async fn predict(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Map<String, Value>>,
) -> AppResult<Json<RiskAssessment>> {
    let vector = state.engine.parse_features(&payload)?;

    // Explanation walks every tree per background row; keep it off the runtime
    let engine = Arc::clone(&state.engine);
    let assessment = tokio::task::spawn_blocking(move || engine.score_and_explain(&vector))
        .await
        .map_err(|e| AppError::InternalError(format!("scoring task failed: {}", e)))??;

    tracing::debug!(
        "Prediction: {} (p={})",
        assessment.prediction,
        assessment.probability
    );
    Ok(Json(assessment))
}

/// Mean |attribution| per feature over the reference population
pub async fn global_shap(State(state): State<AppState>) -> Json<GlobalImportance> {
    Json(state.engine.global_importance().clone())
}

/// Ordered feature names the model expects
pub async fn features(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.feature_schema().to_vec())
}
