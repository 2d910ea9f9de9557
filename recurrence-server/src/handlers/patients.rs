//! Patient record handlers

use axum::{extract::State, Json};
use serde::Serialize;
use validator::Validate;

use super::extract::{AppJson, AppPath};
use crate::models::{Assessment, AssessmentSummary, CreateAssessment, DashboardEntry, UpdateNotes};
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: &'static str,
    pub id: i64,
    pub patient_reference: String,
}

/// Save an assessment under a fresh reference
pub async fn save(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateAssessment>,
) -> AppResult<Json<SaveResponse>> {
    req.validate()?;

    let saved = Assessment::create(&state.pool, req).await?;

    Ok(Json(SaveResponse {
        message: "Patient saved successfully!",
        id: saved.id,
        patient_reference: saved.patient_reference,
    }))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<AssessmentSummary>>> {
    let rows = Assessment::list(&state.pool).await?;
    Ok(Json(rows))
}

pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<Vec<DashboardEntry>>> {
    let rows = Assessment::list_dashboard(&state.pool).await?;
    Ok(Json(rows))
}

pub async fn get(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Assessment>> {
    let record = Assessment::find_by_id(&state.pool, id).await?;
    Ok(Json(record))
}

pub async fn update_notes(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdateNotes>,
) -> AppResult<Json<MessageResponse>> {
    Assessment::update_notes(&state.pool, id, req.notes.as_deref()).await?;

    Ok(Json(MessageResponse {
        message: "Notes updated successfully!",
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    Assessment::delete(&state.pool, id).await?;

    Ok(Json(MessageResponse {
        message: "Patient deleted successfully!",
    }))
}
