use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use reune_core::okr::{
    self, CheckInReceipt, CheckInView, KeyResultInput, KeyResultView, NewCheckIn, ObjectiveInput,
    ObjectiveView,
};
use serde::Deserialize;

use super::{created, Created};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Objectives
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ObjectiveFilter {
    pub cycle: Option<u64>,
}

/// GET /api/objectives?cycle=: objectives visible to the caller, with nested
/// key results and check-ins.
pub async fn list_objectives(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    query: Result<Query<ObjectiveFilter>, QueryRejection>,
) -> Result<Json<Vec<ObjectiveView>>, AppError> {
    let Query(filter) = query?;
    let list = app
        .run(move |s| okr::list_objectives(s, &user, filter.cycle))
        .await?;
    Ok(Json(list))
}

/// GET /api/objectives/{id}
pub async fn get_objective(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<ObjectiveView>, AppError> {
    let view = app.run(move |s| okr::get_objective(s, &user, id)).await?;
    Ok(Json(view))
}

/// POST /api/objectives: the caller becomes the owner.
pub async fn create_objective(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<ObjectiveInput>, JsonRejection>,
) -> Result<Created<ObjectiveView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| okr::create_objective(s, &user, input))
        .await?;
    Ok(created(view))
}

/// PUT /api/objectives/{id}: owner only.
pub async fn update_objective(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<ObjectiveInput>, JsonRejection>,
) -> Result<Json<ObjectiveView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| okr::update_objective(s, &user, id, input))
        .await?;
    Ok(Json(view))
}

/// DELETE /api/objectives/{id}: owner only.
pub async fn delete_objective(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| okr::delete_objective(s, &user, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Key results
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct KeyResultFilter {
    pub objective: Option<u64>,
}

/// GET /api/key-results?objective=
pub async fn list_key_results(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    query: Result<Query<KeyResultFilter>, QueryRejection>,
) -> Result<Json<Vec<KeyResultView>>, AppError> {
    let Query(filter) = query?;
    let list = app
        .run(move |s| okr::list_key_results(s, &user, filter.objective))
        .await?;
    Ok(Json(list))
}

/// GET /api/key-results/{id}
pub async fn get_key_result(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<KeyResultView>, AppError> {
    let view = app.run(move |s| okr::get_key_result(s, &user, id)).await?;
    Ok(Json(view))
}

/// POST /api/key-results: objective owner only.
pub async fn create_key_result(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<KeyResultInput>, JsonRejection>,
) -> Result<Created<KeyResultView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| okr::create_key_result(s, &user, input))
        .await?;
    Ok(created(view))
}

/// PUT /api/key-results/{id}: objective owner only.
pub async fn update_key_result(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<KeyResultInput>, JsonRejection>,
) -> Result<Json<KeyResultView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| okr::update_key_result(s, &user, id, input))
        .await?;
    Ok(Json(view))
}

/// DELETE /api/key-results/{id}: objective owner only.
pub async fn delete_key_result(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| okr::delete_key_result(s, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Check-ins
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CheckInFilter {
    pub key_result: Option<u64>,
}

/// GET /api/check-ins?key_result=: newest first.
pub async fn list_check_ins(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    query: Result<Query<CheckInFilter>, QueryRejection>,
) -> Result<Json<Vec<CheckInView>>, AppError> {
    let Query(filter) = query?;
    let list = app
        .run(move |s| okr::list_check_ins(s, &user, filter.key_result))
        .await?;
    Ok(Json(list))
}

/// GET /api/check-ins/{id}
pub async fn get_check_in(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<CheckInView>, AppError> {
    let view = app.run(move |s| okr::get_check_in(s, &user, id)).await?;
    Ok(Json(view))
}

/// POST /api/check-ins: record a value and roll progress up to the key
/// result and objective. The caller is the submitter.
pub async fn create_check_in(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<NewCheckIn>, JsonRejection>,
) -> Result<Created<CheckInReceipt>, AppError> {
    let Json(input) = body?;
    let receipt = app
        .run(move |s| okr::record_check_in(s, &user, input))
        .await?;
    Ok(created(receipt))
}
