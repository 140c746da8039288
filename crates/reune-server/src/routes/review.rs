use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use reune_core::review::{
    self, AssessmentInput, AssessmentReport, AssessmentView, Competency, CompetencyInput, Cycle,
    CycleInput,
};
use serde::Deserialize;

use super::{created, Created};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

/// GET /api/cycles: newest start date first.
pub async fn list_cycles(State(app): State<AppState>) -> Result<Json<Vec<Cycle>>, AppError> {
    Ok(Json(app.run(review::list_cycles).await?))
}

/// GET /api/cycles/{id}
pub async fn get_cycle(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Cycle>, AppError> {
    Ok(Json(app.run(move |s| review::get_cycle(s, id)).await?))
}

/// POST /api/cycles: staff only.
pub async fn create_cycle(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<CycleInput>, JsonRejection>,
) -> Result<Created<Cycle>, AppError> {
    let Json(input) = body?;
    let cycle = app.run(move |s| review::create_cycle(s, &user, input)).await?;
    Ok(created(cycle))
}

/// PUT /api/cycles/{id}: staff only.
pub async fn update_cycle(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<CycleInput>, JsonRejection>,
) -> Result<Json<Cycle>, AppError> {
    let Json(input) = body?;
    let cycle = app
        .run(move |s| review::update_cycle(s, &user, id, input))
        .await?;
    Ok(Json(cycle))
}

/// DELETE /api/cycles/{id}: staff only; removes the cycle's objectives and
/// assessments too.
pub async fn delete_cycle(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| review::delete_cycle(s, &user, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Competencies
// ---------------------------------------------------------------------------

/// GET /api/competencies
pub async fn list_competencies(
    State(app): State<AppState>,
) -> Result<Json<Vec<Competency>>, AppError> {
    Ok(Json(app.run(review::list_competencies).await?))
}

/// GET /api/competencies/{id}
pub async fn get_competency(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Competency>, AppError> {
    Ok(Json(app.run(move |s| review::get_competency(s, id)).await?))
}

/// POST /api/competencies: staff only.
pub async fn create_competency(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<CompetencyInput>, JsonRejection>,
) -> Result<Created<Competency>, AppError> {
    let Json(input) = body?;
    let competency = app
        .run(move |s| review::create_competency(s, &user, input))
        .await?;
    Ok(created(competency))
}

/// PUT /api/competencies/{id}: staff only.
pub async fn update_competency(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<CompetencyInput>, JsonRejection>,
) -> Result<Json<Competency>, AppError> {
    let Json(input) = body?;
    let competency = app
        .run(move |s| review::update_competency(s, &user, id, input))
        .await?;
    Ok(Json(competency))
}

/// DELETE /api/competencies/{id}: staff only.
pub async fn delete_competency(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| review::delete_competency(s, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Assessments
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct AssessmentFilter {
    pub cycle: Option<u64>,
    pub assessee: Option<u64>,
}

/// GET /api/assessments?cycle=&assessee=
pub async fn list_assessments(
    State(app): State<AppState>,
    query: Result<Query<AssessmentFilter>, QueryRejection>,
) -> Result<Json<Vec<AssessmentView>>, AppError> {
    let Query(filter) = query?;
    let rows = app
        .run(move |s| review::list_assessments(s, filter.cycle, filter.assessee))
        .await?;
    Ok(Json(rows))
}

/// GET /api/assessments/{id}
pub async fn get_assessment(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AssessmentView>, AppError> {
    Ok(Json(app.run(move |s| review::get_assessment(s, id)).await?))
}

/// POST /api/assessments: the caller is recorded as assessor.
pub async fn create_assessment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<AssessmentInput>, JsonRejection>,
) -> Result<Created<AssessmentView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| review::create_assessment(s, &user, input))
        .await?;
    Ok(created(view))
}

/// PUT /api/assessments/{id}: assessor only.
pub async fn update_assessment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<AssessmentInput>, JsonRejection>,
) -> Result<Json<AssessmentView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| review::update_assessment(s, &user, id, input))
        .await?;
    Ok(Json(view))
}

/// DELETE /api/assessments/{id}: assessor only.
pub async fn delete_assessment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| review::delete_assessment(s, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub cycle_id: Option<u64>,
}

/// GET /api/collaborators/{id}/assessment-report?cycle_id=N
pub async fn assessment_report(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<AssessmentReport>, AppError> {
    let Query(q) = query?;
    let report = app
        .run(move |s| review::assessment_report(s, id, q.cycle_id))
        .await?;
    Ok(Json(report))
}
