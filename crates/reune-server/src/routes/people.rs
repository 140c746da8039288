use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use reune_core::people::{
    self, CollaboratorInput, CollaboratorView, Position, PositionInput, Team, TeamInput,
};

use super::{created, Created};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// GET /api/positions
pub async fn list_positions(State(app): State<AppState>) -> Result<Json<Vec<Position>>, AppError> {
    Ok(Json(app.run(people::list_positions).await?))
}

/// GET /api/positions/{id}
pub async fn get_position(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Position>, AppError> {
    Ok(Json(app.run(move |s| people::get_position(s, id)).await?))
}

/// POST /api/positions: staff only.
pub async fn create_position(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<PositionInput>, JsonRejection>,
) -> Result<Created<Position>, AppError> {
    let Json(input) = body?;
    let position = app
        .run(move |s| people::create_position(s, &user, input))
        .await?;
    Ok(created(position))
}

/// PUT /api/positions/{id}: staff only; replaces every field.
pub async fn update_position(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<PositionInput>, JsonRejection>,
) -> Result<Json<Position>, AppError> {
    let Json(input) = body?;
    let position = app
        .run(move |s| people::update_position(s, &user, id, input))
        .await?;
    Ok(Json(position))
}

/// DELETE /api/positions/{id}: staff only.
pub async fn delete_position(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| people::delete_position(s, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// GET /api/teams
pub async fn list_teams(State(app): State<AppState>) -> Result<Json<Vec<Team>>, AppError> {
    Ok(Json(app.run(people::list_teams).await?))
}

/// GET /api/teams/{id}
pub async fn get_team(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Team>, AppError> {
    Ok(Json(app.run(move |s| people::get_team(s, id)).await?))
}

/// POST /api/teams: staff only.
pub async fn create_team(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<TeamInput>, JsonRejection>,
) -> Result<Created<Team>, AppError> {
    let Json(input) = body?;
    let team = app.run(move |s| people::create_team(s, &user, input)).await?;
    Ok(created(team))
}

/// PUT /api/teams/{id}: staff only.
pub async fn update_team(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<TeamInput>, JsonRejection>,
) -> Result<Json<Team>, AppError> {
    let Json(input) = body?;
    let team = app
        .run(move |s| people::update_team(s, &user, id, input))
        .await?;
    Ok(Json(team))
}

/// DELETE /api/teams/{id}: staff only.
pub async fn delete_team(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| people::delete_team(s, &user, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// GET /api/collaborators
pub async fn list_collaborators(
    State(app): State<AppState>,
) -> Result<Json<Vec<CollaboratorView>>, AppError> {
    Ok(Json(app.run(people::list_collaborators).await?))
}

/// GET /api/collaborators/{id}: `id` is the user id.
pub async fn get_collaborator(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CollaboratorView>, AppError> {
    Ok(Json(app.run(move |s| people::get_collaborator(s, id)).await?))
}

/// POST /api/collaborators: staff only.
pub async fn create_collaborator(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<CollaboratorInput>, JsonRejection>,
) -> Result<Created<CollaboratorView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| people::create_collaborator(s, &user, input))
        .await?;
    Ok(created(view))
}

/// PUT /api/collaborators/{id}: staff only.
pub async fn update_collaborator(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    body: Result<Json<CollaboratorInput>, JsonRejection>,
) -> Result<Json<CollaboratorView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| people::update_collaborator(s, &user, id, input))
        .await?;
    Ok(Json(view))
}

/// DELETE /api/collaborators/{id}: staff only.
pub async fn delete_collaborator(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| people::delete_collaborator(s, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
