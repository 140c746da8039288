use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use reune_core::climate::{self, MoodInput, MoodView};

use super::{created, Created};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/moods: own entries; staff see everyone's.
pub async fn list_moods(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<MoodView>>, AppError> {
    Ok(Json(app.run(move |s| climate::list_moods(s, &user)).await?))
}

/// GET /api/moods/{id}
pub async fn get_mood(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<MoodView>, AppError> {
    Ok(Json(app.run(move |s| climate::get_mood(s, &user, id)).await?))
}

/// POST /api/moods: today's mood for the caller; 409 if already logged.
pub async fn create_mood(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<MoodInput>, JsonRejection>,
) -> Result<Created<MoodView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| climate::record_mood(s, &user, input))
        .await?;
    Ok(created(view))
}

/// DELETE /api/moods/{id}: author only.
pub async fn delete_mood(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| climate::delete_mood(s, &user, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
