use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use reune_core::feedback::{self, FeedbackInput, FeedbackView};

use super::{created, Created};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/feedback: sent or received by the caller.
pub async fn list_feedback(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<FeedbackView>>, AppError> {
    Ok(Json(app.run(move |s| feedback::list_feedback(s, &user)).await?))
}

/// GET /api/feedback/{id}
pub async fn get_feedback(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<FeedbackView>, AppError> {
    Ok(Json(
        app.run(move |s| feedback::get_feedback(s, &user, id)).await?,
    ))
}

/// POST /api/feedback: the caller is the sender.
pub async fn create_feedback(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Result<Json<FeedbackInput>, JsonRejection>,
) -> Result<Created<FeedbackView>, AppError> {
    let Json(input) = body?;
    let view = app
        .run(move |s| feedback::send_feedback(s, &user, input))
        .await?;
    Ok(created(view))
}

/// DELETE /api/feedback/{id}: sender only.
pub async fn delete_feedback(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    app.run(move |s| feedback::delete_feedback(s, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
