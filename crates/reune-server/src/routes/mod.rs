pub mod climate;
pub mod feedback;
pub mod okr;
pub mod people;
pub mod review;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use reune_core::people::UserView;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// `201 Created` with the new record as the body.
pub type Created<T> = (StatusCode, Json<T>);

pub fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

/// GET /api/health: liveness probe; no authentication.
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "organization": app.config.organization.name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(serde::Serialize)]
pub struct Me {
    #[serde(flatten)]
    pub user: UserView,
    pub is_staff: bool,
}

/// GET /api/me: the authenticated user.
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Me> {
    Json(Me {
        user: UserView::from(&user),
        is_staff: user.is_staff,
    })
}

/// GET /api/users: every user, by username.
pub async fn list_users(State(app): State<AppState>) -> Result<Json<Vec<UserView>>, AppError> {
    let users = app.run(reune_core::people::list_users).await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}
