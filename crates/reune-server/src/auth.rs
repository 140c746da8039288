use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use reune_core::people::User;
use reune_core::ReuneError;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`require_token`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Axum middleware that resolves `Authorization: Bearer <token>` to a user.
///
/// Missing, malformed or unknown tokens get a 401 JSON response; the handler
/// never runs.
pub async fn require_token(State(app): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(&req) else {
        return AppError(ReuneError::Unauthorized.into()).into_response();
    };

    let user = match app
        .run(move |store| reune_core::people::authenticate(store, &token))
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return AppError(ReuneError::Unauthorized.into()).into_response(),
        Err(e) => return e.into_response(),
    };

    tracing::debug!(user = user.id, path = %req.uri().path(), "authenticated");
    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::{body::Body, middleware, routing::get, Extension, Router};
    use reune_core::config::Config;
    use reune_core::people::{create_user, NewUser};
    use reune_core::Store;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn whoami(Extension(CurrentUser(user)): Extension<CurrentUser>) -> String {
        user.username
    }

    fn test_app() -> (TempDir, Router, String) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("auth.redb")).unwrap();
        let (_, token) = create_user(
            &store,
            NewUser {
                username: "ana".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let state = AppState::new(dir.path().to_path_buf(), Config::new("test"), store);
        let app = Router::new()
            .route("/api/whoami", get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
            .with_state(state);
        (dir, app, token)
    }

    fn request(auth: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/api/whoami");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_401() {
        let (_dir, app, _) = test_app();
        let resp = app.oneshot(request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_scheme_is_401() {
        let (_dir, app, token) = test_app();
        let resp = app
            .oneshot(request(Some(&format!("Basic {token}"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_401() {
        let (_dir, app, _) = test_app();
        let resp = app.oneshot(request(Some("Bearer nope"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let (_dir, app, token) = test_app();
        let resp = app
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
