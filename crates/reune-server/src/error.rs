use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reune_core::ReuneError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// The status code comes from the wrapped [`ReuneError`] when there is one.
/// Body: `{"error": "..."}`, plus `"field"` for validation failures.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn join(err: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {err}"))
    }
}

fn status_for(e: &ReuneError) -> StatusCode {
    match e {
        ReuneError::NotInitialized => StatusCode::BAD_REQUEST,
        ReuneError::NotFound { .. } | ReuneError::UserNotFound(_) | ReuneError::NoData(_) => {
            StatusCode::NOT_FOUND
        }
        ReuneError::Validation { .. } => StatusCode::BAD_REQUEST,
        ReuneError::Conflict(_) => StatusCode::CONFLICT,
        ReuneError::Forbidden(_) => StatusCode::FORBIDDEN,
        ReuneError::Unauthorized => StatusCode::UNAUTHORIZED,
        ReuneError::Storage(_)
        | ReuneError::Io(_)
        | ReuneError::Yaml(_)
        | ReuneError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Malformed request bodies and query strings are client errors.
        if let Some(r) = self.0.downcast_ref::<JsonRejection>() {
            let body = serde_json::json!({ "error": r.body_text() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }
        if let Some(r) = self.0.downcast_ref::<QueryRejection>() {
            let body = serde_json::json!({ "error": r.body_text() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        let (status, body) = match self.0.downcast_ref::<ReuneError>() {
            Some(ReuneError::Validation { field, message }) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": message, "field": field }),
            ),
            Some(e) => (status_for(e), serde_json::json!({ "error": e.to_string() })),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": self.0.to_string() }),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError(
            ReuneError::NotFound {
                entity: "key_result",
                id: 3,
            }
            .into(),
        );
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn user_not_found_maps_to_404() {
        let err = AppError(ReuneError::UserNotFound("ghost".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_data_maps_to_404() {
        let err = AppError(ReuneError::NoData("nothing yet".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError(ReuneError::Conflict("taken".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let err = AppError(ReuneError::Forbidden("not yours".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let err = AppError(ReuneError::Unauthorized.into());
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn not_initialized_maps_to_400() {
        let err = AppError(ReuneError::NotInitialized.into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_error_maps_to_500() {
        let err = AppError(ReuneError::Storage("disk full".into()).into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_reune_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_body_names_the_field() {
        let err = AppError(ReuneError::validation("confidence", "must be between 1 and 5, got 9").into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["field"], "confidence");
        assert_eq!(json["error"], "must be between 1 and 5, got 9");
    }

    #[tokio::test]
    async fn error_body_is_json() {
        let err = AppError(ReuneError::Conflict("username 'ana' is already taken".into()).into());
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "conflict: username 'ana' is already taken");
    }
}
