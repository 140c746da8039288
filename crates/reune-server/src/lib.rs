pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::routing::get;
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
///
/// Everything except `/api/health` sits behind the bearer-token middleware.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/me", get(routes::me))
        .route("/api/users", get(routes::list_users))
        // People
        .route(
            "/api/positions",
            get(routes::people::list_positions).post(routes::people::create_position),
        )
        .route(
            "/api/positions/{id}",
            get(routes::people::get_position)
                .put(routes::people::update_position)
                .delete(routes::people::delete_position),
        )
        .route(
            "/api/teams",
            get(routes::people::list_teams).post(routes::people::create_team),
        )
        .route(
            "/api/teams/{id}",
            get(routes::people::get_team)
                .put(routes::people::update_team)
                .delete(routes::people::delete_team),
        )
        .route(
            "/api/collaborators",
            get(routes::people::list_collaborators).post(routes::people::create_collaborator),
        )
        .route(
            "/api/collaborators/{id}",
            get(routes::people::get_collaborator)
                .put(routes::people::update_collaborator)
                .delete(routes::people::delete_collaborator),
        )
        .route(
            "/api/collaborators/{id}/assessment-report",
            get(routes::review::assessment_report),
        )
        // Review
        .route(
            "/api/cycles",
            get(routes::review::list_cycles).post(routes::review::create_cycle),
        )
        .route(
            "/api/cycles/{id}",
            get(routes::review::get_cycle)
                .put(routes::review::update_cycle)
                .delete(routes::review::delete_cycle),
        )
        .route(
            "/api/competencies",
            get(routes::review::list_competencies).post(routes::review::create_competency),
        )
        .route(
            "/api/competencies/{id}",
            get(routes::review::get_competency)
                .put(routes::review::update_competency)
                .delete(routes::review::delete_competency),
        )
        .route(
            "/api/assessments",
            get(routes::review::list_assessments).post(routes::review::create_assessment),
        )
        .route(
            "/api/assessments/{id}",
            get(routes::review::get_assessment)
                .put(routes::review::update_assessment)
                .delete(routes::review::delete_assessment),
        )
        // OKRs
        .route(
            "/api/objectives",
            get(routes::okr::list_objectives).post(routes::okr::create_objective),
        )
        .route(
            "/api/objectives/{id}",
            get(routes::okr::get_objective)
                .put(routes::okr::update_objective)
                .delete(routes::okr::delete_objective),
        )
        .route(
            "/api/key-results",
            get(routes::okr::list_key_results).post(routes::okr::create_key_result),
        )
        .route(
            "/api/key-results/{id}",
            get(routes::okr::get_key_result)
                .put(routes::okr::update_key_result)
                .delete(routes::okr::delete_key_result),
        )
        .route(
            "/api/check-ins",
            get(routes::okr::list_check_ins).post(routes::okr::create_check_in),
        )
        .route("/api/check-ins/{id}", get(routes::okr::get_check_in))
        // Climate
        .route(
            "/api/moods",
            get(routes::climate::list_moods).post(routes::climate::create_mood),
        )
        .route(
            "/api/moods/{id}",
            get(routes::climate::get_mood).delete(routes::climate::delete_mood),
        )
        // Feedback
        .route(
            "/api/feedback",
            get(routes::feedback::list_feedback).post(routes::feedback::create_feedback),
        )
        .route(
            "/api/feedback/{id}",
            get(routes::feedback::get_feedback).delete(routes::feedback::delete_feedback),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/api/health", get(routes::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the API until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(state, listener).await
}

/// Serve on a pre-bound listener.
///
/// Lets the caller read the actual port first (useful when binding port 0).
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(state);

    tracing::info!("reune API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
