use axum::{
    Json, Router,
    http::{Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use blogcraft_types::api::HealthResponse;

use crate::AppState;
use crate::middleware::require_auth;
use crate::{auth, blogs};

/// Full application router: public auth routes, gated blog routes, CORS
/// for the configured frontend, and request tracing.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/blogs", get(blogs::list_blogs))
        .route("/api/blogs/save-draft", post(blogs::save_draft))
        .route("/api/blogs/publish", post(blogs::publish))
        .route(
            "/api/blogs/{id}",
            get(blogs::get_blog).delete(blogs::delete_blog),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors(&state))
        .layer(TraceLayer::new_for_http())
}

/// Credentialed requests from the frontend origin only.
fn cors(state: &AppState) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(state.config.frontend_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
