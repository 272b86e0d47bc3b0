//! HTTP router for the scene endpoints
//!
//! Provides /health, /config, /scenes and /scenes/{id}/model.

use crate::routes;
use crate::state::SharedState;
use crate::upload::MAX_METADATA_BYTES;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the HTTP router
pub fn create_router(state: SharedState, cors_origins: &[String]) -> Router {
    let body_limit = state.store.max_upload_bytes() + MAX_METADATA_BYTES;

    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/config",
            get(routes::settings::get_settings).put(routes::settings::put_settings),
        )
        .route(
            "/scenes",
            get(routes::scenes::list_scenes).post(routes::scenes::create_scene),
        )
        .route(
            "/scenes/{id}",
            get(routes::scenes::get_scene)
                .patch(routes::scenes::update_scene)
                .delete(routes::scenes::delete_scene),
        )
        .route("/scenes/{id}/model", get(routes::scenes::get_model))
        .layer(DefaultBodyLimit::max(body_limit as usize))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::LOCATION, header::CONTENT_DISPOSITION, header::ETAG])
}

/// Start the HTTP server
pub async fn start_server(
    state: SharedState,
    port: u16,
    cors_origins: &[String],
) -> std::io::Result<()> {
    let router = create_router(state, cors_origins);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}
