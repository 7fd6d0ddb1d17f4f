//! Serves the bundled dashboard UI under `/ui/*` from a static asset
//! directory on disk. The directory itself, its build pipeline, and its
//! contents are an external concern; this module only wires a file
//! service into the router and wraps it with a permissive CORS layer so
//! the dashboard can call the gateway's own JSON endpoints from a
//! different origin during development.

use std::path::PathBuf;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

/// Mounts a static file service rooted at `assets_dir`, falling back to
/// `index.html` for any path that doesn't match a real file so client-side
/// routing in the dashboard keeps working on refresh.
#[must_use]
pub fn router(assets_dir: PathBuf) -> Router {
    let index = assets_dir.join("index.html");
    let service = ServeDir::new(assets_dir).not_found_service(ServeFile::new(index));

    Router::new()
        .fallback_service(service)
        .layer(CorsLayer::permissive())
}
