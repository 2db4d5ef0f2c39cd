pub mod error;
pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/summaries/feed", get(handlers::feed_summary))
        .route("/summaries/milk", get(handlers::milk_summary))
        .route("/analytics/sales", get(handlers::sales_analytics))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
