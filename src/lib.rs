pub mod clock;
pub mod config;
pub mod database;
pub mod dtos;
pub mod errors;
mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::{http::Method, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    let authenticated = Router::new()
        .nest("/api/orders", routes::orders::order_routes())
        .nest("/api/driver", routes::drivers::driver_routes())
        .nest("/api/admin", routes::admin::admin_routes())
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(handlers::health::health_check))
        .route("/api/health", get(handlers::health::api_health_check))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn root_handler() -> &'static str {
    "🚕 Cab Booking API"
}
