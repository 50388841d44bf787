//! HTTP API Layer
//!
//! The prior-authorization rules endpoint over axum.
//!
//! # Routes
//!
//! - `POST /Rules?seq=N`: decide one submitted part
//! - `GET /Rules`: liveness ping, answers 201
//! - `GET /Rules/:claim_id`: completeness of a tracked series
//! - `DELETE /Rules/:claim_id`: drop a tracked series
//! - `GET /health`, `GET /health/ready`
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(engine, properties, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use domain_priorauth::DecisionEngine;

use crate::config::{ApiConfig, ServiceProperties};
use crate::handlers::{health, rules};
use crate::middleware::audit_middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub properties: Arc<ServiceProperties>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(engine: DecisionEngine, properties: ServiceProperties, config: ApiConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            properties: Arc::new(properties),
            config,
        }
    }
}

/// Creates the API router
///
/// # Arguments
///
/// * `state` - Engine, properties and configuration shared by handlers
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let rules_routes = Router::new()
        .route("/Rules", get(rules::ping).post(rules::submit))
        .route("/Rules/:claim_id", get(rules::series_status).delete(rules::purge))
        .layer(axum_middleware::from_fn(audit_middleware));

    Router::new()
        .merge(health_routes)
        .merge(rules_routes)
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}
