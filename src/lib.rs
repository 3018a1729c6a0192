//! Backend da loja: checkout via processador de pagamento, confirmação por
//! webhook e download único do produto digital.

use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http::{HeaderValue, Method, header};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod config;
pub mod error;
pub mod state;

pub mod models {
    pub mod token;
}

pub mod repositories {
    pub mod store;
    pub mod token;
}

pub mod services {
    pub mod download;
    pub mod drive;
    pub mod payment;
}

pub mod handlers {
    pub mod download;
    pub mod payments;
    pub mod site;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod payment;
}

use state::AppState;

async fn health() -> &'static str {
    "OK"
}

/// Builds the HTTP surface around an already-wired [`AppState`].
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let origin: HeaderValue = state
        .config
        .frontend_origin
        .parse()
        .context("FRONTEND_ORIGIN is not a valid origin")?;

    let cors = CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400));

    let admin_routes = Router::new()
        .route("/api/admin/save", post(handlers::site::save_config))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_admin,
        ))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/", get(health))
        .route("/api/config", get(handlers::site::get_config))
        .route(
            "/api/create_preference",
            post(handlers::payments::create_preference),
        )
        .route("/api/webhook", post(handlers::payments::webhook))
        .route("/api/check", get(handlers::payments::check))
        .route("/api/download", get(handlers::download::download))
        .with_state(state);

    Ok(Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(cors))
}
