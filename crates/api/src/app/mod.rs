//! HTTP application wiring (axum router + service wiring).
//!
//! Folder layout:
//! - `services.rs`: store construction and injection
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and validation
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use bugtrackd_auth::Hs256Tokens;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    let tokens = Arc::new(Hs256Tokens::from_secret(config.jwt_secret.clone()));
    Ok(build_router(services, tokens))
}

/// Assemble the router from already-constructed services.
///
/// Split out so tests can hold on to the store handles they wire in.
pub fn build_router(services: Arc<services::AppServices>, tokens: Arc<Hs256Tokens>) -> Router {
    let auth_state = middleware::AuthState {
        tokens: tokens.clone(),
    };

    // Protected routes: the guard answers 401 itself on any decode failure;
    // handlers there always see an authenticated principal.
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(Extension(services))
                .layer(Extension(tokens)),
        )
}
