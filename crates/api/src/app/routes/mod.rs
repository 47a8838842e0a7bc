use axum::Router;

pub mod bugs;
pub mod system;
pub mod users;

/// Routes reachable without a token (register, login, public listings).
pub fn public_router() -> Router {
    Router::new()
        .nest("/api/user", users::public_router())
        .nest("/api/bug", bugs::public_router())
}

/// Routes behind the authentication guard.
pub fn protected_router() -> Router {
    Router::new()
        .nest("/api/user", users::router())
        .nest("/api/bug", bugs::router())
}
