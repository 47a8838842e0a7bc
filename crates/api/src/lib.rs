//! `bugtrackd-api` — HTTP surface (axum router, middleware, handlers).

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod cookies;
pub mod middleware;
