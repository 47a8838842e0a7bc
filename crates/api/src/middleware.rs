//! Route authorization guard, authentication half.
//!
//! Protected routers are layered with [`auth_middleware`]; a request either
//! transitions to authenticated (decoded principal attached to extensions)
//! or is answered 401 here. It never falls through to a handler.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use bugtrackd_auth::{Hs256Tokens, TokenError, TokenVerifier};

use crate::app::errors;
use crate::context::PrincipalContext;
use crate::cookies::AUTH_COOKIE;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<Hs256Tokens>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(req.headers()).ok_or_else(|| {
        errors::json_error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: No token provided.".into(),
        )
    })?;

    let claims = state.tokens.verify(&token).map_err(|e| {
        let message = match e {
            TokenError::Expired => "Unauthorized: Token has expired.",
            _ => "Unauthorized: Invalid token.",
        };
        errors::json_error(StatusCode::UNAUTHORIZED, message.into())
    })?;

    req.extensions_mut()
        .insert(PrincipalContext::from_claims(claims));

    Ok(next.run(req).await)
}

/// Token from the bearer header, falling back to the auth cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }
    CookieJar::from_headers(headers)
        .get(AUTH_COOKIE)
        .map(|c| c.value().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
