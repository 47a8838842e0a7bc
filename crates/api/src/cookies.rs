//! Cookie service: the auth-token cookie issued alongside the JSON token.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the auth token.
pub const AUTH_COOKIE: &str = "authToken";

/// Cookie lifetime matches the token TTL.
const AUTH_COOKIE_MAX_AGE_SECS: i64 = 60 * 60;

/// Build the http-only cookie carrying the auth token.
///
/// `Secure` is left to the TLS terminator in front of the process; the
/// cookie itself is same-site strict and unreadable from script.
pub fn auth_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/".to_string())
        .max_age(Duration::seconds(AUTH_COOKIE_MAX_AGE_SECS))
        .build()
}

/// Build an expired cookie to clear auth state.
pub fn clear_auth_cookie() -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE.to_string(), String::new()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}
