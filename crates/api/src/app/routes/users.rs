use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde_json::json;

use bugtrackd_audit::{EditOp, EditRecord, EditTarget, USER_COLLECTION};
use bugtrackd_auth::{AuthClaims, Hs256Tokens, Role, TokenSigner};
use bugtrackd_core::UserId;
use bugtrackd_infra::UserStore;
use bugtrackd_users::{User, UserPatch, UserProfile};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;
use crate::cookies;

const TOKEN_TTL_HOURS: i64 = 1;

pub fn public_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/list", get(list_users))
}

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me).put(update_me))
        .route("/:userId", get(get_user).patch(update_user).delete(delete_user))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bugtrackd_auth::hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(format!("hash task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bugtrackd_auth::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::internal(format!("verify task failed: {e}")))?
        .map_err(ApiError::from)
}

/// Resolve permissions for the user's roles and sign a fresh token.
///
/// Permissions are baked in here, at issuance; later registry changes do
/// not touch tokens already handed out.
async fn issue_session(
    services: &AppServices,
    tokens: &Hs256Tokens,
    user: &User,
) -> Result<String, ApiError> {
    let permissions = services.resolve_permissions(&user.roles).await?;
    let claims = AuthClaims::new(
        user.id,
        &user.email,
        user.roles.clone(),
        permissions,
        Utc::now(),
        Duration::hours(TOKEN_TTL_HOURS),
    );
    Ok(tokens.issue(&claims)?)
}

/// Both unknown email and wrong password collapse into this one response,
/// so a caller cannot probe which emails are registered.
fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password".to_string())
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse::<UserId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid userId: {raw}")]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tokens): Extension<Arc<Hs256Tokens>>,
    jar: CookieJar,
    Json(body): Json<dto::RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body.validate().map_err(ApiError::validation)?;

    if services
        .users
        .find_by_email(input.email.trim())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User's email already exists".to_string()));
    }

    let password_hash = hash_blocking(input.password.clone()).await?;
    let user = User::register(UserId::new(), &input, password_hash, Utc::now());

    let edit = EditRecord::new(
        USER_COLLECTION,
        EditOp::Insert,
        EditTarget::user(user.id),
        serde_json::to_value(&user).map_err(|e| ApiError::internal(e.to_string()))?,
        None,
        Utc::now(),
    );
    services.users.insert(&user, &edit).await?;

    let token = issue_session(&services, &tokens, &user).await?;
    let jar = jar.add(cookies::auth_cookie(&token));

    Ok((
        jar,
        (
            StatusCode::CREATED,
            Json(json!({
                "message": "User registered successfully",
                "user": UserProfile::from(&user),
                "token": token,
            })),
        ),
    ))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tokens): Extension<Arc<Hs256Tokens>>,
    jar: CookieJar,
    Json(body): Json<dto::LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = body.validate().map_err(ApiError::validation)?;

    let user = services
        .users
        .find_by_email(email.trim())
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_blocking(password, user.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }

    let token = issue_session(&services, &tokens, &user).await?;
    let jar = jar.add(cookies::auth_cookie(&token));

    Ok((
        jar,
        Json(json!({
            "message": "User logged in successfully",
            "token": token,
        })),
    ))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<impl IntoResponse, ApiError> {
    let user = services
        .users
        .find_by_id(principal.user_id())
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found.".to_string()))?;

    Ok(Json(json!({
        "message": "User profile retrieved successfully",
        "profile": UserProfile::from(&user),
    })))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::UserListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let users = services.users.list(&params.into_query()).await?;
    let profiles: Vec<UserProfile> = users.iter().map(UserProfile::from).collect();
    Ok(Json(profiles))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&user_id)?;

    let user = services
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User with userId {user_id} not found.")))?;

    Ok(Json(json!({
        "message": "User profile retrieved successfully",
        "profile": UserProfile::from(&user),
    })))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tokens): Extension<Arc<Hs256Tokens>>,
    Extension(principal): Extension<PrincipalContext>,
    jar: CookieJar,
    Path(user_id): Path<String>,
    Json(body): Json<dto::UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&user_id)?;
    let roles = body.validate().map_err(ApiError::validation)?;

    let mut user = services
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    let password_hash = match &body.password {
        Some(password) => Some(hash_blocking(password.clone()).await?),
        None => None,
    };

    let patch = UserPatch {
        email: body.email.clone(),
        given_name: body.given_name.clone(),
        family_name: body.family_name.clone(),
        password_hash,
        roles: roles.map(|names| names.into_iter().map(Role::new).collect()),
    };

    let update = user.apply_patch(&patch, principal.user_id(), Utc::now());

    let edit = EditRecord::new(
        USER_COLLECTION,
        EditOp::Update,
        EditTarget::user(user.id),
        update,
        Some(principal.actor()),
        Utc::now(),
    );
    services.users.update(&user, &edit).await?;

    // A self-update changes what the session token asserts; reissue it.
    let jar = if principal.user_id() == user.id {
        let token = issue_session(&services, &tokens, &user).await?;
        jar.add(cookies::auth_cookie(&token))
    } else {
        jar
    };

    Ok((
        jar,
        Json(json!({
            "message": "User profile updated successfully.",
            "updated_profile": UserProfile::from(&user),
        })),
    ))
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.role.is_some() {
        return Err(ApiError::Forbidden(
            "You cannot change your own role.".to_string(),
        ));
    }
    body.validate().map_err(ApiError::validation)?;

    let mut user = services
        .users
        .find_by_id(principal.user_id())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    let password_hash = match &body.password {
        Some(password) => Some(hash_blocking(password.clone()).await?),
        None => None,
    };

    let patch = UserPatch {
        email: body.email.clone(),
        given_name: body.given_name.clone(),
        family_name: body.family_name.clone(),
        password_hash,
        roles: None,
    };

    let update = user.apply_patch(&patch, principal.user_id(), Utc::now());

    let edit = EditRecord::new(
        USER_COLLECTION,
        EditOp::Update,
        EditTarget::user(user.id),
        update,
        Some(principal.actor()),
        Utc::now(),
    );
    services.users.update(&user, &edit).await?;

    Ok(Json(json!({
        "message": "User profile updated successfully.",
        "profile": UserProfile::from(&user),
    })))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_user_id(&user_id)?;

    services
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let edit = EditRecord::new(
        USER_COLLECTION,
        EditOp::Delete,
        EditTarget::user(id),
        serde_json::Value::Null,
        Some(principal.actor()),
        Utc::now(),
    );
    services.users.delete(id, &edit).await?;

    Ok(Json(json!({
        "message": "User deleted successfully",
        "user_id": id,
    })))
}
