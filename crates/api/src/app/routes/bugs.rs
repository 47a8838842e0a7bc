use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use bugtrackd_audit::{EditOp, EditRecord, EditTarget, BUGS_COLLECTION};
use bugtrackd_auth::AccessRule;
use bugtrackd_bugs::{Bug, BugPatch, TestPatch};
use bugtrackd_core::{BugId, CommentId, TestCaseId, UserId};
use bugtrackd_infra::{BugStore, UserStore};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::{require_permission, require_scoped};
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/list", get(list_bugs))
        .route("/:bugId", get(get_bug))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(all_bugs))
        .route("/report", post(report_bug))
        .route("/:bugId", axum::routing::patch(update_bug))
        .route("/:bugId/classify", put(classify_bug))
        .route("/:bugId/assign", put(assign_bug))
        .route("/:bugId/close", put(close_bug))
        .route("/:bugId/comments", get(list_comments).post(add_comment))
        .route("/:bugId/comments/:commentId", get(get_comment))
        .route("/:bugId/tests", get(list_tests).post(add_test))
        .route(
            "/:bugId/tests/:testId",
            get(get_test).patch(update_test).delete(delete_test),
        )
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_bug_id(raw: &str) -> Result<BugId, ApiError> {
    raw.parse::<BugId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid bugId: {raw}")]))
}

async fn load_bug(services: &AppServices, raw: &str) -> Result<Bug, ApiError> {
    let id = parse_bug_id(raw)?;
    services
        .bugs
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Bug with bugId {raw} not found.")))
}

/// Display name for comment authorship; falls back to the email when the
/// account vanished between token issuance and now.
async fn author_name(services: &AppServices, principal: &PrincipalContext) -> Result<String, ApiError> {
    Ok(match services.users.find_by_id(principal.user_id()).await? {
        Some(user) => user.given_name,
        None => principal.email().to_string(),
    })
}

fn bug_update_edit(bug: &Bug, update: serde_json::Value, principal: &PrincipalContext) -> EditRecord {
    EditRecord::new(
        BUGS_COLLECTION,
        EditOp::Update,
        EditTarget::bug(bug.id),
        update,
        Some(principal.actor()),
        Utc::now(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────────────────────────

pub async fn all_bugs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(
        &principal,
        "canViewData",
        "Forbidden: You do not have permission to access this resource.",
    )?;

    let query = dto::BugListParams {
        keywords: None,
        classification: None,
        min_age: None,
        max_age: None,
        closed: None,
        sort_by: None,
        page_size: Some(u32::MAX),
        page_number: None,
    };
    let bugs = services.bugs.list(&query.into_query()).await?;
    Ok(Json(bugs))
}

pub async fn list_bugs(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::BugListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.into_query();
    let page_number = query.page_number;
    let page_size = query.page_size;

    let bugs = services.bugs.list(&query).await?;

    Ok(Json(json!({
        "message": "Bugs retrieved successfully",
        "bugs": bugs,
        "page_number": page_number,
        "page_size": page_size,
    })))
}

pub async fn get_bug(
    Extension(services): Extension<Arc<AppServices>>,
    Path(bug_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bug = load_bug(&services, &bug_id).await?;
    Ok(Json(json!({
        "message": "Bug retrieved successfully",
        "bug": bug,
    })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle mutations
// ─────────────────────────────────────────────────────────────────────────────

pub async fn report_bug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ReportBugRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (title, description, classification) = body.validate().map_err(ApiError::validation)?;

    let author = author_name(&services, &principal).await?;
    let bug = Bug::report(
        BugId::new(),
        title,
        description,
        classification,
        principal.user_id(),
        author,
        Utc::now(),
    );

    let edit = EditRecord::new(
        BUGS_COLLECTION,
        EditOp::Insert,
        EditTarget::bug(bug.id),
        serde_json::to_value(&bug).map_err(|e| ApiError::internal(e.to_string()))?,
        Some(principal.actor()),
        Utc::now(),
    );
    services.bugs.insert(&bug, &edit).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Bug created successfully",
            "bug": bug,
        })),
    ))
}

pub async fn update_bug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
    Json(body): Json<dto::UpdateBugRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assigned_to = match &body.assigned_to {
        Some(raw) => Some(
            raw.parse::<UserId>()
                .map_err(|_| ApiError::Validation(vec![format!("Invalid assigned_to: {raw}")]))?,
        ),
        None => None,
    };

    let mut bug = load_bug(&services, &bug_id).await?;

    let patch = BugPatch {
        title: body.title,
        description: body.description,
        classification: body.classification,
        status: body.status,
        assigned_to,
    };
    let update = bug.apply_patch(&patch, principal.user_id(), Utc::now());

    let edit = bug_update_edit(&bug, update, &principal);
    services.bugs.update(&bug, &edit).await?;

    Ok(Json(json!({
        "message": "Bug updated successfully.",
        "bug": bug,
    })))
}

pub async fn classify_bug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
    Json(body): Json<dto::ClassifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let classification = body
        .classification
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation(vec!["Classification field is required.".to_string()]))?;

    let mut bug = load_bug(&services, &bug_id).await?;

    require_scoped(
        &principal,
        &[
            AccessRule::always("canClassifyAnyBug"),
            AccessRule::if_assignee("canEditIfAssignedTo"),
            AccessRule::if_creator("canEditMyBug"),
        ],
        bug.ownership(principal.user_id()),
        "Forbidden: You do not have permission to classify this bug.",
    )?;

    let update = bug.classify(classification, principal.user_id(), Utc::now());

    let edit = bug_update_edit(&bug, update, &principal);
    services.bugs.update(&bug, &edit).await?;

    Ok(Json(json!({
        "message": "Bug classified successfully",
        "bug": bug,
    })))
}

pub async fn assign_bug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
    Json(body): Json<dto::AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assigned_to = body
        .assigned_to
        .ok_or_else(|| ApiError::Validation(vec!["assigned_to field is required.".to_string()]))?;
    let assignee = assigned_to
        .parse::<UserId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid assigned_to: {assigned_to}")]))?;

    let mut bug = load_bug(&services, &bug_id).await?;

    require_scoped(
        &principal,
        &[
            AccessRule::always("canReassignAnyBug"),
            AccessRule::if_assignee("canReassignIfAssignedTo"),
            AccessRule::if_creator("canEditMyBug"),
        ],
        bug.ownership(principal.user_id()),
        "Forbidden: You do not have permission to assign this bug.",
    )?;

    let update = bug.assign(assignee, principal.user_id(), Utc::now());

    let edit = bug_update_edit(&bug, update, &principal);
    services.bugs.update(&bug, &edit).await?;

    Ok(Json(json!({
        "message": "Bug assigned successfully",
        "bug": bug,
    })))
}

pub async fn close_bug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
    Json(body): Json<dto::CloseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let closed = body
        .closed
        .ok_or_else(|| ApiError::Validation(vec!["The 'closed' field must be a boolean.".to_string()]))?;

    require_permission(
        &principal,
        "canCloseAnyBug",
        "Forbidden: You do not have permission to close this bug.",
    )?;

    let mut bug = load_bug(&services, &bug_id).await?;
    let update = bug.set_closed(closed, principal.user_id(), Utc::now());

    let edit = bug_update_edit(&bug, update, &principal);
    services.bugs.update(&bug, &edit).await?;

    let message = if closed {
        "Bug closed successfully"
    } else {
        "Bug reopened successfully"
    };
    Ok(Json(json!({ "message": message, "bug": bug })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Comments
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_comments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(bug_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bug = load_bug(&services, &bug_id).await?;
    Ok(Json(bug.comments))
}

pub async fn get_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Path((bug_id, comment_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let bug = load_bug(&services, &bug_id).await?;

    let id = comment_id
        .parse::<CommentId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid commentId: {comment_id}")]))?;

    let comment = bug
        .find_comment(id)
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment.clone()))
}

pub async fn add_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
    Json(body): Json<dto::CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = body.validate().map_err(ApiError::validation)?;

    require_permission(
        &principal,
        "canAddComments",
        "Forbidden: You do not have permission to comment on bugs.",
    )?;

    let mut bug = load_bug(&services, &bug_id).await?;

    let author = author_name(&services, &principal).await?;
    let comment = bug.add_comment(author, text, Utc::now());

    let edit = EditRecord::new(
        BUGS_COLLECTION,
        EditOp::Insert,
        EditTarget::bug(bug.id),
        serde_json::to_value(&comment).map_err(|e| ApiError::internal(e.to_string()))?,
        Some(principal.actor()),
        Utc::now(),
    );
    services.bugs.update(&bug, &edit).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added successfully",
            "comment": comment,
        })),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Test cases
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_tests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(
        &principal,
        "canViewData",
        "Forbidden: You do not have permission to view tests.",
    )?;

    let bug = load_bug(&services, &bug_id).await?;
    Ok(Json(bug.test_cases))
}

pub async fn get_test(
    Extension(services): Extension<Arc<AppServices>>,
    Path((bug_id, test_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let bug = load_bug(&services, &bug_id).await?;

    let id = test_id
        .parse::<TestCaseId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid testId: {test_id}")]))?;

    let test = bug
        .find_test(id)
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    Ok(Json(test.clone()))
}

pub async fn add_test(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(bug_id): Path<String>,
    Json(body): Json<dto::AddTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(
        &principal,
        "canAddTestCase",
        "Forbidden: You do not have permission to add test cases.",
    )?;

    let (description, status, tested_by, tested_on) =
        body.validate().map_err(ApiError::validation)?;

    let mut bug = load_bug(&services, &bug_id).await?;
    let test = bug.add_test(description, status, tested_by, tested_on, Utc::now());

    let edit = EditRecord::new(
        BUGS_COLLECTION,
        EditOp::Insert,
        EditTarget::bug_test(bug.id, test.id),
        serde_json::to_value(&test).map_err(|e| ApiError::internal(e.to_string()))?,
        Some(principal.actor()),
        Utc::now(),
    );
    services.bugs.update(&bug, &edit).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Test case added successfully!",
            "test": test,
        })),
    ))
}

pub async fn update_test(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((bug_id, test_id)): Path<(String, String)>,
    Json(body): Json<dto::PatchTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(
        &principal,
        "canEditTestCase",
        "Forbidden: You do not have permission to edit test cases.",
    )?;

    let status = body.validate().map_err(ApiError::validation)?;

    let id = test_id
        .parse::<TestCaseId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid testId: {test_id}")]))?;

    let mut bug = load_bug(&services, &bug_id).await?;

    let patch = TestPatch {
        description: body.description.clone(),
        status,
        tested_by: body.tested_by.clone(),
    };
    let test = bug
        .update_test(id, &patch, principal.user_id(), Utc::now())
        .map_err(|_| ApiError::NotFound("Test case not found".to_string()))?;

    let edit = EditRecord::new(
        BUGS_COLLECTION,
        EditOp::Update,
        EditTarget::bug_test(bug.id, test.id),
        serde_json::to_value(&test).map_err(|e| ApiError::internal(e.to_string()))?,
        Some(principal.actor()),
        Utc::now(),
    );
    services.bugs.update(&bug, &edit).await?;

    Ok(Json(json!({
        "message": "Test case updated successfully",
        "test": test,
    })))
}

pub async fn delete_test(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((bug_id, test_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(
        &principal,
        "canDeleteTestCase",
        "Forbidden: You do not have permission to delete test cases.",
    )?;

    let id = test_id
        .parse::<TestCaseId>()
        .map_err(|_| ApiError::Validation(vec![format!("Invalid testId: {test_id}")]))?;

    let mut bug = load_bug(&services, &bug_id).await?;

    let deleted = bug
        .remove_test(id)
        .ok_or_else(|| ApiError::NotFound("Test case not found".to_string()))?;

    let edit = EditRecord::new(
        BUGS_COLLECTION,
        EditOp::Delete,
        EditTarget::bug_test(bug.id, deleted.id),
        serde_json::to_value(&deleted).map_err(|e| ApiError::internal(e.to_string()))?,
        Some(principal.actor()),
        Utc::now(),
    );
    services.bugs.update(&bug, &edit).await?;

    Ok(Json(json!({
        "message": "Test case deleted successfully",
        "deleted_test": deleted,
    })))
}
