//! # Rule Lifecycle API
//!
//! CRUD over access rules, orchestrating the reconciliation engine and the
//! propagation service so every write leaves the directory consistent with
//! the rule set:
//!
//! - create — uniqueness pre-check, insert, then grant to everyone in scope.
//! - update — revoke what the previous state granted and no remaining rule
//!   still grants, persist the new state, then grant the new role set.
//! - delete — soft-delete, then revoke what no remaining rule still grants.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use pax_batch::PropagationSummary;
use pax_core::recon::removal_plan;
use pax_core::scope::{Scope, WILDCARD};
use pax_core::Rule;

use crate::error::AppError;
use crate::state::AppState;

/// Event type for a rule-creation propagation run.
pub const EVENT_RULE_CREATED: &str = "rule.created";
/// Event type for a rule-update propagation run.
pub const EVENT_RULE_UPDATED: &str = "rule.updated";
/// Event type for a rule-deletion propagation run.
pub const EVENT_RULE_DELETED: &str = "rule.deleted";

/// Create/update request body. A missing or `"*"` dimension is a wildcard.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RuleBody {
    /// Display name.
    pub name: String,
    /// Campus dimension; absent or `"*"` matches every campus.
    #[serde(default)]
    pub campus: Option<String>,
    /// Title dimension; absent or `"*"` matches every title.
    #[serde(default)]
    pub title: Option<String>,
    /// Inactive rules grant nothing.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Roles the rule grants, by id.
    pub role_ids: Vec<Uuid>,
    /// Correlation id threaded into the audit trail; generated when absent.
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

fn default_active() -> bool {
    true
}

/// A rule as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct RuleResponse {
    pub id: Uuid,
    pub name: String,
    /// Campus dimension; `"*"` = wildcard.
    pub campus: String,
    /// Title dimension; `"*"` = wildcard.
    pub title: String,
    pub is_active: bool,
    pub role_ids: Vec<Uuid>,
}

impl From<&Rule> for RuleResponse {
    fn from(rule: &Rule) -> Self {
        let (campus, title) = rule.scope.storage_key();
        Self {
            id: rule.id,
            name: rule.name.clone(),
            campus,
            title,
            is_active: rule.is_active,
            role_ids: rule.role_ids.clone(),
        }
    }
}

/// Counters of one propagation run triggered by a rule write.
#[derive(Debug, Serialize, ToSchema)]
pub struct PropagationReport {
    /// The Event audit header the run wrote.
    pub event_id: Uuid,
    pub total: u32,
    pub success: u32,
    pub fail: u32,
}

impl From<PropagationSummary> for PropagationReport {
    fn from(summary: PropagationSummary) -> Self {
        Self {
            event_id: summary.event_id,
            total: summary.total,
            success: summary.success,
            fail: summary.fail,
        }
    }
}

/// Response of a rule create or update.
#[derive(Debug, Serialize, ToSchema)]
pub struct RuleMutationResponse {
    pub rule: RuleResponse,
    /// Revocations applied before the new state, if any were needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal: Option<PropagationReport>,
    /// Grant run for the new state; absent when the rule grants nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<PropagationReport>,
}

/// Response of a rule deletion.
#[derive(Debug, Serialize, ToSchema)]
pub struct RuleDeletionResponse {
    pub id: Uuid,
    /// Revocations applied for roles no remaining rule still grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal: Option<PropagationReport>,
}

/// Build the rules router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/rules", post(create_rule).get(list_rules))
        .route(
            "/v1/rules/:id",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
}

/// Parse the scope dimensions of a request body.
fn parse_scope(body: &RuleBody) -> Result<Scope, AppError> {
    let campus = match body.campus.as_deref() {
        None | Some(WILDCARD) => None,
        Some(s) => Some(s.parse()?),
    };
    let title = match body.title.as_deref() {
        None | Some(WILDCARD) => None,
        Some(s) => Some(s.parse()?),
    };
    Ok(Scope::new(campus, title))
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("rule name must not be empty".into()));
    }
    Ok(())
}

/// POST /v1/rules — Create a rule and grant it across its scope.
#[utoipa::path(
    post,
    path = "/v1/rules",
    request_body = RuleBody,
    responses(
        (status = 201, description = "Rule created and propagated", body = RuleMutationResponse),
        (status = 409, description = "A rule already covers this scope", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid scope or name", body = crate::error::ErrorBody),
    ),
    tag = "rules"
)]
pub(crate) async fn create_rule(
    State(state): State<AppState>,
    Json(body): Json<RuleBody>,
) -> Result<(StatusCode, Json<RuleMutationResponse>), AppError> {
    validate_name(&body.name)?;
    let scope = parse_scope(&body)?;

    // Friendly pre-check; the store's partial unique index still backstops
    // the race.
    let (campus_key, title_key) = scope.storage_key();
    if state
        .rules
        .find_active_by_scope_key(&campus_key, &title_key)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "a rule already exists for scope {scope}"
        )));
    }

    let rule = Rule {
        id: Uuid::new_v4(),
        name: body.name,
        scope,
        is_active: body.is_active,
        role_ids: body.role_ids,
        is_deleted: false,
    };
    state.rules.create(&rule).await?;

    let correlation_id = body.correlation_id.unwrap_or_else(Uuid::new_v4);
    let propagation = if rule.grants() && !rule.role_ids.is_empty() {
        let summary = state
            .propagator()
            .apply_rule(&rule, EVENT_RULE_CREATED, correlation_id)
            .await?;
        Some(summary.into())
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(RuleMutationResponse {
            rule: (&rule).into(),
            removal: None,
            propagation,
        }),
    ))
}

/// GET /v1/rules — List the non-deleted rules.
#[utoipa::path(
    get,
    path = "/v1/rules",
    responses(
        (status = 200, description = "All non-deleted rules", body = [RuleResponse]),
    ),
    tag = "rules"
)]
pub(crate) async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<RuleResponse>>, AppError> {
    let rules = state.rules.list().await?;
    Ok(Json(rules.iter().map(RuleResponse::from).collect()))
}

/// GET /v1/rules/{id} — Fetch one rule.
#[utoipa::path(
    get,
    path = "/v1/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule id")),
    responses(
        (status = 200, description = "The rule", body = RuleResponse),
        (status = 404, description = "No such rule", body = crate::error::ErrorBody),
    ),
    tag = "rules"
)]
pub(crate) async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleResponse>, AppError> {
    let rule = load_live_rule(&state, id).await?;
    Ok(Json((&rule).into()))
}

/// PUT /v1/rules/{id} — Replace a rule's name, scope, activity, and roles.
///
/// Revocations for roles the previous state granted (and no remaining rule
/// still grants) run before the new state is granted, so a shrinking role
/// set never leaves stale access behind.
#[utoipa::path(
    put,
    path = "/v1/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule id")),
    request_body = RuleBody,
    responses(
        (status = 200, description = "Rule updated, deltas applied", body = RuleMutationResponse),
        (status = 404, description = "No such rule", body = crate::error::ErrorBody),
        (status = 409, description = "Another rule covers the new scope", body = crate::error::ErrorBody),
    ),
    tag = "rules"
)]
pub(crate) async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RuleBody>,
) -> Result<Json<RuleMutationResponse>, AppError> {
    validate_name(&body.name)?;
    let previous = load_live_rule(&state, id).await?;
    let scope = parse_scope(&body)?;

    let (campus_key, title_key) = scope.storage_key();
    if let Some(existing) = state
        .rules
        .find_active_by_scope_key(&campus_key, &title_key)
        .await?
    {
        if existing.id != id {
            return Err(AppError::Conflict(format!(
                "a rule already exists for scope {scope}"
            )));
        }
    }

    let correlation_id = body.correlation_id.unwrap_or_else(Uuid::new_v4);
    let propagator = state.propagator();

    // Revoke what the previous state granted and no other rule still grants.
    let removal = if previous.grants() && !previous.role_ids.is_empty() {
        let overlapping = state
            .rules
            .active_overlapping(&previous.scope, Some(id))
            .await?;
        let occupied = state.directory.occupied_groups().await?;
        let plan = removal_plan(&previous.scope, &previous.role_ids, &overlapping, &occupied);
        if plan.is_empty() {
            None
        } else {
            let summary = propagator
                .apply_removal_plan(&plan, EVENT_RULE_UPDATED, Some(id), correlation_id)
                .await?;
            Some(summary.into())
        }
    } else {
        None
    };

    let updated = Rule {
        id,
        name: body.name,
        scope,
        is_active: body.is_active,
        role_ids: body.role_ids,
        is_deleted: false,
    };
    state.rules.update(&updated).await?;

    let propagation = if updated.grants() && !updated.role_ids.is_empty() {
        let summary = propagator
            .apply_rule(&updated, EVENT_RULE_UPDATED, correlation_id)
            .await?;
        Some(summary.into())
    } else {
        None
    };

    Ok(Json(RuleMutationResponse {
        rule: (&updated).into(),
        removal,
        propagation,
    }))
}

/// DELETE /v1/rules/{id} — Soft-delete a rule and revoke orphaned grants.
#[utoipa::path(
    delete,
    path = "/v1/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule deleted, revocations applied", body = RuleDeletionResponse),
        (status = 404, description = "No such rule", body = crate::error::ErrorBody),
    ),
    tag = "rules"
)]
pub(crate) async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RuleDeletionResponse>, AppError> {
    let previous = load_live_rule(&state, id).await?;
    state.rules.soft_delete(id).await?;

    let removal = if previous.grants() && !previous.role_ids.is_empty() {
        let overlapping = state
            .rules
            .active_overlapping(&previous.scope, Some(id))
            .await?;
        let occupied = state.directory.occupied_groups().await?;
        let plan = removal_plan(&previous.scope, &previous.role_ids, &overlapping, &occupied);
        if plan.is_empty() {
            None
        } else {
            let summary = state
                .propagator()
                .apply_removal_plan(&plan, EVENT_RULE_DELETED, Some(id), Uuid::new_v4())
                .await?;
            Some(summary.into())
        }
    } else {
        None
    };

    Ok(Json(RuleDeletionResponse { id, removal }))
}

/// Fetch a rule, treating soft-deleted ones as absent.
async fn load_live_rule(state: &AppState, id: Uuid) -> Result<Rule, AppError> {
    state
        .rules
        .find(id)
        .await?
        .filter(|r| !r.is_deleted)
        .ok_or_else(|| AppError::NotFound(format!("rule not found: {id}")))
}
