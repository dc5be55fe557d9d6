use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{require_admin, require_session},
        routes::applications::parse_kind,
    },
    app_error::{AppError, AppResult},
    domain::entities::application::{Application, ApplicationStatus},
    use_cases::approval::{EntitlementGrant, RepairOutcome, RepairSweep},
};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications))
        .route("/applications/repair-grants", post(repair_ungranted))
        .route("/applications/{id}/approve", post(approve))
        .route("/applications/{id}/reject", post(reject))
        .route("/applications/{id}/repair-grant", post(repair_grant))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ))
        .route_layer(middleware::from_fn_with_state(app_state, require_session))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    kind: Option<String>,
    status: Option<String>,
    /// Only approved applications whose grant is not on record.
    #[serde(default)]
    ungranted: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionRequest {
    admin_notes: Option<String>,
}

async fn list_applications(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Application>>> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            raw.parse::<ApplicationStatus>()
                .map_err(|_| AppError::InvalidInput(format!("Unknown status '{}'", raw)))
        })
        .transpose()?;

    if query.ungranted {
        if status.is_some_and(|s| s != ApplicationStatus::Approved) {
            return Err(AppError::InvalidInput(
                "Only approved applications can be ungranted".into(),
            ));
        }
        let applications = app_state.approval_workflow.list_ungranted(kind).await?;
        return Ok(Json(applications));
    }

    let applications = app_state.application_use_cases.list(kind, status).await?;
    Ok(Json(applications))
}

async fn approve(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionRequest>>,
) -> AppResult<Json<EntitlementGrant>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let grant = app_state
        .approval_workflow
        .approve(id, request.admin_notes.as_deref())
        .await?;
    Ok(Json(grant))
}

async fn reject(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<DecisionRequest>>,
) -> AppResult<Json<Application>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let application = app_state
        .approval_workflow
        .reject(id, request.admin_notes.as_deref())
        .await?;
    Ok(Json(application))
}

async fn repair_grant(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RepairOutcome>> {
    let outcome = app_state.approval_workflow.repair_grant(id).await?;
    Ok(Json(outcome))
}

async fn repair_ungranted(State(app_state): State<AppState>) -> AppResult<Json<RepairSweep>> {
    let sweep = app_state.approval_workflow.repair_ungranted().await?;
    Ok(Json(sweep))
}
