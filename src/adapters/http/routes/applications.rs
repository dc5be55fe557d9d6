use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{Viewer, require_session},
    },
    app_error::{AppError, AppResult},
    domain::entities::application::{Application, ApplicationKind},
    use_cases::applications::SubmitApplicationInput,
};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/mine", get(list_mine))
        .route("/{kind}", post(submit))
        .route_layer(middleware::from_fn_with_state(app_state, require_session))
}

pub(super) fn parse_kind(raw: &str) -> AppResult<ApplicationKind> {
    raw.parse()
        .map_err(|_| AppError::InvalidInput(format!("Unknown application kind '{}'", raw)))
}

async fn submit(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(kind): Path<String>,
    Json(input): Json<SubmitApplicationInput>,
) -> AppResult<(StatusCode, Json<Application>)> {
    let kind = parse_kind(&kind)?;
    let application = app_state
        .application_use_cases
        .submit(&viewer.email, kind, input)
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn list_mine(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> AppResult<Json<Vec<Application>>> {
    let applications = app_state
        .application_use_cases
        .list_for_applicant(&viewer.email)
        .await?;
    Ok(Json(applications))
}
