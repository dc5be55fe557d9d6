use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{Viewer, require_session},
    },
    app_error::AppResult,
    domain::entities::notification::Notification,
};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}/read", post(mark_read))
        .route("/{id}", delete(remove))
        .route_layer(middleware::from_fn_with_state(app_state, require_session))
}

async fn list(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = app_state.notification_use_cases.list(&viewer.email).await?;
    Ok(Json(notifications))
}

async fn mark_read(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state
        .notification_use_cases
        .mark_read(&viewer.email, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    app_state
        .notification_use_cases
        .delete(&viewer.email, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
