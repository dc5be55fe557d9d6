use axum::{Extension, Json, Router, extract::State, middleware, routing::post};

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{Viewer, require_session},
    },
    use_cases::session::SessionEntitlement,
};

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/reconcile", post(reconcile))
        .route_layer(middleware::from_fn_with_state(app_state, require_session))
}

/// Session bootstrap. Always answers; a store outage shows up as `degraded`.
async fn reconcile(
    State(app_state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Json<SessionEntitlement> {
    Json(
        app_state
            .session_reconciler
            .reconcile_session(&viewer.email)
            .await,
    )
}
