pub mod admin;
pub mod applications;
pub mod health;
pub mod notifications;
pub mod session;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/session", session::router(app_state.clone()))
        .nest("/applications", applications::router(app_state.clone()))
        .nest("/notifications", notifications::router(app_state.clone()))
        .nest("/admin", admin::router(app_state))
}
