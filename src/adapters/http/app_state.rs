use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        applications::ApplicationUseCases, approval::ApprovalWorkflow,
        notifications::NotificationUseCases, session::SessionReconciler, user::UserRepo,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub session_reconciler: Arc<SessionReconciler>,
    pub application_use_cases: Arc<ApplicationUseCases>,
    pub approval_workflow: Arc<ApprovalWorkflow>,
    pub notification_use_cases: Arc<NotificationUseCases>,
    pub user_repo: Arc<dyn UserRepo>,
}
