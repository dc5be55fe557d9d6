use crate::{
    adapters::{email::resend::ResendEmailSender, http::app_state::AppState},
    infra::{config::AppConfig, http_client::try_build_client, postgres_persistence},
    use_cases::{
        applications::{ApplicationRepo, ApplicationUseCases},
        approval::ApprovalWorkflow,
        dispatcher::SideEffectDispatcher,
        notifications::{NotificationRepo, NotificationUseCases},
        session::SessionReconciler,
        trial::TrialProvisioner,
        user::{EmailSender, UserRepo},
    },
};
use anyhow::Context;
use std::fs::File;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    init_tracing(&config.log_file)?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let client = try_build_client().context("Failed to build HTTP client")?;
    let email = Arc::new(ResendEmailSender::new(
        client,
        config.resend_api_key.clone(),
        config.email_from.clone(),
    )) as Arc<dyn EmailSender>;

    let user_repo_arc = postgres_arc.clone() as Arc<dyn UserRepo>;
    let application_repo_arc = postgres_arc.clone() as Arc<dyn ApplicationRepo>;
    let notification_repo_arc = postgres_arc.clone() as Arc<dyn NotificationRepo>;

    let dispatcher = SideEffectDispatcher::new(
        notification_repo_arc.clone(),
        email,
        config.app_origin.to_string(),
    );
    let provisioner = TrialProvisioner::new(user_repo_arc.clone(), config.trial_days);

    let session_reconciler =
        SessionReconciler::new(user_repo_arc.clone(), provisioner, dispatcher.clone());

    let approval_workflow = ApprovalWorkflow::new(
        application_repo_arc.clone(),
        user_repo_arc.clone(),
        dispatcher,
        config.trial_days,
        config.grant_retry_attempts,
    );

    info!(
        trial_days = config.trial_days,
        grant_retry_attempts = config.grant_retry_attempts,
        "Membership core configured"
    );

    Ok(AppState {
        config: Arc::new(config),
        session_reconciler: Arc::new(session_reconciler),
        application_use_cases: Arc::new(ApplicationUseCases::new(application_repo_arc)),
        approval_workflow: Arc::new(approval_workflow),
        notification_use_cases: Arc::new(NotificationUseCases::new(notification_repo_arc)),
        user_repo: user_repo_arc,
    })
}

pub fn init_tracing(log_file: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "membership_core=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs)
    let file = File::create(log_file).with_context(|| format!("cannot create log file {log_file}"))?;
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
    Ok(())
}
