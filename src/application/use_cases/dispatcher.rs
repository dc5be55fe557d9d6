use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::{
    app_error::AppResult,
    application::{
        email_templates::{
            application_approved_email, application_rejected_email, trial_started_email,
        },
        use_cases::{notifications::NotificationRepo, user::EmailSender},
    },
    domain::entities::{
        application::ApplicationKind,
        notification::{NewNotification, NotificationType},
        user::normalize_email,
    },
};

/// One attempt plus one retry per channel.
const DELIVERY_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    TrialStarted,
    ApplicationApproved(ApplicationKind),
    ApplicationRejected(ApplicationKind),
}

#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub full_name: Option<String>,
    pub admin_notes: Option<String>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// What actually got delivered. Informational only; never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub notification: bool,
    pub email: bool,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.notification && self.email
    }
}

/// Best-effort notification and email delivery.
///
/// Called only after the authoritative write has committed. Nothing here can
/// fail the caller: each channel is tried twice, then logged and dropped.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    notifications: Arc<dyn NotificationRepo>,
    email: Arc<dyn EmailSender>,
    app_origin: String,
}

impl SideEffectDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationRepo>,
        email: Arc<dyn EmailSender>,
        app_origin: String,
    ) -> Self {
        Self {
            notifications,
            email,
            app_origin: app_origin.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn notify(
        &self,
        recipient_email: &str,
        kind: TemplateKind,
        ctx: &NotificationContext,
    ) -> DispatchReport {
        let recipient = normalize_email(recipient_email);
        let in_app = self.in_app_notification(&recipient, kind, ctx);
        let (subject, html) = self.email_body(kind, ctx);

        let notifications = &self.notifications;
        let email = &self.email;
        let in_app_ref = &in_app;
        let (subject_ref, html_ref, recipient_ref) = (&subject, &html, &recipient);

        let (notification, email) = tokio::join!(
            deliver("notification", recipient_ref, move || notifications.create(in_app_ref)),
            deliver("email", recipient_ref, move || email.send(
                recipient_ref,
                subject_ref,
                html_ref
            )),
        );

        let report = DispatchReport {
            notification,
            email,
        };
        if report.is_complete() {
            info!(recipient = %recipient, ?kind, "Side effects delivered");
        } else {
            warn!(
                recipient = %recipient,
                ?kind,
                notification = report.notification,
                email = report.email,
                "Side effects partially delivered"
            );
        }
        report
    }

    fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.app_origin)
    }

    fn in_app_notification(
        &self,
        recipient: &str,
        kind: TemplateKind,
        ctx: &NotificationContext,
    ) -> NewNotification {
        let (title, message, notification_type, action_url) = match kind {
            TemplateKind::TrialStarted => (
                "Your premium trial has started".to_string(),
                match ctx.ends_at {
                    Some(end) => format!(
                        "Enjoy full access until {}.",
                        end.format("%Y-%m-%d")
                    ),
                    None => "Enjoy full access to the community.".to_string(),
                },
                NotificationType::Success,
                Some(self.dashboard_url()),
            ),
            TemplateKind::ApplicationApproved(ApplicationKind::Member) => (
                "Membership approved".to_string(),
                "Your membership application was approved. Welcome!".to_string(),
                NotificationType::Success,
                Some(self.dashboard_url()),
            ),
            TemplateKind::ApplicationApproved(ApplicationKind::Mentor) => (
                "Mentor application approved".to_string(),
                "You are now an approved mentor. Members can book sessions with you.".to_string(),
                NotificationType::Success,
                Some(format!("{}/mentor/profile", self.app_origin)),
            ),
            TemplateKind::ApplicationRejected(application_kind) => (
                format!("Update on your {} application", application_kind.label()),
                match ctx.admin_notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                    Some(notes) => format!("Your application was not approved. Note: {}", notes),
                    None => "Your application was not approved at this time.".to_string(),
                },
                NotificationType::Warning,
                None,
            ),
        };

        NewNotification {
            recipient_email: recipient.to_string(),
            title,
            message,
            kind: notification_type,
            action_url,
        }
    }

    fn email_body(&self, kind: TemplateKind, ctx: &NotificationContext) -> (String, String) {
        let full_name = ctx.full_name.as_deref();
        match kind {
            TemplateKind::TrialStarted => trial_started_email(
                &self.app_origin,
                full_name,
                ctx.ends_at,
                &self.dashboard_url(),
            ),
            TemplateKind::ApplicationApproved(application_kind) => application_approved_email(
                &self.app_origin,
                application_kind,
                full_name,
                ctx.ends_at,
                &self.dashboard_url(),
            ),
            TemplateKind::ApplicationRejected(application_kind) => application_rejected_email(
                &self.app_origin,
                application_kind,
                full_name,
                ctx.admin_notes.as_deref(),
            ),
        }
    }
}

async fn deliver<F, Fut, T>(channel: &'static str, recipient: &str, mut op: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match op().await {
            Ok(_) => return true,
            Err(e) if attempt < DELIVERY_ATTEMPTS => {
                warn!(channel, recipient = %recipient, attempt, error = %e, "Delivery failed, retrying");
            }
            Err(e) => {
                warn!(channel, recipient = %recipient, attempt, error = %e, "Delivery dropped");
            }
        }
    }
    false
}
