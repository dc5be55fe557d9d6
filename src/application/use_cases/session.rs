use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        entitlement::{Entitlement, classify},
        use_cases::{
            dispatcher::{NotificationContext, SideEffectDispatcher, TemplateKind},
            trial::{Provisioning, TrialProvisioner},
            user::UserRepo,
        },
        validators::is_valid_email,
    },
    domain::entities::{
        subscription::{SubscriptionPlan, SubscriptionStatus, SubscriptionType},
        user::{Role, User, UserType, normalize_email},
    },
};

/// Access tier shown to the viewer for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    NoAccess,
    Trial,
    ActivePaid,
    Expired,
}

impl AccessTier {
    pub fn has_access(&self) -> bool {
        matches!(self, AccessTier::Trial | AccessTier::ActivePaid)
    }
}

/// Result of a session bootstrap. Callers keep this value for the session's
/// lifetime; nothing here is cached server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntitlement {
    pub email: String,
    pub access: AccessTier,
    pub has_access: bool,
    pub subscription_type: Option<SubscriptionType>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub ends_at: Option<DateTime<Utc>>,
    pub role: Role,
    pub user_type: UserType,
    pub is_approved_mentor: bool,
    pub trial_granted: bool,
    /// The store could not be reached; access was withheld rather than guessed.
    pub degraded: bool,
    pub reconciled_at: DateTime<Utc>,
}

impl SessionEntitlement {
    fn from_user(user: &User, now: DateTime<Utc>, trial_granted: bool) -> Self {
        let access = match classify(user, now) {
            Entitlement::Trial => AccessTier::Trial,
            Entitlement::ActivePaid => AccessTier::ActivePaid,
            Entitlement::Expired => AccessTier::Expired,
            Entitlement::NeedsTrial | Entitlement::NoAccess => {
                if user.subscription_status == SubscriptionStatus::Expired {
                    AccessTier::Expired
                } else {
                    AccessTier::NoAccess
                }
            }
        };

        Self {
            email: user.email.clone(),
            access,
            has_access: access.has_access(),
            subscription_type: user.subscription_type,
            subscription_plan: user.subscription_plan,
            ends_at: user.subscription_end_date,
            role: user.role,
            user_type: user.user_type,
            is_approved_mentor: user.is_approved_mentor,
            trial_granted,
            degraded: false,
            reconciled_at: now,
        }
    }

    fn degraded(email: &str, now: DateTime<Utc>) -> Self {
        Self {
            email: normalize_email(email),
            access: AccessTier::NoAccess,
            has_access: false,
            subscription_type: None,
            subscription_plan: None,
            ends_at: None,
            role: Role::default(),
            user_type: UserType::default(),
            is_approved_mentor: false,
            trial_granted: false,
            degraded: true,
            reconciled_at: now,
        }
    }
}

#[derive(Clone)]
pub struct SessionReconciler {
    users: Arc<dyn UserRepo>,
    provisioner: TrialProvisioner,
    dispatcher: SideEffectDispatcher,
}

impl SessionReconciler {
    pub fn new(
        users: Arc<dyn UserRepo>,
        provisioner: TrialProvisioner,
        dispatcher: SideEffectDispatcher,
    ) -> Self {
        Self {
            users,
            provisioner,
            dispatcher,
        }
    }

    pub async fn reconcile_session(&self, email: &str) -> SessionEntitlement {
        self.reconcile_session_at(email, Utc::now()).await
    }

    /// Never fails. A store error degrades the viewer to no access.
    #[instrument(skip(self))]
    pub async fn reconcile_session_at(&self, email: &str, now: DateTime<Utc>) -> SessionEntitlement {
        match self.reconcile(email, now).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Session reconciliation failed, withholding access");
                SessionEntitlement::degraded(email, now)
            }
        }
    }

    async fn reconcile(&self, email: &str, now: DateTime<Utc>) -> AppResult<SessionEntitlement> {
        if !is_valid_email(email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }

        let (mut user, created) = self.users.find_or_create(email, None).await?;
        if created {
            info!(email = %user.email, "Created user on first session");
        }

        let mut trial_granted = false;
        if matches!(
            classify(&user, now),
            Entitlement::Expired | Entitlement::NeedsTrial
        ) {
            match self.provisioner.provision_if_needed(&user, now).await? {
                Provisioning::Granted(updated) => {
                    trial_granted = true;
                    user = updated;
                }
                Provisioning::Corrected(updated) => user = updated,
                Provisioning::NoOp => {
                    // Another session may have provisioned in between.
                    if let Some(fresh) = self.users.get_by_email(&user.email).await? {
                        user = fresh;
                    }
                }
            }
        }

        if trial_granted {
            let ctx = NotificationContext {
                full_name: user.full_name.clone(),
                admin_notes: None,
                ends_at: user.subscription_end_date,
            };
            self.dispatcher
                .notify(&user.email, TemplateKind::TrialStarted, &ctx)
                .await;
        }

        let session = SessionEntitlement::from_user(&user, now, trial_granted);
        info!(access = ?session.access, "Session reconciled");
        Ok(session)
    }
}
