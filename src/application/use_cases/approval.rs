use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        applications::ApplicationRepo,
        dispatcher::{NotificationContext, SideEffectDispatcher, TemplateKind},
        user::{ApprovalGrant, TrialWindow, UserRepo},
    },
    domain::entities::{
        application::{Application, ApplicationKind, ApplicationStatus},
        subscription::{SubscriptionPlan, SubscriptionType},
        user::User,
    },
};

pub const DEFAULT_GRANT_ATTEMPTS: u32 = 3;
const GRANT_RETRY_BACKOFF_MS: u64 = 50;

/// The entitlement an approval put on the applicant's user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementGrant {
    pub application_id: Uuid,
    pub kind: ApplicationKind,
    pub email: String,
    pub user_id: Uuid,
    pub subscription_type: Option<SubscriptionType>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// The applicant had no user record before this approval.
    pub user_created: bool,
    pub mentor: bool,
}

impl EntitlementGrant {
    fn from_user(application: &Application, user: &User, user_created: bool) -> Self {
        Self {
            application_id: application.id,
            kind: application.kind,
            email: user.email.clone(),
            user_id: user.id,
            subscription_type: user.subscription_type,
            subscription_plan: user.subscription_plan,
            starts_at: user.subscription_start_date,
            ends_at: user.subscription_end_date,
            user_created,
            mentor: user.is_approved_mentor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    AlreadyGranted,
    Granted(EntitlementGrant),
}

/// Result of sweeping approved applications whose grant never landed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSweep {
    pub repaired: Vec<EntitlementGrant>,
    /// Still ungranted; picked up again by the next sweep.
    pub failed: Vec<Uuid>,
}

struct AppliedGrant {
    grant: EntitlementGrant,
    newly_applied: bool,
}

/// Admin approve/reject of member and mentor applications.
///
/// Approval order matters: the application transition is the linearization
/// point and is written first; the user grant follows and is idempotent per
/// application, so it can be retried (or repaired later) without ever
/// re-approving. Side effects run last and cannot fail the operation.
#[derive(Clone)]
pub struct ApprovalWorkflow {
    applications: Arc<dyn ApplicationRepo>,
    users: Arc<dyn UserRepo>,
    dispatcher: SideEffectDispatcher,
    trial_days: i64,
    grant_attempts: u32,
}

impl ApprovalWorkflow {
    pub fn new(
        applications: Arc<dyn ApplicationRepo>,
        users: Arc<dyn UserRepo>,
        dispatcher: SideEffectDispatcher,
        trial_days: i64,
        grant_attempts: u32,
    ) -> Self {
        Self {
            applications,
            users,
            dispatcher,
            trial_days,
            grant_attempts: grant_attempts.max(1),
        }
    }

    pub async fn approve(
        &self,
        application_id: Uuid,
        admin_notes: Option<&str>,
    ) -> AppResult<EntitlementGrant> {
        self.approve_at(application_id, admin_notes, Utc::now()).await
    }

    #[instrument(skip(self, admin_notes))]
    pub async fn approve_at(
        &self,
        application_id: Uuid,
        admin_notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<EntitlementGrant> {
        let notes = clean_notes(admin_notes);
        let Some(application) = self
            .applications
            .transition(application_id, ApplicationStatus::Approved, notes, now)
            .await?
        else {
            return Err(self.not_pending(application_id).await);
        };

        info!(
            kind = %application.kind,
            email = %application.applicant_email,
            "Application approved"
        );

        let applied = self.grant_with_retry(&application, now).await?;

        self.dispatch_approved(&application, &applied.grant).await;
        Ok(applied.grant)
    }

    #[instrument(skip(self, admin_notes))]
    pub async fn reject(
        &self,
        application_id: Uuid,
        admin_notes: Option<&str>,
    ) -> AppResult<Application> {
        let notes = clean_notes(admin_notes);
        let Some(application) = self
            .applications
            .transition(application_id, ApplicationStatus::Rejected, notes, Utc::now())
            .await?
        else {
            return Err(self.not_pending(application_id).await);
        };

        info!(
            kind = %application.kind,
            email = %application.applicant_email,
            "Application rejected"
        );

        let ctx = NotificationContext {
            full_name: Some(application.full_name.clone()),
            admin_notes: application.admin_notes.clone(),
            ends_at: None,
        };
        self.dispatcher
            .notify(
                &application.applicant_email,
                TemplateKind::ApplicationRejected(application.kind),
                &ctx,
            )
            .await;

        Ok(application)
    }

    /// Re-runs the entitlement grant for an approved application whose grant
    /// never landed. Idempotent: a grant already on record is left alone.
    #[instrument(skip(self))]
    pub async fn repair_grant(&self, application_id: Uuid) -> AppResult<RepairOutcome> {
        let application = self
            .applications
            .get_by_id(application_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if application.status != ApplicationStatus::Approved {
            return Err(AppError::InvalidInput(format!(
                "Application is {}, only approved applications can be repaired",
                application.status
            )));
        }

        if self.users.has_grant(application.id).await? {
            info!("Grant already on record, nothing to repair");
            return Ok(RepairOutcome::AlreadyGranted);
        }

        let applied = self.grant_with_retry(&application, Utc::now()).await?;
        if !applied.newly_applied {
            return Ok(RepairOutcome::AlreadyGranted);
        }

        warn!(
            email = %application.applicant_email,
            "Repaired missing entitlement grant for approved application"
        );
        self.dispatch_approved(&application, &applied.grant).await;
        Ok(RepairOutcome::Granted(applied.grant))
    }

    /// Approved applications with no grant in the ledger: approvals whose
    /// grant step exhausted its retries and has not been repaired yet.
    #[instrument(skip(self))]
    pub async fn list_ungranted(
        &self,
        kind: Option<ApplicationKind>,
    ) -> AppResult<Vec<Application>> {
        let approved = self
            .applications
            .list(kind, Some(ApplicationStatus::Approved))
            .await?;
        let ids: Vec<Uuid> = approved.iter().map(|a| a.id).collect();
        let granted = self.users.granted_among(&ids).await?;
        Ok(approved
            .into_iter()
            .filter(|a| !granted.contains(&a.id))
            .collect())
    }

    /// Runs `repair_grant` over every ungranted approval. A failure on one
    /// application is logged and does not stop the sweep.
    #[instrument(skip(self))]
    pub async fn repair_ungranted(&self) -> AppResult<RepairSweep> {
        let mut sweep = RepairSweep::default();
        for application in self.list_ungranted(None).await? {
            match self.repair_grant(application.id).await {
                Ok(RepairOutcome::Granted(grant)) => sweep.repaired.push(grant),
                Ok(RepairOutcome::AlreadyGranted) => {}
                Err(e) => {
                    warn!(
                        application_id = %application.id,
                        error = %e,
                        "Grant repair failed, leaving application for the next sweep"
                    );
                    sweep.failed.push(application.id);
                }
            }
        }
        info!(
            repaired = sweep.repaired.len(),
            failed = sweep.failed.len(),
            "Grant repair sweep finished"
        );
        Ok(sweep)
    }

    async fn grant_with_retry(
        &self,
        application: &Application,
        now: DateTime<Utc>,
    ) -> AppResult<AppliedGrant> {
        let mut attempt = 1;
        loop {
            match self.apply_entitlement(application, now).await {
                Ok(applied) => return Ok(applied),
                Err(e) if e.is_retryable() && attempt < self.grant_attempts => {
                    warn!(attempt, error = %e, "Entitlement grant failed, retrying");
                    tokio::time::sleep(StdDuration::from_millis(
                        GRANT_RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        attempt,
                        error = %e,
                        "Entitlement grant failed, application stays approved and needs repair"
                    );
                    return Err(AppError::EntitlementWriteFailed(e.to_string()));
                }
            }
        }
    }

    async fn apply_entitlement(
        &self,
        application: &Application,
        now: DateTime<Utc>,
    ) -> AppResult<AppliedGrant> {
        let (user, user_created) = self
            .users
            .find_or_create(&application.applicant_email, Some(&application.full_name))
            .await?;
        if user_created {
            info!(email = %user.email, "Created user for first-time applicant");
        }

        let grant = ApprovalGrant {
            application_id: application.id,
            kind: application.kind,
            email: user.email.clone(),
            window: TrialWindow::starting_at(now, self.trial_days),
        };

        match self.users.apply_grant(&grant).await? {
            Some(updated) => Ok(AppliedGrant {
                grant: EntitlementGrant::from_user(application, &updated, user_created),
                newly_applied: true,
            }),
            None => {
                let current = self
                    .users
                    .get_by_email(&user.email)
                    .await?
                    .unwrap_or(user);
                Ok(AppliedGrant {
                    grant: EntitlementGrant::from_user(application, &current, user_created),
                    newly_applied: false,
                })
            }
        }
    }

    async fn dispatch_approved(&self, application: &Application, grant: &EntitlementGrant) {
        let ctx = NotificationContext {
            full_name: Some(application.full_name.clone()),
            admin_notes: application.admin_notes.clone(),
            ends_at: grant.ends_at,
        };
        self.dispatcher
            .notify(
                &grant.email,
                TemplateKind::ApplicationApproved(application.kind),
                &ctx,
            )
            .await;
    }

    async fn not_pending(&self, application_id: Uuid) -> AppError {
        match self.applications.get_by_id(application_id).await {
            Ok(Some(application)) => {
                info!(status = %application.status, "Application already processed");
                AppError::AlreadyProcessed
            }
            Ok(None) => AppError::NotFound,
            Err(e) => e,
        }
    }
}

fn clean_notes(notes: Option<&str>) -> Option<&str> {
    notes.map(str::trim).filter(|n| !n.is_empty())
}
