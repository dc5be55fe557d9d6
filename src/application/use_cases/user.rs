use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{
        application::ApplicationKind,
        subscription::{SubscriptionPlan, SubscriptionType},
        user::User,
    },
};

/// Plan attached to every trial window, self-serve or admin-granted.
pub const TRIAL_PLAN: SubscriptionPlan = SubscriptionPlan::Premium;

/// A trial entitlement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub subscription_type: SubscriptionType,
    pub plan: SubscriptionPlan,
}

impl TrialWindow {
    pub fn starting_at(now: DateTime<Utc>, trial_days: i64) -> Self {
        Self {
            starts_at: now,
            ends_at: now + Duration::days(trial_days),
            subscription_type: SubscriptionType::Trial,
            plan: TRIAL_PLAN,
        }
    }
}

/// Entitlement grant produced by an approved application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalGrant {
    pub application_id: Uuid,
    pub kind: ApplicationKind,
    pub email: String,
    pub window: TrialWindow,
}

impl ApprovalGrant {
    pub fn grants_mentor(&self) -> bool {
        self.kind == ApplicationKind::Mentor
    }
}

/// User side of the entity store.
///
/// Every mutating method is a conditional write: it re-checks the stored
/// row against its precondition and returns `None` instead of writing when
/// the precondition no longer holds.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Atomic upsert on email. Returns the user and whether it was created.
    async fn find_or_create(&self, email: &str, full_name: Option<&str>)
    -> AppResult<(User, bool)>;

    /// Starts a trial only if the stored user has never held one and is not active.
    async fn grant_trial(&self, email: &str, window: &TrialWindow) -> AppResult<Option<User>>;

    /// Flips `active` to `expired` only if the stored end date is at or before `now`.
    async fn mark_expired(&self, email: &str, now: DateTime<Utc>) -> AppResult<Option<User>>;

    /// Applies an approval grant, claiming `grant.application_id` in the grant
    /// ledger in the same write. Returns `None` if the grant was already applied.
    async fn apply_grant(&self, grant: &ApprovalGrant) -> AppResult<Option<User>>;

    async fn has_grant(&self, application_id: Uuid) -> AppResult<bool>;

    /// The subset of `application_ids` whose grant is in the ledger.
    async fn granted_among(&self, application_ids: &[Uuid]) -> AppResult<HashSet<Uuid>>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}
