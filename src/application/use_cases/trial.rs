use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        entitlement::{Entitlement, classify},
        use_cases::user::{TrialWindow, UserRepo},
    },
    domain::entities::{subscription::SubscriptionStatus, user::User},
};

pub const DEFAULT_TRIAL_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub enum Provisioning {
    /// A first-ever trial was written.
    Granted(User),
    /// A stale `active` record was flipped to `expired`; nothing was granted.
    Corrected(User),
    NoOp,
}

/// A user may hold at most one trial over the lifetime of its identity.
pub fn is_trial_eligible(user: &User) -> bool {
    !user.has_used_trial() && user.subscription_status != SubscriptionStatus::Active
}

#[derive(Clone)]
pub struct TrialProvisioner {
    user_repo: Arc<dyn UserRepo>,
    trial_days: i64,
}

impl TrialProvisioner {
    pub fn new(user_repo: Arc<dyn UserRepo>, trial_days: i64) -> Self {
        Self {
            user_repo,
            trial_days,
        }
    }

    /// Grants the identity its one trial, or corrects a stale `active` status.
    ///
    /// Safe to call any number of times from any number of sessions: both
    /// writes are conditional on the stored row, so a lost race is a `NoOp`.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn provision_if_needed(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> AppResult<Provisioning> {
        let mut corrected = None;

        if classify(user, now) == Entitlement::Expired {
            match self.user_repo.mark_expired(&user.email, now).await? {
                Some(updated) => {
                    info!(
                        subscription_type = ?updated.subscription_type,
                        "Corrected stale subscription status to expired"
                    );
                    corrected = Some(updated);
                }
                None => {
                    debug!("Expiry already corrected by a concurrent session");
                    corrected = Some(self.reload(&user.email).await?);
                }
            }
        }

        let current = corrected.as_ref().unwrap_or(user);

        if classify(current, now) != Entitlement::NeedsTrial || !is_trial_eligible(current) {
            return Ok(match corrected {
                Some(updated) => Provisioning::Corrected(updated),
                None => Provisioning::NoOp,
            });
        }

        let window = TrialWindow::starting_at(now, self.trial_days);
        match self.user_repo.grant_trial(&current.email, &window).await? {
            Some(granted) => {
                info!(ends_at = %window.ends_at, "Granted first trial");
                Ok(Provisioning::Granted(granted))
            }
            None => {
                debug!("Trial grant skipped, stored user no longer eligible");
                Ok(match corrected {
                    Some(updated) => Provisioning::Corrected(updated),
                    None => Provisioning::NoOp,
                })
            }
        }
    }

    async fn reload(&self, email: &str) -> AppResult<User> {
        self.user_repo
            .get_by_email(email)
            .await?
            .ok_or(AppError::NotFound)
    }
}
