//! Entitlement classification.
//!
//! `classify` is the single place where a stored user record is turned into
//! an access decision. It is pure: the same record and instant always give
//! the same answer, and it never touches storage. Callers must run it before
//! trusting a stored `subscription_status`, because an `active` record whose
//! end date has passed is only corrected lazily.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{
    subscription::{SubscriptionStatus, SubscriptionType},
    user::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entitlement {
    /// Never produced by `classify`; used when reconciliation cannot decide.
    NoAccess,
    Trial,
    ActivePaid,
    /// Stored as active but the window has closed. The record must be
    /// corrected to `expired` and classified again.
    Expired,
    /// Not active (or unreadable). Whether a trial is actually granted is up
    /// to the trial eligibility rule.
    NeedsTrial,
}

pub fn classify(user: &User, now: DateTime<Utc>) -> Entitlement {
    if user.subscription_status != SubscriptionStatus::Active {
        return Entitlement::NeedsTrial;
    }

    // A null end date means indefinite while active.
    let Some(end) = user.subscription_end_date else {
        return Entitlement::ActivePaid;
    };

    // End before start fails toward re-provisioning.
    if user.subscription_start_date.is_some_and(|start| end < start) {
        return Entitlement::NeedsTrial;
    }

    if end <= now {
        Entitlement::Expired
    } else if user.subscription_type == Some(SubscriptionType::Trial) {
        Entitlement::Trial
    } else {
        Entitlement::ActivePaid
    }
}
