use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::subscription::{SubscriptionPlan, SubscriptionStatus, SubscriptionType};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UserType {
    #[default]
    Member,
    Mentor,
    Instructor,
    Admin,
}

impl UserType {
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Identity aggregate. `email` is the identity key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub user_type: UserType,
    pub is_approved_mentor: bool,
    pub mentor_application_id: Option<Uuid>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_type: Option<SubscriptionType>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    /// First-ever activation. Never overwritten once set.
    pub member_since: Option<DateTime<Utc>>,
    /// Set the first time the identity holds a trial. Never cleared.
    pub trial_used_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this identity has ever held a trial.
    pub fn has_used_trial(&self) -> bool {
        self.trial_used_at.is_some() || self.subscription_type == Some(SubscriptionType::Trial)
    }
}

/// Normalizes an email for use as the identity key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
