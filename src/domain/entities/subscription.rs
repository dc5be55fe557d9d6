use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Stored subscription status of a user record.
///
/// `Active` is only trustworthy after the end date has been checked against
/// the clock; see `application::entitlement::classify`.
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
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Expired,
}

impl SubscriptionStatus {
    /// Lenient decode for values read back from storage.
    /// Anything unrecognised is treated as `Inactive` so it never grants access.
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionType {
    Trial,
    Monthly,
    Annual,
}

impl SubscriptionType {
    pub fn from_stored(s: Option<&str>) -> Option<Self> {
        s.and_then(|v| v.parse().ok())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionPlan {
    Basic,
    Premium,
}

impl SubscriptionPlan {
    pub fn from_stored(s: Option<&str>) -> Option<Self> {
        s.and_then(|v| v.parse().ok())
    }
}
