//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    application::{Application, ApplicationKind, ApplicationStatus},
    subscription::SubscriptionStatus,
    user::{Role, User, UserType},
};

/// Create a test user that has never been provisioned.
pub fn create_test_user(overrides: impl FnOnce(&mut User)) -> User {
    let mut user = User {
        id: Uuid::new_v4(),
        email: "user@example.com".to_string(),
        full_name: Some("Test User".to_string()),
        role: Role::Member,
        user_type: UserType::Member,
        is_approved_mentor: false,
        mentor_application_id: None,
        subscription_status: SubscriptionStatus::Inactive,
        subscription_type: None,
        subscription_plan: None,
        subscription_start_date: None,
        subscription_end_date: None,
        member_since: None,
        trial_used_at: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut user);
    user
}

/// Create a pending member application.
pub fn create_test_application(overrides: impl FnOnce(&mut Application)) -> Application {
    let mut details = BTreeMap::new();
    details.insert("linkedin".to_string(), "https://example.com/in/applicant".to_string());

    let mut application = Application {
        id: Uuid::new_v4(),
        kind: ApplicationKind::Member,
        applicant_email: "applicant@example.com".to_string(),
        full_name: "Test Applicant".to_string(),
        motivation: "I would like to join the community".to_string(),
        details,
        status: ApplicationStatus::Pending,
        admin_notes: None,
        reviewed_at: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut application);
    application
}

/// Fixed instant used as "now" across tests.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_with_defaults() {
        let user = create_test_user(|_| {});
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.subscription_status, SubscriptionStatus::Inactive);
        assert!(!user.has_used_trial());
    }

    #[test]
    fn test_create_application_with_overrides() {
        let application = create_test_application(|a| {
            a.kind = ApplicationKind::Mentor;
            a.status = ApplicationStatus::Rejected;
        });
        assert_eq!(application.kind, ApplicationKind::Mentor);
        assert_eq!(application.status, ApplicationStatus::Rejected);
        assert_eq!(application.applicant_email, "applicant@example.com");
    }
}
