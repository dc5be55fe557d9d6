//! In-memory mock implementations for the user store and email sink.
//!
//! Conditional writes are evaluated under a single lock so concurrent tests
//! see the same all-or-nothing behavior as the Postgres statements.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::user::{ApprovalGrant, EmailSender, TrialWindow, UserRepo},
    domain::entities::{
        subscription::{SubscriptionStatus, SubscriptionType},
        user::{Role, User, UserType, normalize_email},
    },
    test_utils::take_failure,
};

// ============================================================================
// InMemoryUserRepo
// ============================================================================

#[derive(Default)]
struct UserStore {
    users: HashMap<String, User>,
    /// Mirrors the entitlement_grants ledger.
    grants: HashMap<Uuid, ApprovalGrant>,
    trial_grants: HashMap<String, usize>,
}

/// In-memory implementation of UserRepo for testing.
#[derive(Default)]
pub struct InMemoryUserRepo {
    store: Mutex<UserStore>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_next_writes: AtomicUsize,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let repo = Self::default();
        {
            let mut store = repo.store.lock().unwrap();
            for user in users {
                store.users.insert(normalize_email(&user.email), user);
            }
        }
        repo
    }

    pub fn get_all(&self) -> Vec<User> {
        self.store.lock().unwrap().users.values().cloned().collect()
    }

    /// Every mutating call fails with a database error while set. Reads still work.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The next `n` mutating calls fail with a database error.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Number of writes that actually changed a row.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn trial_grant_count(&self, email: &str) -> usize {
        self.store
            .lock()
            .unwrap()
            .trial_grants
            .get(&normalize_email(email))
            .copied()
            .unwrap_or(0)
    }

    pub fn grant_count(&self, application_id: Uuid) -> usize {
        usize::from(self.store.lock().unwrap().grants.contains_key(&application_id))
    }

    /// The ledger row written for `application_id`, if its grant landed.
    pub fn ledger_entry(&self, application_id: Uuid) -> Option<ApprovalGrant> {
        self.store
            .lock()
            .unwrap()
            .grants
            .get(&application_id)
            .cloned()
    }

    fn check_write(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) || take_failure(&self.fail_next_writes) {
            return Err(AppError::Database("simulated write failure".into()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn start_window(user: &mut User, window: &TrialWindow) {
    user.subscription_status = SubscriptionStatus::Active;
    user.subscription_type = Some(window.subscription_type);
    user.subscription_plan = Some(window.plan);
    user.subscription_start_date = Some(window.starts_at);
    user.subscription_end_date = Some(window.ends_at);
    user.member_since = user.member_since.or(Some(window.starts_at));
    user.trial_used_at = user.trial_used_at.or(Some(window.starts_at));
    user.updated_at = Some(window.starts_at);
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .users
            .get(&normalize_email(email))
            .cloned())
    }

    async fn find_or_create(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> AppResult<(User, bool)> {
        self.check_write()?;
        let email = normalize_email(email);
        let mut store = self.store.lock().unwrap();

        if let Some(existing) = store.users.get_mut(&email) {
            if existing.full_name.is_none()
                && let Some(name) = full_name
            {
                existing.full_name = Some(name.to_string());
                let filled = existing.clone();
                self.record_write();
                return Ok((filled, false));
            }
            return Ok((existing.clone(), false));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            full_name: full_name.map(str::to_string),
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
            created_at: Some(now),
            updated_at: Some(now),
        };
        store.users.insert(email, user.clone());
        self.record_write();
        Ok((user, true))
    }

    async fn grant_trial(&self, email: &str, window: &TrialWindow) -> AppResult<Option<User>> {
        self.check_write()?;
        let email = normalize_email(email);
        let mut store = self.store.lock().unwrap();

        let Some(user) = store.users.get_mut(&email) else {
            return Ok(None);
        };
        let eligible = user.trial_used_at.is_none()
            && user.subscription_type != Some(SubscriptionType::Trial)
            && user.subscription_status != SubscriptionStatus::Active;
        if !eligible {
            return Ok(None);
        }

        start_window(user, window);
        let granted = user.clone();
        *store.trial_grants.entry(email).or_default() += 1;
        self.record_write();
        Ok(Some(granted))
    }

    async fn mark_expired(&self, email: &str, now: DateTime<Utc>) -> AppResult<Option<User>> {
        self.check_write()?;
        let mut store = self.store.lock().unwrap();

        let Some(user) = store.users.get_mut(&normalize_email(email)) else {
            return Ok(None);
        };
        let stale = user.subscription_status == SubscriptionStatus::Active
            && user.subscription_end_date.is_some_and(|end| end <= now);
        if !stale {
            return Ok(None);
        }

        user.subscription_status = SubscriptionStatus::Expired;
        user.updated_at = Some(now);
        let corrected = user.clone();
        self.record_write();
        Ok(Some(corrected))
    }

    async fn apply_grant(&self, grant: &ApprovalGrant) -> AppResult<Option<User>> {
        self.check_write()?;
        let email = normalize_email(&grant.email);
        let mut store = self.store.lock().unwrap();

        if store.grants.contains_key(&grant.application_id) {
            return Ok(None);
        }
        let Some(user) = store.users.get_mut(&email) else {
            return Err(AppError::NotFound);
        };

        start_window(user, &grant.window);
        if grant.grants_mentor() {
            user.user_type = UserType::Mentor;
            user.is_approved_mentor = true;
            user.mentor_application_id = Some(grant.application_id);
        }
        let updated = user.clone();
        store.grants.insert(
            grant.application_id,
            ApprovalGrant {
                email,
                ..grant.clone()
            },
        );
        self.record_write();
        Ok(Some(updated))
    }

    async fn has_grant(&self, application_id: Uuid) -> AppResult<bool> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .grants
            .contains_key(&application_id))
    }

    async fn granted_among(&self, application_ids: &[Uuid]) -> AppResult<HashSet<Uuid>> {
        let store = self.store.lock().unwrap();
        Ok(application_ids
            .iter()
            .filter(|id| store.grants.contains_key(id))
            .copied()
            .collect())
    }
}

// ============================================================================
// InMemoryEmailSender
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Records sent emails instead of calling the provider.
#[derive(Default)]
pub struct InMemoryEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` sends fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Every call to `send`, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_next) {
            return Err(AppError::Internal("simulated email failure".into()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, test_datetime};

    #[tokio::test]
    async fn test_grant_trial_is_conditional() {
        let now = test_datetime();
        let repo = InMemoryUserRepo::with_users(vec![create_test_user(|_| {})]);
        let window = TrialWindow::starting_at(now, 30);

        assert!(repo.grant_trial("user@example.com", &window).await.unwrap().is_some());
        assert!(repo.grant_trial("user@example.com", &window).await.unwrap().is_none());
        assert_eq!(repo.trial_grant_count("user@example.com"), 1);
    }

    #[tokio::test]
    async fn test_fail_next_writes_recovers() {
        let repo = InMemoryUserRepo::new();
        repo.fail_next_writes(1);

        assert!(repo.find_or_create("a@example.com", None).await.is_err());
        let (user, created) = repo.find_or_create("a@example.com", None).await.unwrap();
        assert!(created);
        assert_eq!(user.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_find_or_create_existing_user_is_read_only() {
        let repo = InMemoryUserRepo::with_users(vec![create_test_user(|u| {
            u.email = "named@example.com".to_string();
            u.full_name = Some("Named".to_string());
        })]);

        let (user, created) = repo
            .find_or_create("Named@Example.com", Some("Other Name"))
            .await
            .unwrap();

        assert!(!created);
        assert_eq!(user.full_name.as_deref(), Some("Named"));
        assert_eq!(repo.write_count(), 0);

        repo.find_or_create("named@example.com", None).await.unwrap();
        assert_eq!(repo.write_count(), 0);
    }

    #[tokio::test]
    async fn test_find_or_create_fills_missing_name_once() {
        let repo = InMemoryUserRepo::with_users(vec![create_test_user(|u| {
            u.email = "anon@example.com".to_string();
            u.full_name = None;
        })]);

        let (user, _) = repo
            .find_or_create("anon@example.com", Some("Anon"))
            .await
            .unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Anon"));
        assert_eq!(repo.write_count(), 1);

        repo.find_or_create("anon@example.com", Some("Anon"))
            .await
            .unwrap();
        assert_eq!(repo.write_count(), 1);
    }
}
