//! Test app state builder for HTTP-level integration testing.
//!
//! `TestAppStateBuilder` creates an `AppState` wired to in-memory mocks and
//! hands the mocks back so tests can assert on stored state.

use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use time::OffsetDateTime;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::Claims,
        use_cases::{
            applications::ApplicationUseCases,
            approval::{ApprovalWorkflow, DEFAULT_GRANT_ATTEMPTS},
            dispatcher::SideEffectDispatcher,
            notifications::NotificationUseCases,
            session::SessionReconciler,
            trial::{DEFAULT_TRIAL_DAYS, TrialProvisioner},
        },
    },
    domain::entities::{
        application::Application,
        user::{User, normalize_email},
    },
    infra::config::AppConfig,
    test_utils::{
        InMemoryApplicationRepo, InMemoryEmailSender, InMemoryNotificationRepo, InMemoryUserRepo,
    },
};

pub const TEST_JWT_SECRET: &str = "test_jwt_secret";
pub const TEST_APP_ORIGIN: &str = "http://localhost:3000";

/// Handles to the mocks behind a built `AppState`.
pub struct TestMocks {
    pub users: Arc<InMemoryUserRepo>,
    pub applications: Arc<InMemoryApplicationRepo>,
    pub notifications: Arc<InMemoryNotificationRepo>,
    pub email: Arc<InMemoryEmailSender>,
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let admin = create_test_user(|u| u.role = Role::Admin);
/// let (app_state, mocks) = TestAppStateBuilder::new()
///     .with_user(admin)
///     .with_application(create_test_application(|_| {}))
///     .build_with_mocks();
/// ```
pub struct TestAppStateBuilder {
    users: Vec<User>,
    applications: Vec<Application>,
    trial_days: i64,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            applications: vec![],
            trial_days: DEFAULT_TRIAL_DAYS,
        }
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        self.applications.push(application);
        self
    }

    pub fn build(self) -> AppState {
        self.build_with_mocks().0
    }

    pub fn build_with_mocks(self) -> (AppState, TestMocks) {
        let users = Arc::new(InMemoryUserRepo::with_users(self.users));
        let applications = Arc::new(InMemoryApplicationRepo::with_applications(
            self.applications,
        ));
        let notifications = Arc::new(InMemoryNotificationRepo::new());
        let email = Arc::new(InMemoryEmailSender::new());

        let dispatcher = SideEffectDispatcher::new(
            notifications.clone(),
            email.clone(),
            TEST_APP_ORIGIN.to_string(),
        );
        let provisioner = TrialProvisioner::new(users.clone(), self.trial_days);

        let config = Arc::new(AppConfig {
            database_url: String::new(),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
            app_origin: Url::parse(TEST_APP_ORIGIN).unwrap(),
            cors_origin: HeaderValue::from_static(TEST_APP_ORIGIN),
            resend_api_key: SecretString::new("test_resend_key".into()),
            email_from: "Community <hello@community.test>".to_string(),
            trial_days: self.trial_days,
            grant_retry_attempts: DEFAULT_GRANT_ATTEMPTS,
            log_file: "app.log".to_string(),
        });

        let app_state = AppState {
            config,
            session_reconciler: Arc::new(SessionReconciler::new(
                users.clone(),
                provisioner,
                dispatcher.clone(),
            )),
            application_use_cases: Arc::new(ApplicationUseCases::new(applications.clone())),
            approval_workflow: Arc::new(ApprovalWorkflow::new(
                applications.clone(),
                users.clone(),
                dispatcher,
                self.trial_days,
                DEFAULT_GRANT_ATTEMPTS,
            )),
            notification_use_cases: Arc::new(NotificationUseCases::new(notifications.clone())),
            user_repo: users.clone(),
        };

        let mocks = TestMocks {
            users,
            applications,
            notifications,
            email,
        };
        (app_state, mocks)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Signs a session token the way the auth service does.
pub fn issue_test_token(email: &str, secret: &SecretString, ttl: time::Duration) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: normalize_email(email),
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .expect("Failed to issue test token")
}

/// `Authorization` header value for a session as `email`.
pub fn bearer_for(email: &str) -> String {
    let token = issue_test_token(
        email,
        &SecretString::new(TEST_JWT_SECRET.into()),
        time::Duration::hours(1),
    );
    format!("Bearer {}", token)
}
