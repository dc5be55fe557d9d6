use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::validators::{
        MAX_DETAIL_FIELDS, MAX_NAME_LEN, MAX_TEXT_LEN, is_valid_detail_key, is_valid_email,
        is_valid_text,
    },
    domain::entities::{
        application::{Application, ApplicationKind, ApplicationStatus},
        user::normalize_email,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub kind: ApplicationKind,
    pub applicant_email: String,
    pub full_name: String,
    pub motivation: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationInput {
    pub full_name: String,
    pub motivation: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

/// Application side of the entity store.
#[async_trait]
pub trait ApplicationRepo: Send + Sync {
    /// Inserts a pending application, or replaces the fields of the one
    /// already pending for `(applicant_email, kind)`. Never creates a second
    /// pending row for the same pair.
    async fn upsert_pending(&self, application: &NewApplication) -> AppResult<Application>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Application>>;

    async fn list(
        &self,
        kind: Option<ApplicationKind>,
        status: Option<ApplicationStatus>,
    ) -> AppResult<Vec<Application>>;

    async fn list_by_applicant(&self, applicant_email: &str) -> AppResult<Vec<Application>>;

    /// Moves a pending application to `to`. Returns `None` without writing if
    /// the stored status is no longer pending.
    async fn transition(
        &self,
        id: Uuid,
        to: ApplicationStatus,
        admin_notes: Option<&str>,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Option<Application>>;
}

#[derive(Clone)]
pub struct ApplicationUseCases {
    repo: Arc<dyn ApplicationRepo>,
}

impl ApplicationUseCases {
    pub fn new(repo: Arc<dyn ApplicationRepo>) -> Self {
        Self { repo }
    }

    /// Submits an application. Resubmitting while one is pending replaces it.
    #[instrument(skip(self, input))]
    pub async fn submit(
        &self,
        applicant_email: &str,
        kind: ApplicationKind,
        input: SubmitApplicationInput,
    ) -> AppResult<Application> {
        if !is_valid_email(applicant_email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        if !is_valid_text(&input.full_name, MAX_NAME_LEN) {
            return Err(AppError::InvalidInput(format!(
                "Full name is required (max {} characters)",
                MAX_NAME_LEN
            )));
        }
        if !is_valid_text(&input.motivation, MAX_TEXT_LEN) {
            return Err(AppError::InvalidInput(format!(
                "Motivation is required (max {} characters)",
                MAX_TEXT_LEN
            )));
        }
        if input.details.len() > MAX_DETAIL_FIELDS {
            return Err(AppError::InvalidInput("Too many detail fields".into()));
        }
        for (key, value) in &input.details {
            if !is_valid_detail_key(key) {
                return Err(AppError::InvalidInput(format!("Invalid detail field '{}'", key)));
            }
            if value.chars().count() > MAX_TEXT_LEN {
                return Err(AppError::InvalidInput(format!("Detail field '{}' is too long", key)));
            }
        }

        let application = NewApplication {
            kind,
            applicant_email: normalize_email(applicant_email),
            full_name: input.full_name.trim().to_string(),
            motivation: input.motivation.trim().to_string(),
            details: input
                .details
                .into_iter()
                .map(|(k, v)| (k, v.trim().to_string()))
                .collect(),
        };

        let stored = self.repo.upsert_pending(&application).await?;
        info!(application_id = %stored.id, kind = %kind, "Application submitted");
        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        kind: Option<ApplicationKind>,
        status: Option<ApplicationStatus>,
    ) -> AppResult<Vec<Application>> {
        self.repo.list(kind, status).await
    }

    #[instrument(skip(self))]
    pub async fn list_for_applicant(&self, applicant_email: &str) -> AppResult<Vec<Application>> {
        self.repo
            .list_by_applicant(&normalize_email(applicant_email))
            .await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Application> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }
}
