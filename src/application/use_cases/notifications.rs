use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        notification::{NewNotification, Notification},
        user::normalize_email,
    },
};

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> AppResult<Notification>;
    async fn list_for_recipient(&self, recipient_email: &str) -> AppResult<Vec<Notification>>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Notification>>;
    async fn mark_read(&self, id: Uuid) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Recipient-facing inbox. The workflow only appends; recipients read,
/// mark and delete their own notifications.
#[derive(Clone)]
pub struct NotificationUseCases {
    repo: Arc<dyn NotificationRepo>,
}

impl NotificationUseCases {
    pub fn new(repo: Arc<dyn NotificationRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, recipient_email: &str) -> AppResult<Vec<Notification>> {
        self.repo
            .list_for_recipient(&normalize_email(recipient_email))
            .await
    }

    #[instrument(skip(self))]
    pub async fn mark_read(&self, recipient_email: &str, id: Uuid) -> AppResult<()> {
        let notification = self.owned(recipient_email, id).await?;
        if notification.is_read {
            return Ok(());
        }
        self.repo.mark_read(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, recipient_email: &str, id: Uuid) -> AppResult<()> {
        self.owned(recipient_email, id).await?;
        self.repo.delete(id).await
    }

    /// Someone else's notification is reported as missing, not forbidden.
    async fn owned(&self, recipient_email: &str, id: Uuid) -> AppResult<Notification> {
        let notification = self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        if notification.recipient_email != normalize_email(recipient_email) {
            return Err(AppError::NotFound);
        }
        Ok(notification)
    }
}
