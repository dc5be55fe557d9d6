//! In-memory mock implementation of the notification store.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::notifications::NotificationRepo,
    domain::entities::notification::{NewNotification, Notification},
    test_utils::take_failure,
};

/// In-memory implementation of NotificationRepo for testing.
#[derive(Default)]
pub struct InMemoryNotificationRepo {
    pub notifications: Mutex<Vec<Notification>>,
    fail_next: AtomicUsize,
}

impl InMemoryNotificationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifications(notifications: Vec<Notification>) -> Self {
        Self {
            notifications: Mutex::new(notifications),
            ..Self::default()
        }
    }

    /// The next `n` creates fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn get_all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationRepo for InMemoryNotificationRepo {
    async fn create(&self, notification: &NewNotification) -> AppResult<Notification> {
        if take_failure(&self.fail_next) {
            return Err(AppError::Database("simulated notification failure".into()));
        }
        let created = Notification {
            id: Uuid::new_v4(),
            recipient_email: notification.recipient_email.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
            action_url: notification.action_url.clone(),
            is_read: false,
            created_at: Some(Utc::now()),
        };
        self.notifications.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list_for_recipient(&self, recipient_email: &str) -> AppResult<Vec<Notification>> {
        let mut listed: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_email == recipient_email)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Notification>> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn mark_read(&self, id: Uuid) -> AppResult<()> {
        let mut notifications = self.notifications.lock().unwrap();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(AppError::NotFound)?;
        notification.is_read = true;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut notifications = self.notifications.lock().unwrap();
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        if notifications.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
