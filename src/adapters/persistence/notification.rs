use async_trait::async_trait;
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::notification::{NewNotification, Notification, NotificationType},
    use_cases::notifications::NotificationRepo,
};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_email, title, message, type, action_url, is_read, created_at";

fn row_to_notification(row: &PgRow) -> Notification {
    Notification {
        id: row.get("id"),
        recipient_email: row.get("recipient_email"),
        title: row.get("title"),
        message: row.get("message"),
        kind: row
            .get::<&str, _>("type")
            .parse::<NotificationType>()
            .unwrap_or_default(),
        action_url: row.get("action_url"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl NotificationRepo for PostgresPersistence {
    async fn create(&self, notification: &NewNotification) -> AppResult<Notification> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO notifications (id, recipient_email, title, message, type, action_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&notification.recipient_email)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.to_string())
        .bind(&notification.action_url)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_notification(&row))
    }

    async fn list_for_recipient(&self, recipient_email: &str) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient_email = $1 ORDER BY created_at DESC"
        ))
        .bind(recipient_email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_notification).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_notification))
    }

    async fn mark_read(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
