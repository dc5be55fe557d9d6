use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    domain::entities::application::{Application, ApplicationKind, ApplicationStatus},
    use_cases::applications::{ApplicationRepo, NewApplication},
};

const APPLICATION_COLUMNS: &str = "id, kind, applicant_email, full_name, motivation, details, \
    status, admin_notes, reviewed_at, created_at, updated_at";

fn row_to_application(row: &PgRow) -> AppResult<Application> {
    let id: Uuid = row.get("id");
    let kind: &str = row.get("kind");
    let status: &str = row.get("status");
    let details: serde_json::Value = row.get("details");

    Ok(Application {
        id,
        kind: kind.parse::<ApplicationKind>().map_err(|_| {
            AppError::Internal(format!("Application {id} has unknown kind '{kind}'"))
        })?,
        applicant_email: row.get("applicant_email"),
        full_name: row.get("full_name"),
        motivation: row.get("motivation"),
        details: parse_json_with_fallback::<BTreeMap<String, String>>(
            &details,
            "details",
            "application",
            &id.to_string(),
        ),
        status: status.parse::<ApplicationStatus>().map_err(|_| {
            AppError::Internal(format!("Application {id} has unknown status '{status}'"))
        })?,
        admin_notes: row.get("admin_notes"),
        reviewed_at: row.get("reviewed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn rows_to_applications(rows: &[PgRow]) -> AppResult<Vec<Application>> {
    rows.iter().map(row_to_application).collect()
}

#[async_trait]
impl ApplicationRepo for PostgresPersistence {
    async fn upsert_pending(&self, application: &NewApplication) -> AppResult<Application> {
        let details = serde_json::to_value(&application.details)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO applications (id, kind, applicant_email, full_name, motivation, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (applicant_email, kind) WHERE status = 'pending' DO UPDATE SET
                full_name = EXCLUDED.full_name,
                motivation = EXCLUDED.motivation,
                details = EXCLUDED.details,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(application.kind.to_string())
        .bind(&application.applicant_email)
        .bind(&application.full_name)
        .bind(&application.motivation)
        .bind(details)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row_to_application(&row)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Application>> {
        let row = sqlx::query(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_application).transpose()
    }

    async fn list(
        &self,
        kind: Option<ApplicationKind>,
        status: Option<ApplicationStatus>,
    ) -> AppResult<Vec<Application>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS} FROM applications
            WHERE ($1::text IS NULL OR kind = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(kind.map(|k| k.to_string()))
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows_to_applications(&rows)
    }

    async fn list_by_applicant(&self, applicant_email: &str) -> AppResult<Vec<Application>> {
        let rows = sqlx::query(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE applicant_email = $1 ORDER BY created_at DESC"
        ))
        .bind(applicant_email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows_to_applications(&rows)
    }

    async fn transition(
        &self,
        id: Uuid,
        to: ApplicationStatus,
        admin_notes: Option<&str>,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<Option<Application>> {
        // The status predicate makes this the single linearization point.
        let row = sqlx::query(&format!(
            r#"
            UPDATE applications SET
                status = $2,
                admin_notes = $3,
                reviewed_at = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'pending'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.to_string())
        .bind(admin_notes)
        .bind(reviewed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_application).transpose()
    }
}
