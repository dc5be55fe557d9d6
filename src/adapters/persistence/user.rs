use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::{
        subscription::{SubscriptionPlan, SubscriptionStatus, SubscriptionType},
        user::{Role, User, UserType, normalize_email},
    },
    use_cases::user::{ApprovalGrant, TrialWindow, UserRepo},
};

const USER_COLUMNS: &str = "id, email, full_name, role, user_type, is_approved_mentor, \
    mentor_application_id, subscription_status, subscription_type, subscription_plan, \
    subscription_start_date, subscription_end_date, member_since, trial_used_at, \
    created_at, updated_at";

fn row_to_user(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        role: Role::from_stored(row.get::<&str, _>("role")),
        user_type: UserType::from_stored(row.get::<&str, _>("user_type")),
        is_approved_mentor: row.get("is_approved_mentor"),
        mentor_application_id: row.get("mentor_application_id"),
        subscription_status: SubscriptionStatus::from_stored(
            row.get::<&str, _>("subscription_status"),
        ),
        subscription_type: SubscriptionType::from_stored(
            row.get::<Option<&str>, _>("subscription_type"),
        ),
        subscription_plan: SubscriptionPlan::from_stored(
            row.get::<Option<&str>, _>("subscription_plan"),
        ),
        subscription_start_date: row.get("subscription_start_date"),
        subscription_end_date: row.get("subscription_end_date"),
        member_since: row.get("member_since"),
        trial_used_at: row.get("trial_used_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Every user column qualified with `u.`, for statements that join.
fn qualified_user_columns() -> String {
    USER_COLUMNS
        .split(',')
        .map(|c| format!("u.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_or_create(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> AppResult<(User, bool)> {
        let email = normalize_email(email);

        // An existing row is only rewritten to fill a missing name; otherwise
        // the conflict arm writes nothing and returns no row. xmax = 0 only
        // on a freshly inserted row version.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, full_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                updated_at = CURRENT_TIMESTAMP
            WHERE users.full_name IS NULL AND EXCLUDED.full_name IS NOT NULL
            RETURNING {USER_COLUMNS}, (xmax = 0) AS created
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(full_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        if let Some(row) = row {
            return Ok((row_to_user(&row), row.get("created")));
        }

        let existing = self.get_by_email(&email).await?.ok_or(AppError::NotFound)?;
        Ok((existing, false))
    }

    async fn grant_trial(&self, email: &str, window: &TrialWindow) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                subscription_status = 'active',
                subscription_type = $2,
                subscription_plan = $3,
                subscription_start_date = $4,
                subscription_end_date = $5,
                member_since = COALESCE(member_since, $4),
                trial_used_at = COALESCE(trial_used_at, $4),
                updated_at = CURRENT_TIMESTAMP
            WHERE email = $1
              AND trial_used_at IS NULL
              AND subscription_type IS DISTINCT FROM 'trial'
              AND subscription_status <> 'active'
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(normalize_email(email))
        .bind(window.subscription_type.to_string())
        .bind(window.plan.to_string())
        .bind(window.starts_at)
        .bind(window.ends_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn mark_expired(&self, email: &str, now: DateTime<Utc>) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                subscription_status = 'expired',
                updated_at = CURRENT_TIMESTAMP
            WHERE email = $1
              AND subscription_status = 'active'
              AND subscription_end_date <= $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(normalize_email(email))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn apply_grant(&self, grant: &ApprovalGrant) -> AppResult<Option<User>> {
        // Ledger claim and user update commit together; a second claim for
        // the same application inserts nothing and so updates nothing.
        let row = sqlx::query(&format!(
            r#"
            WITH claimed AS (
                INSERT INTO entitlement_grants (
                    application_id, user_id, email, kind,
                    subscription_type, subscription_plan, starts_at, ends_at
                )
                SELECT $1, id, email, $8, $3, $4, $5, $6 FROM users WHERE email = $2
                ON CONFLICT (application_id) DO NOTHING
                RETURNING user_id
            )
            UPDATE users u SET
                subscription_status = 'active',
                subscription_type = $3,
                subscription_plan = $4,
                subscription_start_date = $5,
                subscription_end_date = $6,
                member_since = COALESCE(u.member_since, $5),
                trial_used_at = COALESCE(u.trial_used_at, $5),
                user_type = CASE WHEN $7 THEN 'mentor' ELSE u.user_type END,
                is_approved_mentor = u.is_approved_mentor OR $7,
                mentor_application_id = CASE WHEN $7 THEN $1 ELSE u.mentor_application_id END,
                updated_at = CURRENT_TIMESTAMP
            FROM claimed
            WHERE u.id = claimed.user_id
            RETURNING {}
            "#,
            qualified_user_columns()
        ))
        .bind(grant.application_id)
        .bind(normalize_email(&grant.email))
        .bind(grant.window.subscription_type.to_string())
        .bind(grant.window.plan.to_string())
        .bind(grant.window.starts_at)
        .bind(grant.window.ends_at)
        .bind(grant.grants_mentor())
        .bind(grant.kind.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(Some(row_to_user(&row))),
            None if self.has_grant(grant.application_id).await? => Ok(None),
            None => Err(AppError::NotFound),
        }
    }

    async fn has_grant(&self, application_id: Uuid) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM entitlement_grants WHERE application_id = $1) AS granted",
        )
        .bind(application_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.get("granted"))
    }

    async fn granted_among(&self, application_ids: &[Uuid]) -> AppResult<HashSet<Uuid>> {
        if application_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            "SELECT application_id FROM entitlement_grants WHERE application_id = ANY($1)",
        )
        .bind(application_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows
            .iter()
            .map(|row| row.get::<Uuid, _>("application_id"))
            .collect())
    }
}
