//! PostgreSQL implementation of GrantRepository and UsageLedger.
//!
//! Counter writes are single guarded `UPDATE` statements: the `WHERE` clause
//! carries the capacity and liveness checks, and `rows_affected() == 1` is
//! the success signal. Scheduler jobs additionally take a transaction-scoped
//! advisory lock keyed by job name, so each job type is serialized across
//! instances while different job types still run side by side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::domain::catalog::{PlanKind, Price};
use crate::domain::foundation::{
    DomainError, ErrorCode, GrantId, PlanId, Timestamp, UserId,
};
use crate::domain::grant::{Grant, GrantStatus, GrantUsage, PackageUsage, SubscriptionUsage};
use crate::domain::lifecycle::{ResetBoundary, UsageWindow};
use crate::ports::{ActivationOutcome, GrantRepository, ResetOutcome, UsageLedger};

/// Grant persistence and atomic counter operations backed by PostgreSQL.
pub struct PostgresGrantStore {
    pool: PgPool,
}

impl PostgresGrantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))
    }
}

const SELECT_GRANT: &str = r#"
    SELECT id, user_id, plan_id, kind, price_cents, currency, status, duration_days,
           weekly_limit, weekly_used, monthly_limit, monthly_used,
           total_credits, used_credits,
           started_at, expired_at, external_payment_ref, created_at, updated_at
    FROM grants
"#;

const EXTERNAL_REF_CONSTRAINT: &str = "grants_external_payment_ref_key";
const ONE_ACTIVE_SUBSCRIPTION_INDEX: &str = "grants_one_active_subscription_idx";

/// Database row representation of a grant.
#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    id: Uuid,
    user_id: String,
    plan_id: Uuid,
    kind: String,
    price_cents: i64,
    currency: String,
    status: String,
    duration_days: i32,
    weekly_limit: Option<i32>,
    weekly_used: Option<i32>,
    monthly_limit: Option<i32>,
    monthly_used: Option<i32>,
    total_credits: Option<i32>,
    used_credits: Option<i32>,
    started_at: Option<DateTime<Utc>>,
    expired_at: Option<DateTime<Utc>>,
    external_payment_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GrantRow> for Grant {
    type Error = DomainError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        let kind = PlanKind::parse(&row.kind).ok_or_else(|| corrupt("kind", &row.kind))?;
        let status = parse_status(&row.status)?;

        let usage = match kind {
            PlanKind::Subscription => GrantUsage::Subscription(
                SubscriptionUsage::restore(
                    counter("weekly_limit", row.weekly_limit)?,
                    counter("weekly_used", row.weekly_used)?,
                    counter("monthly_limit", row.monthly_limit)?,
                    counter("monthly_used", row.monthly_used)?,
                )
                .map_err(|e| corrupt("subscription counters", e))?,
            ),
            PlanKind::Package => GrantUsage::Package(
                PackageUsage::restore(
                    counter("total_credits", row.total_credits)?,
                    counter("used_credits", row.used_credits)?,
                )
                .map_err(|e| corrupt("package counters", e))?,
            ),
        };

        Ok(Grant {
            id: GrantId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            plan_id: PlanId::from_uuid(row.plan_id),
            price: Price::new(row.price_cents, &row.currency).map_err(|e| corrupt("price", e))?,
            status,
            usage,
            duration_days: u32::try_from(row.duration_days)
                .map_err(|_| corrupt("duration_days", row.duration_days))?,
            started_at: row.started_at.map(Timestamp::from_datetime),
            expired_at: row.expired_at.map(Timestamp::from_datetime),
            external_payment_ref: row.external_payment_ref,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn corrupt(field: &str, value: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value in grants row: {}", field, value),
    )
}

fn counter(field: &str, value: Option<i32>) -> Result<u32, DomainError> {
    let value = value.ok_or_else(|| corrupt(field, "NULL"))?;
    u32::try_from(value).map_err(|_| corrupt(field, value))
}

fn parse_status(s: &str) -> Result<GrantStatus, DomainError> {
    GrantStatus::parse(s).ok_or_else(|| corrupt("status", s))
}

fn to_db(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Usage columns in table order: weekly limit/used, monthly limit/used,
/// total/used credits.
fn usage_columns(usage: &GrantUsage) -> [Option<i32>; 6] {
    match usage {
        GrantUsage::Subscription(u) => [
            Some(to_db(u.weekly_limit())),
            Some(to_db(u.weekly_used())),
            Some(to_db(u.monthly_limit())),
            Some(to_db(u.monthly_used())),
            None,
            None,
        ],
        GrantUsage::Package(u) => [
            None,
            None,
            None,
            None,
            Some(to_db(u.total_credits())),
            Some(to_db(u.used_credits())),
        ],
    }
}

fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

async fn advisory_lock(tx: &mut Transaction<'_, Postgres>, key: &str) -> Result<(), DomainError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to acquire advisory lock", e))?;
    Ok(())
}

#[async_trait]
impl GrantRepository for PostgresGrantStore {
    async fn save(&self, grant: &Grant) -> Result<(), DomainError> {
        let [weekly_limit, weekly_used, monthly_limit, monthly_used, total_credits, used_credits] =
            usage_columns(&grant.usage);

        sqlx::query(
            r#"
            INSERT INTO grants (
                id, user_id, plan_id, kind, price_cents, currency, status, duration_days,
                weekly_limit, weekly_used, monthly_limit, monthly_used,
                total_credits, used_credits,
                started_at, expired_at, external_payment_ref, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(grant.id.as_uuid())
        .bind(grant.user_id.as_str())
        .bind(grant.plan_id.as_uuid())
        .bind(grant.kind().as_str())
        .bind(grant.price.amount_cents())
        .bind(grant.price.currency())
        .bind(grant.status.as_str())
        .bind(to_db(grant.duration_days))
        .bind(weekly_limit)
        .bind(weekly_used)
        .bind(monthly_limit)
        .bind(monthly_used)
        .bind(total_credits)
        .bind(used_credits)
        .bind(grant.started_at.map(|t| *t.as_datetime()))
        .bind(grant.expired_at.map(|t| *t.as_datetime()))
        .bind(&grant.external_payment_ref)
        .bind(grant.created_at.as_datetime())
        .bind(grant.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, EXTERNAL_REF_CONSTRAINT) {
                return DomainError::new(
                    ErrorCode::DuplicatePaymentReference,
                    "Payment reference is already attached to a grant",
                )
                .with_detail(
                    "external_payment_ref",
                    grant.external_payment_ref.clone().unwrap_or_default(),
                );
            }
            DomainError::database("Failed to save grant", e)
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &GrantId) -> Result<Option<Grant>, DomainError> {
        let row: Option<GrantRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_GRANT))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find grant", e))?;

        row.map(Grant::try_from).transpose()
    }

    async fn find_by_external_payment_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Grant>, DomainError> {
        let row: Option<GrantRow> =
            sqlx::query_as(&format!("{} WHERE external_payment_ref = $1", SELECT_GRANT))
                .bind(external_ref)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to find grant by payment reference", e))?;

        row.map(Grant::try_from).transpose()
    }

    async fn active_subscription_for(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<Option<Grant>, DomainError> {
        let row: Option<GrantRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE user_id = $1
              AND kind = 'subscription'
              AND status = 'active'
              AND (expired_at IS NULL OR expired_at > $2)
            ORDER BY created_at ASC
            LIMIT 1"#,
            SELECT_GRANT
        ))
        .bind(user_id.as_str())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find active subscription", e))?;

        row.map(Grant::try_from).transpose()
    }

    async fn active_packages_for(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<Vec<Grant>, DomainError> {
        let rows: Vec<GrantRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE user_id = $1
              AND kind = 'package'
              AND status = 'active'
              AND (expired_at IS NULL OR expired_at > $2)
            ORDER BY created_at ASC, id ASC"#,
            SELECT_GRANT
        ))
        .bind(user_id.as_str())
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find active packages", e))?;

        rows.into_iter().map(Grant::try_from).collect()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Grant>, DomainError> {
        let rows: Vec<GrantRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
            SELECT_GRANT
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list grants", e))?;

        rows.into_iter().map(Grant::try_from).collect()
    }

    async fn activate(&self, grant: &Grant) -> Result<ActivationOutcome, DomainError> {
        let mut tx = self.begin().await?;
        advisory_lock(&mut tx, &format!("activate:{}", grant.user_id)).await?;

        let superseded: Vec<Uuid> = if grant.kind() == PlanKind::Subscription {
            sqlx::query_scalar(
                r#"
                UPDATE grants SET status = 'cancelled', updated_at = $3
                WHERE user_id = $1 AND kind = 'subscription' AND status = 'active' AND id <> $2
                RETURNING id
                "#,
            )
            .bind(grant.user_id.as_str())
            .bind(grant.id.as_uuid())
            .bind(grant.updated_at.as_datetime())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to supersede subscriptions", e))?
        } else {
            Vec::new()
        };

        let result = sqlx::query(
            r#"
            UPDATE grants SET status = 'active', started_at = $2, expired_at = $3, updated_at = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(grant.id.as_uuid())
        .bind(grant.started_at.map(|t| *t.as_datetime()))
        .bind(grant.expired_at.map(|t| *t.as_datetime()))
        .bind(grant.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if violates(&e, ONE_ACTIVE_SUBSCRIPTION_INDEX) {
                return DomainError::new(
                    ErrorCode::ConcurrencyConflict,
                    "Another subscription was activated concurrently",
                );
            }
            DomainError::database("Failed to activate grant", e)
        })?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back any superseding.
            return Ok(ActivationOutcome::default());
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit activation", e))?;

        Ok(ActivationOutcome {
            activated: true,
            superseded: superseded.into_iter().map(GrantId::from_uuid).collect(),
        })
    }

    async fn mark_status(
        &self,
        id: &GrantId,
        from: &[GrantStatus],
        to: GrantStatus,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let result = sqlx::query(
            "UPDATE grants SET status = $2, updated_at = $3 WHERE id = $1 AND status = ANY($4)",
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .bind(at.as_datetime())
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update grant status", e))?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UsageLedger for PostgresGrantStore {
    async fn try_debit(
        &self,
        grant_id: &GrantId,
        kind: PlanKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let sql = match kind {
            PlanKind::Subscription => {
                r#"
                UPDATE grants
                SET weekly_used = weekly_used + 1, monthly_used = monthly_used + 1, updated_at = $2
                WHERE id = $1
                  AND kind = 'subscription'
                  AND status = 'active'
                  AND (expired_at IS NULL OR expired_at > $2)
                  AND weekly_used < weekly_limit
                  AND monthly_used < monthly_limit
                "#
            }
            PlanKind::Package => {
                r#"
                UPDATE grants
                SET used_credits = used_credits + 1, updated_at = $2
                WHERE id = $1
                  AND kind = 'package'
                  AND status = 'active'
                  AND (expired_at IS NULL OR expired_at > $2)
                  AND used_credits < total_credits
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(grant_id.as_uuid())
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to debit grant", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<GrantId>, DomainError> {
        let mut tx = self.begin().await?;
        advisory_lock(&mut tx, "expire-sweep").await?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE grants SET status = 'expired', updated_at = $1
            WHERE status = 'active' AND expired_at IS NOT NULL AND expired_at <= $1
            RETURNING id
            "#,
        )
        .bind(now.as_datetime())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to expire grants", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit expiry sweep", e))?;

        Ok(ids.into_iter().map(GrantId::from_uuid).collect())
    }

    async fn reset_usage(&self, boundary: &ResetBoundary) -> Result<ResetOutcome, DomainError> {
        let job = boundary.window.job_name();
        let mut tx = self.begin().await?;
        advisory_lock(&mut tx, job).await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO reconciler_runs (job, boundary_key, boundary_starts_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (job, boundary_key) DO NOTHING
            "#,
        )
        .bind(job)
        .bind(&boundary.key)
        .bind(boundary.starts_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to claim reset boundary", e))?;

        if claimed.rows_affected() == 0 {
            debug!(job, boundary = %boundary.key, "Reset boundary already claimed");
            return Ok(ResetOutcome::AlreadyApplied);
        }

        let sql = match boundary.window {
            UsageWindow::Weekly => {
                r#"
                UPDATE grants SET weekly_used = 0, updated_at = NOW()
                WHERE kind = 'subscription' AND status = 'active' AND weekly_used > 0
                "#
            }
            UsageWindow::Monthly => {
                r#"
                UPDATE grants SET monthly_used = 0, updated_at = NOW()
                WHERE kind = 'subscription' AND status = 'active' AND monthly_used > 0
                "#
            }
        };

        let reset = sqlx::query(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to reset usage", e))?;
        let grants_reset = reset.rows_affected();

        sqlx::query("UPDATE reconciler_runs SET grants_reset = $3 WHERE job = $1 AND boundary_key = $2")
            .bind(job)
            .bind(&boundary.key)
            .bind(i64::try_from(grants_reset).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to record reset", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit usage reset", e))?;

        Ok(ResetOutcome::Applied { grants_reset })
    }
}
