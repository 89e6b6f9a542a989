//! PostgreSQL implementation of PlanCatalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::catalog::{canonical_name, Plan, PlanKind, PlanRecord};
use crate::domain::foundation::{DomainError, PlanId, Timestamp};
use crate::ports::PlanCatalog;

/// PostgreSQL implementation of the PlanCatalog port.
pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_PLAN: &str = r#"
    SELECT id, kind, name, display_name, price_cents, currency, duration_days,
           weekly_limit, monthly_limit, total_credits, is_active, display_rank,
           metadata, created_at
    FROM plans
"#;

/// Database row representation of a plan.
#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    kind: String,
    name: String,
    display_name: Option<String>,
    price_cents: i64,
    currency: String,
    duration_days: i32,
    weekly_limit: Option<i32>,
    monthly_limit: Option<i32>,
    total_credits: Option<i32>,
    is_active: bool,
    display_rank: i32,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanRecord {
    fn from(row: PlanRow) -> Self {
        PlanRecord {
            id: PlanId::from_uuid(row.id),
            kind: row.kind,
            name: row.name,
            display_name: row.display_name,
            price_cents: row.price_cents,
            currency: row.currency,
            duration_days: row.duration_days,
            weekly_limit: row.weekly_limit,
            monthly_limit: row.monthly_limit,
            total_credits: row.total_credits,
            is_active: row.is_active,
            display_rank: row.display_rank,
            metadata: row.metadata,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

fn into_plan(row: PlanRow) -> Result<Plan, DomainError> {
    Plan::try_from(PlanRecord::from(row)).map_err(DomainError::from)
}

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_PLAN))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find plan", e))?;

        row.map(into_plan).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Plan>, DomainError> {
        let name = match canonical_name(name) {
            Ok(name) => name,
            Err(_) => return Ok(None),
        };

        let row: Option<PlanRow> =
            sqlx::query_as(&format!("{} WHERE LOWER(TRIM(name)) = $1", SELECT_PLAN))
                .bind(&name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to find plan by name", e))?;

        row.map(into_plan).transpose()
    }

    async fn list_available(&self, kind: Option<PlanKind>) -> Result<Vec<Plan>, DomainError> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "{} WHERE is_active AND ($1::TEXT IS NULL OR kind = $1) ORDER BY display_rank ASC, name ASC",
            SELECT_PLAN
        ))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list plans", e))?;

        rows.into_iter().map(into_plan).collect()
    }
}
