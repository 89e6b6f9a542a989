//! Postgres ledger tests.
//!
//! These run the guarded SQL updates against a real database. They are
//! ignored by default; run them with
//! `DATABASE_URL=postgres://... cargo test --test postgres_ledger -- --ignored`.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use publish_entitlements::adapters::postgres::PostgresGrantStore;
use publish_entitlements::domain::catalog::{Plan, PlanKind, PlanTerms, Price};
use publish_entitlements::domain::foundation::{Timestamp, UserId};
use publish_entitlements::domain::grant::{Grant, GrantUsage};
use publish_entitlements::domain::lifecycle::{ResetBoundary, UsageWindow};
use publish_entitlements::ports::{GrantRepository, ResetOutcome, UsageLedger};

async fn pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    Some(pool)
}

/// Inserts a catalog row for `terms` under a unique name and returns the plan.
async fn seed_plan(pool: &PgPool, terms: PlanTerms) -> Plan {
    let name = format!("ledger-{}", Uuid::new_v4());
    let plan = Plan::new(&name, Price::new(900, "USD").unwrap(), 30, terms).unwrap();
    let (weekly, monthly, credits) = match &plan.terms {
        PlanTerms::Subscription {
            weekly_limit,
            monthly_limit,
        } => (Some(*weekly_limit as i32), Some(*monthly_limit as i32), None),
        PlanTerms::Package { total_credits } => (None, None, Some(*total_credits as i32)),
    };

    sqlx::query(
        r#"
        INSERT INTO plans (id, kind, name, price_cents, currency, duration_days,
                           weekly_limit, monthly_limit, total_credits)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(plan.id.as_uuid())
    .bind(plan.terms.kind().as_str())
    .bind(&plan.name)
    .bind(plan.price.amount_cents())
    .bind(plan.price.currency())
    .bind(plan.duration_days as i32)
    .bind(weekly)
    .bind(monthly)
    .bind(credits)
    .execute(pool)
    .await
    .expect("insert plan");

    plan
}

async fn active_grant(store: &PostgresGrantStore, plan: &Plan, now: Timestamp) -> Grant {
    let user = UserId::new(format!("pg-{}", Uuid::new_v4())).unwrap();
    let mut grant = Grant::issue(plan, user, None, now).unwrap();
    store.save(&grant).await.unwrap();
    grant.activate(now).unwrap();
    assert!(store.activate(&grant).await.unwrap().activated);
    grant
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_debits_never_exceed_package_credits() {
    let Some(pool) = pool().await else { return };
    let store = Arc::new(PostgresGrantStore::new(pool.clone()));
    let now = Timestamp::now();
    let plan = seed_plan(&pool, PlanTerms::Package { total_credits: 3 }).await;
    let grant = active_grant(&store, &plan, now).await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let id = grant.id;
            tokio::spawn(async move { store.try_debit(&id, PlanKind::Package, now).await })
        })
        .collect();

    let mut debited = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() {
            debited += 1;
        }
    }
    assert_eq!(debited, 3);

    let stored = store.find_by_id(&grant.id).await.unwrap().unwrap();
    match stored.usage {
        GrantUsage::Package(usage) => {
            assert_eq!(usage.used_credits(), 3);
            assert_eq!(usage.remaining(), 0);
        }
        other => panic!("expected package usage, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn debit_refuses_wrong_kind_and_lapsed_grants() {
    let Some(pool) = pool().await else { return };
    let store = PostgresGrantStore::new(pool.clone());
    let now = Timestamp::now();
    let plan = seed_plan(&pool, PlanTerms::Package { total_credits: 5 }).await;
    let grant = active_grant(&store, &plan, now).await;

    assert!(!store
        .try_debit(&grant.id, PlanKind::Subscription, now)
        .await
        .unwrap());

    let after_window = now.checked_add_days(31).unwrap();
    assert!(!store
        .try_debit(&grant.id, PlanKind::Package, after_window)
        .await
        .unwrap());

    let stored = store.find_by_id(&grant.id).await.unwrap().unwrap();
    match stored.usage {
        GrantUsage::Package(usage) => assert_eq!(usage.used_credits(), 0),
        other => panic!("expected package usage, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn weekly_reset_applies_once_per_boundary() {
    let Some(pool) = pool().await else { return };
    let store = PostgresGrantStore::new(pool.clone());
    let now = Timestamp::now();
    let plan = seed_plan(
        &pool,
        PlanTerms::Subscription {
            weekly_limit: 5,
            monthly_limit: 20,
        },
    )
    .await;
    let grant = active_grant(&store, &plan, now).await;
    for _ in 0..2 {
        assert!(store
            .try_debit(&grant.id, PlanKind::Subscription, now)
            .await
            .unwrap());
    }

    let boundary = ResetBoundary {
        window: UsageWindow::Weekly,
        starts_at: now,
        key: format!("weekly:test-{}", Uuid::new_v4()),
    };

    let first = store.reset_usage(&boundary).await.unwrap();
    assert!(matches!(first, ResetOutcome::Applied { grants_reset } if grants_reset >= 1));
    assert_eq!(
        store.reset_usage(&boundary).await.unwrap(),
        ResetOutcome::AlreadyApplied
    );

    let stored = store.find_by_id(&grant.id).await.unwrap().unwrap();
    match stored.usage {
        GrantUsage::Subscription(usage) => {
            assert_eq!(usage.weekly_used(), 0);
            assert_eq!(usage.monthly_used(), 2);
        }
        other => panic!("expected subscription usage, got {other:?}"),
    }
}
