//! HTTP integration tests for the entitlement API.
//!
//! These tests verify:
//! 1. A purchase stays unusable until its payment webhook arrives
//! 2. Webhook redelivery is acknowledged without side effects
//! 3. Consumption is reflected in publishing rights
//! 4. Restrictions map to 402 with a machine-readable code

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use publish_entitlements::adapters::http::{entitlement_router, EntitlementAppState};
use publish_entitlements::adapters::memory::{InMemoryGrantStore, InMemoryPlanCatalog};
use publish_entitlements::domain::catalog::{Plan, PlanTerms, Price};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn app() -> (Router, Plan, Plan) {
    let subscription = Plan::new(
        "pro-monthly",
        Price::new(1900, "USD").unwrap(),
        30,
        PlanTerms::Subscription {
            weekly_limit: 1,
            monthly_limit: 4,
        },
    )
    .unwrap()
    .with_rank(0);
    let package = Plan::new(
        "ten-pack",
        Price::new(4900, "USD").unwrap(),
        365,
        PlanTerms::Package { total_credits: 10 },
    )
    .unwrap()
    .with_rank(1);

    let store = Arc::new(InMemoryGrantStore::new());
    let state = EntitlementAppState::new(
        Arc::new(InMemoryPlanCatalog::with_plans(vec![
            subscription.clone(),
            package.clone(),
        ])),
        store.clone(),
        store,
    );

    (entitlement_router().with_state(state), subscription, package)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn purchase(app: &Router, user: &str, plan: &Plan, payment_ref: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        &format!("/api/entitlements/{}/grants", user),
        Some(json!({ "plan_id": plan.id.to_string(), "external_payment_ref": payment_ref })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    body["id"].as_str().unwrap().to_string()
}

async fn webhook(app: &Router, payment_ref: &str, outcome: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/api/webhooks/payments",
        Some(json!({ "external_ref": payment_ref, "outcome": outcome })),
    )
    .await
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn catalog_lists_plans_in_display_order() {
    let (app, _, _) = app();

    let (status, body) = call(&app, Method::GET, "/api/plans", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["plans"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["pro-monthly", "ten-pack"]);

    let (_, packages) = call(&app, Method::GET, "/api/plans?kind=package", None).await;
    assert_eq!(packages["plans"].as_array().unwrap().len(), 1);
    assert_eq!(packages["plans"][0]["total_credits"], 10);
}

#[tokio::test]
async fn purchase_pay_consume_flow() {
    let (app, subscription, _) = app();
    let grant_id = purchase(&app, "author-1", &subscription, "pi_flow").await;

    let (status, body) = call(&app, Method::POST, "/api/entitlements/author-1/consume", None).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error_code"], "INSUFFICIENT_ENTITLEMENT");

    let (status, body) = webhook(&app, "pi_flow", "succeeded").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "activated");
    assert_eq!(body["grant_id"], grant_id.as_str());

    let (status, body) = webhook(&app, "pi_flow", "succeeded").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "already_applied");

    let (_, rights) = call(&app, Method::GET, "/api/entitlements/author-1", None).await;
    assert_eq!(rights["can_publish"], true);
    assert_eq!(rights["weekly_remaining"], 1);
    assert_eq!(rights["selected_grant_id"], grant_id.as_str());

    let (status, body) = call(&app, Method::POST, "/api/entitlements/author-1/consume", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["grant_id"], grant_id.as_str());
    assert_eq!(body["kind"], "subscription");

    let (_, rights) = call(&app, Method::GET, "/api/entitlements/author-1", None).await;
    assert_eq!(rights["can_publish"], false);
    assert_eq!(rights["restriction_reason"], "limit_reached");
    assert_eq!(rights["monthly_remaining"], 3);
}

#[tokio::test]
async fn cancelled_grant_stops_publishing() {
    let (app, _, package) = app();
    let grant_id = purchase(&app, "author-2", &package, "pi_cancel").await;
    webhook(&app, "pi_cancel", "succeeded").await;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/entitlements/author-2/grants/{}/cancel", grant_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, rights) = call(&app, Method::GET, "/api/entitlements/author-2", None).await;
    assert_eq!(rights["can_publish"], false);
    assert_eq!(rights["restriction_reason"], "no_active_grant");

    // A late success must not resurrect it.
    let (status, body) = webhook(&app, "pi_cancel", "succeeded").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "ignored");
}

#[tokio::test]
async fn cancelling_someone_elses_grant_is_not_found() {
    let (app, _, package) = app();
    let grant_id = purchase(&app, "owner", &package, "pi_owner").await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/entitlements/intruder/grants/{}/cancel", grant_id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "GRANT_NOT_FOUND");
}

#[tokio::test]
async fn reused_payment_reference_conflicts() {
    let (app, subscription, package) = app();
    purchase(&app, "author-3", &subscription, "pi_dup").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/entitlements/author-3/grants",
        Some(json!({ "plan_id": package.id.to_string(), "external_payment_ref": "pi_dup" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "DUPLICATE_PAYMENT_REFERENCE");
}
