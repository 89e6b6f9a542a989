//! Route configuration for entitlement endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    cancel_grant, consume_entitlement, get_publishing_rights, handle_payment_webhook,
    initiate_purchase, list_plans, EntitlementAppState,
};

/// Creates the entitlement router with all endpoints.
///
/// Routes:
/// - `GET /api/plans?kind=` - Plans on sale
/// - `GET /api/entitlements/:user_id` - Publishing rights
/// - `POST /api/entitlements/:user_id/consume` - Debit one publish
/// - `POST /api/entitlements/:user_id/grants` - Start a purchase
/// - `POST /api/entitlements/:user_id/grants/:grant_id/cancel` - Cancel a grant
/// - `POST /api/webhooks/payments` - Payment settlement events
pub fn entitlement_router() -> Router<EntitlementAppState> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/entitlements/:user_id", get(get_publishing_rights))
        .route("/api/entitlements/:user_id/consume", post(consume_entitlement))
        .route("/api/entitlements/:user_id/grants", post(initiate_purchase))
        .route(
            "/api/entitlements/:user_id/grants/:grant_id/cancel",
            post(cancel_grant),
        )
        .route("/api/webhooks/payments", post(handle_payment_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGrantStore, InMemoryPlanCatalog};
    use crate::domain::catalog::{Plan, PlanTerms, Price};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> (EntitlementAppState, Plan) {
        let plan = Plan::new(
            "three-pack",
            Price::new(900, "USD").unwrap(),
            30,
            PlanTerms::Package { total_credits: 3 },
        )
        .unwrap();
        let store = Arc::new(InMemoryGrantStore::new());
        let state = EntitlementAppState::new(
            Arc::new(InMemoryPlanCatalog::with_plans(vec![plan.clone()])),
            store.clone(),
            store,
        );
        (state, plan)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn router_lists_plans() {
        let (state, _) = state();
        let response = entitlement_router()
            .with_state(state)
            .oneshot(
                Request::builder()
                    .uri("/api/plans?kind=package")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["plans"][0]["name"], "three-pack");
    }

    #[tokio::test]
    async fn consume_without_grants_is_payment_required() {
        let (state, _) = state();
        let response = entitlement_router()
            .with_state(state)
            .oneshot(post_json("/api/entitlements/u1/consume", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(json_of(response).await["error_code"], "INSUFFICIENT_ENTITLEMENT");
    }

    #[tokio::test]
    async fn purchase_returns_created_pending_grant() {
        let (state, plan) = state();
        let response = entitlement_router()
            .with_state(state)
            .oneshot(post_json(
                "/api/entitlements/u1/grants",
                serde_json::json!({ "plan_id": plan.id.to_string(), "external_payment_ref": "pay_1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_of(response).await["status"], "pending");
    }

    #[tokio::test]
    async fn malformed_grant_id_is_bad_request() {
        let (state, _) = state();
        let response = entitlement_router()
            .with_state(state)
            .oneshot(post_json(
                "/api/entitlements/u1/grants/not-a-uuid/cancel",
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_payment_reference_asks_for_retry() {
        let (state, _) = state();
        let response = entitlement_router()
            .with_state(state)
            .oneshot(post_json(
                "/api/webhooks/payments",
                serde_json::json!({ "external_ref": "pay_missing", "outcome": "succeeded" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_of(response).await["retryable"], true);
    }
}
