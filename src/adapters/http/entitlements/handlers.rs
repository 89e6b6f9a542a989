//! HTTP handlers for entitlement endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::{
    CancelGrantCommand, CancelGrantHandler, ConsumeEntitlementCommand, ConsumeEntitlementHandler,
    EvaluateEntitlementHandler, EvaluateEntitlementQuery, HandlePaymentEventCommand,
    HandlePaymentEventHandler, InitiatePurchaseCommand, InitiatePurchaseHandler, ListPlansHandler,
    ListPlansQuery,
};
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{DomainError, GrantId, PlanId, Timestamp, UserId, ValidationError};
use crate::domain::lifecycle::PaymentEvent;
use crate::ports::{GrantRepository, PlanCatalog, UsageLedger};

use super::dto::{
    ConsumeResponse, ErrorResponse, GrantResponse, InitiatePurchaseRequest, ListPlansParams,
    PaymentWebhookRequest, PaymentWebhookResponse, PlanResponse, PlansResponse,
    PublishingRightsResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; dependencies are Arc-wrapped.
#[derive(Clone)]
pub struct EntitlementAppState {
    pub plan_catalog: Arc<dyn PlanCatalog>,
    pub grant_repository: Arc<dyn GrantRepository>,
    pub usage_ledger: Arc<dyn UsageLedger>,
}

impl EntitlementAppState {
    pub fn new(
        plan_catalog: Arc<dyn PlanCatalog>,
        grant_repository: Arc<dyn GrantRepository>,
        usage_ledger: Arc<dyn UsageLedger>,
    ) -> Self {
        Self {
            plan_catalog,
            grant_repository,
            usage_ledger,
        }
    }

    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.plan_catalog.clone())
    }

    pub fn evaluate_handler(&self) -> EvaluateEntitlementHandler {
        EvaluateEntitlementHandler::new(self.grant_repository.clone())
    }

    pub fn consume_handler(&self) -> ConsumeEntitlementHandler {
        ConsumeEntitlementHandler::new(self.grant_repository.clone(), self.usage_ledger.clone())
    }

    pub fn initiate_purchase_handler(&self) -> InitiatePurchaseHandler {
        InitiatePurchaseHandler::new(self.plan_catalog.clone(), self.grant_repository.clone())
    }

    pub fn cancel_grant_handler(&self) -> CancelGrantHandler {
        CancelGrantHandler::new(self.grant_repository.clone())
    }

    pub fn payment_event_handler(&self) -> HandlePaymentEventHandler {
        HandlePaymentEventHandler::new(self.grant_repository.clone())
    }
}

fn parse_user_id(raw: String) -> Result<UserId, EntitlementApiError> {
    Ok(UserId::new(raw)?)
}

fn parse_id<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T, EntitlementApiError> {
    raw.parse()
        .map_err(|_| EntitlementError::validation(field, "must be a UUID").into())
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/plans - List plans on sale
pub async fn list_plans(
    State(state): State<EntitlementAppState>,
    Query(params): Query<ListPlansParams>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let plans = state
        .list_plans_handler()
        .handle(ListPlansQuery { kind: params.kind })
        .await?;

    Ok(Json(PlansResponse {
        plans: plans.into_iter().map(PlanResponse::from).collect(),
    }))
}

/// GET /api/entitlements/:user_id - Current publishing rights
pub async fn get_publishing_rights(
    State(state): State<EntitlementAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let query = EvaluateEntitlementQuery {
        user_id: parse_user_id(user_id)?,
    };
    let rights = state.evaluate_handler().handle(query).await?;
    Ok(Json(PublishingRightsResponse::from(rights)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/entitlements/:user_id/consume - Debit one publish
pub async fn consume_entitlement(
    State(state): State<EntitlementAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let cmd = ConsumeEntitlementCommand {
        user_id: parse_user_id(user_id)?,
    };
    let result = state.consume_handler().handle(cmd).await?;
    Ok(Json(ConsumeResponse::from(result)))
}

/// POST /api/entitlements/:user_id/grants - Start a purchase
pub async fn initiate_purchase(
    State(state): State<EntitlementAppState>,
    Path(user_id): Path<String>,
    Json(request): Json<InitiatePurchaseRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let cmd = InitiatePurchaseCommand {
        user_id: parse_user_id(user_id)?,
        plan_id: parse_id::<PlanId>(&request.plan_id, "plan_id")?,
        external_payment_ref: request.external_payment_ref,
    };
    let result = state.initiate_purchase_handler().handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(GrantResponse::from(result.grant))))
}

/// POST /api/entitlements/:user_id/grants/:grant_id/cancel - Cancel a grant
pub async fn cancel_grant(
    State(state): State<EntitlementAppState>,
    Path((user_id, grant_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let cmd = CancelGrantCommand {
        user_id: parse_user_id(user_id)?,
        grant_id: parse_id::<GrantId>(&grant_id, "grant_id")?,
    };
    state.cancel_grant_handler().handle(cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/webhooks/payments - Apply a payment settlement event
pub async fn handle_payment_webhook(
    State(state): State<EntitlementAppState>,
    Json(request): Json<PaymentWebhookRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let occurred_at = request
        .timestamp
        .map(Timestamp::from_datetime)
        .unwrap_or_else(Timestamp::now);
    let event = PaymentEvent::new(request.external_ref, request.outcome, occurred_at)?;

    let result = state
        .payment_event_handler()
        .handle(HandlePaymentEventCommand { event })
        .await?;

    Ok(Json(PaymentWebhookResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts engine errors to HTTP responses.
#[derive(Debug)]
pub struct EntitlementApiError(EntitlementError);

impl From<EntitlementError> for EntitlementApiError {
    fn from(err: EntitlementError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for EntitlementApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for EntitlementApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for EntitlementApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            EntitlementError::NoActiveGrant(_) => (StatusCode::PAYMENT_REQUIRED, "NO_ACTIVE_GRANT"),
            EntitlementError::LimitReached(_) => (StatusCode::PAYMENT_REQUIRED, "LIMIT_REACHED"),
            EntitlementError::CreditsExhausted(_) => {
                (StatusCode::PAYMENT_REQUIRED, "CREDITS_EXHAUSTED")
            }
            EntitlementError::InsufficientEntitlement(_) => {
                (StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_ENTITLEMENT")
            }
            EntitlementError::UnknownPaymentReference(_) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_PAYMENT_REFERENCE")
            }
            EntitlementError::PlanNotFound(_) => (StatusCode::NOT_FOUND, "PLAN_NOT_FOUND"),
            EntitlementError::GrantNotFound(_) => (StatusCode::NOT_FOUND, "GRANT_NOT_FOUND"),
            EntitlementError::ConcurrencyConflict(_) => {
                (StatusCode::CONFLICT, "CONCURRENCY_CONFLICT")
            }
            EntitlementError::DuplicatePaymentReference(_) => {
                (StatusCode::CONFLICT, "DUPLICATE_PAYMENT_REFERENCE")
            }
            EntitlementError::InvalidState { .. } => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION")
            }
            EntitlementError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            EntitlementError::InvalidPlanConfiguration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_PLAN_CONFIGURATION")
            }
            EntitlementError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let detail = DomainError::from(self.0.clone()).details;
        let body = if detail.is_empty() {
            ErrorResponse::new(error_code, self.0.to_string())
        } else {
            ErrorResponse::with_details(error_code, self.0.to_string(), serde_json::json!(detail))
        }
        .retryable(self.0.is_retryable());

        (status, Json(body)).into_response()
    }
}
