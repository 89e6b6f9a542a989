//! HandlePaymentEventHandler - Applies payment-provider settlement events.
//!
//! Events are keyed by the provider's transaction id and may arrive more
//! than once, out of order, or before the purchase row is committed.
//!
//! | Outcome     | pending   | active          | cancelled       | expired |
//! |-------------|-----------|-----------------|-----------------|---------|
//! | `succeeded` | activate  | already applied | ignored         | ignored |
//! | `failed`    | cancel    | cancel          | already applied | ignored |
//! | `refunded`  | cancel    | cancel          | already applied | ignored |

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{GrantId, Timestamp};
use crate::domain::grant::{Grant, GrantStatus};
use crate::domain::lifecycle::{PaymentEvent, PaymentOutcome};
use crate::ports::GrantRepository;

/// Command carrying one delivered payment event.
#[derive(Debug, Clone)]
pub struct HandlePaymentEventCommand {
    pub event: PaymentEvent,
}

/// What the event did to its grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentEventResult {
    /// Pending grant became active; `superseded` lists subscriptions it replaced.
    Activated {
        grant_id: GrantId,
        superseded: Vec<GrantId>,
    },
    Cancelled { grant_id: GrantId },
    /// Redelivery of an event whose effect is already in place.
    AlreadyApplied { grant_id: GrantId },
    /// The grant is terminal; the event cannot change it.
    Ignored { grant_id: GrantId, status: GrantStatus },
}

pub struct HandlePaymentEventHandler {
    grants: Arc<dyn GrantRepository>,
}

impl HandlePaymentEventHandler {
    pub fn new(grants: Arc<dyn GrantRepository>) -> Self {
        Self { grants }
    }

    /// # Errors
    ///
    /// - `UnknownPaymentReference` if no grant carries the reference yet;
    ///   the caller should redeliver later
    /// - `Infrastructure` on storage failure
    pub async fn handle(
        &self,
        cmd: HandlePaymentEventCommand,
    ) -> Result<HandlePaymentEventResult, EntitlementError> {
        let event = cmd.event;
        let grant = match self.grants.find_by_external_payment_ref(&event.external_ref).await? {
            Some(grant) => grant,
            None => {
                warn!(
                    external_ref = %event.external_ref,
                    outcome = %event.outcome,
                    occurred_at = %event.occurred_at,
                    "Payment event for unknown reference"
                );
                return Err(EntitlementError::UnknownPaymentReference(event.external_ref));
            }
        };

        debug!(
            grant_id = %grant.id,
            outcome = %event.outcome,
            occurred_at = %event.occurred_at,
            "Applying payment event"
        );

        let now = Timestamp::now();
        match event.outcome {
            PaymentOutcome::Succeeded => self.activate(grant, now).await,
            PaymentOutcome::Failed | PaymentOutcome::Refunded => {
                self.cancel(grant, event.outcome, now).await
            }
        }
    }

    async fn activate(
        &self,
        grant: Grant,
        now: Timestamp,
    ) -> Result<HandlePaymentEventResult, EntitlementError> {
        match grant.status {
            GrantStatus::Active => return Ok(already_applied(&grant)),
            GrantStatus::Cancelled | GrantStatus::Expired => return Ok(ignored(&grant)),
            GrantStatus::Pending => {}
        }

        let mut activated = grant.clone();
        activated.activate(now)?;
        let outcome = self.grants.activate(&activated).await?;

        if !outcome.activated {
            // A concurrent delivery moved the grant first.
            return self.settled_elsewhere(grant.id, GrantStatus::Active).await;
        }

        info!(
            user_id = %activated.user_id,
            grant_id = %activated.id,
            kind = %activated.kind(),
            superseded = outcome.superseded.len(),
            "Grant activated by payment"
        );

        Ok(HandlePaymentEventResult::Activated {
            grant_id: activated.id,
            superseded: outcome.superseded,
        })
    }

    async fn cancel(
        &self,
        grant: Grant,
        outcome: PaymentOutcome,
        now: Timestamp,
    ) -> Result<HandlePaymentEventResult, EntitlementError> {
        match grant.status {
            GrantStatus::Cancelled => return Ok(already_applied(&grant)),
            GrantStatus::Expired => return Ok(ignored(&grant)),
            GrantStatus::Pending | GrantStatus::Active => {}
        }

        let changed = self
            .grants
            .mark_status(
                &grant.id,
                &[GrantStatus::Pending, GrantStatus::Active],
                GrantStatus::Cancelled,
                now,
            )
            .await?;

        if !changed {
            return self.settled_elsewhere(grant.id, GrantStatus::Cancelled).await;
        }

        info!(
            user_id = %grant.user_id,
            grant_id = %grant.id,
            outcome = %outcome,
            "Grant cancelled by payment event"
        );

        Ok(HandlePaymentEventResult::Cancelled { grant_id: grant.id })
    }

    /// Classifies a grant whose guarded write matched nothing.
    async fn settled_elsewhere(
        &self,
        grant_id: GrantId,
        wanted: GrantStatus,
    ) -> Result<HandlePaymentEventResult, EntitlementError> {
        let current = self
            .grants
            .find_by_id(&grant_id)
            .await?
            .ok_or(EntitlementError::GrantNotFound(grant_id))?;

        if current.status == wanted {
            Ok(already_applied(&current))
        } else {
            Ok(ignored(&current))
        }
    }
}

fn already_applied(grant: &Grant) -> HandlePaymentEventResult {
    HandlePaymentEventResult::AlreadyApplied { grant_id: grant.id }
}

fn ignored(grant: &Grant) -> HandlePaymentEventResult {
    warn!(
        grant_id = %grant.id,
        status = %grant.status,
        "Payment event ignored for terminal grant"
    );
    HandlePaymentEventResult::Ignored {
        grant_id: grant.id,
        status: grant.status,
    }
}
