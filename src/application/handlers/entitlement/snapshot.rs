//! Loads the grants an entitlement decision is made over.

use crate::domain::entitlement::{EntitlementError, EntitlementSnapshot};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::GrantRepository;

/// Fetches the user's live subscription and live packages.
///
/// When `with_lapsed` is set and nothing live is held, also checks whether
/// the user owns paid grants whose window has closed.
pub(crate) async fn load_snapshot(
    grants: &dyn GrantRepository,
    user_id: &UserId,
    now: Timestamp,
    with_lapsed: bool,
) -> Result<EntitlementSnapshot, EntitlementError> {
    let subscription = grants.active_subscription_for(user_id, now).await?;
    let packages = grants.active_packages_for(user_id, now).await?;

    let has_lapsed = if with_lapsed && subscription.is_none() && packages.is_empty() {
        grants
            .list_for_user(user_id)
            .await?
            .iter()
            .any(|g| g.has_lapsed(now))
    } else {
        false
    };

    Ok(EntitlementSnapshot::new(subscription, packages).with_lapsed(has_lapsed))
}
