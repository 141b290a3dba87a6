// Webhook subscriptions: list, create and delete, plus the portal-wide
// delete that falls back to one-by-one deletion when the bulk call fails
// with a server error.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{CreateSubscriptionRequest, Subscription, SubscriptionList};
use tracing::{info, warn};

const SUBSCRIPTIONS_PATH: &str = "/webhooks/v4/subscriptions";

/// Result of deleting every subscription of a portal.
#[derive(Debug)]
pub enum PortalDeletion {
    /// The bulk endpoint removed everything in one call.
    Bulk,
    /// The bulk endpoint failed with a server error and each subscription
    /// was deleted individually.
    Individually(Vec<DeletionOutcome>),
}

#[derive(Debug)]
pub struct DeletionOutcome {
    pub subscription_id: String,
    pub result: Result<()>,
}

impl PortalDeletion {
    pub fn failures(&self) -> usize {
        match self {
            Self::Bulk => 0,
            Self::Individually(outcomes) => outcomes.iter().filter(|o| o.result.is_err()).count(),
        }
    }
}

#[derive(Clone)]
pub struct SubscriptionsClient {
    api: ApiClient,
}

impl SubscriptionsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn list(&self) -> Result<Vec<Subscription>> {
        match self.api.get::<SubscriptionList>(SUBSCRIPTIONS_PATH) {
            Ok(list) => Ok(list.results),
            Err(Error::NoContent) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub fn create(&self, req: &CreateSubscriptionRequest) -> Result<Subscription> {
        let sub: Subscription = self.api.post(SUBSCRIPTIONS_PATH, req)?;
        info!(id = %sub.id, portal_id = sub.portal_id, "created subscription");
        Ok(sub)
    }

    pub fn delete(&self, subscription_id: &str) -> Result<()> {
        self.api
            .delete(&format!("{}/{}", SUBSCRIPTIONS_PATH, subscription_id))
    }

    /// Delete all subscriptions of `portal_id`. Tries the bulk endpoint
    /// first; on a 5xx falls back to one delete per subscription of that
    /// portal, carrying on past individual failures.
    pub fn delete_for_portal(&self, portal_id: u64) -> Result<PortalDeletion> {
        match self
            .api
            .delete(&format!("{}/portals/{}", SUBSCRIPTIONS_PATH, portal_id))
        {
            Ok(()) => return Ok(PortalDeletion::Bulk),
            Err(e) if e.is_server_error() => {
                warn!(portal_id, error = %e, "bulk delete failed, deleting subscriptions one by one");
            }
            Err(e) => return Err(e),
        }

        let outcomes = self
            .list()?
            .into_iter()
            .filter(|sub| sub.portal_id == portal_id)
            .map(|sub| {
                let result = self.delete(&sub.id);
                if let Err(e) = &result {
                    warn!(id = %sub.id, error = %e, "failed to delete subscription");
                }
                DeletionOutcome {
                    subscription_id: sub.id,
                    result,
                }
            })
            .collect();

        Ok(PortalDeletion::Individually(outcomes))
    }
}
