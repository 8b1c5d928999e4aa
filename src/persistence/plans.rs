//! Subscription plan lookup consumed by the permission gate.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::RemoteStoreError;
use crate::domain::OwnerId;

/// Plan tier name recorded for the free tier.
pub const FREE_TIER: &str = "free";

/// An identity's active subscription plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPlan {
    /// Plan tier name as stored by the billing system (e.g. `"free"`,
    /// `"premium"`).
    pub tier: String,
}

impl SubscriptionPlan {
    /// Creates a plan of the given tier.
    #[must_use]
    pub fn new(tier: impl Into<String>) -> Self {
        Self { tier: tier.into() }
    }

    /// Returns `true` for the free tier.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.tier.eq_ignore_ascii_case(FREE_TIER)
    }
}

/// Read-only access to active subscription plans.
#[async_trait]
pub trait PlanLookup: Send + Sync + std::fmt::Debug {
    /// Returns the identity's active plan, or `None` if there is no record.
    async fn active_plan(&self, owner: &OwnerId)
    -> Result<Option<SubscriptionPlan>, RemoteStoreError>;
}

/// In-memory [`PlanLookup`].
#[derive(Debug, Default)]
pub struct StaticPlanLookup {
    plans: RwLock<HashMap<OwnerId, SubscriptionPlan>>,
    failing: bool,
}

impl StaticPlanLookup {
    /// Creates a lookup with no plans on record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lookup whose every query fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Records `plan` as `owner`'s active plan.
    pub async fn set(&self, owner: &OwnerId, plan: SubscriptionPlan) {
        self.plans.write().await.insert(owner.clone(), plan);
    }
}

#[async_trait]
impl PlanLookup for StaticPlanLookup {
    async fn active_plan(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubscriptionPlan>, RemoteStoreError> {
        if self.failing {
            return Err(RemoteStoreError::PlanLookup(
                "injected lookup failure".to_string(),
            ));
        }
        Ok(self.plans.read().await.get(owner).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_is_case_insensitive() {
        assert!(SubscriptionPlan::new("FREE").is_free());
        assert!(!SubscriptionPlan::new("premium").is_free());
    }
}
