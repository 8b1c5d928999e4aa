//! Permission gate: may this identity create a backup?

use std::sync::Arc;

use crate::domain::OwnerId;
use crate::persistence::{PlanLookup, SubscriptionPlan};

/// Decides whether an explicit subscription plan allows backups.
pub trait BackupPolicy: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `plan` permits creating a backup.
    fn allows(&self, plan: &SubscriptionPlan) -> bool;
}

/// Paid tiers may back up; the free tier may not.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaidTierPolicy;

impl BackupPolicy for PaidTierPolicy {
    fn allows(&self, plan: &SubscriptionPlan) -> bool {
        !plan.is_free()
    }
}

/// Answers `CanBackup(identity)` from subscription state.
///
/// Fails open: if the plan lookup errors or finds no record, backup is
/// allowed so that billing outages never block users. Only an explicit plan
/// is handed to the [`BackupPolicy`].
#[derive(Debug, Clone)]
pub struct PermissionGate {
    plans: Arc<dyn PlanLookup>,
    policy: Arc<dyn BackupPolicy>,
}

impl PermissionGate {
    /// Creates a gate over `plans` evaluated by `policy`.
    #[must_use]
    pub fn new(plans: Arc<dyn PlanLookup>, policy: Arc<dyn BackupPolicy>) -> Self {
        Self { plans, policy }
    }

    /// Returns `true` if `owner` may create a backup. Read-only.
    pub async fn can_backup(&self, owner: &OwnerId) -> bool {
        match self.plans.active_plan(owner).await {
            Ok(Some(plan)) => {
                let allowed = self.policy.allows(&plan);
                tracing::debug!(%owner, tier = %plan.tier, allowed, "evaluated backup permission");
                allowed
            }
            Ok(None) => {
                tracing::debug!(%owner, "no active plan on record; allowing backup");
                true
            }
            Err(e) => {
                tracing::warn!(%owner, error = %e, "plan lookup failed; allowing backup");
                true
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::StaticPlanLookup;

    fn owner() -> OwnerId {
        let Some(owner) = OwnerId::parse("U1") else {
            panic!("valid owner");
        };
        owner
    }

    fn gate(plans: StaticPlanLookup) -> PermissionGate {
        PermissionGate::new(Arc::new(plans), Arc::new(PaidTierPolicy))
    }

    #[tokio::test]
    async fn paid_plan_allows() {
        let plans = StaticPlanLookup::new();
        plans.set(&owner(), SubscriptionPlan::new("premium")).await;
        assert!(gate(plans).can_backup(&owner()).await);
    }

    #[tokio::test]
    async fn free_plan_denies() {
        let plans = StaticPlanLookup::new();
        plans.set(&owner(), SubscriptionPlan::new("free")).await;
        assert!(!gate(plans).can_backup(&owner()).await);
    }

    #[tokio::test]
    async fn missing_plan_fails_open() {
        assert!(gate(StaticPlanLookup::new()).can_backup(&owner()).await);
    }

    #[tokio::test]
    async fn lookup_failure_fails_open() {
        assert!(gate(StaticPlanLookup::failing()).can_backup(&owner()).await);
    }

    #[derive(Debug)]
    struct DenyAll;

    impl BackupPolicy for DenyAll {
        fn allows(&self, _plan: &SubscriptionPlan) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn caller_policy_decides_explicit_plans() {
        let plans = StaticPlanLookup::new();
        plans.set(&owner(), SubscriptionPlan::new("premium")).await;
        let gate = PermissionGate::new(Arc::new(plans), Arc::new(DenyAll));
        assert!(!gate.can_backup(&owner()).await);
    }
}
