//! Stagnation sweep: auto-loss for deals nobody is working anymore.
//!
//! The sweep itself is idempotent and never rate-limits; the decision of
//! *when* to run belongs to the caller (server interval job, one-shot CLI).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::deal::{Deal, DealStage};
use crate::errors::ApplicationError;
use crate::pipeline::StageTransitionService;
use crate::store::DealStore;

/// Days without contact before a deal counts as stagnant.
pub const STAGNATION_THRESHOLD_DAYS: i64 = 7;

/// Attempts that must have been made before the system gives up on a lead.
pub const MIN_CONTACT_ATTEMPTS: u32 = 6;

pub const AUTO_LOSS_REASON: &str = "no_response";
pub const AUTO_LOSS_DETAILS: &str = "auto-archived by system due to inactivity";

/// Stages the sweep never touches. Paid consultations stay out even though
/// they are not SLA-exempt: the money is already on the table.
pub const SWEEP_EXEMPT_STAGES: [DealStage; 4] = [
    DealStage::Won,
    DealStage::Lost,
    DealStage::ConsultationDone,
    DealStage::ConsultationPaid,
];

/// Storage-side candidate filter. A deal qualifies when it sits outside the
/// exempt stages, has at least `min_contact_attempts`, and its last contact
/// (or creation, when never contacted) predates `stale_before`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepCriteria {
    pub min_contact_attempts: u32,
    pub stale_before: DateTime<Utc>,
}

impl SweepCriteria {
    pub fn effective_at(now: DateTime<Utc>) -> Self {
        Self {
            min_contact_attempts: MIN_CONTACT_ATTEMPTS,
            stale_before: now - Duration::days(STAGNATION_THRESHOLD_DAYS),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub archived: usize,
    pub failed: usize,
}

pub struct StagnationSweeper {
    deals: Arc<dyn DealStore>,
    transitions: Arc<StageTransitionService>,
}

impl StagnationSweeper {
    pub fn new(deals: Arc<dyn DealStore>, transitions: Arc<StageTransitionService>) -> Self {
        Self { deals, transitions }
    }

    /// Deals the next run would archive, without touching them.
    pub async fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<Deal>, ApplicationError> {
        Ok(self.deals.list_stagnant_candidates(&SweepCriteria::effective_at(now)).await?)
    }

    /// Archives every candidate as lost with the auto-loss reason. Best
    /// effort: one candidate failing is logged and counted, the rest of the
    /// batch still runs.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport, ApplicationError> {
        let candidates = self.candidates(now).await?;
        let mut report = SweepReport { examined: candidates.len(), ..SweepReport::default() };

        for deal in candidates {
            match self
                .transitions
                .mark_lost(&deal.id, AUTO_LOSS_REASON, Some(AUTO_LOSS_DETAILS))
                .await
            {
                Ok(_) => report.archived += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        deal_id = %deal.id.0,
                        error = %error,
                        "stagnation sweep could not archive deal"
                    );
                }
            }
        }

        info!(
            examined = report.examined,
            archived = report.archived,
            failed = report.failed,
            "stagnation sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    use crate::domain::activity::ActivityKind;
    use crate::domain::campaign::CampaignId;
    use crate::domain::deal::{Deal, DealId, DealStage, LeadUrgency};
    use crate::pipeline::StageTransitionService;
    use crate::store::{ActivityLog, DealStore, StoreError};

    use super::{
        StagnationSweeper, SweepCriteria, AUTO_LOSS_REASON, MIN_CONTACT_ATTEMPTS,
        STAGNATION_THRESHOLD_DAYS,
    };

    /// Candidate selection is storage-side; this fake mirrors the contract so
    /// the sweeper's orchestration can be exercised against it.
    #[derive(Default)]
    struct FakeDealStore {
        deals: Mutex<HashMap<String, Deal>>,
        fail_saves_for: Option<String>,
    }

    impl FakeDealStore {
        fn insert(&self, deal: Deal) {
            self.deals.lock().expect("lock").insert(deal.id.0.clone(), deal);
        }

        fn get(&self, id: &str) -> Option<Deal> {
            self.deals.lock().expect("lock").get(id).cloned()
        }
    }

    #[async_trait]
    impl DealStore for FakeDealStore {
        async fn load(&self, id: &DealId) -> Result<Option<Deal>, StoreError> {
            Ok(self.deals.lock().expect("lock").get(&id.0).cloned())
        }

        async fn save(&self, deal: Deal) -> Result<Deal, StoreError> {
            if self.fail_saves_for.as_deref() == Some(deal.id.0.as_str()) {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.deals.lock().expect("lock").insert(deal.id.0.clone(), deal.clone());
            Ok(deal)
        }

        async fn record_contact_attempt(
            &self,
            _id: &DealId,
            _at: DateTime<Utc>,
        ) -> Result<Deal, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn list_active(
            &self,
            _campaign_id: Option<&CampaignId>,
        ) -> Result<Vec<Deal>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_stagnant_candidates(
            &self,
            criteria: &SweepCriteria,
        ) -> Result<Vec<Deal>, StoreError> {
            let deals = self.deals.lock().expect("lock");
            Ok(deals
                .values()
                .filter(|deal| {
                    !super::SWEEP_EXEMPT_STAGES.contains(&deal.stage)
                        && deal.contact_attempts >= criteria.min_contact_attempts
                        && deal.sla_base_time() < criteria.stale_before
                })
                .cloned()
                .collect())
        }
    }

    struct NullActivityLog;

    #[async_trait]
    impl ActivityLog for NullActivityLog {
        async fn append(
            &self,
            _deal_id: &DealId,
            _kind: ActivityKind,
            _description: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn stagnant_deal(id: &str, stage: DealStage, attempts: u32, days_stale: i64) -> Deal {
        let now = Utc::now();
        let mut deal = Deal::enter_pipeline(
            CampaignId("camp-1".to_string()),
            stage,
            LeadUrgency::Low,
            now - Duration::days(days_stale + 30),
        );
        deal.id = DealId(id.to_string());
        deal.contact_attempts = attempts;
        deal.last_contact_at = Some(now - Duration::days(days_stale));
        deal
    }

    fn sweeper(store: Arc<FakeDealStore>) -> StagnationSweeper {
        let transitions =
            Arc::new(StageTransitionService::new(store.clone(), Arc::new(NullActivityLog)));
        StagnationSweeper::new(store, transitions)
    }

    #[test]
    fn criteria_reflect_the_policy_constants() {
        let now = Utc::now();
        let criteria = SweepCriteria::effective_at(now);

        assert_eq!(criteria.min_contact_attempts, MIN_CONTACT_ATTEMPTS);
        assert_eq!(criteria.stale_before, now - Duration::days(STAGNATION_THRESHOLD_DAYS));
    }

    #[tokio::test]
    async fn stale_qualified_deal_is_archived_with_the_auto_loss_reason() {
        let store = Arc::new(FakeDealStore::default());
        store.insert(stagnant_deal("stale", DealStage::Qualified, 6, 8));

        let report = sweeper(store.clone()).run(Utc::now()).await.expect("sweep");

        assert_eq!(report.examined, 1);
        assert_eq!(report.archived, 1);
        assert_eq!(report.failed, 0);

        let archived = store.get("stale").expect("deal");
        assert_eq!(archived.stage, DealStage::Lost);
        assert_eq!(archived.loss_reason.as_deref(), Some(AUTO_LOSS_REASON));
        assert!(archived.lost_at.is_some());
    }

    #[tokio::test]
    async fn under_threshold_deals_are_never_candidates() {
        let store = Arc::new(FakeDealStore::default());
        store.insert(stagnant_deal("few-attempts", DealStage::Qualified, 5, 90));
        store.insert(stagnant_deal("fresh-contact", DealStage::Qualified, 9, 2));
        store.insert(stagnant_deal("paid", DealStage::ConsultationPaid, 9, 90));

        let report = sweeper(store.clone()).run(Utc::now()).await.expect("sweep");

        assert_eq!(report.examined, 0);
        assert_eq!(store.get("few-attempts").expect("deal").stage, DealStage::Qualified);
        assert_eq!(store.get("paid").expect("deal").stage, DealStage::ConsultationPaid);
    }

    #[tokio::test]
    async fn one_failing_candidate_does_not_abort_the_batch() {
        let mut store = FakeDealStore::default();
        store.fail_saves_for = Some("poisoned".to_string());
        let store = Arc::new(store);
        store.insert(stagnant_deal("poisoned", DealStage::InService, 7, 10));
        store.insert(stagnant_deal("healthy", DealStage::Qualified, 7, 10));

        let report = sweeper(store.clone()).run(Utc::now()).await.expect("sweep");

        assert_eq!(report.examined, 2);
        assert_eq!(report.archived, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(store.get("healthy").expect("deal").stage, DealStage::Lost);
        assert_eq!(store.get("poisoned").expect("deal").stage, DealStage::InService);
    }
}
