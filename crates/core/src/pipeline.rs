use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::activity::ActivityKind;
use crate::domain::deal::{Deal, DealId, DealStage};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{ActivityLog, DealStore, StoreError};

/// Applies deal stage changes, stamps timestamps, and emits activity entries.
///
/// Persistence errors propagate unmodified; no retries happen here. Activity
/// appends are best-effort and degrade to a warning log.
pub struct StageTransitionService {
    deals: Arc<dyn DealStore>,
    activity: Arc<dyn ActivityLog>,
}

impl StageTransitionService {
    pub fn new(deals: Arc<dyn DealStore>, activity: Arc<dyn ActivityLog>) -> Self {
        Self { deals, activity }
    }

    pub async fn advance_stage(
        &self,
        deal_id: &DealId,
        new_stage: DealStage,
        substage: Option<String>,
    ) -> Result<Deal, ApplicationError> {
        let mut deal = self.load(deal_id).await?;
        let from = deal.stage;

        deal.stage = new_stage;
        deal.substage = substage;
        deal.updated_at = Utc::now();

        let deal = self.deals.save(deal).await?;
        self.log(
            deal_id,
            ActivityKind::StageChanged,
            &format!("stage changed from {from} to {new_stage}"),
        )
        .await;
        Ok(deal)
    }

    /// Increments `contact_attempts` by exactly one and stamps
    /// `last_contact_at`. The increment happens storage-side so concurrent
    /// attempts for the same deal never lose updates.
    pub async fn record_contact_attempt(&self, deal_id: &DealId) -> Result<Deal, ApplicationError> {
        let deal = match self.deals.record_contact_attempt(deal_id, Utc::now()).await {
            Ok(deal) => deal,
            Err(StoreError::NotFound) => {
                return Err(ApplicationError::NotFound { entity: "deal", id: deal_id.0.clone() });
            }
            Err(error) => return Err(error.into()),
        };

        self.log(
            deal_id,
            ActivityKind::ContactAttempt,
            &format!("contact attempt #{}", deal.contact_attempts),
        )
        .await;
        Ok(deal)
    }

    /// Moves the deal to `lost` and records why. Repeated calls overwrite the
    /// reason and timestamp; a deal already won is rejected.
    pub async fn mark_lost(
        &self,
        deal_id: &DealId,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Deal, ApplicationError> {
        let mut deal = self.load(deal_id).await?;
        if deal.stage == DealStage::Won {
            return Err(DomainError::DealAlreadyWon.into());
        }

        let now = Utc::now();
        deal.stage = DealStage::Lost;
        deal.substage = None;
        deal.loss_reason = Some(reason.to_owned());
        deal.loss_details = details.map(str::to_owned);
        deal.lost_at = Some(now);
        deal.updated_at = now;

        let deal = self.deals.save(deal).await?;
        self.log(deal_id, ActivityKind::MarkedLost, &format!("deal lost: {reason}")).await;
        Ok(deal)
    }

    /// Clears loss fields and re-enters the pipeline at `target_stage`.
    /// Precondition: the deal is currently `lost`; anything else is returned
    /// unchanged (callers are expected not to offer the action otherwise).
    pub async fn reactivate(
        &self,
        deal_id: &DealId,
        target_stage: DealStage,
    ) -> Result<Deal, ApplicationError> {
        let mut deal = self.load(deal_id).await?;
        if deal.stage != DealStage::Lost {
            debug!(deal_id = %deal_id.0, stage = %deal.stage, "reactivate skipped: deal is not lost");
            return Ok(deal);
        }

        deal.stage = target_stage;
        deal.substage = None;
        deal.loss_reason = None;
        deal.loss_details = None;
        deal.lost_at = None;
        deal.updated_at = Utc::now();

        let deal = self.deals.save(deal).await?;
        self.log(
            deal_id,
            ActivityKind::Reactivated,
            &format!("deal reactivated into {target_stage}"),
        )
        .await;
        Ok(deal)
    }

    async fn load(&self, deal_id: &DealId) -> Result<Deal, ApplicationError> {
        self.deals
            .load(deal_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound { entity: "deal", id: deal_id.0.clone() })
    }

    async fn log(&self, deal_id: &DealId, kind: ActivityKind, description: &str) {
        if let Err(error) = self.activity.append(deal_id, kind, description).await {
            warn!(deal_id = %deal_id.0, error = %error, "activity log append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::domain::activity::ActivityKind;
    use crate::domain::campaign::CampaignId;
    use crate::domain::deal::{Deal, DealId, DealStage, LeadUrgency};
    use crate::errors::{ApplicationError, DomainError};
    use crate::store::{ActivityLog, DealStore, StoreError};
    use crate::sweep::SweepCriteria;

    use super::StageTransitionService;

    #[derive(Default)]
    struct FakeDealStore {
        deals: Mutex<HashMap<String, Deal>>,
    }

    impl FakeDealStore {
        fn with_deal(deal: Deal) -> Arc<Self> {
            let store = Self::default();
            store.deals.lock().expect("lock").insert(deal.id.0.clone(), deal);
            Arc::new(store)
        }
    }

    #[async_trait]
    impl DealStore for FakeDealStore {
        async fn load(&self, id: &DealId) -> Result<Option<Deal>, StoreError> {
            Ok(self.deals.lock().expect("lock").get(&id.0).cloned())
        }

        async fn save(&self, deal: Deal) -> Result<Deal, StoreError> {
            self.deals.lock().expect("lock").insert(deal.id.0.clone(), deal.clone());
            Ok(deal)
        }

        async fn record_contact_attempt(
            &self,
            id: &DealId,
            at: DateTime<Utc>,
        ) -> Result<Deal, StoreError> {
            let mut deals = self.deals.lock().expect("lock");
            let deal = deals.get_mut(&id.0).ok_or(StoreError::NotFound)?;
            deal.contact_attempts += 1;
            deal.last_contact_at = Some(at);
            deal.updated_at = at;
            Ok(deal.clone())
        }

        async fn list_active(
            &self,
            _campaign_id: Option<&CampaignId>,
        ) -> Result<Vec<Deal>, StoreError> {
            Ok(self.deals.lock().expect("lock").values().cloned().collect())
        }

        async fn list_stagnant_candidates(
            &self,
            _criteria: &SweepCriteria,
        ) -> Result<Vec<Deal>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingActivityLog {
        entries: Mutex<Vec<(ActivityKind, String)>>,
    }

    #[async_trait]
    impl ActivityLog for RecordingActivityLog {
        async fn append(
            &self,
            _deal_id: &DealId,
            kind: ActivityKind,
            description: &str,
        ) -> Result<(), StoreError> {
            self.entries.lock().expect("lock").push((kind, description.to_string()));
            Ok(())
        }
    }

    struct FailingActivityLog;

    #[async_trait]
    impl ActivityLog for FailingActivityLog {
        async fn append(
            &self,
            _deal_id: &DealId,
            _kind: ActivityKind,
            _description: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("audit table unavailable".to_string()))
        }
    }

    fn deal(stage: DealStage) -> Deal {
        Deal::enter_pipeline(
            CampaignId("camp-1".to_string()),
            stage,
            LeadUrgency::Medium,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn advance_stage_persists_and_logs_the_transition() {
        let deal = deal(DealStage::LeadQuiz);
        let id = deal.id.clone();
        let store = FakeDealStore::with_deal(deal);
        let activity = Arc::new(RecordingActivityLog::default());
        let service = StageTransitionService::new(store.clone(), activity.clone());

        let updated = service
            .advance_stage(&id, DealStage::Qualified, Some("hot".to_string()))
            .await
            .expect("advance stage");

        assert_eq!(updated.stage, DealStage::Qualified);
        assert_eq!(updated.substage.as_deref(), Some("hot"));

        let entries = activity.entries.lock().expect("lock");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, ActivityKind::StageChanged);
        assert!(entries[0].1.contains("lead_quiz"));
        assert!(entries[0].1.contains("qualified"));
    }

    #[tokio::test]
    async fn contact_attempts_increment_by_exactly_one() {
        let deal = deal(DealStage::InService);
        let id = deal.id.clone();
        let store = FakeDealStore::with_deal(deal);
        let activity = Arc::new(RecordingActivityLog::default());
        let service = StageTransitionService::new(store, activity.clone());

        let first = service.record_contact_attempt(&id).await.expect("first attempt");
        let second = service.record_contact_attempt(&id).await.expect("second attempt");

        assert_eq!(first.contact_attempts, 1);
        assert_eq!(second.contact_attempts, 2);
        assert!(second.last_contact_at.is_some());

        let entries = activity.entries.lock().expect("lock");
        assert_eq!(entries[1].1, "contact attempt #2");
    }

    #[tokio::test]
    async fn mark_lost_stamps_reason_and_rejects_won_deals() {
        let lost_candidate = deal(DealStage::Qualified);
        let id = lost_candidate.id.clone();
        let store = FakeDealStore::with_deal(lost_candidate);
        let service = StageTransitionService::new(store, Arc::new(RecordingActivityLog::default()));

        let lost = service
            .mark_lost(&id, "no_response", Some("went quiet after quote"))
            .await
            .expect("mark lost");
        assert_eq!(lost.stage, DealStage::Lost);
        assert_eq!(lost.loss_reason.as_deref(), Some("no_response"));
        assert!(lost.lost_at.is_some());

        let won = deal(DealStage::Won);
        let won_id = won.id.clone();
        let store = FakeDealStore::with_deal(won);
        let service = StageTransitionService::new(store, Arc::new(RecordingActivityLog::default()));

        let error = service.mark_lost(&won_id, "no_response", None).await.expect_err("must reject");
        assert_eq!(error, ApplicationError::Domain(DomainError::DealAlreadyWon));
    }

    #[tokio::test]
    async fn reactivate_clears_loss_fields_only_for_lost_deals() {
        let mut lost = deal(DealStage::Lost);
        lost.loss_reason = Some("no_response".to_string());
        lost.lost_at = Some(Utc::now());
        let id = lost.id.clone();
        let store = FakeDealStore::with_deal(lost);
        let service = StageTransitionService::new(store, Arc::new(RecordingActivityLog::default()));

        let revived = service.reactivate(&id, DealStage::InService).await.expect("reactivate");
        assert_eq!(revived.stage, DealStage::InService);
        assert_eq!(revived.loss_reason, None);
        assert_eq!(revived.lost_at, None);

        let active = deal(DealStage::Qualified);
        let active_id = active.id.clone();
        let store = FakeDealStore::with_deal(active.clone());
        let service = StageTransitionService::new(store, Arc::new(RecordingActivityLog::default()));

        let unchanged = service.reactivate(&active_id, DealStage::InService).await.expect("no-op");
        assert_eq!(unchanged.stage, DealStage::Qualified);
    }

    #[tokio::test]
    async fn activity_log_failure_does_not_fail_the_operation() {
        let deal = deal(DealStage::LeadQuiz);
        let id = deal.id.clone();
        let store = FakeDealStore::with_deal(deal);
        let service = StageTransitionService::new(store, Arc::new(FailingActivityLog));

        let updated = service
            .advance_stage(&id, DealStage::InService, None)
            .await
            .expect("stage change should survive audit failure");
        assert_eq!(updated.stage, DealStage::InService);
    }

    #[tokio::test]
    async fn missing_deal_surfaces_not_found() {
        let store = Arc::new(FakeDealStore::default());
        let service = StageTransitionService::new(store, Arc::new(RecordingActivityLog::default()));

        let error = service
            .record_contact_attempt(&DealId("ghost".to_string()))
            .await
            .expect_err("missing deal");
        assert!(matches!(error, ApplicationError::NotFound { entity: "deal", .. }));
    }
}
