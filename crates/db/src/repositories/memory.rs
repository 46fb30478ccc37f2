use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use funil_core::domain::activity::{ActivityEntry, ActivityKind};
use funil_core::domain::campaign::CampaignId;
use funil_core::domain::deal::{Deal, DealId};
use funil_core::domain::followup::{FollowupStage, FollowupStageId};
use funil_core::domain::tracking::TrackingRecord;
use funil_core::sla::is_sla_exempt;
use funil_core::store::{ActivityLog, DealStore, FollowupStageSource, StoreError, TrackingStore};
use funil_core::sweep::{SweepCriteria, SWEEP_EXEMPT_STAGES};

/// In-memory stores backing local development and service-level tests. They
/// honor the same contracts as the SQL stores, including the atomic
/// contact-attempt increment and the (deal, stage) upsert key.
#[derive(Default)]
pub struct InMemoryDealStore {
    deals: RwLock<HashMap<String, Deal>>,
}

#[async_trait]
impl DealStore for InMemoryDealStore {
    async fn load(&self, id: &DealId) -> Result<Option<Deal>, StoreError> {
        let deals = self.deals.read().await;
        Ok(deals.get(&id.0).cloned())
    }

    async fn save(&self, deal: Deal) -> Result<Deal, StoreError> {
        let mut deals = self.deals.write().await;
        deals.insert(deal.id.0.clone(), deal.clone());
        Ok(deal)
    }

    async fn record_contact_attempt(
        &self,
        id: &DealId,
        at: DateTime<Utc>,
    ) -> Result<Deal, StoreError> {
        let mut deals = self.deals.write().await;
        let deal = deals.get_mut(&id.0).ok_or(StoreError::NotFound)?;
        deal.contact_attempts += 1;
        deal.last_contact_at = Some(at);
        deal.updated_at = at;
        Ok(deal.clone())
    }

    async fn list_active(
        &self,
        campaign_id: Option<&CampaignId>,
    ) -> Result<Vec<Deal>, StoreError> {
        let deals = self.deals.read().await;
        let mut active: Vec<Deal> = deals
            .values()
            .filter(|deal| {
                campaign_id.map_or(true, |campaign| deal.campaign_id == *campaign)
                    && !is_sla_exempt(deal)
            })
            .cloned()
            .collect();
        active.sort_by_key(|deal| deal.created_at);
        Ok(active)
    }

    async fn list_stagnant_candidates(
        &self,
        criteria: &SweepCriteria,
    ) -> Result<Vec<Deal>, StoreError> {
        let deals = self.deals.read().await;
        let mut candidates: Vec<Deal> = deals
            .values()
            .filter(|deal| {
                !SWEEP_EXEMPT_STAGES.contains(&deal.stage)
                    && deal.contact_attempts >= criteria.min_contact_attempts
                    && deal.sla_base_time() < criteria.stale_before
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|deal| deal.created_at);
        Ok(candidates)
    }
}

#[derive(Default)]
pub struct InMemoryTrackingStore {
    records: RwLock<HashMap<(String, String), TrackingRecord>>,
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn load(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
    ) -> Result<Option<TrackingRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&(deal_id.0.clone(), stage_id.0.clone())).cloned())
    }

    async fn upsert(&self, record: TrackingRecord) -> Result<TrackingRecord, StoreError> {
        let mut records = self.records.write().await;
        records.insert((record.deal_id.0.clone(), record.stage_id.0.clone()), record.clone());
        Ok(record)
    }

    async fn list_for_deal(&self, deal_id: &DealId) -> Result<Vec<TrackingRecord>, StoreError> {
        let records = self.records.read().await;
        let mut found: Vec<TrackingRecord> =
            records.values().filter(|record| record.deal_id == *deal_id).cloned().collect();
        found.sort_by_key(|record| record.created_at);
        Ok(found)
    }
}

pub struct InMemoryFollowupStageSource {
    stages: Vec<FollowupStage>,
}

impl InMemoryFollowupStageSource {
    pub fn with_stages(mut stages: Vec<FollowupStage>) -> Self {
        stages.sort_by_key(|stage| stage.position);
        Self { stages }
    }
}

#[async_trait]
impl FollowupStageSource for InMemoryFollowupStageSource {
    async fn list_for_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<FollowupStage>, StoreError> {
        Ok(self
            .stages
            .iter()
            .filter(|stage| stage.campaign_id == *campaign_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryActivityLog {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl InMemoryActivityLog {
    pub fn entries(&self) -> Vec<ActivityEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn append(
        &self,
        deal_id: &DealId,
        kind: ActivityKind,
        description: &str,
    ) -> Result<(), StoreError> {
        let entry = ActivityEntry {
            id: Uuid::new_v4().to_string(),
            deal_id: deal_id.clone(),
            kind,
            description: description.to_string(),
            occurred_at: Utc::now(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use funil_core::domain::activity::ActivityKind;
    use funil_core::domain::campaign::CampaignId;
    use funil_core::domain::deal::{Deal, DealId, DealStage, LeadUrgency};
    use funil_core::domain::followup::FollowupStageId;
    use funil_core::domain::tracking::TrackingRecord;
    use funil_core::store::{ActivityLog, DealStore, TrackingStore};
    use funil_core::sweep::SweepCriteria;

    use super::{InMemoryActivityLog, InMemoryDealStore, InMemoryTrackingStore};

    fn deal(id: &str, stage: DealStage) -> Deal {
        let mut deal = Deal::enter_pipeline(
            CampaignId("camp-1".to_string()),
            stage,
            LeadUrgency::Medium,
            Utc::now(),
        );
        deal.id = DealId(id.to_string());
        deal
    }

    #[tokio::test]
    async fn in_memory_deal_store_round_trip() {
        let store = InMemoryDealStore::default();
        let deal = deal("deal-1", DealStage::LeadQuiz);

        store.save(deal.clone()).await.expect("save deal");
        let found = store.load(&deal.id).await.expect("load deal");

        assert_eq!(found, Some(deal));
    }

    #[tokio::test]
    async fn contact_attempt_increment_is_visible_on_next_load() {
        let store = InMemoryDealStore::default();
        let deal = deal("deal-1", DealStage::InService);
        let id = deal.id.clone();
        store.save(deal).await.expect("save deal");

        store.record_contact_attempt(&id, Utc::now()).await.expect("first");
        store.record_contact_attempt(&id, Utc::now()).await.expect("second");

        let found = store.load(&id).await.expect("load").expect("present");
        assert_eq!(found.contact_attempts, 2);
    }

    #[tokio::test]
    async fn stagnant_candidates_respect_the_attempt_floor() {
        let store = InMemoryDealStore::default();
        let mut stale = deal("stale", DealStage::Qualified);
        stale.contact_attempts = 6;
        stale.last_contact_at = Some(Utc::now() - Duration::days(8));
        let mut few = deal("few", DealStage::Qualified);
        few.contact_attempts = 2;
        few.last_contact_at = Some(Utc::now() - Duration::days(90));
        store.save(stale).await.expect("save stale");
        store.save(few).await.expect("save few");

        let candidates = store
            .list_stagnant_candidates(&SweepCriteria::effective_at(Utc::now()))
            .await
            .expect("candidates");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id.0, "stale");
    }

    #[tokio::test]
    async fn in_memory_tracking_store_upserts_on_the_pair_key() {
        let store = InMemoryTrackingStore::default();
        let deal_id = DealId("deal-1".to_string());
        let stage_id = FollowupStageId("fu-1".to_string());

        let first = TrackingRecord::new(deal_id.clone(), stage_id.clone(), Utc::now());
        let mut second = first.clone();
        second.message_sent_at = Some(Utc::now());

        store.upsert(first).await.expect("insert");
        store.upsert(second.clone()).await.expect("update");

        let listed = store.list_for_deal(&deal_id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], second);
    }

    #[tokio::test]
    async fn activity_log_keeps_append_order() {
        let log = InMemoryActivityLog::default();
        let deal_id = DealId("deal-1".to_string());

        log.append(&deal_id, ActivityKind::StageChanged, "first").await.expect("append");
        log.append(&deal_id, ActivityKind::ContactAttempt, "second").await.expect("append");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "first");
        assert_eq!(entries[1].kind, ActivityKind::ContactAttempt);
    }
}
