use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::activity::ActivityKind;
use crate::domain::campaign::CampaignId;
use crate::domain::deal::{Deal, DealId};
use crate::domain::followup::{FollowupStage, FollowupStageId};
use crate::domain::tracking::TrackingRecord;
use crate::errors::ApplicationError;
use crate::sweep::SweepCriteria;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting concurrent write")]
    Conflict,
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Persistence seam for deals. Implementations must make
/// `record_contact_attempt` a storage-native atomic increment; a
/// read-then-write sequence loses updates under concurrent callers.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn load(&self, id: &DealId) -> Result<Option<Deal>, StoreError>;

    async fn save(&self, deal: Deal) -> Result<Deal, StoreError>;

    /// Atomically increments `contact_attempts` and stamps `last_contact_at`,
    /// returning the updated deal. `StoreError::NotFound` when no such deal.
    async fn record_contact_attempt(
        &self,
        id: &DealId,
        at: DateTime<Utc>,
    ) -> Result<Deal, StoreError>;

    /// Deals still subject to SLA monitoring, optionally scoped to one
    /// campaign. The monitor polls with no scope.
    async fn list_active(&self, campaign_id: Option<&CampaignId>)
        -> Result<Vec<Deal>, StoreError>;

    /// Candidates for the stagnation sweep, filtered storage-side by the
    /// criteria (attempt floor, staleness cutoff, exempt stages).
    async fn list_stagnant_candidates(
        &self,
        criteria: &SweepCriteria,
    ) -> Result<Vec<Deal>, StoreError>;
}

/// Persistence seam for follow-up tracking records, keyed `(deal, stage)`.
/// `upsert` must write the full record against that key: at most one row per
/// pair, never a duplicate insert.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn load(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
    ) -> Result<Option<TrackingRecord>, StoreError>;

    async fn upsert(&self, record: TrackingRecord) -> Result<TrackingRecord, StoreError>;

    async fn list_for_deal(&self, deal_id: &DealId) -> Result<Vec<TrackingRecord>, StoreError>;
}

/// Campaign follow-up sequences, position-ordered.
#[async_trait]
pub trait FollowupStageSource: Send + Sync {
    async fn list_for_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<FollowupStage>, StoreError>;
}

/// Audit-trail appender. Best-effort from the engine's side: callers log and
/// swallow append failures instead of failing the parent operation.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(
        &self,
        deal_id: &DealId,
        kind: ActivityKind,
        description: &str,
    ) -> Result<(), StoreError>;
}
