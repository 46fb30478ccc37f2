use async_trait::async_trait;

use funil_core::domain::deal::DealId;
use funil_core::domain::followup::FollowupStageId;
use funil_core::domain::tracking::TrackingRecord;
use funil_core::store::{StoreError, TrackingStore};

use super::{map_sqlx, tracking_from_row};
use crate::DbPool;

const TRACKING_COLUMNS: &str = "deal_id, stage_id, message_sent_at, response, response_content, \
     message_responded_at, checklist, status, completed_at, skipped_at, skip_reason, \
     created_at, updated_at";

#[derive(Clone)]
pub struct SqlTrackingStore {
    pool: DbPool,
}

impl SqlTrackingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackingStore for SqlTrackingStore {
    async fn load(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
    ) -> Result<Option<TrackingRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRACKING_COLUMNS} FROM followup_tracking \
             WHERE deal_id = ?1 AND stage_id = ?2",
        ))
        .bind(&deal_id.0)
        .bind(&stage_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.as_ref().map(tracking_from_row).transpose()
    }

    async fn upsert(&self, record: TrackingRecord) -> Result<TrackingRecord, StoreError> {
        let checklist = serde_json::to_string(&record.checklist)
            .map_err(|error| StoreError::Decode(format!("tracking checklist: {error}")))?;

        // Keyed on (deal_id, stage_id): a second write for the same pair
        // updates the existing row, it never duplicates it. created_at is
        // kept from the first write.
        sqlx::query(
            "INSERT INTO followup_tracking (deal_id, stage_id, message_sent_at, response, \
                 response_content, message_responded_at, checklist, status, completed_at, \
                 skipped_at, skip_reason, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT(deal_id, stage_id) DO UPDATE SET \
                 message_sent_at = excluded.message_sent_at, \
                 response = excluded.response, \
                 response_content = excluded.response_content, \
                 message_responded_at = excluded.message_responded_at, \
                 checklist = excluded.checklist, \
                 status = excluded.status, \
                 completed_at = excluded.completed_at, \
                 skipped_at = excluded.skipped_at, \
                 skip_reason = excluded.skip_reason, \
                 updated_at = excluded.updated_at",
        )
        .bind(&record.deal_id.0)
        .bind(&record.stage_id.0)
        .bind(record.message_sent_at)
        .bind(record.response.as_str())
        .bind(&record.response_content)
        .bind(record.message_responded_at)
        .bind(&checklist)
        .bind(record.status.as_str())
        .bind(record.completed_at)
        .bind(record.skipped_at)
        .bind(&record.skip_reason)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(record)
    }

    async fn list_for_deal(&self, deal_id: &DealId) -> Result<Vec<TrackingRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRACKING_COLUMNS} FROM followup_tracking \
             WHERE deal_id = ?1 ORDER BY created_at",
        ))
        .bind(&deal_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(tracking_from_row).collect()
    }
}
