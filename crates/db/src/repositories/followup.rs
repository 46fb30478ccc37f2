use async_trait::async_trait;

use funil_core::domain::campaign::CampaignId;
use funil_core::domain::followup::FollowupStage;
use funil_core::store::{FollowupStageSource, StoreError};

use super::{followup_stage_from_row, map_sqlx};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlFollowupStageSource {
    pool: DbPool,
}

impl SqlFollowupStageSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowupStageSource for SqlFollowupStageSource {
    async fn list_for_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<FollowupStage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, campaign_id, position, title, timing, message_template, auto_send, \
                 attach_pdf, request_media, actions \
             FROM followup_stages WHERE campaign_id = ?1 ORDER BY position",
        )
        .bind(&campaign_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(followup_stage_from_row).collect()
    }
}
