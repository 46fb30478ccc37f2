use async_trait::async_trait;
use chrono::{DateTime, Utc};

use funil_core::domain::campaign::CampaignId;
use funil_core::domain::deal::{Deal, DealId};
use funil_core::store::{DealStore, StoreError};
use funil_core::sweep::{SweepCriteria, SWEEP_EXEMPT_STAGES};

use super::{deal_from_row, map_sqlx};
use crate::DbPool;

const DEAL_COLUMNS: &str = "id, campaign_id, stage, substage, contact_attempts, lead_urgency, \
     last_contact_at, loss_reason, loss_details, lost_at, created_at, updated_at";

#[derive(Clone)]
pub struct SqlDealStore {
    pool: DbPool,
}

impl SqlDealStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DealStore for SqlDealStore {
    async fn load(&self, id: &DealId) -> Result<Option<Deal>, StoreError> {
        let row = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.as_ref().map(deal_from_row).transpose()
    }

    async fn save(&self, deal: Deal) -> Result<Deal, StoreError> {
        sqlx::query(
            "INSERT INTO deals (id, campaign_id, stage, substage, contact_attempts, \
                 lead_urgency, last_contact_at, loss_reason, loss_details, lost_at, \
                 created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(id) DO UPDATE SET \
                 campaign_id = excluded.campaign_id, \
                 stage = excluded.stage, \
                 substage = excluded.substage, \
                 contact_attempts = excluded.contact_attempts, \
                 lead_urgency = excluded.lead_urgency, \
                 last_contact_at = excluded.last_contact_at, \
                 loss_reason = excluded.loss_reason, \
                 loss_details = excluded.loss_details, \
                 lost_at = excluded.lost_at, \
                 updated_at = excluded.updated_at",
        )
        .bind(&deal.id.0)
        .bind(&deal.campaign_id.0)
        .bind(deal.stage.as_str())
        .bind(&deal.substage)
        .bind(deal.contact_attempts as i64)
        .bind(deal.lead_urgency.as_str())
        .bind(deal.last_contact_at)
        .bind(&deal.loss_reason)
        .bind(&deal.loss_details)
        .bind(deal.lost_at)
        .bind(deal.created_at)
        .bind(deal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(deal)
    }

    async fn record_contact_attempt(
        &self,
        id: &DealId,
        at: DateTime<Utc>,
    ) -> Result<Deal, StoreError> {
        // The increment runs storage-side so concurrent attempts for the same
        // deal cannot lose updates.
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let result = sqlx::query(
            "UPDATE deals SET contact_attempts = contact_attempts + 1, \
                 last_contact_at = ?2, updated_at = ?2 \
             WHERE id = ?1",
        )
        .bind(&id.0)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let row = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1"))
            .bind(&id.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        let deal = deal_from_row(&row)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(deal)
    }

    async fn list_active(
        &self,
        campaign_id: Option<&CampaignId>,
    ) -> Result<Vec<Deal>, StoreError> {
        let rows = match campaign_id {
            Some(campaign_id) => {
                sqlx::query(&format!(
                    "SELECT {DEAL_COLUMNS} FROM deals \
                     WHERE campaign_id = ?1 \
                       AND stage NOT IN ('won', 'lost', 'consultation_done') \
                     ORDER BY created_at",
                ))
                .bind(&campaign_id.0)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {DEAL_COLUMNS} FROM deals \
                     WHERE stage NOT IN ('won', 'lost', 'consultation_done') \
                     ORDER BY created_at",
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx)?;

        rows.iter().map(deal_from_row).collect()
    }

    async fn list_stagnant_candidates(
        &self,
        criteria: &SweepCriteria,
    ) -> Result<Vec<Deal>, StoreError> {
        let exempt = SWEEP_EXEMPT_STAGES
            .iter()
            .map(|stage| format!("'{}'", stage.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let rows = sqlx::query(&format!(
            "SELECT {DEAL_COLUMNS} FROM deals \
             WHERE stage NOT IN ({exempt}) \
               AND contact_attempts >= ?1 \
               AND ( \
                     (last_contact_at IS NOT NULL AND datetime(last_contact_at) < datetime(?2)) \
                  OR (last_contact_at IS NULL AND datetime(created_at) < datetime(?2)) \
                   ) \
             ORDER BY created_at",
        ))
        .bind(criteria.min_contact_attempts as i64)
        .bind(criteria.stale_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(deal_from_row).collect()
    }
}
