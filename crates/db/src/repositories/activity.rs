use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use funil_core::domain::activity::ActivityKind;
use funil_core::domain::deal::DealId;
use funil_core::store::{ActivityLog, StoreError};

use super::map_sqlx;
use crate::DbPool;

#[derive(Clone)]
pub struct SqlActivityLog {
    pool: DbPool,
}

impl SqlActivityLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for SqlActivityLog {
    async fn append(
        &self,
        deal_id: &DealId,
        kind: ActivityKind,
        description: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO activity_log (id, deal_id, kind, description, occurred_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&deal_id.0)
        .bind(kind.as_str())
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}
