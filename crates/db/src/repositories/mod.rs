use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use funil_core::domain::campaign::CampaignId;
use funil_core::domain::deal::{Deal, DealId, DealStage, LeadUrgency};
use funil_core::domain::followup::{ChecklistAction, FollowupStage, FollowupStageId, FollowupTiming};
use funil_core::domain::tracking::{ResponseState, TrackingRecord, TrackingStatus};
use funil_core::store::StoreError;

pub mod activity;
pub mod deal;
pub mod followup;
pub mod memory;
pub mod tracking;

pub use activity::SqlActivityLog;
pub use deal::SqlDealStore;
pub use followup::SqlFollowupStageSource;
pub use memory::{
    InMemoryActivityLog, InMemoryDealStore, InMemoryFollowupStageSource, InMemoryTrackingStore,
};
pub use tracking::SqlTrackingStore;

pub(crate) fn map_sqlx(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Backend(other.to_string()),
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|error| StoreError::Decode(format!("column `{name}`: {error}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|error| StoreError::Decode(format!("{what}: {error}")))
}

pub(crate) fn deal_from_row(row: &SqliteRow) -> Result<Deal, StoreError> {
    let stage_raw: String = column(row, "stage")?;
    let stage = DealStage::parse(&stage_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown deal stage `{stage_raw}`")))?;
    let urgency_raw: String = column(row, "lead_urgency")?;

    Ok(Deal {
        id: DealId(column(row, "id")?),
        campaign_id: CampaignId(column(row, "campaign_id")?),
        stage,
        substage: column(row, "substage")?,
        contact_attempts: column::<i64>(row, "contact_attempts")?.max(0) as u32,
        lead_urgency: LeadUrgency::parse(&urgency_raw),
        last_contact_at: column(row, "last_contact_at")?,
        loss_reason: column(row, "loss_reason")?,
        loss_details: column(row, "loss_details")?,
        lost_at: column(row, "lost_at")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn tracking_from_row(row: &SqliteRow) -> Result<TrackingRecord, StoreError> {
    let status_raw: String = column(row, "status")?;
    let status = TrackingStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown tracking status `{status_raw}`")))?;
    let response_raw: String = column(row, "response")?;
    let response = ResponseState::parse(&response_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown response state `{response_raw}`")))?;
    let checklist_raw: String = column(row, "checklist")?;

    Ok(TrackingRecord {
        deal_id: DealId(column(row, "deal_id")?),
        stage_id: FollowupStageId(column(row, "stage_id")?),
        message_sent_at: column(row, "message_sent_at")?,
        response,
        response_content: column(row, "response_content")?,
        message_responded_at: column(row, "message_responded_at")?,
        checklist: decode_json(&checklist_raw, "tracking checklist")?,
        status,
        completed_at: column(row, "completed_at")?,
        skipped_at: column(row, "skipped_at")?,
        skip_reason: column(row, "skip_reason")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn followup_stage_from_row(row: &SqliteRow) -> Result<FollowupStage, StoreError> {
    let timing_raw: String = column(row, "timing")?;
    let timing: FollowupTiming = decode_json(&timing_raw, "follow-up timing")?;
    let actions_raw: String = column(row, "actions")?;
    let actions: Vec<ChecklistAction> = decode_json(&actions_raw, "follow-up actions")?;

    Ok(FollowupStage {
        id: FollowupStageId(column(row, "id")?),
        campaign_id: CampaignId(column(row, "campaign_id")?),
        position: column::<i64>(row, "position")?.max(0) as u32,
        title: column(row, "title")?,
        timing,
        message_template: column(row, "message_template")?,
        auto_send: column(row, "auto_send")?,
        attach_pdf: column(row, "attach_pdf")?,
        request_media: column(row, "request_media")?,
        actions,
    })
}
