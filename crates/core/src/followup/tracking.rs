use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::domain::activity::ActivityKind;
use crate::domain::deal::DealId;
use crate::domain::followup::{FollowupStage, FollowupStageId};
use crate::domain::tracking::{ChecklistMark, ResponseState, TrackingRecord, TrackingStatus};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{ActivityLog, TrackingStore};

/// Minimum length of a skip justification, in chars.
pub const MIN_SKIP_REASON_CHARS: usize = 10;

/// Stored response content when the lead never answered.
pub const NO_RESPONSE_MARKER: &str = "no response";

/// Upsert-only writer for follow-up tracking records.
///
/// Every mutation is a read-modify-write of the full record keyed
/// `(deal_id, stage_id)`: load the current row (or start a fresh pending
/// one), merge the change, write the whole record back. Partial field writes
/// would clobber concurrent writers' fields.
pub struct FollowupTrackingService {
    tracking: Arc<dyn TrackingStore>,
    activity: Arc<dyn ActivityLog>,
}

impl FollowupTrackingService {
    pub fn new(tracking: Arc<dyn TrackingStore>, activity: Arc<dyn ActivityLog>) -> Self {
        Self { tracking, activity }
    }

    /// Stamps `message_sent_at`. Re-sending overwrites the stamp: last write
    /// wins.
    pub async fn register_sent(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
    ) -> Result<TrackingRecord, ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(deal_id, stage_id).await?;
        record.message_sent_at = Some(now);
        record.updated_at = now;

        let record = self.tracking.upsert(record).await?;
        self.log(deal_id, ActivityKind::FollowupSent, &format!("follow-up {} sent", stage_id.0))
            .await;
        Ok(record)
    }

    /// Records whether the lead answered. A negative outcome stores the fixed
    /// no-response marker instead of leaving the content blank.
    pub async fn register_response(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
        responded: bool,
        content: Option<String>,
    ) -> Result<TrackingRecord, ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(deal_id, stage_id).await?;

        if responded {
            record.response = ResponseState::Responded;
            record.response_content = content;
        } else {
            record.response = ResponseState::NoResponse;
            record.response_content = Some(
                content
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| NO_RESPONSE_MARKER.to_string()),
            );
        }
        record.message_responded_at = Some(now);
        record.updated_at = now;

        let record = self.tracking.upsert(record).await?;
        self.log(
            deal_id,
            ActivityKind::FollowupResponse,
            &format!(
                "follow-up {} response recorded: {}",
                stage_id.0,
                record.response.as_str()
            ),
        )
        .await;
        Ok(record)
    }

    /// Merges one checklist slot into the record. A check stores the instant;
    /// an uncheck clears it. Every other field on the record is preserved.
    pub async fn toggle_checklist_item(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
        action_index: u32,
        checked: bool,
    ) -> Result<TrackingRecord, ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(deal_id, stage_id).await?;

        let mark = if checked {
            ChecklistMark { value: true, checked_at: Some(now) }
        } else {
            ChecklistMark { value: false, checked_at: None }
        };
        record.checklist.insert(action_index, mark);
        record.updated_at = now;

        Ok(self.tracking.upsert(record).await?)
    }

    /// Closes the stage as completed. Hard precondition: every one of the
    /// stage's checklist actions must be checked; the store refuses even if a
    /// client forgot to disable the control.
    pub async fn complete_stage(
        &self,
        deal_id: &DealId,
        stage: &FollowupStage,
    ) -> Result<TrackingRecord, ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(deal_id, &stage.id).await?;

        if record.is_terminal() {
            return Err(DomainError::TrackingAlreadyClosed { status: record.status }.into());
        }
        let missing = record.unchecked_actions(stage.actions.len());
        if !missing.is_empty() {
            return Err(DomainError::ChecklistIncomplete { missing }.into());
        }

        record.status = TrackingStatus::Completed;
        record.completed_at = Some(now);
        record.updated_at = now;

        let record = self.tracking.upsert(record).await?;
        self.log(
            deal_id,
            ActivityKind::FollowupCompleted,
            &format!("follow-up {} completed", stage.id.0),
        )
        .await;
        Ok(record)
    }

    /// Closes the stage as skipped. The justification must carry at least
    /// [`MIN_SKIP_REASON_CHARS`] chars.
    pub async fn skip_stage(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
        reason: &str,
    ) -> Result<TrackingRecord, ApplicationError> {
        let length = reason.chars().count();
        if length < MIN_SKIP_REASON_CHARS {
            return Err(DomainError::SkipReasonTooShort {
                length,
                minimum: MIN_SKIP_REASON_CHARS,
            }
            .into());
        }

        let now = Utc::now();
        let mut record = self.load_or_new(deal_id, stage_id).await?;
        if record.is_terminal() {
            return Err(DomainError::TrackingAlreadyClosed { status: record.status }.into());
        }

        record.status = TrackingStatus::Skipped;
        record.skipped_at = Some(now);
        record.skip_reason = Some(reason.to_owned());
        record.updated_at = now;

        let record = self.tracking.upsert(record).await?;
        self.log(
            deal_id,
            ActivityKind::FollowupSkipped,
            &format!("follow-up {} skipped: {reason}", stage_id.0),
        )
        .await;
        Ok(record)
    }

    pub async fn records_for_deal(
        &self,
        deal_id: &DealId,
    ) -> Result<Vec<TrackingRecord>, ApplicationError> {
        Ok(self.tracking.list_for_deal(deal_id).await?)
    }

    async fn load_or_new(
        &self,
        deal_id: &DealId,
        stage_id: &FollowupStageId,
    ) -> Result<TrackingRecord, ApplicationError> {
        let existing = self.tracking.load(deal_id, stage_id).await?;
        Ok(existing
            .unwrap_or_else(|| TrackingRecord::new(deal_id.clone(), stage_id.clone(), Utc::now())))
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
    use chrono::Utc;

    use crate::domain::activity::ActivityKind;
    use crate::domain::campaign::CampaignId;
    use crate::domain::deal::DealId;
    use crate::domain::followup::{
        ActionKind, ChecklistAction, DelayUnit, FollowupStage, FollowupStageId, FollowupTiming,
    };
    use crate::domain::tracking::{ResponseState, TrackingRecord, TrackingStatus};
    use crate::errors::{ApplicationError, DomainError};
    use crate::store::{ActivityLog, StoreError, TrackingStore};

    use super::{FollowupTrackingService, MIN_SKIP_REASON_CHARS, NO_RESPONSE_MARKER};

    #[derive(Default)]
    struct FakeTrackingStore {
        records: Mutex<HashMap<(String, String), TrackingRecord>>,
    }

    #[async_trait]
    impl TrackingStore for FakeTrackingStore {
        async fn load(
            &self,
            deal_id: &DealId,
            stage_id: &FollowupStageId,
        ) -> Result<Option<TrackingRecord>, StoreError> {
            let key = (deal_id.0.clone(), stage_id.0.clone());
            Ok(self.records.lock().expect("lock").get(&key).cloned())
        }

        async fn upsert(&self, record: TrackingRecord) -> Result<TrackingRecord, StoreError> {
            let key = (record.deal_id.0.clone(), record.stage_id.0.clone());
            self.records.lock().expect("lock").insert(key, record.clone());
            Ok(record)
        }

        async fn list_for_deal(&self, deal_id: &DealId) -> Result<Vec<TrackingRecord>, StoreError> {
            Ok(self
                .records
                .lock()
                .expect("lock")
                .values()
                .filter(|record| record.deal_id == *deal_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
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

    fn service() -> FollowupTrackingService {
        FollowupTrackingService::new(
            Arc::new(FakeTrackingStore::default()),
            Arc::new(NullActivityLog),
        )
    }

    fn stage_with_actions(count: usize) -> FollowupStage {
        FollowupStage {
            id: FollowupStageId("fu-1".to_string()),
            campaign_id: CampaignId("camp-1".to_string()),
            position: 1,
            title: "D+1 check-in".to_string(),
            timing: FollowupTiming::Relative { value: 1, unit: DelayUnit::Days },
            message_template: "Oi {{ name }}!".to_string(),
            auto_send: true,
            attach_pdf: false,
            request_media: false,
            actions: (0..count)
                .map(|index| ChecklistAction {
                    kind: ActionKind::SendMessage,
                    label: format!("action {index}"),
                    value: None,
                })
                .collect(),
        }
    }

    fn deal_id() -> DealId {
        DealId("deal-1".to_string())
    }

    fn stage_id() -> FollowupStageId {
        FollowupStageId("fu-1".to_string())
    }

    #[tokio::test]
    async fn register_sent_creates_the_record_lazily_and_resend_overwrites() {
        let service = service();

        let first = service.register_sent(&deal_id(), &stage_id()).await.expect("first send");
        let first_stamp = first.message_sent_at.expect("sent stamp");

        let second = service.register_sent(&deal_id(), &stage_id()).await.expect("re-send");
        let second_stamp = second.message_sent_at.expect("sent stamp");

        assert!(second_stamp >= first_stamp);
        assert_eq!(second.status, TrackingStatus::Pending);
    }

    #[tokio::test]
    async fn negative_response_defaults_to_the_marker_content() {
        let service = service();

        let record = service
            .register_response(&deal_id(), &stage_id(), false, None)
            .await
            .expect("register response");

        assert_eq!(record.response, ResponseState::NoResponse);
        assert_eq!(record.response_content.as_deref(), Some(NO_RESPONSE_MARKER));
        assert!(record.message_responded_at.is_some());
    }

    #[tokio::test]
    async fn positive_response_keeps_the_lead_content() {
        let service = service();

        let record = service
            .register_response(&deal_id(), &stage_id(), true, Some("adorei o resultado".to_string()))
            .await
            .expect("register response");

        assert_eq!(record.response, ResponseState::Responded);
        assert_eq!(record.response_content.as_deref(), Some("adorei o resultado"));
    }

    #[tokio::test]
    async fn checklist_toggle_merges_without_clobbering_other_fields() {
        let service = service();

        service.register_sent(&deal_id(), &stage_id()).await.expect("send");
        let record = service
            .toggle_checklist_item(&deal_id(), &stage_id(), 0, true)
            .await
            .expect("toggle");

        assert!(record.message_sent_at.is_some(), "sent stamp must survive the merge");
        assert!(record.is_checked(0));
    }

    #[tokio::test]
    async fn toggling_the_same_value_twice_is_idempotent() {
        let service = service();

        service.toggle_checklist_item(&deal_id(), &stage_id(), 2, false).await.expect("first");
        let once = service
            .toggle_checklist_item(&deal_id(), &stage_id(), 2, false)
            .await
            .expect("second");

        let mark = once.checklist.get(&2).copied().expect("mark");
        assert!(!mark.value);
        assert_eq!(mark.checked_at, None);
        assert_eq!(once.checklist.len(), 1);

        // On the true path the stamp renews each time; the value is stable.
        let checked_once =
            service.toggle_checklist_item(&deal_id(), &stage_id(), 2, true).await.expect("check");
        let checked_twice =
            service.toggle_checklist_item(&deal_id(), &stage_id(), 2, true).await.expect("recheck");
        assert!(checked_once.is_checked(2) && checked_twice.is_checked(2));
        assert_eq!(checked_twice.checklist.len(), 1);
    }

    #[tokio::test]
    async fn completion_is_rejected_while_any_action_is_unchecked() {
        let service = service();
        let stage = stage_with_actions(3);

        service.toggle_checklist_item(&deal_id(), &stage.id, 0, true).await.expect("check 0");
        service.toggle_checklist_item(&deal_id(), &stage.id, 2, true).await.expect("check 2");

        let error = service.complete_stage(&deal_id(), &stage).await.expect_err("must reject");
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::ChecklistIncomplete { missing: vec![1] })
        );

        // The record stayed pending.
        let record = service
            .toggle_checklist_item(&deal_id(), &stage.id, 1, true)
            .await
            .expect("check 1");
        assert_eq!(record.status, TrackingStatus::Pending);

        let completed = service.complete_stage(&deal_id(), &stage).await.expect("complete");
        assert_eq!(completed.status, TrackingStatus::Completed);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn stage_without_actions_completes_directly() {
        let service = service();
        let stage = stage_with_actions(0);

        let completed = service.complete_stage(&deal_id(), &stage).await.expect("complete");
        assert_eq!(completed.status, TrackingStatus::Completed);
    }

    #[tokio::test]
    async fn short_skip_reasons_are_rejected() {
        let service = service();

        let error = service
            .skip_stage(&deal_id(), &stage_id(), "too busy")
            .await
            .expect_err("must reject");
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::SkipReasonTooShort {
                length: 8,
                minimum: MIN_SKIP_REASON_CHARS
            })
        );

        let skipped = service
            .skip_stage(&deal_id(), &stage_id(), "patient traveling abroad")
            .await
            .expect("skip");
        assert_eq!(skipped.status, TrackingStatus::Skipped);
        assert_eq!(skipped.skip_reason.as_deref(), Some("patient traveling abroad"));
    }

    #[tokio::test]
    async fn terminal_records_refuse_further_closure() {
        let service = service();
        let stage = stage_with_actions(0);

        service.complete_stage(&deal_id(), &stage).await.expect("complete");

        let error = service
            .skip_stage(&deal_id(), &stage.id, "changed my mind about it")
            .await
            .expect_err("must reject");
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::TrackingAlreadyClosed {
                status: TrackingStatus::Completed
            })
        );

        let error = service.complete_stage(&deal_id(), &stage).await.expect_err("must reject");
        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::TrackingAlreadyClosed { .. })
        ));
    }
}
