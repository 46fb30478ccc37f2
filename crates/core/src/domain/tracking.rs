use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deal::DealId;
use crate::domain::followup::FollowupStageId;

/// Lifecycle of one (deal, follow-up stage) pair. Pending is the only state
/// that accepts further transitions; Completed and Skipped are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
}

impl TrackingStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

/// Whether the lead answered the follow-up message. Explicit tri-state so an
/// unrecorded outcome is distinguishable from a recorded "did not respond".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseState {
    #[default]
    Unrecorded,
    Responded,
    NoResponse,
}

impl ResponseState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unrecorded" => Some(Self::Unrecorded),
            "responded" => Some(Self::Responded),
            "no_response" => Some(Self::NoResponse),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrecorded => "unrecorded",
            Self::Responded => "responded",
            Self::NoResponse => "no_response",
        }
    }
}

/// One checked/unchecked checklist slot. A check carries the instant it was
/// made; an uncheck clears it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistMark {
    pub value: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

/// Mutable progress state of one (deal, follow-up stage) pair, keyed uniquely
/// by that pair. Created lazily on first write, never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub deal_id: DealId,
    pub stage_id: FollowupStageId,
    pub message_sent_at: Option<DateTime<Utc>>,
    pub response: ResponseState,
    pub response_content: Option<String>,
    pub message_responded_at: Option<DateTime<Utc>>,
    pub checklist: BTreeMap<u32, ChecklistMark>,
    pub status: TrackingStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub skipped_at: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingRecord {
    pub fn new(deal_id: DealId, stage_id: FollowupStageId, now: DateTime<Utc>) -> Self {
        Self {
            deal_id,
            stage_id,
            message_sent_at: None,
            response: ResponseState::Unrecorded,
            response_content: None,
            message_responded_at: None,
            checklist: BTreeMap::new(),
            status: TrackingStatus::Pending,
            completed_at: None,
            skipped_at: None,
            skip_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TrackingStatus::Pending
    }

    pub fn is_checked(&self, index: u32) -> bool {
        self.checklist.get(&index).is_some_and(|mark| mark.value)
    }

    /// Indexes in `0..action_count` that are missing or unchecked.
    pub fn unchecked_actions(&self, action_count: usize) -> Vec<u32> {
        (0..action_count as u32).filter(|index| !self.is_checked(*index)).collect()
    }
}
