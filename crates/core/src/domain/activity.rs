use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deal::DealId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    StageChanged,
    ContactAttempt,
    MarkedLost,
    Reactivated,
    FollowupSent,
    FollowupResponse,
    FollowupCompleted,
    FollowupSkipped,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StageChanged => "stage_changed",
            Self::ContactAttempt => "contact_attempt",
            Self::MarkedLost => "marked_lost",
            Self::Reactivated => "reactivated",
            Self::FollowupSent => "followup_sent",
            Self::FollowupResponse => "followup_response",
            Self::FollowupCompleted => "followup_completed",
            Self::FollowupSkipped => "followup_skipped",
        }
    }
}

/// One audit-trail line for a deal. Appends are best-effort: a failed append
/// is logged by the caller and never fails the operation that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub deal_id: DealId,
    pub kind: ActivityKind,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}
