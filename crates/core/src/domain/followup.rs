use serde::{Deserialize, Serialize};

use crate::domain::campaign::CampaignId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowupStageId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
}

/// When a follow-up step should fire, relative to the sale. The structured
/// form is the source of truth; the formatted string the UI shows is always
/// derived via [`FollowupTiming::describe`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FollowupTiming {
    Relative { value: u32, unit: DelayUnit },
    Specific { day_offset: u32, time_of_day: String },
}

impl FollowupTiming {
    pub fn describe(&self) -> String {
        match self {
            Self::Relative { value, unit } => {
                let unit_label = match (unit, *value) {
                    (DelayUnit::Minutes, 1) => "minute",
                    (DelayUnit::Minutes, _) => "minutes",
                    (DelayUnit::Hours, 1) => "hour",
                    (DelayUnit::Hours, _) => "hours",
                    (DelayUnit::Days, 1) => "day",
                    (DelayUnit::Days, _) => "days",
                };
                format!("{value} {unit_label} after the sale")
            }
            Self::Specific { day_offset, time_of_day } => {
                format!("day {day_offset} at {time_of_day}")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendMessage,
    SendMedia,
    RequestMedia,
    Call,
    Schedule,
    Custom,
}

/// One required task inside a follow-up step's checklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistAction {
    pub kind: ActionKind,
    pub label: String,
    pub value: Option<String>,
}

/// A post-sale outreach step: message template, timing, send flags, and the
/// checklist that must be cleared before the step can be completed.
/// Immutable from the engine's perspective except for its position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowupStage {
    pub id: FollowupStageId,
    pub campaign_id: CampaignId,
    pub position: u32,
    pub title: String,
    pub timing: FollowupTiming,
    pub message_template: String,
    pub auto_send: bool,
    pub attach_pdf: bool,
    pub request_media: bool,
    pub actions: Vec<ChecklistAction>,
}
