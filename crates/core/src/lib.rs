pub mod config;
pub mod domain;
pub mod errors;
pub mod followup;
pub mod monitor;
pub mod pipeline;
pub mod sla;
pub mod store;
pub mod sweep;

pub use domain::activity::{ActivityEntry, ActivityKind};
pub use domain::campaign::{CampaignId, CampaignStage, CampaignStageId};
pub use domain::deal::{Deal, DealId, DealStage, LeadUrgency};
pub use domain::followup::{
    ActionKind, ChecklistAction, DelayUnit, FollowupStage, FollowupStageId, FollowupTiming,
};
pub use domain::tracking::{
    ChecklistMark, ResponseState, TrackingRecord, TrackingStatus,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use followup::sequence::{current_stage, records_by_stage};
pub use followup::tracking::{FollowupTrackingService, MIN_SKIP_REASON_CHARS, NO_RESPONSE_MARKER};
pub use monitor::{classify, SlaSnapshot, MONITOR_POLL_INTERVAL_SECS};
pub use pipeline::StageTransitionService;
pub use sla::{assess, urgency_level, SlaAssessment, SlaLevel};
pub use store::{ActivityLog, DealStore, FollowupStageSource, StoreError, TrackingStore};
pub use sweep::{
    StagnationSweeper, SweepCriteria, SweepReport, AUTO_LOSS_REASON, MIN_CONTACT_ATTEMPTS,
    STAGNATION_THRESHOLD_DAYS,
};
