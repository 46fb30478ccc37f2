//! Derives which follow-up stage is "current" for a deal.
//!
//! Always a scan over the ordered stage list and the tracking records, never
//! a stored field, so it cannot drift from the underlying data.

use std::collections::HashMap;

use crate::domain::followup::{FollowupStage, FollowupStageId};
use crate::domain::tracking::TrackingRecord;

/// First stage, in sequence order, whose tracking record is absent or still
/// pending. `None` once every stage is completed or skipped.
pub fn current_stage<'a>(
    stages: &'a [FollowupStage],
    records: &HashMap<FollowupStageId, TrackingRecord>,
) -> Option<&'a FollowupStage> {
    stages
        .iter()
        .find(|stage| records.get(&stage.id).map_or(true, |record| !record.is_terminal()))
}

/// Index tracking records by stage for evaluator lookups.
pub fn records_by_stage(
    records: impl IntoIterator<Item = TrackingRecord>,
) -> HashMap<FollowupStageId, TrackingRecord> {
    records.into_iter().map(|record| (record.stage_id.clone(), record)).collect()
}
