//! SLA monitor partition: one poll's worth of violation/warning buckets.
//!
//! Stateless recomputation over a deal list: no stored history, no
//! hysteresis. A deal may flap between buckets across polls as time or its
//! urgency changes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::deal::{Deal, DealId};
use crate::sla::{is_sla_exempt, urgency_level, SlaLevel};

/// Reference polling cadence for monitor loops.
pub const MONITOR_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlaSnapshot {
    pub violations: Vec<DealId>,
    pub warnings: Vec<DealId>,
    pub evaluated_at: DateTime<Utc>,
}

impl SlaSnapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self { violations: Vec::new(), warnings: Vec::new(), evaluated_at: now }
    }
}

/// Partition the deals into violation and warning buckets as of `now`.
/// Exempt deals never appear in either bucket.
pub fn classify(deals: &[Deal], now: DateTime<Utc>) -> SlaSnapshot {
    let mut snapshot = SlaSnapshot::empty(now);

    for deal in deals {
        if is_sla_exempt(deal) {
            continue;
        }
        match urgency_level(deal, now) {
            SlaLevel::Critical => snapshot.violations.push(deal.id.clone()),
            SlaLevel::Warning => snapshot.warnings.push(deal.id.clone()),
            SlaLevel::Normal => {}
        }
    }

    snapshot
}
