//! Response-time SLA calculator.
//!
//! Pure and stateless: every function takes a deal snapshot plus an explicit
//! `now`, so callers (and tests) control the clock.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::deal::{Deal, DealStage, LeadUrgency};

pub const SLA_LIMIT_HIGH_MINUTES: i64 = 5;
pub const SLA_LIMIT_MEDIUM_MINUTES: i64 = 30;
pub const SLA_LIMIT_LOW_MINUTES: i64 = 120;
pub const SLA_LIMIT_DEFAULT_MINUTES: i64 = 240;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaLevel {
    Normal,
    Warning,
    Critical,
}

/// Whole minutes the deal has sat without contact, clamped at zero when the
/// base instant is in the future relative to `now`.
pub fn time_in_stage_minutes(deal: &Deal, now: DateTime<Utc>) -> i64 {
    (now - deal.sla_base_time()).num_minutes().max(0)
}

/// Response budget for a lead urgency. Policy constants, not derived.
pub fn sla_limit_minutes(urgency: LeadUrgency) -> i64 {
    match urgency {
        LeadUrgency::High => SLA_LIMIT_HIGH_MINUTES,
        LeadUrgency::Medium => SLA_LIMIT_MEDIUM_MINUTES,
        LeadUrgency::Low => SLA_LIMIT_LOW_MINUTES,
        LeadUrgency::None => SLA_LIMIT_DEFAULT_MINUTES,
    }
}

/// Closed or post-consultation deals are never flagged and never swept.
pub fn is_sla_exempt(deal: &Deal) -> bool {
    matches!(deal.stage, DealStage::Won | DealStage::Lost | DealStage::ConsultationDone)
}

/// Critical once elapsed time exceeds the budget; Warning past 80% of it.
/// The 80% threshold is compared in integer math (`5·t > 4·limit`) so the
/// boundary minute is exact rather than subject to float rounding.
pub fn urgency_level(deal: &Deal, now: DateTime<Utc>) -> SlaLevel {
    if is_sla_exempt(deal) {
        return SlaLevel::Normal;
    }

    let elapsed = time_in_stage_minutes(deal, now);
    let limit = sla_limit_minutes(deal.lead_urgency);

    if elapsed > limit {
        SlaLevel::Critical
    } else if 5 * elapsed > 4 * limit {
        SlaLevel::Warning
    } else {
        SlaLevel::Normal
    }
}

/// Minutes left in the budget; zero or negative means overdue.
pub fn time_until_violation(deal: &Deal, now: DateTime<Utc>) -> i64 {
    sla_limit_minutes(deal.lead_urgency) - time_in_stage_minutes(deal, now)
}

/// Display form of a remaining-minutes value.
pub fn describe_remaining(minutes: i64) -> String {
    if minutes <= 0 {
        "overdue".to_string()
    } else if minutes < 60 {
        format!("{minutes}min")
    } else {
        format!("{}h {}min", minutes / 60, minutes % 60)
    }
}

/// Snapshot of a deal's SLA standing, as rendered to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlaAssessment {
    pub level: SlaLevel,
    pub exempt: bool,
    pub minutes_in_stage: i64,
    pub limit_minutes: i64,
    pub remaining: String,
}

pub fn assess(deal: &Deal, now: DateTime<Utc>) -> SlaAssessment {
    SlaAssessment {
        level: urgency_level(deal, now),
        exempt: is_sla_exempt(deal),
        minutes_in_stage: time_in_stage_minutes(deal, now),
        limit_minutes: sla_limit_minutes(deal.lead_urgency),
        remaining: describe_remaining(time_until_violation(deal, now)),
    }
}
