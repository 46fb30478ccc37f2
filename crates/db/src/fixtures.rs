//! Deterministic demo dataset for local development and smoke checks.
//!
//! Seeds one aesthetic-clinic campaign with its pipeline, a three-step
//! follow-up sequence, and a handful of deals spread across the lifecycle,
//! including one already past the stagnation thresholds.

use chrono::{Duration, Utc};
use sqlx::Row;

use funil_core::domain::campaign::{CampaignId, CampaignStage, CampaignStageId};
use funil_core::domain::deal::DealStage;
use funil_core::sweep::{MIN_CONTACT_ATTEMPTS, STAGNATION_THRESHOLD_DAYS};

use crate::connection::DbPool;

pub const SEED_CAMPAIGN_ID: &str = "camp-aesthetic-001";
pub const SEED_STALE_DEAL_ID: &str = "deal-stale-001";

const SEED_CAMPAIGN_STAGES: &[(&str, u32, &str)] = &[
    ("cs-quiz-001", 1, "Lead Quiz"),
    ("cs-service-001", 2, "In Service"),
    ("cs-qualified-001", 3, "Qualified"),
    ("cs-offer-001", 4, "Consultation Offer"),
    ("cs-accepted-001", 5, "Consultation Accepted"),
    ("cs-paid-001", 6, "Consultation Paid"),
    ("cs-done-001", 7, "Consultation Done"),
];

const SEED_FOLLOWUP_STAGES: &[(&str, u32, &str, &str, &str, bool)] = &[
    (
        "fu-d1-001",
        1,
        "D+1 check-in",
        r#"{"kind":"relative","value":1,"unit":"days"}"#,
        r#"[{"kind":"send_message","label":"Send recovery tips","value":null},{"kind":"call","label":"Confirm no adverse reaction","value":null}]"#,
        true,
    ),
    (
        "fu-d7-001",
        2,
        "D+7 evaluation",
        r#"{"kind":"specific","day_offset":7,"time_of_day":"09:00"}"#,
        r#"[{"kind":"request_media","label":"Ask for progress photo","value":null}]"#,
        false,
    ),
    (
        "fu-d30-001",
        3,
        "D+30 retention",
        r#"{"kind":"relative","value":30,"unit":"days"}"#,
        r#"[{"kind":"schedule","label":"Offer maintenance session","value":null}]"#,
        false,
    ),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub campaign_stages: usize,
    pub followup_stages: usize,
    pub deals: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let now = Utc::now();

        for (id, position, title) in SEED_CAMPAIGN_STAGES {
            let stage = CampaignStage {
                id: CampaignStageId(id.to_string()),
                campaign_id: CampaignId(SEED_CAMPAIGN_ID.to_string()),
                position: *position,
                title: title.to_string(),
            };
            sqlx::query(
                "INSERT OR REPLACE INTO campaign_stages (id, campaign_id, position, title) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&stage.id.0)
            .bind(&stage.campaign_id.0)
            .bind(stage.position as i64)
            .bind(&stage.title)
            .execute(pool)
            .await?;
        }

        for (id, position, title, timing, actions, auto_send) in SEED_FOLLOWUP_STAGES {
            sqlx::query(
                "INSERT OR REPLACE INTO followup_stages (id, campaign_id, position, title, \
                     timing, message_template, auto_send, attach_pdf, request_media, actions) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8)",
            )
            .bind(id)
            .bind(SEED_CAMPAIGN_ID)
            .bind(*position as i64)
            .bind(title)
            .bind(timing)
            .bind(format!("Oi {{{{ name }}}}, aqui é da clínica. {title}!"))
            .bind(auto_send)
            .bind(actions)
            .execute(pool)
            .await?;
        }

        let deals: &[(&str, DealStage, &str, u32, Option<Duration>)] = &[
            ("deal-fresh-001", DealStage::LeadQuiz, "high", 0, None),
            ("deal-working-001", DealStage::Qualified, "medium", 3, Some(Duration::minutes(20))),
            (
                SEED_STALE_DEAL_ID,
                DealStage::Qualified,
                "low",
                MIN_CONTACT_ATTEMPTS,
                Some(Duration::days(STAGNATION_THRESHOLD_DAYS + 1)),
            ),
            ("deal-won-001", DealStage::Won, "none", 4, Some(Duration::days(2))),
        ];

        for (id, stage, urgency, attempts, last_contact_ago) in deals {
            let last_contact_at = last_contact_ago.map(|ago| now - ago);
            let created_at = now - Duration::days(STAGNATION_THRESHOLD_DAYS + 14);

            sqlx::query(
                "INSERT OR REPLACE INTO deals (id, campaign_id, stage, substage, \
                     contact_attempts, lead_urgency, last_contact_at, loss_reason, \
                     loss_details, lost_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, NULL, NULL, NULL, ?7, ?7)",
            )
            .bind(id)
            .bind(SEED_CAMPAIGN_ID)
            .bind(stage.as_str())
            .bind(*attempts as i64)
            .bind(urgency)
            .bind(last_contact_at)
            .bind(created_at)
            .execute(pool)
            .await?;
        }

        Ok(SeedResult {
            campaign_stages: SEED_CAMPAIGN_STAGES.len(),
            followup_stages: SEED_FOLLOWUP_STAGES.len(),
            deals: deals.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, sqlx::Error> {
        let mut checks = Vec::new();

        let campaign_stage_count = count(
            pool,
            "SELECT COUNT(*) AS count FROM campaign_stages WHERE campaign_id = ?1",
        )
        .await?;
        checks.push((
            "campaign_stages_seeded",
            campaign_stage_count == SEED_CAMPAIGN_STAGES.len() as i64,
        ));

        let followup_stage_count = count(
            pool,
            "SELECT COUNT(*) AS count FROM followup_stages WHERE campaign_id = ?1",
        )
        .await?;
        checks.push((
            "followup_stages_seeded",
            followup_stage_count == SEED_FOLLOWUP_STAGES.len() as i64,
        ));

        let deal_count =
            count(pool, "SELECT COUNT(*) AS count FROM deals WHERE campaign_id = ?1").await?;
        checks.push(("deals_seeded", deal_count >= 4));

        let stale_row = sqlx::query(
            "SELECT contact_attempts FROM deals WHERE id = ?1 AND stage = 'qualified'",
        )
        .bind(SEED_STALE_DEAL_ID)
        .fetch_optional(pool)
        .await?;
        let stale_ok = stale_row
            .map(|row| row.get::<i64, _>("contact_attempts") >= MIN_CONTACT_ATTEMPTS as i64)
            .unwrap_or(false);
        checks.push(("stagnant_candidate_present", stale_ok));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count(pool: &DbPool, query: &str) -> Result<i64, sqlx::Error> {
    Ok(sqlx::query(query).bind(SEED_CAMPAIGN_ID).fetch_one(pool).await?.get::<i64, _>("count"))
}
