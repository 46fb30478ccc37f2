use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::campaign::CampaignId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

impl DealId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Ordered pipeline stages a deal moves through, from first quiz contact to
/// a closed outcome. Wire names are the snake_case forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    LeadQuiz,
    InService,
    Qualified,
    ConsultationOffer,
    ConsultationAccepted,
    ConsultationPaid,
    ConsultationDone,
    Won,
    Lost,
}

impl DealStage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "lead_quiz" => Some(Self::LeadQuiz),
            "in_service" => Some(Self::InService),
            "qualified" => Some(Self::Qualified),
            "consultation_offer" => Some(Self::ConsultationOffer),
            "consultation_accepted" => Some(Self::ConsultationAccepted),
            "consultation_paid" => Some(Self::ConsultationPaid),
            "consultation_done" => Some(Self::ConsultationDone),
            "won" => Some(Self::Won),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadQuiz => "lead_quiz",
            Self::InService => "in_service",
            Self::Qualified => "qualified",
            Self::ConsultationOffer => "consultation_offer",
            Self::ConsultationAccepted => "consultation_accepted",
            Self::ConsultationPaid => "consultation_paid",
            Self::ConsultationDone => "consultation_done",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }
}

impl std::fmt::Display for DealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Urgency of the associated lead. Foreign attribute: the engine reads it to
/// pick an SLA budget but never writes it. Missing values collapse to `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadUrgency {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl LeadUrgency {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub campaign_id: CampaignId,
    pub stage: DealStage,
    pub substage: Option<String>,
    pub contact_attempts: u32,
    pub lead_urgency: LeadUrgency,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub loss_reason: Option<String>,
    pub loss_details: Option<String>,
    pub lost_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// A fresh deal entering the pipeline at the campaign's first stage.
    pub fn enter_pipeline(
        campaign_id: CampaignId,
        first_stage: DealStage,
        lead_urgency: LeadUrgency,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DealId::generate(),
            campaign_id,
            stage: first_stage,
            substage: None,
            contact_attempts: 0,
            lead_urgency,
            last_contact_at: None,
            loss_reason: None,
            loss_details: None,
            lost_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reference instant for SLA elapsed-time math: the last contact attempt,
    /// falling back to creation when the deal has never been contacted.
    pub fn sla_base_time(&self) -> DateTime<Utc> {
        self.last_contact_at.unwrap_or(self.created_at)
    }
}
