use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignStageId(pub String);

/// One ordered step of a campaign's pipeline. The engine only cares about
/// identity and order; titles and any editing belong to the campaign UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStage {
    pub id: CampaignStageId,
    pub campaign_id: CampaignId,
    pub position: u32,
    pub title: String,
}
