//! Campaign configuration read by the pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The slice of campaign configuration the completion logic depends on.
///
/// Read-only to this subsystem; owned by the campaign CRUD controllers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSettings {
    /// Campaign ID
    pub campaign_id: String,

    /// Whether raw footage is a required deliverable type
    #[serde(default)]
    pub raw_footage: bool,

    /// Whether photos are a required deliverable type
    #[serde(default)]
    pub photos: bool,

    /// Fixed credit pool; `None` means an unlimited/UGC-style campaign
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_credits: Option<u32>,
}

impl CampaignSettings {
    /// UGC campaigns have no fixed credit pool; completion only needs one video.
    pub fn is_ugc(&self) -> bool {
        self.campaign_credits.is_none()
    }
}

/// A creator shortlisted onto a campaign, with their contracted video count.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShortlistedCreator {
    /// Creator user ID
    pub user_id: String,

    /// Campaign ID
    pub campaign_id: String,

    /// Number of videos this creator is contracted to deliver.
    /// Only meaningful on credit-based campaigns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ugc_videos: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ugc_campaign_has_no_credits() {
        let settings = CampaignSettings {
            campaign_id: "camp_1".to_string(),
            raw_footage: false,
            photos: false,
            campaign_credits: None,
        };
        assert!(settings.is_ugc());

        let credited = CampaignSettings {
            campaign_credits: Some(10),
            ..settings
        };
        assert!(!credited.is_ugc());
    }
}
