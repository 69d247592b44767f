use serde::{Deserialize, Serialize};

use super::arp::ArpAttributes;
use super::attribute::UserAttribute;

/// Inbound aggregation call: the caller's attributes plus the ARP already resolved for its service provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArpAggregationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider_entity_id: Option<String>,
    #[serde(default)]
    pub user_attributes: Vec<UserAttribute>,
    #[serde(default)]
    pub arp_attributes: ArpAttributes,
}

impl ArpAggregationRequest {
    pub fn new(user_attributes: Vec<UserAttribute>, arp_attributes: ArpAttributes) -> Self {
        Self { service_provider_entity_id: None, user_attributes, arp_attributes }
    }

    pub fn for_service_provider(mut self, entity_id: impl Into<String>) -> Self {
        self.service_provider_entity_id = Some(entity_id.into());
        self
    }
}
