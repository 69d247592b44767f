//! eduID directory: looks a user up by principal name and returns whatever it knows about them.

use async_trait::async_trait;

use super::{with_fallbacks, AttributeAggregator, AuthorityClient, QUERY_PARAMETER_OPTION};
use crate::config::AttributeAuthorityConfiguration;
use crate::error::AggregationError;
use crate::model::{ArpAttributes, UserAttribute};

pub const EDUID: &str = "eduid";
pub const EDUID_QUERY_PARAMETER: &str = "edu_person_principal_name";

pub struct EduIdAttributeAggregator {
    configuration: AttributeAuthorityConfiguration,
    client: AuthorityClient,
    query_parameter: String,
}

impl EduIdAttributeAggregator {
    pub fn new(configuration: AttributeAuthorityConfiguration) -> Result<Self, AggregationError> {
        let client = AuthorityClient::new(&configuration)?;
        let query_parameter = configuration.option(QUERY_PARAMETER_OPTION).unwrap_or(EDUID_QUERY_PARAMETER).to_string();
        Ok(Self { configuration, client, query_parameter })
    }

    pub fn client(&self) -> &AuthorityClient { &self.client }
}

#[async_trait]
impl AttributeAggregator for EduIdAttributeAggregator {
    fn configuration(&self) -> &AttributeAuthorityConfiguration { &self.configuration }

    async fn aggregate(&self, input: &[UserAttribute], arp: &ArpAttributes) -> Result<Vec<UserAttribute>, AggregationError> {
        let principal = self.lookup_identifier(input)?;
        let response = self.client.fetch(&self.query_parameter, principal).await?;
        Ok(with_fallbacks(response, input, arp, self.attribute_authority_id()))
    }
}
