//! Attribute aggregators: one implementation per attribute authority, selected by a registry
//! keyed on authority id. Each aggregator owns its configuration and transport client and
//! keeps no per-request state.

pub mod cache;
pub mod client;
pub mod eduid;
pub mod orcid;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AttributeAuthorityConfiguration, AuthoritiesConfig, RequiredInputAttribute};
use crate::error::AggregationError;
use crate::model::{has_non_empty, preserved_attributes, single_value, stamp_source, ArpAttributes, UserAttribute};

pub use client::AuthorityClient;
pub use eduid::EduIdAttributeAggregator;
pub use orcid::OrcidAttributeAggregator;

/// Option naming the input attribute whose value is sent upstream; defaults to the first required input.
pub const LOOKUP_ATTRIBUTE_OPTION: &str = "lookupAttribute";
/// Option overriding the name of the outbound query parameter.
pub const QUERY_PARAMETER_OPTION: &str = "queryParameter";
/// Option selecting the implementation when it differs from the authority id.
pub const AGGREGATOR_OPTION: &str = "aggregator";

#[async_trait]
pub trait AttributeAggregator: Send + Sync {
    fn configuration(&self) -> &AttributeAuthorityConfiguration;

    fn attribute_authority_id(&self) -> &str { &self.configuration().id }

    fn required_input_attributes(&self) -> &[RequiredInputAttribute] { &self.configuration().required_input_attributes }

    /// First non-blank value of `name` in `input`.
    fn user_attribute_single_value<'a>(&self, input: &'a [UserAttribute], name: &str) -> Option<&'a str> {
        single_value(input, name)
    }

    /// First required input attribute missing (or blank) in `input`, if any.
    fn missing_required_input(&self, input: &[UserAttribute]) -> Option<String> {
        self.required_input_attributes()
            .iter()
            .find(|r| !has_non_empty(input, &r.name))
            .map(|r| r.name.clone())
    }

    /// Value to send upstream, taken from the `lookupAttribute` option or the first required input.
    fn lookup_identifier<'a>(&self, input: &'a [UserAttribute]) -> Result<&'a str, AggregationError> {
        let cfg = self.configuration();
        let name = cfg
            .option(LOOKUP_ATTRIBUTE_OPTION)
            .or_else(|| cfg.required_input_names().next())
            .ok_or_else(|| AggregationError::Configuration(format!("authority '{}' has no lookup attribute", cfg.id)))?;
        self.user_attribute_single_value(input, name).ok_or_else(|| AggregationError::MissingRequiredInput {
            authority: cfg.id.clone(),
            attribute: name.to_string(),
        })
    }

    /// Fetch from the backend and apply fallback preservation. Every returned attribute carries
    /// this authority's id as its source.
    async fn aggregate(&self, input: &[UserAttribute], arp: &ArpAttributes) -> Result<Vec<UserAttribute>, AggregationError>;

    /// Backend-specific validation of aggregated output. Identity unless overridden.
    fn filter_invalid_responses(&self, input: Vec<UserAttribute>) -> Vec<UserAttribute> { input }
}

/// Append fallback-preserved input attributes to a backend response and stamp provenance.
pub fn with_fallbacks(
    mut response: Vec<UserAttribute>,
    input: &[UserAttribute],
    arp: &ArpAttributes,
    authority: &str,
) -> Vec<UserAttribute> {
    let preserved = preserved_attributes(input, arp, &response, authority);
    response.extend(preserved);
    stamp_source(&mut response, authority);
    response
}

pub type AggregatorFactory = fn(&AttributeAuthorityConfiguration) -> Result<Arc<dyn AttributeAggregator>, AggregationError>;

fn eduid_factory(cfg: &AttributeAuthorityConfiguration) -> Result<Arc<dyn AttributeAggregator>, AggregationError> {
    Ok(Arc::new(EduIdAttributeAggregator::new(cfg.clone())?))
}

fn orcid_factory(cfg: &AttributeAuthorityConfiguration) -> Result<Arc<dyn AttributeAggregator>, AggregationError> {
    Ok(Arc::new(OrcidAttributeAggregator::new(cfg.clone())?))
}

/// Maps an authority id (or its `aggregator` option) to the implementation that serves it.
#[derive(Clone, Default)]
pub struct AggregatorRegistry {
    factories: HashMap<String, AggregatorFactory>,
}

impl AggregatorRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(eduid::EDUID, eduid_factory);
        reg.register(orcid::ORCID_AUTHORITY, orcid_factory);
        reg
    }

    pub fn register(&mut self, kind: &str, factory: AggregatorFactory) {
        self.factories.insert(kind.to_string(), factory);
    }

    pub fn create(&self, cfg: &AttributeAuthorityConfiguration) -> Result<Arc<dyn AttributeAggregator>, AggregationError> {
        let kind = cfg.option(AGGREGATOR_OPTION).unwrap_or(cfg.id.as_str());
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| AggregationError::Configuration(format!("no aggregator registered for authority '{}' (kind '{}')", cfg.id, kind)))?;
        factory(cfg)
    }

    /// Build aggregators for every configured authority, preserving configuration order.
    pub fn build(&self, cfg: &AuthoritiesConfig) -> Result<Vec<Arc<dyn AttributeAggregator>>, AggregationError> {
        cfg.validate()?;
        cfg.authorities.iter().map(|a| self.create(a)).collect()
    }
}

#[cfg(test)]
#[path = "aggregators_tests.rs"]
mod tests;
