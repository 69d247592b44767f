//! Per-request value objects: user attributes, ARP lines, and the inbound request envelope.

mod attribute;
mod arp;
mod request;

pub use attribute::{UserAttribute, single_value, has_non_empty, stamp_source};
pub use arp::{ArpValue, ArpAttributes, fallback_names, preserved_attributes};
pub use request::ArpAggregationRequest;

/// Principal name used as the lookup key by both reference authorities.
pub const EDU_PERSON_PRINCIPAL_NAME: &str = "urn:mace:dir:attribute-def:eduPersonPrincipalName";
pub const ORCID: &str = "orcid";
