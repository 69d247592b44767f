//! ORCID lookup: resolves a principal name to an ORCID iD and emits it in canonical URL form.
//!
//! An ORCID iD is four hyphen-separated groups of four characters. The first fifteen are digits;
//! the sixteenth is an ISO 7064 MOD 11-2 check character (`0`-`9` or `X`). Values that fail the
//! format or the checksum are dropped by `filter_invalid_responses`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{with_fallbacks, AttributeAggregator, AuthorityClient, QUERY_PARAMETER_OPTION};
use crate::config::AttributeAuthorityConfiguration;
use crate::error::AggregationError;
use crate::model::{ArpAttributes, UserAttribute, ORCID};

pub const ORCID_AUTHORITY: &str = "orcid";
pub const ORCID_QUERY_PARAMETER: &str = "eppn";
pub const DEFAULT_ORCID_BASE_URL: &str = "http://orcid.org/";
/// Option overriding the canonical URL prefix.
pub const ORCID_BASE_URL_OPTION: &str = "orcidBaseUrl";

static ORCID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?orcid\.org/)?([0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X])$").expect("static ORCID pattern")
});

/// ISO 7064 MOD 11-2 check character over the first fifteen digits.
pub fn checksum(base_digits: &str) -> char {
    let total = base_digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u32, |acc, d| (acc + d) * 2);
    let result = (12 - total % 11) % 11;
    if result == 10 { 'X' } else { char::from_digit(result, 10).unwrap_or('?') }
}

/// Extract the bare iD from a value (bare or URL form) when both format and checksum hold.
pub fn parse_orcid(value: &str) -> Option<&str> {
    let caps = ORCID_PATTERN.captures(value.trim())?;
    let id = caps.get(1)?.as_str();
    let digits: Vec<char> = id.chars().filter(|c| *c != '-').collect();
    let base: String = digits.iter().take(15).collect();
    (digits.get(15) == Some(&checksum(&base))).then_some(id)
}

pub struct OrcidAttributeAggregator {
    configuration: AttributeAuthorityConfiguration,
    client: AuthorityClient,
    query_parameter: String,
    base_url: String,
}

impl OrcidAttributeAggregator {
    pub fn new(configuration: AttributeAuthorityConfiguration) -> Result<Self, AggregationError> {
        let client = AuthorityClient::new(&configuration)?;
        let query_parameter = configuration.option(QUERY_PARAMETER_OPTION).unwrap_or(ORCID_QUERY_PARAMETER).to_string();
        let mut base_url = configuration.option(ORCID_BASE_URL_OPTION).unwrap_or(DEFAULT_ORCID_BASE_URL).to_string();
        if !base_url.ends_with('/') { base_url.push('/'); }
        Ok(Self { configuration, client, query_parameter, base_url })
    }

    pub fn client(&self) -> &AuthorityClient { &self.client }

    /// Canonical URL form of a valid value.
    pub fn canonical(&self, value: &str) -> Option<String> {
        parse_orcid(value).map(|id| format!("{}{}", self.base_url, id))
    }

    /// Collapse whatever the lookup service returned into a single `orcid` attribute. Valid values
    /// are canonicalised; invalid ones are kept as-is so the filter decides their fate.
    fn interpret(&self, response: Vec<UserAttribute>) -> Vec<UserAttribute> {
        let mut values: Vec<String> = Vec::new();
        for v in response.into_iter().flat_map(|a| a.values) {
            if v.trim().is_empty() { continue; }
            let v = self.canonical(&v).unwrap_or(v);
            if !values.contains(&v) { values.push(v); }
        }
        if values.is_empty() { Vec::new() } else { vec![UserAttribute::new(ORCID, values)] }
    }
}

#[async_trait]
impl AttributeAggregator for OrcidAttributeAggregator {
    fn configuration(&self) -> &AttributeAuthorityConfiguration { &self.configuration }

    async fn aggregate(&self, input: &[UserAttribute], arp: &ArpAttributes) -> Result<Vec<UserAttribute>, AggregationError> {
        let principal = self.lookup_identifier(input)?;
        let response = match self.client.fetch(&self.query_parameter, principal).await {
            Ok(r) => r,
            // An unreadable ORCID payload means "no ORCID", not a broken backend.
            Err(e @ AggregationError::MalformedResponse { .. }) => {
                warn!(target: "authority", authority = %self.attribute_authority_id(), error = %e, "ignoring unreadable ORCID payload");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok(with_fallbacks(self.interpret(response), input, arp, self.attribute_authority_id()))
    }

    fn filter_invalid_responses(&self, input: Vec<UserAttribute>) -> Vec<UserAttribute> {
        input
            .into_iter()
            .filter_map(|mut attr| {
                if attr.name != ORCID { return Some(attr); }
                let mut valid: Vec<String> = Vec::new();
                for v in attr.values.iter().filter_map(|v| self.canonical(v)) {
                    if !valid.contains(&v) { valid.push(v); }
                }
                if valid.is_empty() { return None; }
                attr.values = valid;
                Some(attr)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> OrcidAttributeAggregator {
        let cfg = AttributeAuthorityConfiguration::new(ORCID_AUTHORITY, "http://localhost:8889/orcid").with_required_input("eppn");
        OrcidAttributeAggregator::new(cfg).unwrap()
    }

    #[test]
    fn checksum_matches_known_ids() {
        assert_eq!(checksum("000000024926285"), '9');
        assert_eq!(checksum("000000021694233"), 'X');
        assert_eq!(checksum("000000015109370"), '0');
    }

    #[test]
    fn parse_accepts_bare_and_url_forms() {
        assert_eq!(parse_orcid("0000-0002-4926-2859"), Some("0000-0002-4926-2859"));
        assert_eq!(parse_orcid("http://orcid.org/0000-0002-4926-2859"), Some("0000-0002-4926-2859"));
        assert_eq!(parse_orcid("https://orcid.org/0000-0002-1694-233X"), Some("0000-0002-1694-233X"));
        assert_eq!(parse_orcid(" 0000-0002-1694-233X "), Some("0000-0002-1694-233X"));
    }

    #[test]
    fn parse_rejects_bad_format_or_checksum() {
        assert_eq!(parse_orcid("0000-0002-4926-2858"), None);
        assert_eq!(parse_orcid("0000-0002-4926-285"), None);
        assert_eq!(parse_orcid("0000000249262859"), None);
        assert_eq!(parse_orcid("0000-0002-1694-233x"), None);
        assert_eq!(parse_orcid("https://example.org/0000-0002-4926-2859"), None);
        assert_eq!(parse_orcid(""), None);
    }

    #[test]
    fn non_ascii_digits_are_rejected() {
        assert_eq!(parse_orcid("٠٠٠٠-٠٠٠٠-٠٠٠٠-٠٠٠X"), None);
        assert_eq!(parse_orcid("００００-０００２-４９２６-２８５９"), None);
        let s = subject();
        let out = s.filter_invalid_responses(vec![UserAttribute::new(ORCID, vec!["٠٠٠٠-٠٠٠٠-٠٠٠٠-٠٠٠X".into()])]);
        assert!(out.is_empty());
        let raw = s.interpret(vec![UserAttribute::new("urn:mace:dir:attribute-def:eduPersonOrcid", vec!["٠٠٠٠-٠٠٠٠-٠٠٠٠-٠٠٠X".into()])]);
        assert!(s.filter_invalid_responses(raw).is_empty());
    }

    #[test]
    fn filter_canonicalises_and_drops_invalid() {
        let s = subject();
        let input = vec![
            UserAttribute::with_source(ORCID, vec!["0000-0002-4926-2859".into(), "http://orcid.org/0000-0002-4926-2859".into(), "nope".into()], "orcid"),
            UserAttribute::with_source("mail", vec!["x@example.com".into()], "orcid"),
        ];
        let out = s.filter_invalid_responses(input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].values, vec!["http://orcid.org/0000-0002-4926-2859".to_string()]);
        assert_eq!(out[1].name, "mail");
    }

    #[test]
    fn filter_is_idempotent() {
        let s = subject();
        let input = vec![
            UserAttribute::new(ORCID, vec!["0000-0002-1694-233X".into(), "0000-0002-4926-2858".into()]),
            UserAttribute::new(ORCID, vec!["garbage".into()]),
        ];
        let once = s.filter_invalid_responses(input);
        let twice = s.filter_invalid_responses(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
        assert!(s.filter_invalid_responses(Vec::new()).is_empty());
    }

    #[test]
    fn interpret_collapses_values() {
        let s = subject();
        let out = s.interpret(vec![
            UserAttribute::new("urn:mace:dir:attribute-def:eduPersonOrcid", vec!["0000-0002-4926-2859".into()]),
            UserAttribute::new(ORCID, vec!["https://orcid.org/0000-0002-4926-2859".into(), "".into()]),
        ]);
        assert_eq!(out, vec![UserAttribute::new(ORCID, vec!["http://orcid.org/0000-0002-4926-2859".into()])]);
        assert!(s.interpret(vec![UserAttribute::new(ORCID, vec![])]).is_empty());
    }

    #[test]
    fn base_url_option_is_normalised() {
        let cfg = AttributeAuthorityConfiguration::new(ORCID_AUTHORITY, "http://localhost:8889/orcid")
            .with_required_input("eppn")
            .with_option(ORCID_BASE_URL_OPTION, "https://orcid.org");
        let s = OrcidAttributeAggregator::new(cfg).unwrap();
        assert_eq!(s.canonical("0000-0002-4926-2859").as_deref(), Some("https://orcid.org/0000-0002-4926-2859"));
    }
}
