//! Attribute Release Policy (ARP) lines and the fallback-preservation rule.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::attribute::UserAttribute;

fn default_release() -> bool { true }

/// One policy line for one attribute name: which source may supply it and whether it is released.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArpValue {
    pub source: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_release")]
    pub release: bool,
}

impl ArpValue {
    pub fn new(source: impl Into<String>, value: impl Into<String>) -> Self {
        Self { source: source.into(), value: value.into(), release: true }
    }
}

/// Attribute name -> ordered policy lines. Ordered map keeps iteration deterministic.
pub type ArpAttributes = BTreeMap<String, Vec<ArpValue>>;

/// ARP attribute names that `authority` is sanctioned for but did not return.
pub fn fallback_names<'a>(arp: &'a ArpAttributes, response: &[UserAttribute], authority: &str) -> Vec<&'a str> {
    let returned: HashSet<&str> = response.iter().map(|a| a.name.as_str()).collect();
    arp.iter()
        .filter(|(name, vals)| !returned.contains(name.as_str()) && vals.iter().any(|v| v.source == authority))
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Original input attributes carried through for `authority` because the backend had nothing to say
/// about them. Only unstamped attributes qualify (the orchestrator clears caller-supplied sources),
/// and a name already stamped by an earlier authority is left alone so the first authority in
/// configuration order wins.
pub fn preserved_attributes(
    input: &[UserAttribute],
    arp: &ArpAttributes,
    response: &[UserAttribute],
    authority: &str,
) -> Vec<UserAttribute> {
    let names = fallback_names(arp, response, authority);
    if names.is_empty() { return Vec::new(); }
    let claimed: HashSet<&str> = input.iter().filter(|a| a.source.is_some()).map(|a| a.name.as_str()).collect();
    input
        .iter()
        .filter(|a| a.source.is_none() && names.contains(&a.name.as_str()) && !claimed.contains(a.name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arp(entries: &[(&str, &[&str])]) -> ArpAttributes {
        entries
            .iter()
            .map(|(name, sources)| (name.to_string(), sources.iter().map(|s| ArpValue::new(*s, "*")).collect()))
            .collect()
    }

    #[test]
    fn release_defaults_to_true() {
        let v: ArpValue = serde_json::from_str(r#"{"source":"eduid","value":"*"}"#).unwrap();
        assert!(v.release);
        let v: ArpValue = serde_json::from_str(r#"{"source":"eduid","release":false}"#).unwrap();
        assert!(!v.release);
        assert_eq!(v.value, "");
    }

    #[test]
    fn fallback_names_only_for_sanctioned_and_missing() {
        let policy = arp(&[("mail", &["eduid"]), ("cn", &["idp"]), ("uid", &["eduid"])]);
        let response = vec![UserAttribute::new("uid", vec!["u".into()])];
        assert_eq!(fallback_names(&policy, &response, "eduid"), vec!["mail"]);
        assert!(fallback_names(&policy, &response, "orcid").is_empty());
        assert_eq!(fallback_names(&policy, &[], "idp"), vec!["cn"]);
    }

    #[test]
    fn preserves_original_values_in_input_order() {
        let policy = arp(&[("mail", &["eduid"]), ("cn", &["eduid", "idp"])]);
        let input = vec![
            UserAttribute::new("cn", vec!["John".into()]),
            UserAttribute::new("eppn", vec!["j@example.com".into()]),
            UserAttribute::new("mail", vec!["j@example.com".into()]),
        ];
        let kept = preserved_attributes(&input, &policy, &[], "eduid");
        let names: Vec<&str> = kept.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["cn", "mail"]);
        assert_eq!(kept[0].values, vec!["John".to_string()]);
    }

    #[test]
    fn name_already_stamped_by_earlier_authority_is_not_preserved_again() {
        let policy = arp(&[("mail", &["eduid", "orcid"])]);
        let input = vec![
            UserAttribute::new("mail", vec!["j@example.com".into()]),
            UserAttribute::with_source("mail", vec!["j@example.com".into()], "eduid"),
        ];
        assert!(preserved_attributes(&input, &policy, &[], "orcid").is_empty());
    }
}
