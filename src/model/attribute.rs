use serde::{Deserialize, Serialize};

/// One named, multi-valued user attribute. `source` records the authority that emitted it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAttribute {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self { name: name.into(), values, source: None }
    }

    pub fn with_source(name: impl Into<String>, values: Vec<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), values, source: Some(source.into()) }
    }

    /// First value that is not blank.
    pub fn first_value(&self) -> Option<&str> {
        self.values.iter().map(|v| v.as_str()).find(|v| !v.trim().is_empty())
    }

    pub fn has_value(&self) -> bool { self.first_value().is_some() }
}

/// Look up the first non-blank value of `name` across a list of attributes.
pub fn single_value<'a>(attributes: &'a [UserAttribute], name: &str) -> Option<&'a str> {
    attributes.iter().filter(|a| a.name == name).find_map(|a| a.first_value())
}

/// True when `name` is present with at least one non-blank value.
pub fn has_non_empty(attributes: &[UserAttribute], name: &str) -> bool {
    single_value(attributes, name).is_some()
}

/// Stamp provenance on every attribute, overwriting whatever the backend claimed.
pub fn stamp_source(attributes: &mut [UserAttribute], source: &str) {
    for a in attributes.iter_mut() {
        a.source = Some(source.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_skips_blanks() {
        let a = UserAttribute::new("x", vec!["".into(), "  ".into(), "v".into()]);
        assert_eq!(a.first_value(), Some("v"));
        assert!(!UserAttribute::new("x", vec![" ".into()]).has_value());
        assert!(!UserAttribute::new("x", vec![]).has_value());
    }

    #[test]
    fn single_value_across_duplicates() {
        let attrs = vec![
            UserAttribute::new("eppn", vec![]),
            UserAttribute::new("mail", vec!["m@example.com".into()]),
            UserAttribute::new("eppn", vec!["jdoe@example.com".into()]),
        ];
        assert_eq!(single_value(&attrs, "eppn"), Some("jdoe@example.com"));
        assert!(has_non_empty(&attrs, "mail"));
        assert!(!has_non_empty(&attrs, "cn"));
    }

    #[test]
    fn stamp_overwrites_claimed_source() {
        let mut attrs = vec![
            UserAttribute::with_source("a", vec!["1".into()], "spoofed"),
            UserAttribute::new("b", vec!["2".into()]),
        ];
        stamp_source(&mut attrs, "eduid");
        assert!(attrs.iter().all(|a| a.source.as_deref() == Some("eduid")));
    }

    #[test]
    fn deserializes_without_source_and_values() {
        let a: UserAttribute = serde_json::from_str(r#"{"name":"cn"}"#).unwrap();
        assert_eq!(a, UserAttribute::new("cn", vec![]));
        let json = serde_json::to_string(&a).unwrap();
        assert!(!json.contains("source"));
        assert!(serde_json::from_str::<UserAttribute>(r#"{"name":"cn","values":[null]}"#).is_err());
    }
}
