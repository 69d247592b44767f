//! Attribute authority configuration and server settings.
//! The authority table is loaded once at startup and shared read-only behind an `Arc`.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::AggregationError;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_HTTP_PORT: u16 = 8087;
pub const DEFAULT_AUTHORITIES_PATH: &str = "attributeAuthorities.json";

fn default_timeout_ms() -> u64 { DEFAULT_TIMEOUT_MS }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredInputAttribute {
    pub name: String,
}

impl RequiredInputAttribute {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

/// What the orchestrator does when an authority call fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Skip the failed authority's contribution and continue.
    #[default]
    Degrade,
    /// Fail the whole request on the first backend failure.
    Abort,
}

/// One attribute authority backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeAuthorityConfiguration {
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub required_input_attributes: Vec<RequiredInputAttribute>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// 0 disables the per-aggregator response cache.
    #[serde(default)]
    pub cache_duration_ms: u64,
    /// Authority-specific knobs, e.g. `queryParameter` or `orcidBaseUrl`.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl AttributeAuthorityConfiguration {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            user: None,
            password: None,
            required_input_attributes: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cache_duration_ms: 0,
            options: BTreeMap::new(),
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_required_input(mut self, name: impl Into<String>) -> Self {
        self.required_input_attributes.push(RequiredInputAttribute::new(name));
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self { self.timeout_ms = ms; self }

    pub fn with_cache_duration_ms(mut self, ms: u64) -> Self { self.cache_duration_ms = ms; self }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) => Some((u, p)),
            _ => None,
        }
    }

    pub fn required_input_names(&self) -> impl Iterator<Item = &str> {
        self.required_input_attributes.iter().map(|r| r.name.as_str())
    }

    pub fn option(&self, key: &str) -> Option<&str> { self.options.get(key).map(|s| s.as_str()) }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    pub fn endpoint_url(&self) -> Result<Url, AggregationError> {
        Url::parse(&self.endpoint)
            .map_err(|e| AggregationError::Configuration(format!("authority '{}' has invalid endpoint '{}': {}", self.id, self.endpoint, e)))
    }

    pub fn validate(&self) -> Result<(), AggregationError> {
        if self.id.trim().is_empty() {
            return Err(AggregationError::Configuration("authority id must not be empty".into()));
        }
        let url = self.endpoint_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AggregationError::Configuration(format!("authority '{}' endpoint must be http(s)", self.id)));
        }
        if self.user.is_some() != self.password.is_some() {
            return Err(AggregationError::Configuration(format!("authority '{}' needs both user and password, or neither", self.id)));
        }
        if self.required_input_attributes.is_empty() {
            return Err(AggregationError::Configuration(format!("authority '{}' declares no required input attributes", self.id)));
        }
        if self.timeout_ms == 0 {
            return Err(AggregationError::Configuration(format!("authority '{}' timeoutMs must be positive", self.id)));
        }
        Ok(())
    }
}

/// Summary of one authority safe to expose over the API (no credentials).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritySummary {
    pub id: String,
    pub endpoint: String,
    pub required_input_attributes: Vec<String>,
    pub timeout_ms: u64,
}

impl From<&AttributeAuthorityConfiguration> for AuthoritySummary {
    fn from(c: &AttributeAuthorityConfiguration) -> Self {
        Self {
            id: c.id.clone(),
            endpoint: c.endpoint.clone(),
            required_input_attributes: c.required_input_names().map(|s| s.to_string()).collect(),
            timeout_ms: c.timeout_ms,
        }
    }
}

/// The full authority table, in invocation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritiesConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub authorities: Vec<AttributeAuthorityConfiguration>,
}

impl AuthoritiesConfig {
    pub fn new(authorities: Vec<AttributeAuthorityConfiguration>) -> Self {
        Self { failure_policy: FailurePolicy::Degrade, authorities }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self { self.failure_policy = policy; self }

    pub fn from_json(text: &str) -> Result<Self, AggregationError> {
        let cfg: AuthoritiesConfig = serde_json::from_str(text)
            .map_err(|e| AggregationError::Configuration(format!("invalid authorities document: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read attribute authorities config: {}", path.display()))?;
        let cfg = Self::from_json(&text)
            .with_context(|| format!("While loading attribute authorities from {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AggregationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for a in &self.authorities {
            a.validate()?;
            if !seen.insert(a.id.as_str()) {
                return Err(AggregationError::Configuration(format!("duplicate authority id '{}'", a.id)));
            }
        }
        Ok(())
    }

    pub fn summaries(&self) -> Vec<AuthoritySummary> { self.authorities.iter().map(AuthoritySummary::from).collect() }
}

/// Process settings: CLI flags override environment, environment overrides defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_port: u16,
    pub authorities_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { http_port: DEFAULT_HTTP_PORT, authorities_path: PathBuf::from(DEFAULT_AUTHORITIES_PATH) }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

impl ServerConfig {
    pub fn from_env_and_args(args: &[String]) -> Self {
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Resolution with an injectable environment lookup.
    pub fn resolve(args: &[String], lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let http_port = arg_value(args, "--http-port")
            .and_then(|v| v.parse::<u16>().ok())
            .or_else(|| lookup("AA_HTTP_PORT").and_then(|v| v.parse::<u16>().ok()))
            .unwrap_or(defaults.http_port);
        let authorities_path = arg_value(args, "--authorities")
            .map(PathBuf::from)
            .or_else(|| lookup("AA_AUTHORITIES_CONFIG").map(PathBuf::from))
            .unwrap_or(defaults.authorities_path);
        Self { http_port, authorities_path }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
