//! Outbound HTTP transport shared by the authority implementations.
//! One GET per lookup, identifier as a single query parameter, optional HTTP Basic credentials.

use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tracing::debug;

use super::cache::{CacheStats, ResponseCache};
use crate::config::AttributeAuthorityConfiguration;
use crate::error::AggregationError;
use crate::model::UserAttribute;

/// Immutable after construction; safe to share across concurrent requests.
pub struct AuthorityClient {
    authority_id: String,
    endpoint: Url,
    credentials: Option<(String, String)>,
    timeout_ms: u64,
    http: Client,
    cache: Option<ResponseCache>,
}

impl AuthorityClient {
    pub fn new(cfg: &AttributeAuthorityConfiguration) -> Result<Self, AggregationError> {
        let endpoint = cfg.endpoint_url()?;
        let http = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| AggregationError::Configuration(format!("authority '{}': failed to build HTTP client: {}", cfg.id, e)))?;
        let cache = (cfg.cache_duration_ms > 0)
            .then(|| ResponseCache::new(std::time::Duration::from_millis(cfg.cache_duration_ms)));
        Ok(Self {
            authority_id: cfg.id.clone(),
            endpoint,
            credentials: cfg.credentials().map(|(u, p)| (u.to_string(), p.to_string())),
            timeout_ms: cfg.timeout_ms,
            http,
            cache,
        })
    }

    pub fn endpoint(&self) -> &Url { &self.endpoint }

    pub fn cache_stats(&self) -> Option<CacheStats> { self.cache.as_ref().map(|c| c.stats()) }

    /// GET the endpoint and parse the body as a list of attributes. An empty body is an empty list.
    pub async fn fetch(&self, query_parameter: &str, identifier: &str) -> Result<Vec<UserAttribute>, AggregationError> {
        let cache_key = format!("{}={}", query_parameter, identifier);
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&cache_key)) {
            return Ok(cached);
        }
        let body = self.fetch_body(query_parameter, identifier).await?;
        let attributes = parse_attributes(&self.authority_id, &body)?;
        if let Some(cache) = &self.cache {
            cache.insert(&cache_key, attributes.clone());
        }
        Ok(attributes)
    }

    async fn fetch_body(&self, query_parameter: &str, identifier: &str) -> Result<String, AggregationError> {
        let mut req = self
            .http
            .get(self.endpoint.clone())
            .query(&[(query_parameter, identifier)])
            .header(ACCEPT, "application/json");
        if let Some((user, password)) = &self.credentials {
            req = req.basic_auth(user, Some(password));
        }
        debug!(target: "authority", authority = %self.authority_id, endpoint = %self.endpoint, "fetching attributes");
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AggregationError::unavailable(
                &self.authority_id,
                format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }
        resp.text().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> AggregationError {
        if e.is_timeout() {
            AggregationError::unavailable(&self.authority_id, format!("timed out after {}ms", self.timeout_ms))
        } else {
            AggregationError::unavailable(&self.authority_id, e.to_string())
        }
    }
}

/// Parse a backend body. Blank bodies are treated as "nothing to say".
pub fn parse_attributes(authority: &str, body: &str) -> Result<Vec<UserAttribute>, AggregationError> {
    if body.trim().is_empty() { return Ok(Vec::new()); }
    serde_json::from_str::<Vec<UserAttribute>>(body).map_err(|e| AggregationError::malformed(authority, e.to_string()))
}
