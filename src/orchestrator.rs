//! Aggregation orchestrator.
//!
//! Per request: walk the configured authorities in order, skip the ones whose required inputs are
//! not satisfied by the running attribute set, invoke the rest one at a time, validate each
//! contribution with that authority's filter, and append it to the running set so later
//! authorities see earlier contributions. The result is the concatenation of contributions, each
//! stamped with its authority id.
//!
//! Backend failures degrade to an empty contribution unless `FailurePolicy::Abort` is configured.
//! When every invoked authority failed, the caller's input is returned unchanged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregators::{AggregatorRegistry, AttributeAggregator};
use crate::config::{AuthoritiesConfig, FailurePolicy};
use crate::error::AggregationError;
use crate::model::{stamp_source, ArpAggregationRequest, UserAttribute};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthorityStatus {
    Skipped { missing: String },
    Succeeded { count: usize, dropped: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorityOutcome {
    pub authority: String,
    #[serde(flatten)]
    pub status: AuthorityStatus,
}

/// Attributes plus what happened at each authority, for logging and metrics collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
    pub attributes: Vec<UserAttribute>,
    pub outcomes: Vec<AuthorityOutcome>,
}

impl AggregationReport {
    pub fn failed(&self) -> impl Iterator<Item = &AuthorityOutcome> {
        self.outcomes.iter().filter(|o| matches!(o.status, AuthorityStatus::Failed { .. }))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub requests: u64,
    pub invocations: u64,
    pub skipped: u64,
    pub backend_failures: u64,
}

pub struct AggregationOrchestrator {
    aggregators: Vec<Arc<dyn AttributeAggregator>>,
    failure_policy: FailurePolicy,
    requests: AtomicU64,
    invocations: AtomicU64,
    skipped: AtomicU64,
    backend_failures: AtomicU64,
}

impl AggregationOrchestrator {
    pub fn new(aggregators: Vec<Arc<dyn AttributeAggregator>>, failure_policy: FailurePolicy) -> Self {
        Self {
            aggregators,
            failure_policy,
            requests: AtomicU64::new(0),
            invocations: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            backend_failures: AtomicU64::new(0),
        }
    }

    pub fn from_config(cfg: &AuthoritiesConfig, registry: &AggregatorRegistry) -> Result<Self, AggregationError> {
        let aggregators = registry.build(cfg)?;
        info!(target: "aggregation", authorities = aggregators.len(), policy = ?cfg.failure_policy, "orchestrator ready");
        Ok(Self::new(aggregators, cfg.failure_policy))
    }

    pub fn authority_ids(&self) -> Vec<&str> { self.aggregators.iter().map(|a| a.attribute_authority_id()).collect() }

    pub fn failure_policy(&self) -> FailurePolicy { self.failure_policy }

    pub async fn aggregate(&self, request: &ArpAggregationRequest) -> Result<Vec<UserAttribute>, AggregationError> {
        Ok(self.aggregate_with_report(request).await?.attributes)
    }

    pub async fn aggregate_with_report(&self, request: &ArpAggregationRequest) -> Result<AggregationReport, AggregationError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let sp = request.service_provider_entity_id.as_deref().unwrap_or("<unspecified>");
        // Caller attributes are unattributed until an authority stamps them.
        let mut running: Vec<UserAttribute> = request
            .user_attributes
            .iter()
            .map(|a| UserAttribute { source: None, ..a.clone() })
            .collect();
        let mut contributed: Vec<UserAttribute> = Vec::new();
        let mut outcomes: Vec<AuthorityOutcome> = Vec::with_capacity(self.aggregators.len());
        let mut invoked = 0usize;
        let mut failed = 0usize;

        for agg in &self.aggregators {
            let id = agg.attribute_authority_id();
            if let Some(missing) = agg.missing_required_input(&running) {
                self.skip(id, missing, &mut outcomes);
                continue;
            }
            match agg.aggregate(&running, &request.arp_attributes).await {
                Ok(response) => {
                    invoked += 1;
                    self.invocations.fetch_add(1, Ordering::Relaxed);
                    let received = response.len();
                    let mut filtered = agg.filter_invalid_responses(response);
                    stamp_source(&mut filtered, id);
                    let dropped = received.saturating_sub(filtered.len());
                    debug!(target: "aggregation", authority = %id, count = filtered.len(), dropped, sp, "authority contributed");
                    outcomes.push(AuthorityOutcome {
                        authority: id.to_string(),
                        status: AuthorityStatus::Succeeded { count: filtered.len(), dropped },
                    });
                    running.extend(filtered.iter().cloned());
                    contributed.extend(filtered);
                }
                Err(AggregationError::MissingRequiredInput { attribute, .. }) => {
                    self.skip(id, attribute, &mut outcomes);
                }
                Err(e) => {
                    invoked += 1;
                    failed += 1;
                    self.invocations.fetch_add(1, Ordering::Relaxed);
                    self.backend_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(target: "aggregation", authority = %id, error = %e, sp, "authority failed");
                    if self.failure_policy == FailurePolicy::Abort {
                        return Err(e);
                    }
                    outcomes.push(AuthorityOutcome { authority: id.to_string(), status: AuthorityStatus::Failed { reason: e.to_string() } });
                }
            }
        }

        let attributes = if invoked > 0 && failed == invoked {
            warn!(target: "aggregation", invoked, sp, "every invoked authority failed; returning input unchanged");
            request.user_attributes.clone()
        } else {
            contributed
        };
        Ok(AggregationReport { attributes, outcomes })
    }

    fn skip(&self, id: &str, missing: String, outcomes: &mut Vec<AuthorityOutcome>) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        debug!(target: "aggregation", authority = %id, missing = %missing, "skipping authority; required input absent");
        outcomes.push(AuthorityOutcome { authority: id.to_string(), status: AuthorityStatus::Skipped { missing } });
    }

    pub fn stats(&self) -> AggregationStats {
        AggregationStats {
            requests: self.requests.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
