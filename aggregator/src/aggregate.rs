//! Orchestration of one aggregation request: validate, plan, fan out, project.

use crate::errors::{AggregateError, UpstreamError};
use crate::executor::FanOutExecutor;
use crate::metrics_defs::AGGREGATE_TOTAL_FAILURES;
use crate::planner::{self, RequestedFields};
use crate::projector::{self, OutputRecord};
use crate::resource::Outcomes;
use crate::upstream::ResourceFetcher;
use shared::counter;
use std::sync::Arc;
use std::time::Duration;

pub struct Aggregator {
    executor: FanOutExecutor,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, task_timeout: Duration) -> Self {
        Self {
            executor: FanOutExecutor::new(fetcher, task_timeout),
        }
    }

    /// Aggregates the requested fields of one player.
    ///
    /// Preconditions are checked in order and before any upstream call:
    /// subject id, credential, non-empty plan. Individual upstream failures
    /// only drop the fields depending on them; a failure of every planned
    /// resource is a [`AggregateError::TotalFailure`].
    pub async fn aggregate(
        &self,
        raw_id: Option<&str>,
        requested: &RequestedFields,
    ) -> Result<OutputRecord, AggregateError> {
        let subject_id = parse_subject_id(raw_id)?;

        if !self.executor.fetcher().has_credentials() {
            tracing::error!("Aggregation requested without a session credential");
            return Err(AggregateError::MissingCredentials);
        }

        let resources = planner::plan(requested);
        if resources.is_empty() {
            return Err(AggregateError::NoValidFields);
        }

        let outcomes = self.executor.execute(&resources, subject_id).await;

        for (resource, outcome) in &outcomes {
            if let Err(e) = outcome {
                tracing::warn!(subject_id, %resource, error = %e, "Upstream fetch failed");
            }
        }

        if outcomes.values().all(Result::is_err) {
            counter!(AGGREGATE_TOTAL_FAILURES).increment(1);
            tracing::error!(subject_id, "Every upstream fetch failed");
            return Err(total_failure(&outcomes));
        }

        projector::project(&outcomes, requested)
    }
}

/// Parses a subject id: a positive integer, surrounding whitespace allowed.
pub fn parse_subject_id(raw: Option<&str>) -> Result<u64, AggregateError> {
    raw.map(str::trim)
        .and_then(|id| id.parse::<u64>().ok())
        .filter(|id| *id > 0)
        .ok_or(AggregateError::InvalidSubject)
}

/// Picks the most informative failure: the first one carrying an upstream
/// status, otherwise the first one.
fn total_failure(outcomes: &Outcomes) -> AggregateError {
    let failures: Vec<&UpstreamError> = outcomes
        .values()
        .filter_map(|outcome| outcome.as_ref().err())
        .collect();

    let richest = failures
        .iter()
        .find(|e| e.status().is_some())
        .or_else(|| failures.first());

    AggregateError::TotalFailure {
        upstream_status: richest.and_then(|e| e.status()),
        details: richest
            .map(|e| e.details())
            .unwrap_or_else(|| serde_json::Value::String("No upstream data".to_string())),
    }
}
