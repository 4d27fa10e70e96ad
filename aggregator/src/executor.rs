//! Concurrent fan-out of upstream resource fetches.

use crate::errors::UpstreamError;
use crate::metrics_defs::{UPSTREAM_FAILURES, UPSTREAM_REQUEST_DURATION};
use crate::resource::{Outcome, Outcomes, Resource};
use crate::upstream::ResourceFetcher;
use shared::{counter, histogram};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;

/// Issues one upstream call per resource and waits for all of them to settle.
///
/// No call cancels another. Calls still running when the overall deadline
/// expires are aborted and recorded as timeouts, so the returned map holds
/// exactly one outcome for every requested resource.
pub struct FanOutExecutor {
    fetcher: Arc<dyn ResourceFetcher>,
    task_timeout: Duration,
}

impl FanOutExecutor {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, task_timeout: Duration) -> Self {
        Self {
            fetcher,
            task_timeout,
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn ResourceFetcher> {
        &self.fetcher
    }

    pub async fn execute(&self, resources: &BTreeSet<Resource>, subject_id: u64) -> Outcomes {
        let mut outcomes = Outcomes::new();
        if resources.is_empty() {
            return outcomes;
        }

        let mut join_set = JoinSet::new();
        let mut pending: HashMap<Id, Resource> = HashMap::new();

        for &resource in resources {
            let fetcher = self.fetcher.clone();
            let abort_handle = join_set.spawn(async move {
                let started = Instant::now();
                let outcome = fetcher.fetch(resource, subject_id).await;
                histogram!(UPSTREAM_REQUEST_DURATION, "resource" => resource.name())
                    .record(started.elapsed().as_secs_f64());
                (resource, outcome)
            });
            pending.insert(abort_handle.id(), resource);
        }

        let deadline = tokio::time::sleep(self.task_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = join_set.join_next_with_id() => match joined {
                    Some(joined) => {
                        if let Some((resource, outcome)) = settle(joined, &mut pending) {
                            outcomes.insert(resource, outcome);
                        }
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        subject_id,
                        remaining = join_set.len(),
                        "Fan-out deadline reached, aborting remaining upstream calls"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        drain_aborted(&mut join_set, &mut pending, &mut outcomes).await;
        for (_, resource) in pending.drain() {
            outcomes.insert(resource, Err(UpstreamError::Timeout));
        }

        for (resource, outcome) in &outcomes {
            if let Err(e) = outcome {
                counter!(UPSTREAM_FAILURES, "resource" => resource.name(), "kind" => e.kind())
                    .increment(1);
            }
        }

        outcomes
    }
}

/// Joins every task left after `abort_all`.
///
/// Tasks that completed before the abort keep their outcome; cancelled ones
/// stay in `pending`.
async fn drain_aborted(
    join_set: &mut JoinSet<(Resource, Outcome)>,
    pending: &mut HashMap<Id, Resource>,
    outcomes: &mut Outcomes,
) {
    while let Some(joined) = join_set.join_next_with_id().await {
        if matches!(&joined, Err(e) if e.is_cancelled()) {
            continue;
        }
        if let Some((resource, outcome)) = settle(joined, pending) {
            outcomes.insert(resource, outcome);
        }
    }
}

/// Resolves one joined task into its resource and outcome.
fn settle(
    joined: Result<(Id, (Resource, Outcome)), JoinError>,
    pending: &mut HashMap<Id, Resource>,
) -> Option<(Resource, Outcome)> {
    match joined {
        Ok((id, (resource, outcome))) => {
            pending.remove(&id);
            Some((resource, outcome))
        }
        Err(e) => {
            let resource = pending.remove(&e.id())?;
            tracing::error!(%resource, error = %e, "Upstream task failed");
            Some((resource, Err(UpstreamError::TaskFailed(e.to_string()))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hyper::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers from a fixed script and records every call.
    #[derive(Default)]
    struct ScriptedFetcher {
        failing: Vec<Resource>,
        slow: Vec<Resource>,
        panicking: Vec<Resource>,
        calls: Mutex<Vec<Resource>>,
    }

    #[async_trait]
    impl ResourceFetcher for ScriptedFetcher {
        async fn fetch(&self, resource: Resource, _subject_id: u64) -> Outcome {
            self.calls.lock().unwrap().push(resource);
            if self.panicking.contains(&resource) {
                panic!("boom");
            }
            if self.slow.contains(&resource) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.failing.contains(&resource) {
                return Err(UpstreamError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: json!("down"),
                });
            }
            Ok(json!({"resource": resource.name()}))
        }

        fn has_credentials(&self) -> bool {
            true
        }
    }

    fn executor(fetcher: Arc<ScriptedFetcher>, task_timeout: Duration) -> FanOutExecutor {
        FanOutExecutor::new(fetcher, task_timeout)
    }

    #[tokio::test]
    async fn test_empty_plan_makes_no_calls() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let outcomes = executor(fetcher.clone(), Duration::from_secs(1))
            .execute(&BTreeSet::new(), 1)
            .await;

        assert!(outcomes.is_empty());
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_outcome_per_resource() {
        let fetcher = Arc::new(ScriptedFetcher {
            failing: vec![Resource::Status],
            ..Default::default()
        });
        let resources = BTreeSet::from([Resource::UserProfile, Resource::Status, Resource::Badges]);

        let outcomes = executor(fetcher.clone(), Duration::from_secs(5))
            .execute(&resources, 1)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 3);
        assert_eq!(
            outcomes[&Resource::UserProfile].as_ref().unwrap(),
            &json!({"resource": "user_profile"})
        );
        assert_eq!(
            outcomes[&Resource::Status].as_ref().unwrap_err().status(),
            Some(StatusCode::SERVICE_UNAVAILABLE)
        );
        assert!(outcomes[&Resource::Badges].is_ok());
    }

    #[tokio::test]
    async fn test_panicking_task_is_recorded_as_failure() {
        let fetcher = Arc::new(ScriptedFetcher {
            panicking: vec![Resource::Friends],
            ..Default::default()
        });
        let resources = BTreeSet::from([Resource::Friends, Resource::GroupRoles]);

        let outcomes = executor(fetcher, Duration::from_secs(5))
            .execute(&resources, 1)
            .await;

        assert!(matches!(
            outcomes[&Resource::Friends],
            Err(UpstreamError::TaskFailed(_))
        ));
        assert!(outcomes[&Resource::GroupRoles].is_ok());
    }

    #[tokio::test]
    async fn test_deadline_aborts_stragglers() {
        let fetcher = Arc::new(ScriptedFetcher {
            slow: vec![Resource::UsernameHistory],
            ..Default::default()
        });
        let resources = BTreeSet::from([Resource::UserProfile, Resource::UsernameHistory]);

        let started = Instant::now();
        let outcomes = executor(fetcher, Duration::from_millis(200))
            .execute(&resources, 1)
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcomes[&Resource::UserProfile].is_ok());
        assert!(matches!(
            outcomes[&Resource::UsernameHistory],
            Err(UpstreamError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_drain_keeps_finished_results() {
        let mut join_set: JoinSet<(Resource, Outcome)> = JoinSet::new();
        let mut pending: HashMap<Id, Resource> = HashMap::new();

        let done = join_set.spawn(async { (Resource::Status, Ok(json!({"userPresenceType": 1}))) });
        pending.insert(done.id(), Resource::Status);
        let stuck = join_set.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (Resource::Friends, Ok(json!({})))
        });
        pending.insert(stuck.id(), Resource::Friends);

        while !done.is_finished() {
            tokio::task::yield_now().await;
        }
        join_set.abort_all();

        let mut outcomes = Outcomes::new();
        drain_aborted(&mut join_set, &mut pending, &mut outcomes).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[&Resource::Status].as_ref().unwrap(),
            &json!({"userPresenceType": 1})
        );
        assert_eq!(pending.into_values().collect::<Vec<_>>(), vec![Resource::Friends]);
    }

    #[tokio::test]
    async fn test_returns_without_waiting_for_deadline() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let started = Instant::now();
        let outcomes = executor(fetcher, Duration::from_secs(30))
            .execute(&BTreeSet::from([Resource::Status]), 1)
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
