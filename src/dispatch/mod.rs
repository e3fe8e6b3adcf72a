use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, ensure};
use futures::future::{BoxFuture, join_all};
use http::Uri;
use tracing::{debug, warn};

use crate::client::HttpClient;
use crate::config::StrategyKind;

/// What to dispatch: fixed request volume against one target, with a hard
/// cap on simultaneously outstanding requests.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    total_requests: u64,
    concurrency_limit: usize,
    target_url: Uri,
}

impl DispatchPlan {
    pub fn new(total_requests: u64, concurrency_limit: usize, target_url: Uri) -> Result<Self> {
        ensure!(concurrency_limit >= 1, "Concurrency limit must be at least 1");

        Ok(Self {
            total_requests,
            concurrency_limit,
            target_url,
        })
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn target_url(&self) -> &Uri {
        &self.target_url
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome {
    pub succeeded: bool,
}

/// Aggregate view of one dispatch run. `attempted` always equals the plan's
/// total once `execute` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl DispatchSummary {
    fn record(&mut self, outcome: RequestOutcome) {
        self.attempted += 1;
        if outcome.succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// A way of getting the planned request volume onto the wire without ever
/// exceeding the concurrency limit. `execute` returns once every request is
/// terminal.
pub trait DispatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute<'a>(
        &'a self,
        client: &'a HttpClient,
        plan: &'a DispatchPlan,
    ) -> BoxFuture<'a, DispatchSummary>;
}

pub fn for_kind(kind: StrategyKind) -> Box<dyn DispatchStrategy> {
    match kind {
        StrategyKind::Pool => Box::new(PoolDispatcher),
        StrategyKind::Batch => Box::new(BatchDispatcher),
    }
}

/// Batch-and-wait: spawn one batch of at most `concurrency_limit` requests,
/// join the whole batch, repeat. Concurrency dips below the limit as each
/// batch drains, which costs some sustained throughput versus the pool.
pub struct BatchDispatcher;

impl DispatchStrategy for BatchDispatcher {
    fn name(&self) -> &'static str {
        "batch"
    }

    fn execute<'a>(
        &'a self,
        client: &'a HttpClient,
        plan: &'a DispatchPlan,
    ) -> BoxFuture<'a, DispatchSummary> {
        Box::pin(async move {
            let mut summary = DispatchSummary::default();
            let mut remaining = plan.total_requests();

            while remaining > 0 {
                let batch_size = remaining.min(plan.concurrency_limit() as u64);

                let mut tasks = Vec::with_capacity(batch_size as usize);
                for _ in 0..batch_size {
                    let client = client.clone();
                    let target = plan.target_url().clone();
                    tasks.push(tokio::spawn(
                        async move { issue_request(&client, &target).await },
                    ));
                }

                for joined in join_all(tasks).await {
                    match joined {
                        Ok(outcome) => summary.record(outcome),
                        Err(e) => {
                            // the task held a slot in this batch, so its
                            // request still counts as attempted
                            warn!("Request task panicked: {}", e);
                            summary.record(RequestOutcome { succeeded: false });
                        }
                    }
                }

                remaining -= batch_size;
            }

            summary
        })
    }
}

/// Worker pool: `concurrency_limit` workers claim request indices from a
/// shared counter until the volume is consumed. Concurrency holds at the
/// limit until the queue drains.
pub struct PoolDispatcher;

impl DispatchStrategy for PoolDispatcher {
    fn name(&self) -> &'static str {
        "pool"
    }

    fn execute<'a>(
        &'a self,
        client: &'a HttpClient,
        plan: &'a DispatchPlan,
    ) -> BoxFuture<'a, DispatchSummary> {
        Box::pin(async move {
            let total = plan.total_requests();
            let next = Arc::new(AtomicU64::new(0));
            let succeeded = Arc::new(AtomicU64::new(0));
            let failed = Arc::new(AtomicU64::new(0));

            let mut workers = Vec::with_capacity(plan.concurrency_limit());
            for _ in 0..plan.concurrency_limit() {
                let client = client.clone();
                let target = plan.target_url().clone();
                let next = next.clone();
                let succeeded = succeeded.clone();
                let failed = failed.clone();

                workers.push(tokio::spawn(async move {
                    // each fetch_add claims one request index, so every
                    // planned request is issued by exactly one worker
                    while next.fetch_add(1, Ordering::Relaxed) < total {
                        let outcome = issue_request(&client, &target).await;
                        if outcome.succeeded {
                            succeeded.fetch_add(1, Ordering::Relaxed);
                        } else {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }));
            }

            for worker in workers {
                if let Err(e) = worker.await {
                    warn!("Worker task panicked: {}", e);
                }
            }

            let succeeded = succeeded.load(Ordering::Relaxed);
            let failed = failed.load(Ordering::Relaxed);

            DispatchSummary {
                attempted: succeeded + failed,
                succeeded,
                failed,
            }
        })
    }
}

/// One attempt. Transport errors and HTTP error statuses both land here as
/// failed outcomes; nothing is retried.
async fn issue_request(client: &HttpClient, target: &Uri) -> RequestOutcome {
    match client.get(target).await {
        Ok(response) => RequestOutcome {
            succeeded: response.status.is_success(),
        },
        Err(e) => {
            debug!("Request failed: {}", e);
            RequestOutcome { succeeded: false }
        }
    }
}
