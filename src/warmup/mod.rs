use http::Uri;
use tracing::{debug, info};

use crate::client::HttpClient;

/// Sequential requests issued before the measured phase to absorb one-time
/// connection and cache costs.
pub const WARMUP_REQUESTS: usize = 10;

/// Primes the target. Responses and errors are discarded alike; an
/// unreachable target never aborts the benchmark.
pub async fn run(client: &HttpClient, target: &Uri) {
    debug!(
        "Warming up {} with {} sequential requests",
        target, WARMUP_REQUESTS
    );

    for i in 0..WARMUP_REQUESTS {
        if let Err(e) = client.get(target).await {
            debug!("Warm-up request {} failed: {}", i + 1, e);
        }
    }

    info!("Warm-up complete");
}
