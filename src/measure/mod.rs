use std::time::{Duration, Instant};

use crate::dispatch::DispatchSummary;

/// Minimum sustained rate the target has to hit for the run to pass.
pub const THROUGHPUT_THRESHOLD_RPS: f64 = 1000.0;

/// Elapsed times under this are clamped before the throughput division so a
/// run faster than the clock can resolve never produces inf or NaN.
const MIN_MEASURABLE: Duration = Duration::from_micros(1);

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub total_requests: u64,
    pub elapsed_seconds: f64,
    pub requests_per_second: f64,
    pub passed: bool,
    /// True when the elapsed time was below clock resolution and got clamped.
    pub clamped: bool,
}

/// Runs the dispatch future with timestamps taken immediately around it, so
/// discovery and warm-up never leak into the measurement.
pub async fn timed<F>(dispatch: F) -> (DispatchSummary, Duration)
where
    F: Future<Output = DispatchSummary>,
{
    let start = Instant::now();
    let summary = dispatch.await;
    (summary, start.elapsed())
}

pub fn compute(total_requests: u64, elapsed: Duration) -> BenchmarkResult {
    let clamped = elapsed < MIN_MEASURABLE;
    let effective = if clamped { MIN_MEASURABLE } else { elapsed };

    let elapsed_seconds = effective.as_secs_f64();
    let requests_per_second = total_requests as f64 / elapsed_seconds;

    BenchmarkResult {
        total_requests,
        elapsed_seconds,
        requests_per_second,
        passed: requests_per_second >= THROUGHPUT_THRESHOLD_RPS,
        clamped,
    }
}

pub fn render(result: &BenchmarkResult, summary: &DispatchSummary) {
    println!("\n=== Throughput Benchmark Results ===");
    println!("Total requests: {}", result.total_requests);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed: {}", summary.failed);
    if result.clamped {
        println!(
            "Duration: {:.6}s (below clock resolution, clamped)",
            result.elapsed_seconds
        );
    } else {
        println!("Duration: {:.2}s", result.elapsed_seconds);
    }
    println!("Requests/sec: {:.2}", result.requests_per_second);

    if result.passed {
        println!(
            "PASS: throughput at or above {:.0} req/s",
            THROUGHPUT_THRESHOLD_RPS
        );
    } else {
        println!(
            "FAIL: throughput below {:.0} req/s",
            THROUGHPUT_THRESHOLD_RPS
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_second_run_of_5000_passes() {
        let result = compute(5000, Duration::from_secs(4));

        assert_eq!(result.requests_per_second, 1250.0);
        assert!(result.passed);
        assert!(!result.clamped);
    }

    #[test]
    fn six_second_run_of_5000_fails() {
        let result = compute(5000, Duration::from_secs(6));

        assert!((result.requests_per_second - 5000.0 / 6.0).abs() < 1e-9);
        assert!(!result.passed);
    }

    #[test]
    fn threshold_is_inclusive() {
        let result = compute(1000, Duration::from_secs(1));

        assert_eq!(result.requests_per_second, 1000.0);
        assert!(result.passed);
    }

    #[test]
    fn zero_elapsed_is_clamped_not_a_crash() {
        let result = compute(5000, Duration::ZERO);

        assert!(result.clamped);
        assert!(result.requests_per_second.is_finite());
        assert!(result.elapsed_seconds > 0.0);
    }

    #[test]
    fn recomputing_from_stored_fields_is_idempotent() {
        let result = compute(5000, Duration::from_millis(3700));

        assert_eq!(
            result.total_requests as f64 / result.elapsed_seconds,
            result.requests_per_second
        );
    }

    #[tokio::test]
    async fn timing_wraps_only_the_dispatch_future() {
        let (summary, elapsed) = timed(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            DispatchSummary {
                attempted: 1,
                succeeded: 1,
                failed: 0,
            }
        })
        .await;

        assert_eq!(summary.attempted, 1);
        assert!(elapsed >= Duration::from_millis(50));
    }
}
