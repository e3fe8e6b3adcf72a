use anyhow::{Context, Result};
use clap::Parser;
use http::Uri;
use tracing::info;

mod client;
mod config;
mod discovery;
mod dispatch;
mod measure;
mod warmup;

#[cfg(test)]
mod testutil;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("surge=info,warn")
        .init();

    info!("Starting surge throughput harness");

    let config = config::BenchmarkConfig::resolve(config::Args::parse())?;
    info!(
        "Configured: duration {}s, {} connections, {} threads, {} requests, target {}",
        config.duration_seconds,
        config.max_connections,
        config.thread_count,
        config.total_requests,
        config.target_url
    );

    let client = client::HttpClient::new(config.max_connections);

    let locator = discovery::TargetLocator::new(
        client.clone(),
        config.host().to_string(),
        config.primary_port(),
    );
    let port = locator.locate().await.context("Service discovery failed")?;

    let target: Uri = format!("http://{}:{}/", config.host(), port).parse()?;
    info!("Target located at {}", target);

    warmup::run(&client, &target).await;

    let plan = dispatch::DispatchPlan::new(config.total_requests, config.max_connections, target)?;
    let strategy = dispatch::for_kind(config.strategy);
    info!(
        "Dispatching {} requests with the {} strategy (limit {})",
        plan.total_requests(),
        strategy.name(),
        plan.concurrency_limit()
    );

    let (summary, elapsed) = measure::timed(strategy.execute(&client, &plan)).await;
    let result = measure::compute(summary.attempted, elapsed);
    measure::render(&result, &summary);

    Ok(())
}
