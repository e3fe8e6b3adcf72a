use anyhow::{Context, Result, ensure};
use clap::Parser;
use http::Uri;
use serde::Deserialize;

pub const DEFAULT_TARGET_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_DURATION_SECONDS: u64 = 30;
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;
pub const DEFAULT_THREAD_COUNT: usize = 4;
pub const DEFAULT_TOTAL_REQUESTS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Fixed worker set pulling requests from a shared queue
    Pool,
    /// Sequential batches of at most the connection limit
    Batch,
}

/// CLI arguments for the throughput harness.
#[derive(Debug, Parser)]
#[command(name = "surge", version, about = "HTTP throughput harness", long_about = None)]
pub struct Args {
    /// Benchmark duration in seconds (reported only; the run is volume-based)
    #[arg(short, long, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Maximum number of concurrently in-flight requests
    #[arg(short, long, value_name = "N")]
    pub connections: Option<usize>,

    /// Worker thread count (reported only; tasks run on the async runtime)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Base URL of the target; its port is probed first during discovery
    #[arg(short, long)]
    pub url: Option<String>,

    /// Total number of requests to dispatch
    #[arg(short = 'n', long, value_name = "N")]
    pub requests: Option<u64>,

    /// Dispatch strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// TOML file with the same settings; explicit flags take precedence
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,
}

/// Optional on-disk settings, mirroring the CLI flags.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub duration: Option<u64>,
    pub connections: Option<usize>,
    pub threads: Option<usize>,
    pub url: Option<String>,
    pub requests: Option<u64>,
    pub strategy: Option<StrategyKind>,
}

impl FileConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Merged benchmark settings, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub duration_seconds: u64,
    pub max_connections: usize,
    pub thread_count: usize,
    pub target_url: Uri,
    pub total_requests: u64,
    pub strategy: StrategyKind,
}

impl BenchmarkConfig {
    pub fn resolve(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::from_file(path)
                .with_context(|| format!("Failed to load config file {}", path))?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let url = args
            .url
            .or(file.url)
            .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        let target_url: Uri = url
            .parse()
            .with_context(|| format!("Invalid target URL {}", url))?;
        ensure!(target_url.host().is_some(), "Target URL {} has no host", url);
        ensure!(
            target_url.scheme_str().is_none_or(|s| s == "http"),
            "Only plain http targets are supported, got {}",
            url
        );

        let max_connections = args
            .connections
            .or(file.connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        ensure!(max_connections >= 1, "Connection limit must be at least 1");

        Ok(Self {
            duration_seconds: args
                .duration
                .or(file.duration)
                .unwrap_or(DEFAULT_DURATION_SECONDS),
            max_connections,
            thread_count: args.threads.or(file.threads).unwrap_or(DEFAULT_THREAD_COUNT),
            target_url,
            total_requests: args
                .requests
                .or(file.requests)
                .unwrap_or(DEFAULT_TOTAL_REQUESTS),
            strategy: args.strategy.or(file.strategy).unwrap_or(StrategyKind::Pool),
        })
    }

    pub fn host(&self) -> &str {
        self.target_url.host().unwrap_or("127.0.0.1")
    }

    pub fn primary_port(&self) -> u16 {
        self.target_url.port_u16().unwrap_or(80)
    }
}
