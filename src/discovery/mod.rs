use std::time::Duration;

use http::Uri;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

use crate::client::HttpClient;

/// Ports scanned, in order, when the primary port has no listener.
pub const CANDIDATE_PORTS: &[u16] = &[8080, 8000, 80, 3000, 3001, 8282];

/// Exact body the target serves on `/`; anything else is a different service.
pub const SENTINEL_BODY: &str = "Hello, World!";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(
        "no service answering with {SENTINEL_BODY:?} found on ports {scanned:?}; \
         start the target server (or pass --url) and re-run"
    )]
    TargetNotFound { scanned: Vec<u16> },
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub port: u16,
    pub is_listening: bool,
    pub body_matches: bool,
}

/// Finds the port the target service is actually running on.
///
/// The primary port is accepted on a bare listen check; only ports from the
/// scan list are additionally verified against the sentinel body.
pub struct TargetLocator {
    client: HttpClient,
    host: String,
    primary_port: u16,
    candidates: Vec<u16>,
    sentinel: String,
    probe_timeout: Duration,
}

impl TargetLocator {
    pub fn new(client: HttpClient, host: impl Into<String>, primary_port: u16) -> Self {
        Self {
            client,
            host: host.into(),
            primary_port,
            candidates: CANDIDATE_PORTS.to_vec(),
            sentinel: SENTINEL_BODY.to_string(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<u16>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub async fn locate(&self) -> Result<u16, DiscoveryError> {
        if probe_port(&self.addr_for(self.primary_port), self.probe_timeout).await {
            info!("Primary port {} is listening, using it", self.primary_port);
            return Ok(self.primary_port);
        }

        debug!(
            "Primary port {} not listening, scanning {} candidates",
            self.primary_port,
            self.candidates.len()
        );

        for &port in &self.candidates {
            let result = self.check_candidate(port).await;
            debug!(
                "Candidate {}: listening={} matches={}",
                result.port, result.is_listening, result.body_matches
            );
            if result.is_listening && result.body_matches {
                info!("Located target on port {}", port);
                return Ok(port);
            }
        }

        let mut scanned = vec![self.primary_port];
        scanned.extend(&self.candidates);
        Err(DiscoveryError::TargetNotFound { scanned })
    }

    async fn check_candidate(&self, port: u16) -> ProbeResult {
        if !probe_port(&self.addr_for(port), self.probe_timeout).await {
            return ProbeResult {
                port,
                is_listening: false,
                body_matches: false,
            };
        }

        let uri: Uri = match format!("http://{}:{}/", self.host, port).parse() {
            Ok(uri) => uri,
            Err(_) => {
                return ProbeResult {
                    port,
                    is_listening: true,
                    body_matches: false,
                };
            }
        };

        let body_matches = match self.client.get(&uri).await {
            Ok(response) => response.body.as_ref() == self.sentinel.as_bytes(),
            Err(e) => {
                debug!("Content check failed for port {}: {}", port, e);
                false
            }
        };

        ProbeResult {
            port,
            is_listening: true,
            body_matches,
        }
    }

    fn addr_for(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }
}

pub async fn probe_port(addr: &str, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            debug!("Probe SUCCESS for {}", addr);
            true
        }
        Ok(Err(e)) => {
            debug!("Probe FAILED for {}: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Probe TIMEOUT for {}", addr);
            false
        }
    }
}
