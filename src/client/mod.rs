use anyhow::Result;
use http::Uri;
use http_body_util::{BodyExt, Empty};
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

/// Pooled HTTP client shared by every phase of the benchmark. Cloning is
/// cheap and all clones reuse the same connection pool.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Empty<Bytes>>,
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpClient {
    pub fn new(max_idle_per_host: usize) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(max_idle_per_host)
            .build_http();

        Self { inner }
    }

    /// Plain GET with no extra headers or body. The response body is read to
    /// completion so the connection can go back to the pool.
    pub async fn get(&self, uri: &Uri) -> Result<HttpResponse> {
        let response = self.inner.get(uri.clone()).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        Ok(HttpResponse { status, body })
    }
}
