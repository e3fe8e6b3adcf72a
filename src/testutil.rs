use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct StubServer {
    pub addr: SocketAddr,
    /// Requests served so far.
    pub hits: Arc<AtomicUsize>,
    /// Most requests ever observed in flight at once.
    pub high_water: Arc<AtomicUsize>,
}

/// Spawns a minimal HTTP/1.1 server answering every request with the given
/// status line and body. Passing a non-zero delay holds each response open
/// so overlapping requests become observable through `high_water`.
pub async fn spawn_stub_server(
    status_line: &'static str,
    body: &'static str,
    delay: Duration,
) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));

    let server = StubServer {
        addr,
        hits: hits.clone(),
        high_water: high_water.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let hits = hits.clone();
            let high_water = high_water.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                let _ =
                    serve_connection(socket, status_line, body, delay, hits, in_flight, high_water)
                        .await;
            });
        }
    });

    server
}

async fn serve_connection(
    mut socket: TcpStream,
    status_line: &str,
    body: &str,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    high_water: Arc<AtomicUsize>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; 4096];

    loop {
        // read one request's worth of headers; clients here never send bodies
        let mut request = Vec::new();
        loop {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            request.extend_from_slice(&buf[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(current, Ordering::SeqCst);
        hits.fetch_add(1, Ordering::SeqCst);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-length: {}\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let result = socket.write_all(response.as_bytes()).await;

        in_flight.fetch_sub(1, Ordering::SeqCst);
        result?;
    }
}

/// Returns a port that had no listener at the time of the call.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
