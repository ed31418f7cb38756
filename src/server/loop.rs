// Server loop module
// Accepts connections until shutdown, then drains in-flight requests

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How long shutdown waits for open connections before giving up on them
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept loop: serves until `shutdown` is notified.
///
/// Accept errors are logged and the loop keeps going; they are usually
/// transient (a client resetting before accept, or fd exhaustion).
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(
                        stream,
                        peer_addr,
                        &state,
                        &active_connections,
                        &graceful,
                    ),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => break,
        }
    }

    // Stop accepting before draining
    drop(listener);

    tokio::select! {
        () = graceful.shutdown() => tracing::info!("All connections closed"),
        () = tokio::time::sleep(DRAIN_TIMEOUT) => logger::log_warning(&format!(
            "Connections still open after {}s, exiting anyway",
            DRAIN_TIMEOUT.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::config::Config;
    use crate::server::listener::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), b"hello").expect("write");
        let cli = Cli {
            dir: Some(dir.path().to_string_lossy().into_owned()),
            prefix: Some("/".to_string()),
            config: "fileserve-test-config-that-does-not-exist".to_string(),
            ..Cli::default()
        };
        let mut config = Config::load(&cli).expect("config");
        config.logging.access_log = false;
        let state = Arc::new(AppState::new(&config));

        let listener = create_listener("127.0.0.1:0".parse().expect("addr")).expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut client = tokio::net::TcpStream::connect(addr).await.expect("connect");
        client
            .write_all(b"GET /a.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("send");
        let mut response = String::new();
        client.read_to_string(&mut response).await.expect("read");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server stops")
            .expect("server task");
    }
}
