// Connection handling module
// Accepts a single TCP connection and serves HTTP/1.1 on it

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::{Body, Incoming};
use hyper::header::{CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Version};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpStream;

use crate::config::AppState;
use crate::handler;
use crate::http::ResponseBody;
use crate::logger::{self, AccessLogEntry};

/// Accept a connection unless the connection limit is reached.
///
/// The counter is incremented before the check so that concurrent accepts
/// cannot both slip under the limit.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    graceful: &GracefulShutdown,
) {
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    tracing::debug!("Accepted connection from {peer_addr}");
    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        graceful,
    );
}

/// Serve one connection in a spawned task.
///
/// The connection is registered with `graceful` so shutdown can wait for
/// in-flight requests; the counter is decremented when it ends.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    graceful: &GracefulShutdown,
) {
    let io = TokioIo::new(stream);
    let timeout_secs = state.config.performance.connection_timeout;

    let mut builder = http1::Builder::new();
    builder.keep_alive(state.config.performance.keep_alive);

    let conn = builder.serve_connection(
        io,
        service_fn(move |req| serve_request(req, peer_addr, Arc::clone(&state))),
    );
    let conn = graceful.watch(conn);

    tokio::spawn(async move {
        if timeout_secs == 0 {
            if let Err(err) = conn.await {
                logger::log_connection_error(&err);
            }
        } else {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), conn).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => logger::log_connection_error(&err),
                Err(_) => logger::log_warning(&format!(
                    "Connection from {peer_addr} closed after {timeout_secs} seconds"
                )),
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Run the request handler, writing an access log line when enabled
async fn serve_request(
    req: Request<Incoming>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<hyper::Response<ResponseBody>, std::convert::Infallible> {
    if !state.access_log() {
        return handler::handle_request(req, state).await;
    }

    let start = Instant::now();
    let mut entry = access_entry(&req, peer_addr);

    let response = handler::handle_request(req, Arc::clone(&state)).await?;

    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.request_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, &state.access_log_format);

    Ok(response)
}

/// Capture the request side of an access log line before the body is consumed
fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: hyper::header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_length = header(CONTENT_LENGTH).and_then(|v| v.parse().ok());
    entry
}
