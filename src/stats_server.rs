//! HTTP stats server for link monitoring.
//!
//! Serves the shared [`LinkStats`] as JSON at `/stats`.
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_ms": 3600000,
//!   "tx_count": 150,
//!   "rx_count": 230,
//!   "ack_count": 610,
//!   "retry_count": 12,
//!   "failed_sends": 1,
//!   "expired_reassemblies": 0
//! }
//! ```

use crate::stats::LinkStats;
use log::{error, info, warn};
use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Response, Server};

/// Default port for the stats server.
pub const DEFAULT_STATS_PORT: u16 = 8080;

/// How often the server loop checks for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// HTTP stats server.
///
/// Runs in a background thread. Drop it to stop the server.
pub struct StatsServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    port: u16,
}

impl StatsServer {
    /// Start serving `stats` on `bind_addr:port` (`None` binds 0.0.0.0).
    ///
    /// Port 0 picks a free port; see [`StatsServer::port`].
    pub fn start(bind_addr: Option<IpAddr>, port: u16, stats: Arc<LinkStats>) -> io::Result<Self> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .unwrap_or(port);

        info!("Stats server listening on port {} (/stats)", port);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            port,
        })
    }

    /// Port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    fn run_server(server: Server, stats: Arc<LinkStats>, shutdown: Arc<AtomicBool>) {
        let content_type = header("Content-Type", "application/json");
        let allow_get = header("Allow", "GET");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Stats server shutting down");
                break;
            }

            let request = match server.recv_timeout(SHUTDOWN_POLL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    error!("Stats server error: {}", e);
                    break;
                }
            };

            if request.method() != &Method::Get {
                let mut response = Response::from_string("Method Not Allowed").with_status_code(405);
                if let Some(h) = &allow_get {
                    response = response.with_header(h.clone());
                }
                if let Err(e) = request.respond(response) {
                    warn!("Failed to send 405: {}", e);
                }
                continue;
            }

            let result = if matches!(request.url(), "/stats" | "/stats/") {
                let mut response = Response::from_string(stats.to_json());
                if let Some(h) = &content_type {
                    response = response.with_header(h.clone());
                }
                request.respond(response)
            } else {
                request.respond(Response::from_string("Not Found").with_status_code(404))
            };

            if let Err(e) = result {
                warn!("Failed to send response: {}", e);
            }
        }
    }

    /// Stop the server.
    ///
    /// May take up to 100 ms due to the polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}
