//! Device TCP Connection
//!
//! One [`DeviceConnection`] per controller host name, shared by every
//! channel that addresses that host. All socket operations are serialized
//! by an async mutex so that combined batches from different channels never
//! interleave on the wire.
//!
//! Lifecycle:
//!
//! ```text
//! new ──ensure_connected──▶ connected ──send ok──▶ connected
//!  │                          │
//!  │ resolve/connect error    │ write error / short write / write timeout / peer closed
//!  ▼                          ▼
//! dead ◀──────────────────── dead   (never retried; registry drops it)
//! ```

use super::metrics::{MetricsSnapshot, MetricsTracker, ThroughputMeter};
use crate::{Result, TransportError};
use bytes::BytesMut;
use parking_lot::Mutex;
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info, warn};
use types::{TelemetryResponse, TELEMETRY_RESPONSE_SIZE};

/// Port the strip firmware listens on
pub const DEFAULT_DEVICE_PORT: u16 = 49152;

/// Cap on unparsed telemetry bytes held between sends
const MAX_PENDING_TELEMETRY: usize = 16 * TELEMETRY_RESPONSE_SIZE;

/// Device connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Device port
    pub port: u16,
    /// Upper bound on a single TCP connect
    pub connect_timeout: Duration,
    /// Upper bound on writing one batch; a device that stops reading is dropped
    pub send_timeout: Duration,
    /// Minimum spacing between connect attempts to one host
    pub connect_cooldown: Duration,
    /// Age after which the bytes-per-second window restarts
    pub throughput_window: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DEVICE_PORT,
            connect_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(5),
            connect_cooldown: Duration::from_secs(1),
            throughput_window: Duration::from_secs(10),
        }
    }
}

/// Per-host connect attempt clock
///
/// Owned by the registry so the cooldown survives a connection being
/// dropped and recreated.
#[derive(Debug, Default)]
pub struct ConnectAttempts {
    last: Mutex<Option<Instant>>,
}

impl ConnectAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an attempt at `now`, or return the time since the last one
    pub fn begin(&self, now: Instant, cooldown: Duration) -> std::result::Result<(), Duration> {
        let mut last = self.last.lock();
        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < cooldown {
                return Err(elapsed);
            }
        }
        *last = Some(now);
        Ok(())
    }

    pub fn last(&self) -> Option<Instant> {
        *self.last.lock()
    }
}

/// Outcome of a successful send
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendReport {
    pub written: usize,
    /// Newest complete telemetry record available after the write, if any
    pub telemetry: Option<TelemetryResponse>,
}

/// Connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub host: String,
    pub peer_addr: Option<SocketAddr>,
    pub connected: bool,
    pub dead: bool,
    pub bytes_per_second: u64,
    pub firmware_version: Option<String>,
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

struct Link {
    stream: Option<TcpStream>,
    /// Telemetry bytes received but not yet forming a full record
    pending: BytesMut,
}

/// Shared TCP connection to one LED controller
pub struct DeviceConnection {
    host: String,
    config: ConnectionConfig,
    attempts: Arc<ConnectAttempts>,
    link: tokio::sync::Mutex<Link>,
    peer_addr: Mutex<Option<SocketAddr>>,
    connected: AtomicBool,
    dead: AtomicBool,
    throughput: ThroughputMeter,
    metrics: MetricsTracker,
    last_telemetry: Mutex<Option<TelemetryResponse>>,
}

impl DeviceConnection {
    pub fn new(host: impl Into<String>, config: ConnectionConfig, attempts: Arc<ConnectAttempts>) -> Self {
        let throughput = ThroughputMeter::new(config.throughput_window);
        Self {
            host: host.into(),
            config,
            attempts,
            link: tokio::sync::Mutex::new(Link {
                stream: None,
                pending: BytesMut::with_capacity(2 * TELEMETRY_RESPONSE_SIZE),
            }),
            peer_addr: Mutex::new(None),
            connected: AtomicBool::new(false),
            dead: AtomicBool::new(false),
            throughput,
            metrics: MetricsTracker::new(),
            last_telemetry: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Connected and not marked dead
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.is_dead()
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// Connect if not already connected
    ///
    /// A dead connection fails immediately without retrying. A connect
    /// inside the per-host cooldown fails with [`TransportError::Cooldown`]
    /// and leaves the connection usable. Resolve and connect failures mark
    /// the connection dead.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.is_dead() {
            return Err(TransportError::dead(&self.host));
        }

        let mut link = self.link.lock().await;
        if link.stream.is_some() {
            return Ok(());
        }

        let cooldown = self.config.connect_cooldown;
        if let Err(elapsed) = self.attempts.begin(Instant::now(), cooldown) {
            debug!(host = %self.host, elapsed_ms = elapsed.as_millis() as u64, "Connect attempt inside cooldown");
            return Err(TransportError::cooldown(&self.host, elapsed, cooldown));
        }

        let addr = match self.resolve().await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(host = %self.host, error = %e, "Device host did not resolve");
                self.mark_dead();
                return Err(e);
            }
        };

        debug!(host = %self.host, peer = %addr, "Connecting to device");
        let stream = match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.metrics.record_error();
                self.mark_dead();
                return Err(TransportError::connection_with_source(
                    &self.host,
                    "Failed to connect to device",
                    Some(addr),
                    e,
                ));
            }
            Err(_) => {
                self.metrics.record_error();
                self.mark_dead();
                return Err(TransportError::connection(
                    &self.host,
                    format!("Connect timed out after {}ms", self.config.connect_timeout.as_millis()),
                    Some(addr),
                ));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(host = %self.host, "Failed to set TCP_NODELAY: {}", e);
        }

        link.stream = Some(stream);
        link.pending.clear();
        *self.peer_addr.lock() = Some(addr);
        self.throughput.restart(Instant::now());
        self.connected.store(true, Ordering::Release);

        info!(host = %self.host, peer = %addr, "Connected to device");
        Ok(())
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = lookup_host((self.host.as_str(), self.config.port))
            .await
            .map_err(|e| TransportError::resolve_with_source(&self.host, "DNS lookup failed", e))?;
        addrs
            .next()
            .ok_or_else(|| TransportError::resolve(&self.host, "no addresses returned"))
    }

    /// Write the whole buffer, then pick up any telemetry already waiting
    ///
    /// A write error, a short write or a write outlasting `send_timeout`
    /// marks the connection dead; the short count is carried in
    /// [`TransportError::ShortWrite`]. The telemetry read never waits for the
    /// device.
    pub async fn send(&self, data: &[u8]) -> Result<SendReport> {
        if self.is_dead() {
            return Err(TransportError::dead(&self.host));
        }

        let mut link = self.link.lock().await;
        let Some(stream) = link.stream.as_mut() else {
            return Err(TransportError::transmission(&self.host, "Not connected"));
        };

        let send_timeout = self.config.send_timeout;
        let Ok((written, failure)) = tokio::time::timeout(send_timeout, write_counted(stream, data)).await
        else {
            self.metrics.record_error();
            self.fail(&mut link);
            warn!(host = %self.host, expected = data.len(), timeout_ms = send_timeout.as_millis() as u64, "Device stopped reading");
            return Err(TransportError::transmission(
                &self.host,
                format!("Write timed out after {}ms", send_timeout.as_millis()),
            ));
        };

        if let Some(e) = failure {
            self.metrics.record_error();
            self.fail(&mut link);
            warn!(host = %self.host, written, expected = data.len(), error = %e, "Write to device failed");
            return Err(TransportError::transmission_with_source(
                &self.host,
                "Failed to write batch",
                e,
            ));
        }
        if written != data.len() {
            self.metrics.record_error();
            self.fail(&mut link);
            warn!(host = %self.host, written, expected = data.len(), "Short write to device");
            return Err(TransportError::short_write(&self.host, written, data.len()));
        }

        self.throughput.record(written, Instant::now());
        self.metrics.record_send(written);
        debug!(host = %self.host, bytes = written, "Sent batch to device");

        let telemetry = self.drain_telemetry(&mut link);
        Ok(SendReport { written, telemetry })
    }

    /// Read whatever telemetry bytes are ready and parse complete records
    fn drain_telemetry(&self, link: &mut Link) -> Option<TelemetryResponse> {
        let mut scratch = [0u8; 4 * TELEMETRY_RESPONSE_SIZE];
        let mut peer_closed = false;

        if let Some(stream) = link.stream.as_ref() {
            loop {
                match stream.try_read(&mut scratch) {
                    Ok(0) => {
                        peer_closed = true;
                        break;
                    }
                    Ok(n) => link.pending.extend_from_slice(&scratch[..n]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        debug!(host = %self.host, error = %e, "Telemetry read failed");
                        break;
                    }
                }
                if link.pending.len() >= MAX_PENDING_TELEMETRY {
                    break;
                }
            }
        }

        let mut latest = None;
        while link.pending.len() >= TELEMETRY_RESPONSE_SIZE {
            let record = link.pending.split_to(TELEMETRY_RESPONSE_SIZE);
            if let Some(telemetry) = TelemetryResponse::parse(&record) {
                self.metrics.record_telemetry();
                latest = Some(telemetry);
            }
        }

        if let Some(telemetry) = latest {
            *self.last_telemetry.lock() = Some(telemetry);
        }

        if peer_closed {
            warn!(host = %self.host, "Device closed the connection");
            self.fail(link);
        }

        latest
    }

    fn mark_dead(&self) {
        self.dead.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);
    }

    fn fail(&self, link: &mut Link) {
        self.mark_dead();
        link.stream = None;
    }

    /// Close the socket; the connection stays not-dead but disconnected
    pub async fn close(&self) {
        let mut link = self.link.lock().await;
        if let Some(mut stream) = link.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(host = %self.host, error = %e, "Socket shutdown failed");
            }
            info!(host = %self.host, "Closed device connection");
        }
        self.connected.store(false, Ordering::Release);
    }

    /// Average send rate over the current throughput window
    pub fn bytes_per_second(&self) -> u64 {
        if !self.is_connected() {
            return 0;
        }
        self.throughput.bytes_per_second(Instant::now())
    }

    pub fn last_telemetry(&self) -> Option<TelemetryResponse> {
        *self.last_telemetry.lock()
    }

    /// Firmware version from the latest telemetry, e.g. `"v42"`
    pub fn firmware_version(&self) -> Option<String> {
        self.last_telemetry().map(|t| t.firmware_version())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            host: self.host.clone(),
            peer_addr: *self.peer_addr.lock(),
            connected: self.is_connected(),
            dead: self.is_dead(),
            bytes_per_second: self.bytes_per_second(),
            firmware_version: self.firmware_version(),
            counters: self.metrics.snapshot(),
        }
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("host", &self.host)
            .field("connected", &self.is_connected())
            .field("dead", &self.is_dead())
            .finish()
    }
}

/// Write until done, the peer stops accepting bytes, or an error occurs
async fn write_counted(stream: &mut TcpStream, data: &[u8]) -> (usize, Option<io::Error>) {
    let mut written = 0;
    while written < data.len() {
        match stream.write(&data[written..]).await {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (written, Some(e)),
        }
    }
    (written, None)
}
