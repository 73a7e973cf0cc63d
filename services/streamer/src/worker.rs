//! Channel Worker
//!
//! One task per channel: keeps the shared connection for the channel's host
//! alive, decides when to flush, and writes combined batches. Every socket
//! failure is handled here by dropping the registry entry; the next
//! iteration gets a fresh connection through the registry.

use network::ConnectionRegistry;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{DeviceChannel, MAX_QUEUE_DEPTH};

/// What one worker iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Queue was at the cap; it was emptied and the connection dropped
    Jammed { discarded: usize },
    /// Connect failed or is cooling down
    ConnectFailed,
    /// Nothing due yet
    Idle,
    Sent { packets: usize, bytes: usize },
    /// Write failed; the connection was dropped
    SendFailed,
}

/// Drains one channel into its device connection
pub struct ChannelWorker {
    channel: Arc<DeviceChannel>,
    registry: Arc<ConnectionRegistry>,
    site_fps: Arc<AtomicU32>,
    poll_interval: Duration,
}

impl ChannelWorker {
    pub fn new(
        channel: Arc<DeviceChannel>,
        site_fps: Arc<AtomicU32>,
        poll_interval: Duration,
    ) -> Self {
        let registry = Arc::clone(channel.registry());
        Self {
            channel,
            registry,
            site_fps,
            poll_interval,
        }
    }

    pub fn channel(&self) -> &Arc<DeviceChannel> {
        &self.channel
    }

    /// Run a single connect/flush iteration
    pub async fn step(&self) -> StepOutcome {
        let host = self.channel.host();
        let (connection, created) = self.registry.get_or_create(host);
        if created {
            self.channel.note_connect();
        }

        if self.channel.queue_depth() >= MAX_QUEUE_DEPTH {
            let discarded = self.channel.discard_jammed();
            warn!(host, channel = %self.channel.name(), discarded, "Discarding data for jammed socket");
            self.registry.remove(host, &connection);
            return StepOutcome::Jammed { discarded };
        }

        if !connection.is_connected() {
            if let Err(e) = connection.ensure_connected().await {
                if !e.keeps_connection() {
                    self.registry.remove(host, &connection);
                }
                debug!(host, error = %e, category = e.category(), "Device not connected");
                return StepOutcome::ConnectFailed;
            }
        }

        let now = Instant::now();
        if !self.channel.should_send_batch(self.site_fps.load(Ordering::Relaxed), now) {
            return StepOutcome::Idle;
        }

        let Some(batch) = self.channel.take_batch(now) else {
            return StepOutcome::Idle;
        };

        match connection.send(&batch.bytes).await {
            Ok(report) => {
                self.channel.note_sent();
                if let Some(telemetry) = report.telemetry {
                    self.channel.record_telemetry(telemetry);
                }
                debug!(host, packets = batch.packets, bytes = report.written, "Flushed batch");
                StepOutcome::Sent {
                    packets: batch.packets,
                    bytes: report.written,
                }
            }
            Err(e) => {
                warn!(
                    host,
                    channel = %self.channel.name(),
                    packets = batch.packets,
                    error = %e,
                    "Could not write batch, closing socket"
                );
                self.registry.remove(host, &connection);
                StepOutcome::SendFailed
            }
        }
    }

    /// Loop until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(host = %self.channel.host(), channel = %self.channel.name(), "Channel worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // An in-flight connect or write is abandoned on shutdown; the
            // server closes the socket afterwards
            let interrupted = tokio::select! {
                _ = self.step() => None,
                changed = shutdown.changed() => Some(changed.is_err()),
            };
            match interrupted {
                Some(true) => break,
                Some(false) => continue,
                None => {}
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(host = %self.channel.host(), channel = %self.channel.name(), "Channel worker stopped");
    }
}
