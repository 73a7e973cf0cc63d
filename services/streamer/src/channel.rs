//! Device Channel
//!
//! A [`DeviceChannel`] is one slice of a site's pixel buffer addressed to one
//! output of one controller. The site scheduler pushes frames in through
//! [`DeviceChannel::compress_and_enqueue`]; the channel's
//! [`ChannelWorker`](crate::worker::ChannelWorker) drains the queue to the
//! shared device connection on its own cadence.
//!
//! The queue is bounded at [`MAX_QUEUE_DEPTH`]. A full queue drops the newest
//! frame instead of blocking the renderer or growing without limit.

use bytes::{Bytes, BytesMut};
use codec::{color_bytes_at_offset, FrameEncoder, PacketBuilder};
use network::ConnectionRegistry;
use parking_lot::Mutex;
use serde::Serialize;
use settings::{NetworkSettings, StripSettings};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;
use types::{Crgb, TelemetryResponse};

use crate::error::EnqueueRejected;

/// Packets a channel may hold before it refuses frames
pub const MAX_QUEUE_DEPTH: usize = 99;

/// Identity and tuning of one channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub host: String,
    pub name: String,
    /// Output number on the controller
    pub channel: u8,
    /// First pixel of the slice within the site buffer
    pub offset: usize,
    pub length: usize,
    pub compress: bool,
    pub reversed: bool,
    pub swap_red_green: bool,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    /// Enqueue backoff while the host has no registered connection
    pub retry_backoff: Duration,
}

impl ChannelConfig {
    pub fn new(host: impl Into<String>, name: impl Into<String>, offset: usize, length: usize) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            channel: 0,
            offset,
            length,
            compress: true,
            reversed: false,
            swap_red_green: false,
            batch_size: 1,
            batch_timeout: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(2),
        }
    }

    pub fn from_settings(strip: &StripSettings, network: &NetworkSettings) -> Self {
        Self {
            host: strip.host.clone(),
            name: strip.name.clone(),
            channel: strip.channel,
            offset: strip.offset,
            length: strip.length,
            compress: strip.compress,
            reversed: strip.reversed,
            swap_red_green: strip.swap_red_green,
            batch_size: strip.batch_size.max(1),
            batch_timeout: strip.batch_timeout(),
            retry_backoff: network.retry_backoff(),
        }
    }

    /// One past the last pixel of the slice
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.length)
    }
}

/// Connection state as shown on a status display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connected,
    QueueFull,
    /// Queue was discarded at the cap; cleared by the next successful send
    Jammed,
    Stopped,
}

/// Point-in-time view of a channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub host: String,
    pub name: String,
    pub channel: u8,
    pub state: LinkState,
    pub queue_depth: usize,
    pub bytes_per_second: u64,
    pub firmware_version: Option<String>,
    pub connects: u64,
    pub frames_enqueued: u64,
    pub frames_rejected: u64,
    pub packets_discarded: u64,
    pub batches_sent: u64,
    pub telemetry: TelemetryResponse,
}

/// Packets drained from the queue for one combined write
#[derive(Debug, Clone)]
pub struct Batch {
    pub bytes: Bytes,
    pub packets: usize,
}

struct ChannelState {
    /// Last enqueue that got past the retry check
    last_attempt: Option<Instant>,
    last_batch: Instant,
    telemetry: TelemetryResponse,
}

#[derive(Default)]
struct ChannelCounters {
    connects: AtomicU64,
    enqueued: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
    batches: AtomicU64,
}

/// One logical output stream of a site
pub struct DeviceChannel {
    config: ChannelConfig,
    registry: Arc<ConnectionRegistry>,
    encoder: Arc<dyn FrameEncoder>,
    packets: PacketBuilder,
    queue: Mutex<VecDeque<Bytes>>,
    state: Mutex<ChannelState>,
    stopped: AtomicBool,
    jammed: AtomicBool,
    counters: ChannelCounters,
}

impl DeviceChannel {
    pub fn new(
        config: ChannelConfig,
        registry: Arc<ConnectionRegistry>,
        encoder: Arc<dyn FrameEncoder>,
    ) -> Self {
        Self {
            config,
            registry,
            encoder,
            packets: PacketBuilder::default(),
            queue: Mutex::new(VecDeque::with_capacity(MAX_QUEUE_DEPTH)),
            state: Mutex::new(ChannelState {
                last_attempt: None,
                last_batch: Instant::now(),
                telemetry: TelemetryResponse::default(),
            }),
            stopped: AtomicBool::new(false),
            jammed: AtomicBool::new(false),
            counters: ChannelCounters::default(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the shared connection for this host is up
    pub fn is_connected(&self) -> bool {
        self.registry
            .get(self.host())
            .is_some_and(|connection| connection.is_connected())
    }

    /// Live connection and room in the queue
    pub fn ready_for_data(&self) -> bool {
        !self.is_stopped() && self.is_connected() && self.queue_depth() < MAX_QUEUE_DEPTH
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Slice, transform, frame and queue one rendered buffer
    ///
    /// `pixels` is the whole site buffer; the channel takes its own slice.
    pub fn try_compress_and_enqueue(
        &self,
        pixels: &[Crgb],
        timestamp: SystemTime,
    ) -> Result<usize, EnqueueRejected> {
        if self.is_stopped() {
            return Err(EnqueueRejected::Disabled);
        }

        {
            let now = Instant::now();
            let mut state = self.state.lock();
            if let Some(last) = state.last_attempt {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.config.retry_backoff && !self.registry.contains(self.host()) {
                    return Err(EnqueueRejected::RetryBackoff {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }
            state.last_attempt = Some(now);
        }

        let depth = self.queue_depth();
        if depth >= MAX_QUEUE_DEPTH {
            return Err(EnqueueRejected::QueueOverflow { depth });
        }

        let pixel_bytes = color_bytes_at_offset(
            pixels,
            self.config.offset,
            self.config.length,
            self.config.reversed,
            self.config.swap_red_green,
        )
        .map_err(|_| EnqueueRejected::OutOfBounds {
            offset: self.config.offset,
            length: self.config.length,
            buffer_len: pixels.len(),
        })?;

        let frame = self.encoder.encode(&pixel_bytes, timestamp);
        let packet = self.packets.build(&frame, self.config.compress);

        let mut queue = self.queue.lock();
        if queue.len() >= MAX_QUEUE_DEPTH {
            return Err(EnqueueRejected::QueueOverflow { depth: queue.len() });
        }
        queue.push_back(packet.bytes);
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(queue.len())
    }

    /// Queue a frame, returning false when it was dropped
    pub fn compress_and_enqueue(&self, pixels: &[Crgb], timestamp: SystemTime) -> bool {
        match self.try_compress_and_enqueue(pixels, timestamp) {
            Ok(_) => true,
            Err(reason) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(
                    host = %self.config.host,
                    channel = %self.config.name,
                    reason = reason.category(),
                    "Frame not queued: {}",
                    reason
                );
                false
            }
        }
    }

    /// Whether the worker should flush the queue now
    ///
    /// Flushes once more than a second of frames is waiting, once anything is
    /// waiting and the batch timeout has passed since the last flush, or once
    /// the batch size is reached.
    pub fn should_send_batch(&self, site_fps: u32, now: Instant) -> bool {
        let depth = self.queue_depth();
        if depth > site_fps as usize {
            return true;
        }

        if depth > 0 {
            let last_batch = self.state.lock().last_batch;
            if now.saturating_duration_since(last_batch) > self.config.batch_timeout {
                return true;
            }
        }

        depth >= self.config.batch_size
    }

    /// Dequeue every waiting packet as one contiguous buffer
    ///
    /// Marks `now` as the last flush even when the queue was empty.
    pub fn take_batch(&self, now: Instant) -> Option<Batch> {
        self.state.lock().last_batch = now;

        let drained: Vec<Bytes> = self.queue.lock().drain(..).collect();
        if drained.is_empty() {
            return None;
        }

        let total = drained.iter().map(Bytes::len).sum();
        let mut combined = BytesMut::with_capacity(total);
        for packet in &drained {
            combined.extend_from_slice(packet);
        }

        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        Some(Batch {
            bytes: combined.freeze(),
            packets: drained.len(),
        })
    }

    /// Drop every queued packet, returning how many were dropped
    pub fn clear_queue(&self) -> usize {
        let mut queue = self.queue.lock();
        let dropped = queue.len();
        queue.clear();
        self.counters
            .discarded
            .fetch_add(dropped as u64, Ordering::Relaxed);
        dropped
    }

    /// Drop the whole queue of a device that cannot keep up and flag the jam
    pub fn discard_jammed(&self) -> usize {
        self.jammed.store(true, Ordering::Release);
        self.clear_queue()
    }

    pub fn is_jammed(&self) -> bool {
        self.jammed.load(Ordering::Acquire)
    }

    /// A batch reached the device
    pub fn note_sent(&self) {
        self.jammed.store(false, Ordering::Release);
    }

    /// Count a fresh connection entry created for this channel
    pub fn note_connect(&self) {
        self.counters.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connects(&self) -> u64 {
        self.counters.connects.load(Ordering::Relaxed)
    }

    pub fn frames_rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    pub fn record_telemetry(&self, telemetry: TelemetryResponse) {
        self.state.lock().telemetry = telemetry;
    }

    pub fn telemetry(&self) -> TelemetryResponse {
        self.state.lock().telemetry
    }

    /// Zero the cached telemetry so stale numbers are not displayed
    pub fn reset_telemetry(&self) {
        self.state.lock().telemetry.reset();
    }

    /// Refuse further frames and discard anything queued
    pub fn stop(&self) -> usize {
        self.stopped.store(true, Ordering::Release);
        self.clear_queue()
    }

    pub fn status(&self) -> ChannelStatus {
        let connection = self.registry.get(self.host());
        let connected = connection.as_ref().is_some_and(|c| c.is_connected());
        let queue_depth = self.queue_depth();

        let state = if self.is_stopped() {
            LinkState::Stopped
        } else if queue_depth >= MAX_QUEUE_DEPTH {
            LinkState::QueueFull
        } else if self.is_jammed() {
            LinkState::Jammed
        } else if connected {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };

        ChannelStatus {
            host: self.config.host.clone(),
            name: self.config.name.clone(),
            channel: self.config.channel,
            state,
            queue_depth,
            bytes_per_second: connection.as_ref().map_or(0, |c| c.bytes_per_second()),
            firmware_version: connection.as_ref().and_then(|c| c.firmware_version()),
            connects: self.connects(),
            frames_enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected(),
            packets_discarded: self.counters.discarded.load(Ordering::Relaxed),
            batches_sent: self.counters.batches.load(Ordering::Relaxed),
            telemetry: self.telemetry(),
        }
    }
}

impl std::fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("host", &self.config.host)
            .field("name", &self.config.name)
            .field("offset", &self.config.offset)
            .field("length", &self.config.length)
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}
