//! Sites
//!
//! A [`Site`] is one installation: a master pixel buffer, the channels that
//! slice it up, and the shared state the scheduler and the outside world
//! both touch (enabled flag, frame rate, manual effect offset, statistics).
//! The effects themselves live in the site's
//! [`SiteScheduler`](crate::scheduler::SiteScheduler), which owns them
//! exclusively.

use codec::PixelDataEncoder;
use network::ConnectionRegistry;
use parking_lot::RwLock;
use serde::Serialize;
use settings::{NetworkSettings, SiteSettings};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use types::PixelBuffer;

use crate::channel::{ChannelConfig, ChannelStatus, DeviceChannel};
use crate::error::{Result, StreamerError};

/// Frame rate used when a site is configured with 0
pub const FALLBACK_FPS: u32 = 30;
/// Spare time reported before any frame has been measured
pub const SPARE_MS_CEILING: u32 = 1000;
/// Effect name shown while no scheduled effect is eligible
pub const NO_EFFECT_RUNNING: &str = "[None Running]";

/// Render statistics shared between the scheduler and status readers
#[derive(Debug)]
pub struct SiteStats {
    frames_rendered: AtomicU64,
    frames_dropped: AtomicU64,
    frames_rejected: AtomicU64,
    spare_ms: AtomicU32,
}

impl Default for SiteStats {
    fn default() -> Self {
        Self {
            frames_rendered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            spare_ms: AtomicU32::new(SPARE_MS_CEILING),
        }
    }
}

impl SiteStats {
    pub fn record_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, count: u64) {
        self.frames_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Keep the smallest spare time seen since the last reset
    pub fn record_spare(&self, spare: Duration) {
        let ms = spare.as_millis().min(u128::from(SPARE_MS_CEILING)) as u32;
        self.spare_ms.fetch_min(ms, Ordering::Relaxed);
    }

    pub fn reset_spare(&self) {
        self.spare_ms.store(SPARE_MS_CEILING, Ordering::Relaxed);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected.load(Ordering::Relaxed)
    }

    pub fn spare_ms(&self) -> u32 {
        self.spare_ms.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a site
#[derive(Debug, Clone, Serialize)]
pub struct SiteStatus {
    pub name: String,
    pub enabled: bool,
    pub fps: u32,
    pub pixels: usize,
    pub current_effect: String,
    pub effect_offset: i64,
    pub frames_rendered: u64,
    pub frames_dropped: u64,
    pub frames_rejected: u64,
    pub spare_ms: u32,
    pub bytes_per_second: u64,
    pub channels: Vec<ChannelStatus>,
}

/// One installation and its channels
#[derive(Debug)]
pub struct Site {
    name: String,
    buffer: PixelBuffer,
    channels: Vec<Arc<DeviceChannel>>,
    registry: Arc<ConnectionRegistry>,
    enabled: AtomicBool,
    fps: Arc<AtomicU32>,
    seconds_per_effect: u64,
    effect_offset: AtomicI64,
    current_effect: RwLock<String>,
    started_at: Instant,
    stats: SiteStats,
}

impl Site {
    /// Create a site over `width * height` pixels
    ///
    /// Fails when the buffer is empty or any channel's slice does not fit.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        channels: Vec<DeviceChannel>,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self> {
        let name = name.into();
        let buffer = PixelBuffer::new(width, height);

        if buffer.is_empty() {
            return Err(StreamerError::configuration(
                &name,
                format!("site has zero pixels ({width}x{height})"),
            ));
        }

        for channel in &channels {
            let config = channel.config();
            match config.end() {
                Some(end) if end <= buffer.len() => {}
                _ => {
                    return Err(StreamerError::configuration(
                        &name,
                        format!(
                            "strip '{}' covers pixels {}+{} past the {} pixel buffer",
                            config.name,
                            config.offset,
                            config.length,
                            buffer.len()
                        ),
                    ))
                }
            }
        }

        Ok(Self {
            name,
            buffer,
            channels: channels.into_iter().map(Arc::new).collect(),
            registry,
            enabled: AtomicBool::new(true),
            fps: Arc::new(AtomicU32::new(22)),
            seconds_per_effect: 60,
            effect_offset: AtomicI64::new(0),
            current_effect: RwLock::new("[None]".to_string()),
            started_at: Instant::now(),
            stats: SiteStats::default(),
        })
    }

    /// Build a site and its channels from settings
    ///
    /// Every channel gets the stock pixel data encoder for its output number.
    pub fn from_settings(
        settings: &SiteSettings,
        network: &NetworkSettings,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self> {
        let channels = settings
            .strips
            .iter()
            .map(|strip| {
                DeviceChannel::new(
                    ChannelConfig::from_settings(strip, network),
                    Arc::clone(&registry),
                    Arc::new(PixelDataEncoder::new(u16::from(strip.channel))),
                )
            })
            .collect();

        let site = Self::new(
            settings.name.clone(),
            settings.width,
            settings.height,
            channels,
            registry,
        )?
        .with_fps(settings.fps)
        .with_seconds_per_effect(settings.seconds_per_effect);

        site.set_enabled(settings.enabled);
        Ok(site)
    }

    pub fn with_fps(self, fps: u32) -> Self {
        self.set_fps(fps);
        self
    }

    pub fn with_seconds_per_effect(mut self, seconds: u64) -> Self {
        self.seconds_per_effect = seconds.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn channels(&self) -> &[Arc<DeviceChannel>] {
        &self.channels
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    pub fn set_fps(&self, fps: u32) {
        self.fps.store(fps, Ordering::Relaxed);
    }

    /// Frame rate shared with the channel workers
    pub fn fps_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.fps)
    }

    /// Time allotted to one frame
    pub fn frame_interval(&self) -> Duration {
        let fps = match self.fps() {
            0 => FALLBACK_FPS,
            fps => fps,
        };
        Duration::from_secs_f64(1.0 / f64::from(fps))
    }

    pub fn seconds_per_effect(&self) -> u64 {
        self.seconds_per_effect
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Step the rotation forward by one effect
    pub fn next_effect(&self) {
        self.effect_offset.fetch_add(1, Ordering::Relaxed);
    }

    pub fn previous_effect(&self) {
        self.effect_offset.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn effect_offset(&self) -> i64 {
        self.effect_offset.load(Ordering::Relaxed)
    }

    pub fn current_effect_name(&self) -> String {
        self.current_effect.read().clone()
    }

    pub(crate) fn set_current_effect_name(&self, name: &str) {
        let mut current = self.current_effect.write();
        if current.as_str() != name {
            current.clear();
            current.push_str(name);
        }
    }

    pub fn stats(&self) -> &SiteStats {
        &self.stats
    }

    /// Combined send rate of the distinct hosts this site uses
    pub fn bytes_per_second(&self) -> u64 {
        self.registry
            .bytes_per_second_for(self.channels.iter().map(|channel| channel.host()))
    }

    pub fn status(&self) -> SiteStatus {
        SiteStatus {
            name: self.name.clone(),
            enabled: self.is_enabled(),
            fps: self.fps(),
            pixels: self.buffer.len(),
            current_effect: self.current_effect_name(),
            effect_offset: self.effect_offset(),
            frames_rendered: self.stats.frames_rendered(),
            frames_dropped: self.stats.frames_dropped(),
            frames_rejected: self.stats.frames_rejected(),
            spare_ms: self.stats.spare_ms(),
            bytes_per_second: self.bytes_per_second(),
            channels: self.channels.iter().map(|channel| channel.status()).collect(),
        }
    }
}
