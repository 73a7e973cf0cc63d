//! Streamer Configuration Module
//!
//! Loads the site layout from a TOML file with `STREAMER__`-prefixed
//! environment overrides, e.g. `STREAMER__NETWORK__PORT=50000`.
//!
//! ```toml
//! [network]
//! port = 49152
//!
//! [[sites]]
//! name = "Cabinets"
//! width = 144
//! fps = 22
//!
//! [[sites.strips]]
//! host = "cabinets.local"
//! name = "Upper"
//! length = 144
//!
//! [[sites.effects]]
//! days = "weekdays"
//! start_hour = 9
//! end_hour = 17
//! effect = { kind = "color_cycle", degrees_per_second = 30.0 }
//! ```

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::validation::ValidationError;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "STREAMER";
/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";

/// Main streamer configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Device socket tuning
    pub network: NetworkSettings,

    /// Periodic status reporting
    pub status: StatusSettings,

    /// Installations to render and stream
    pub sites: Vec<SiteSettings>,
}

/// Device socket tuning
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// Longest a single batch write may take before the device is dropped
    pub send_timeout_ms: u64,
    pub connect_cooldown_ms: u64,
    /// Enqueue backoff while a host has no connection
    pub retry_backoff_ms: u64,
    /// Sleep between channel worker iterations
    pub worker_poll_ms: u64,
    /// Age at which the bytes-per-second window restarts
    pub telemetry_window_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            port: 49152,
            connect_timeout_ms: 5000,
            send_timeout_ms: 5000,
            connect_cooldown_ms: 1000,
            retry_backoff_ms: 2000,
            worker_poll_ms: 10,
            telemetry_window_secs: 10,
        }
    }
}

impl NetworkSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn connect_cooldown(&self) -> Duration {
        Duration::from_millis(self.connect_cooldown_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }

    pub fn telemetry_window(&self) -> Duration {
        Duration::from_secs(self.telemetry_window_secs)
    }
}

/// Periodic status reporting
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusSettings {
    /// Seconds between status reports, 0 disables them
    pub interval_secs: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// One installation: a pixel buffer, its strips and its effect schedule
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteSettings {
    pub name: String,
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_seconds_per_effect")]
    pub seconds_per_effect: u64,
    #[serde(default)]
    pub strips: Vec<StripSettings>,
    #[serde(default)]
    pub effects: Vec<ScheduledEffectSettings>,
}

impl SiteSettings {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One device channel: a slice of the site buffer sent to one controller
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StripSettings {
    pub host: String,
    pub name: String,
    /// Output channel on the controller
    #[serde(default)]
    pub channel: u8,
    /// First pixel of the slice within the site buffer
    #[serde(default)]
    pub offset: usize,
    pub length: usize,
    #[serde(default = "default_true")]
    pub compress: bool,
    #[serde(default)]
    pub reversed: bool,
    #[serde(default)]
    pub swap_red_green: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: f64,
}

impl StripSettings {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.batch_timeout_secs.max(0.0))
    }
}

/// Day selection: a keyword (`all`, `weekdays`, `weekends`), a single day
/// name, or a list of day names
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DaysSetting {
    One(String),
    Many(Vec<String>),
}

impl Default for DaysSetting {
    fn default() -> Self {
        DaysSetting::One("all".to_string())
    }
}

impl DaysSetting {
    pub fn names(&self) -> Vec<&str> {
        match self {
            DaysSetting::One(name) => vec![name.as_str()],
            DaysSetting::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// An effect bound to a weekly time window
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScheduledEffectSettings {
    #[serde(default)]
    pub days: DaysSetting,
    #[serde(default)]
    pub start_hour: u32,
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
    #[serde(default)]
    pub start_minute: u32,
    #[serde(default = "default_end_minute")]
    pub end_minute: u32,
    pub effect: EffectSettings,
}

/// Built-in effects, selected by `kind`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectSettings {
    /// Fill every pixel with one color
    Solid { color: [u8; 3] },
    /// Rotate hue over time, spread along the strip
    ColorCycle {
        #[serde(default = "default_degrees_per_second")]
        degrees_per_second: f64,
        /// Hue degrees between neighbouring pixels
        #[serde(default)]
        spread: f64,
        #[serde(default = "default_brightness")]
        brightness: f64,
    },
}

fn default_height() -> u32 {
    1
}

fn default_fps() -> u32 {
    22
}

fn default_true() -> bool {
    true
}

fn default_seconds_per_effect() -> u64 {
    60
}

fn default_batch_size() -> usize {
    1
}

fn default_batch_timeout_secs() -> f64 {
    1.0
}

fn default_end_hour() -> u32 {
    24
}

fn default_end_minute() -> u32 {
    60
}

fn default_degrees_per_second() -> f64 {
    30.0
}

fn default_brightness() -> f64 {
    1.0
}

impl Settings {
    /// Load configuration from a file with environment overrides
    ///
    /// Without a path only defaults and environment overrides apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading streamer config: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        // Override with environment variables (STREAMER__ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        let settings: Settings = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.validate().context("Invalid configuration")?;
        debug!(sites = settings.sites.len(), "Configuration loaded");
        Ok(settings)
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to parse configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.validate().context("Invalid configuration")?;
        Ok(settings)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        crate::validation::validate(self)
    }

    /// Get settings for a site by name
    pub fn site(&self, name: &str) -> Option<&SiteSettings> {
        self.sites.iter().find(|site| site.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [network]
        port = 50000

        [[sites]]
        name = "Cabinets"
        width = 300

        [[sites.strips]]
        host = "cabinets.local"
        name = "Upper"
        length = 144
        batch_size = 4

        [[sites.strips]]
        host = "cabinets.local"
        name = "Lower"
        channel = 1
        offset = 144
        length = 156
        reversed = true
        batch_timeout_secs = 0.5

        [[sites.effects]]
        days = "weekdays"
        start_hour = 9
        end_hour = 17
        effect = { kind = "solid", color = [255, 0, 0] }

        [[sites.effects]]
        days = ["saturday", "sunday"]
        effect = { kind = "color_cycle", spread = 2.5 }
    "#;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.network.port, 49152);
        assert_eq!(settings.network.retry_backoff(), Duration::from_secs(2));
        assert_eq!(settings.network.worker_poll(), Duration::from_millis(10));
        assert_eq!(settings.status.interval_secs, 5);
        assert!(settings.sites.is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.network.port, 50000);
        assert_eq!(settings.network.connect_cooldown_ms, 1000);

        let site = settings.site("Cabinets").unwrap();
        assert_eq!(site.height, 1);
        assert_eq!(site.fps, 22);
        assert!(site.enabled);
        assert_eq!(site.seconds_per_effect, 60);
        assert_eq!(site.pixel_count(), 300);

        let upper = &site.strips[0];
        assert!(upper.compress);
        assert_eq!(upper.batch_size, 4);
        assert_eq!(upper.batch_timeout(), Duration::from_secs(1));

        let lower = &site.strips[1];
        assert_eq!(lower.channel, 1);
        assert!(lower.reversed);
        assert_eq!(lower.batch_timeout(), Duration::from_millis(500));

        let weekday = &site.effects[0];
        assert_eq!(weekday.days.names(), vec!["weekdays"]);
        assert_eq!(weekday.end_minute, 60);
        assert_eq!(weekday.effect, EffectSettings::Solid { color: [255, 0, 0] });

        let weekend = &site.effects[1];
        assert_eq!(weekend.days.names(), vec!["saturday", "sunday"]);
        assert_eq!(weekend.end_hour, 24);
        assert_eq!(
            weekend.effect,
            EffectSettings::ColorCycle {
                degrees_per_second: 30.0,
                spread: 2.5,
                brightness: 1.0
            }
        );
    }

    #[test]
    fn test_unknown_effect_kind_rejected() {
        let toml = r#"
            [[sites]]
            name = "A"
            width = 10
            [[sites.effects]]
            effect = { kind = "starfield" }
        "#;
        assert!(Settings::from_toml_str(toml).is_err());
    }
}
