//! # Streamer Settings
//!
//! Typed configuration for the LED streamer: device socket tuning, status
//! reporting and the site layout (strips and scheduled effects).
//!
//! Settings are plain data. Turning them into running sites, channels and
//! effects is the streamer service's job.

pub mod streamer_config;
pub mod validation;

pub use streamer_config::{
    DaysSetting, EffectSettings, NetworkSettings, ScheduledEffectSettings, Settings,
    SiteSettings, StatusSettings, StripSettings, ENV_PREFIX, ENV_SEPARATOR,
};
pub use validation::ValidationError;
