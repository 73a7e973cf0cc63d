//! Configuration validation
//!
//! Structural checks only. Whether a strip fits inside its site buffer is
//! checked again when the site is built, since that is where the buffer
//! actually exists.

use std::collections::HashSet;
use thiserror::Error;

use crate::streamer_config::{EffectSettings, Settings};

/// A configuration value that cannot be run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Site name must not be empty")]
    EmptySiteName,

    #[error("Duplicate site name '{name}'")]
    DuplicateSite { name: String },

    #[error("Site '{site}' has zero pixels ({width}x{height})")]
    EmptySite { site: String, width: u32, height: u32 },

    #[error("Strip '{strip}' on site '{site}' has an empty host name")]
    EmptyHost { site: String, strip: String },

    #[error("Strip '{strip}' on site '{site}' has zero length")]
    EmptyStrip { site: String, strip: String },

    #[error("Strip '{strip}' on site '{site}' has batch size 0")]
    ZeroBatchSize { site: String, strip: String },

    #[error("Strip '{strip}' on site '{site}' has invalid batch timeout {timeout}")]
    InvalidBatchTimeout { site: String, strip: String, timeout: f64 },

    #[error("Effect {index} on site '{site}' has invalid window: {reason}")]
    InvalidWindow { site: String, index: usize, reason: String },

    #[error("Effect {index} on site '{site}' has invalid parameter: {reason}")]
    InvalidEffect { site: String, index: usize, reason: String },
}

pub(crate) fn validate(settings: &Settings) -> Result<(), ValidationError> {
    let mut names = HashSet::new();

    for site in &settings.sites {
        if site.name.trim().is_empty() {
            return Err(ValidationError::EmptySiteName);
        }
        if !names.insert(site.name.as_str()) {
            return Err(ValidationError::DuplicateSite {
                name: site.name.clone(),
            });
        }
        if site.pixel_count() == 0 {
            return Err(ValidationError::EmptySite {
                site: site.name.clone(),
                width: site.width,
                height: site.height,
            });
        }

        for strip in &site.strips {
            if strip.host.trim().is_empty() {
                return Err(ValidationError::EmptyHost {
                    site: site.name.clone(),
                    strip: strip.name.clone(),
                });
            }
            if strip.length == 0 {
                return Err(ValidationError::EmptyStrip {
                    site: site.name.clone(),
                    strip: strip.name.clone(),
                });
            }
            if strip.batch_size == 0 {
                return Err(ValidationError::ZeroBatchSize {
                    site: site.name.clone(),
                    strip: strip.name.clone(),
                });
            }
            if !strip.batch_timeout_secs.is_finite() || strip.batch_timeout_secs < 0.0 {
                return Err(ValidationError::InvalidBatchTimeout {
                    site: site.name.clone(),
                    strip: strip.name.clone(),
                    timeout: strip.batch_timeout_secs,
                });
            }
        }

        for (index, scheduled) in site.effects.iter().enumerate() {
            let window_error = |reason: String| ValidationError::InvalidWindow {
                site: site.name.clone(),
                index,
                reason,
            };

            if scheduled.start_hour > 24 || scheduled.end_hour > 24 {
                return Err(window_error(format!(
                    "hours {}..{} outside 0..=24",
                    scheduled.start_hour, scheduled.end_hour
                )));
            }
            if scheduled.start_minute > 60 || scheduled.end_minute > 60 {
                return Err(window_error(format!(
                    "minutes {}..{} outside 0..=60",
                    scheduled.start_minute, scheduled.end_minute
                )));
            }
            if scheduled.days.names().is_empty() {
                return Err(window_error("no days selected".to_string()));
            }

            if let EffectSettings::ColorCycle {
                degrees_per_second,
                spread,
                brightness,
            } = &scheduled.effect
            {
                if !degrees_per_second.is_finite() || !spread.is_finite() {
                    return Err(ValidationError::InvalidEffect {
                        site: site.name.clone(),
                        index,
                        reason: "color cycle rates must be finite".to_string(),
                    });
                }
                if !(0.0..=1.0).contains(brightness) {
                    return Err(ValidationError::InvalidEffect {
                        site: site.name.clone(),
                        index,
                        reason: format!("brightness {brightness} outside 0..=1"),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer_config::{
        DaysSetting, ScheduledEffectSettings, SiteSettings, StripSettings,
    };

    fn site() -> SiteSettings {
        SiteSettings {
            name: "Bench".to_string(),
            width: 100,
            height: 1,
            fps: 22,
            enabled: true,
            seconds_per_effect: 60,
            strips: vec![StripSettings {
                host: "bench.local".to_string(),
                name: "Main".to_string(),
                channel: 0,
                offset: 0,
                length: 100,
                compress: true,
                reversed: false,
                swap_red_green: false,
                batch_size: 1,
                batch_timeout_secs: 1.0,
            }],
            effects: vec![ScheduledEffectSettings {
                days: DaysSetting::default(),
                start_hour: 0,
                end_hour: 24,
                start_minute: 0,
                end_minute: 60,
                effect: EffectSettings::Solid { color: [1, 2, 3] },
            }],
        }
    }

    fn settings_with(site: SiteSettings) -> Settings {
        Settings {
            sites: vec![site],
            ..Settings::default()
        }
    }

    #[test]
    fn test_valid_site_passes() {
        assert_eq!(settings_with(site()).validate(), Ok(()));
    }

    #[test]
    fn test_zero_sized_site() {
        let mut bad = site();
        bad.width = 0;
        assert!(matches!(
            settings_with(bad).validate(),
            Err(ValidationError::EmptySite { .. })
        ));
    }

    #[test]
    fn test_empty_host() {
        let mut bad = site();
        bad.strips[0].host = "  ".to_string();
        assert!(matches!(
            settings_with(bad).validate(),
            Err(ValidationError::EmptyHost { .. })
        ));
    }

    #[test]
    fn test_duplicate_site_names() {
        let settings = Settings {
            sites: vec![site(), site()],
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ValidationError::DuplicateSite {
                name: "Bench".to_string()
            })
        );
    }

    #[test]
    fn test_window_bounds() {
        let mut bad = site();
        bad.effects[0].end_hour = 25;
        assert!(matches!(
            settings_with(bad).validate(),
            Err(ValidationError::InvalidWindow { index: 0, .. })
        ));
    }

    #[test]
    fn test_batch_rules() {
        let mut bad = site();
        bad.strips[0].batch_size = 0;
        assert!(matches!(
            settings_with(bad).validate(),
            Err(ValidationError::ZeroBatchSize { .. })
        ));

        let mut bad = site();
        bad.strips[0].batch_timeout_secs = -1.0;
        assert!(matches!(
            settings_with(bad).validate(),
            Err(ValidationError::InvalidBatchTimeout { .. })
        ));
    }
}
