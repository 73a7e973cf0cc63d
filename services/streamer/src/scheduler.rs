//! Site Scheduler
//!
//! One task per site. Each tick picks the active effect, renders it into the
//! site buffer under the buffer lock, then offers the frame to every channel.
//!
//! Effect selection: the effects whose window matches the local clock are
//! eligible, and the active one advances every `seconds_per_effect` plus the
//! site's manual offset, modulo the number of eligible effects.
//!
//! Cadence: frames are due every `1 / fps`. A frame that overruns its slot is
//! counted as dropped and the next one starts immediately, with no attempt to
//! catch up on the frames that were skipped.

use chrono::{DateTime, Datelike, Local, Timelike};
use settings::ScheduledEffectSettings;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::effects::build_effect;
use crate::error::{Result, StreamerError};
use crate::schedule::{DaySet, ScheduledEffect, TimeWindow};
use crate::site::{Site, NO_EFFECT_RUNNING};
use crate::surface::Canvas;

/// Sleep between checks while a site is disabled
pub const DISABLED_POLL: Duration = Duration::from_millis(100);

/// What one render tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Index into the scheduled effect list, if any effect ran
    pub effect: Option<usize>,
    pub frames_enqueued: usize,
    pub frames_rejected: usize,
    /// Channels skipped because they were not ready
    pub channels_skipped: usize,
}

/// Drives rendering for one site
pub struct SiteScheduler {
    site: Arc<Site>,
    effects: Vec<ScheduledEffect>,
    current: Option<usize>,
    effect_started: Instant,
}

impl SiteScheduler {
    pub fn new(site: Arc<Site>, effects: Vec<ScheduledEffect>) -> Self {
        Self {
            site,
            effects,
            current: None,
            effect_started: Instant::now(),
        }
    }

    /// Build the stock effects and their windows from settings
    pub fn from_settings(site: Arc<Site>, settings: &[ScheduledEffectSettings]) -> Result<Self> {
        let effects = settings
            .iter()
            .enumerate()
            .map(|(index, scheduled)| {
                let days = DaySet::from_names(scheduled.days.names()).map_err(|e| {
                    StreamerError::configuration(site.name(), format!("effect {index}: {e}"))
                })?;
                let window = TimeWindow::new(days, scheduled.start_hour, scheduled.end_hour)
                    .with_minutes(scheduled.start_minute, scheduled.end_minute);
                Ok(ScheduledEffect::new(window, build_effect(&scheduled.effect)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(site, effects))
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    pub fn effects(&self) -> &[ScheduledEffect] {
        &self.effects
    }

    /// Index of the effect that rendered last, if any
    pub fn current_effect(&self) -> Option<usize> {
        self.current
    }

    /// Pick the effect for `now`, running stop/start hooks on a change
    ///
    /// `elapsed` is the time since the site started and drives rotation.
    pub fn select_effect<T: Datelike + Timelike>(&mut self, now: &T, elapsed: Duration) -> Option<usize> {
        let eligible: Vec<usize> = self
            .effects
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.window.is_active(now))
            .map(|(index, _)| index)
            .collect();

        let selected = if eligible.is_empty() {
            None
        } else {
            let rotation = (elapsed.as_secs() / self.site.seconds_per_effect()) as i64;
            let position = (rotation + self.site.effect_offset()).rem_euclid(eligible.len() as i64);
            Some(eligible[position as usize])
        };

        if selected != self.current {
            if let Some(outgoing) = self.current {
                self.effects[outgoing].effect.stop();
            }
            if let Some(incoming) = selected {
                self.effects[incoming].effect.start();
                self.effect_started = Instant::now();
                info!(
                    site = %self.site.name(),
                    effect = %self.effects[incoming].name(),
                    position = incoming,
                    eligible = eligible.len(),
                    "Switching effect"
                );
            }
            self.current = selected;
        }

        selected
    }

    /// Render one frame for local time `now` and offer it to every channel
    ///
    /// `timestamp` is the presentation time stamped into each device frame.
    pub fn tick<T: Datelike + Timelike>(&mut self, now: &T, timestamp: SystemTime) -> TickReport {
        let elapsed = self.site.started_at().elapsed();
        let effect = self.select_effect(now, elapsed);

        match effect {
            Some(index) => {
                let effect_elapsed = self.effect_started.elapsed();
                let buffer = self.site.buffer().clone();
                {
                    let mut pixels = buffer.lock();
                    let mut canvas = Canvas::new(&mut pixels, buffer.width(), buffer.height());
                    self.effects[index].effect.render(&mut canvas, effect_elapsed);
                }
                self.site.set_current_effect_name(self.effects[index].name());
                self.site.stats().record_rendered();
            }
            None => self.site.set_current_effect_name(NO_EFFECT_RUNNING),
        }

        let mut report = self.dispatch(timestamp);
        report.effect = effect;
        report
    }

    /// Offer the current buffer to every channel of the site
    ///
    /// Channels that are not ready get their cached telemetry zeroed instead.
    pub fn dispatch(&self, timestamp: SystemTime) -> TickReport {
        let mut report = TickReport {
            effect: self.current,
            frames_enqueued: 0,
            frames_rejected: 0,
            channels_skipped: 0,
        };

        let buffer = self.site.buffer();
        for channel in self.site.channels() {
            if !channel.ready_for_data() {
                channel.reset_telemetry();
                report.channels_skipped += 1;
                continue;
            }

            let queued = {
                let pixels = buffer.lock();
                channel.compress_and_enqueue(&pixels, timestamp)
            };
            if queued {
                report.frames_enqueued += 1;
            } else {
                report.frames_rejected += 1;
            }
        }

        if report.frames_rejected > 0 {
            self.site.stats().record_rejected(report.frames_rejected as u64);
        }
        report
    }

    /// Render at the site frame rate until `shutdown` turns true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(site = %self.site.name(), fps = self.site.fps(), "Site scheduler started");

        let mut last_frame = Instant::now()
            .checked_sub(self.site.frame_interval())
            .unwrap_or_else(Instant::now);
        let mut last_spare_reset = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !self.site.is_enabled() {
                if wait_or_shutdown(&mut shutdown, DISABLED_POLL).await {
                    break;
                }
                last_frame = Instant::now();
                continue;
            }

            let next_frame = last_frame + self.site.frame_interval();
            let lead = next_frame.saturating_duration_since(Instant::now());
            let timestamp = SystemTime::now() + lead;
            let local: DateTime<Local> = Local::now();

            self.tick(&local, timestamp);

            let now = Instant::now();
            let pause = if next_frame > now {
                let spare = next_frame - now;
                self.site.stats().record_spare(spare);
                last_frame = next_frame;
                spare
            } else {
                let overrun = now - next_frame;
                self.site.stats().record_spare(Duration::ZERO);
                self.site.stats().record_dropped();
                debug!(site = %self.site.name(), overrun_ms = overrun.as_millis() as u64, "Dropped frame");
                last_frame = now;
                Duration::from_millis(1)
            };

            if now.saturating_duration_since(last_spare_reset) > Duration::from_secs(1) {
                self.site.stats().reset_spare();
                last_spare_reset = now;
            }

            if wait_or_shutdown(&mut shutdown, pause).await {
                break;
            }
        }

        if let Some(current) = self.current.take() {
            self.effects[current].effect.stop();
        }
        info!(site = %self.site.name(), "Site scheduler stopped");
    }
}

/// Sleep for `duration`; true when shutdown was signalled meanwhile
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        changed = shutdown.changed() => match changed {
            Ok(()) => {
                let stop = *shutdown.borrow();
                stop
            }
            Err(_) => {
                warn!("Shutdown sender dropped");
                true
            }
        },
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Effect, SolidColor};
    use chrono::{NaiveDate, NaiveDateTime, Weekday};
    use network::{ConnectionConfig, ConnectionRegistry};
    use parking_lot::Mutex;
    use types::Crgb;

    /// Records hook calls into a shared log
    struct Recording {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Effect for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn start(&mut self) {
            self.log.lock().push(format!("start {}", self.name));
        }

        fn stop(&mut self) {
            self.log.lock().push(format!("stop {}", self.name));
        }

        fn render(&mut self, canvas: &mut Canvas<'_>, _elapsed: Duration) {
            canvas.fill_solid(Crgb::WHITE);
        }
    }

    fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Effect> {
        Box::new(Recording {
            name: name.to_string(),
            log: Arc::clone(log),
        })
    }

    fn site() -> Arc<Site> {
        let registry = Arc::new(ConnectionRegistry::new(ConnectionConfig::default()));
        Arc::new(
            Site::new("Bench", 8, 1, Vec::new(), registry)
                .unwrap()
                .with_seconds_per_effect(10),
        )
    }

    /// Wednesday 2024-05-15 at the given time
    fn wednesday(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_rotation_over_eligible_effects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effects = vec![
            ScheduledEffect::always(recording("a", &log)),
            // Weekends only, never eligible on a Wednesday
            ScheduledEffect::new(
                TimeWindow::new(DaySet::WEEKENDS, 0, 24),
                recording("weekend", &log),
            ),
            ScheduledEffect::always(recording("b", &log)),
        ];
        let mut scheduler = SiteScheduler::new(site(), effects);
        let now = wednesday(12, 0);

        assert_eq!(scheduler.select_effect(&now, Duration::from_secs(0)), Some(0));
        assert_eq!(scheduler.select_effect(&now, Duration::from_secs(9)), Some(0));
        assert_eq!(scheduler.select_effect(&now, Duration::from_secs(10)), Some(2));
        assert_eq!(scheduler.select_effect(&now, Duration::from_secs(25)), Some(0));

        assert_eq!(
            *log.lock(),
            vec!["start a", "stop a", "start b", "stop b", "start a"]
        );
    }

    #[test]
    fn test_manual_offset_wraps_both_ways() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effects = vec![
            ScheduledEffect::always(recording("a", &log)),
            ScheduledEffect::always(recording("b", &log)),
            ScheduledEffect::always(recording("c", &log)),
        ];
        let mut scheduler = SiteScheduler::new(site(), effects);
        let now = wednesday(12, 0);

        scheduler.site().previous_effect();
        assert_eq!(scheduler.select_effect(&now, Duration::ZERO), Some(2));

        scheduler.site().next_effect();
        scheduler.site().next_effect();
        assert_eq!(scheduler.select_effect(&now, Duration::ZERO), Some(1));
    }

    #[test]
    fn test_hooks_fire_once_per_change() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effects = vec![
            ScheduledEffect::new(TimeWindow::new(DaySet::ALL, 9, 17), recording("day", &log)),
            ScheduledEffect::new(TimeWindow::new(DaySet::ALL, 18, 23), recording("night", &log)),
        ];
        let mut scheduler = SiteScheduler::new(site(), effects);

        for _ in 0..3 {
            scheduler.tick(&wednesday(10, 0), SystemTime::now());
        }
        scheduler.tick(&wednesday(19, 0), SystemTime::now());
        scheduler.tick(&wednesday(19, 1), SystemTime::now());

        assert_eq!(*log.lock(), vec!["start day", "stop day", "start night"]);
        assert_eq!(scheduler.site().current_effect_name(), "night");
        assert_eq!(scheduler.site().stats().frames_rendered(), 5);
    }

    #[test]
    fn test_no_eligible_effect() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let effects = vec![ScheduledEffect::new(
            TimeWindow::new(DaySet::only(Weekday::Sun), 0, 24),
            recording("sunday", &log),
        )];
        let mut scheduler = SiteScheduler::new(site(), effects);

        let report = scheduler.tick(&wednesday(10, 0), SystemTime::now());

        assert_eq!(report.effect, None);
        assert_eq!(scheduler.site().current_effect_name(), NO_EFFECT_RUNNING);
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.site().stats().frames_rendered(), 0);
    }

    #[test]
    fn test_render_writes_site_buffer() {
        let mut scheduler = SiteScheduler::new(
            site(),
            vec![ScheduledEffect::always(Box::new(SolidColor::new(Crgb::RED)))],
        );
        scheduler.tick(&wednesday(10, 0), SystemTime::now());

        let snapshot = scheduler.site().buffer().snapshot();
        assert!(snapshot.iter().all(|p| *p == Crgb::RED));
        assert_eq!(scheduler.site().current_effect_name(), "SolidColor");
    }

    /// Renders slower than the frame interval allows
    struct Sluggish {
        render_time: Duration,
    }

    impl Effect for Sluggish {
        fn name(&self) -> &str {
            "Sluggish"
        }

        fn render(&mut self, canvas: &mut Canvas<'_>, _elapsed: Duration) {
            std::thread::sleep(self.render_time);
            canvas.fill_solid(Crgb::BLUE);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overrun_drops_frames_without_catching_up() {
        let render_time = Duration::from_millis(15);
        let registry = Arc::new(ConnectionRegistry::new(ConnectionConfig::default()));
        // 5ms slots, every render overruns
        let site = Arc::new(
            Site::new("Bench", 8, 1, Vec::new(), registry)
                .unwrap()
                .with_fps(200),
        );
        let scheduler = SiteScheduler::new(
            Arc::clone(&site),
            vec![ScheduledEffect::always(Box::new(Sluggish { render_time }))],
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let started = Instant::now();
        let task = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        let elapsed = started.elapsed();

        let rendered = site.stats().frames_rendered();
        let dropped = site.stats().frames_dropped();
        assert!(rendered > 0);
        assert!(dropped > 0);
        // Every slot overran, and no skipped slot was replayed
        assert!(dropped + 1 >= rendered, "rendered {rendered}, dropped {dropped}");
        let ceiling = (elapsed.as_millis() / render_time.as_millis()) as u64 + 1;
        assert!(rendered <= ceiling, "rendered {rendered} in {elapsed:?}");
        assert_eq!(site.stats().spare_ms(), 0);
    }

    #[test]
    fn test_from_settings_rejects_unknown_day() {
        let settings = vec![ScheduledEffectSettings {
            days: settings::DaysSetting::One("someday".to_string()),
            start_hour: 0,
            end_hour: 24,
            start_minute: 0,
            end_minute: 60,
            effect: settings::EffectSettings::Solid { color: [0, 0, 0] },
        }];
        let result = SiteScheduler::from_settings(site(), &settings);
        assert!(matches!(result, Err(StreamerError::Configuration { .. })));
    }
}
