//! Weekly Effect Schedules
//!
//! Each configured effect runs only inside a window: a set of weekdays plus a
//! start and end time. Both ends are inclusive at minute resolution, and an
//! end minute of 60 means "through the end of the end hour".

use chrono::{Datelike, Timelike, Weekday};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::effects::Effect;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown day '{0}'")]
pub struct UnknownDay(pub String);

/// A set of weekdays
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DaySet(u8);

impl DaySet {
    pub const EMPTY: DaySet = DaySet(0);
    pub const WEEKDAYS: DaySet = DaySet(0b0001_1111);
    pub const WEEKENDS: DaySet = DaySet(0b0110_0000);
    pub const ALL: DaySet = DaySet(0b0111_1111);

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    pub fn only(day: Weekday) -> Self {
        DaySet(Self::bit(day))
    }

    pub fn with(self, day: Weekday) -> Self {
        DaySet(self.0 | Self::bit(day))
    }

    pub fn union(self, other: DaySet) -> Self {
        DaySet(self.0 | other.0)
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Combine several day names or keywords into one set
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, UnknownDay> {
        names
            .into_iter()
            .try_fold(DaySet::EMPTY, |set, name| Ok(set.union(name.parse()?)))
    }
}

impl FromStr for DaySet {
    type Err = UnknownDay;

    /// Accepts `all`, `weekdays`, `weekends` or a day name such as `mon` or `Monday`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "all" | "every" | "daily" => Ok(DaySet::ALL),
            "weekdays" => Ok(DaySet::WEEKDAYS),
            "weekends" => Ok(DaySet::WEEKENDS),
            _ => name
                .parse::<Weekday>()
                .map(DaySet::only)
                .map_err(|_| UnknownDay(s.to_string())),
        }
    }
}

impl fmt::Debug for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        f.debug_set()
            .entries(days.iter().filter(|day| self.contains(**day)))
            .finish()
    }
}

/// When an effect is allowed to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub days: DaySet,
    pub start_hour: u32,
    pub end_hour: u32,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::always()
    }
}

impl TimeWindow {
    pub fn new(days: DaySet, start_hour: u32, end_hour: u32) -> Self {
        Self {
            days,
            start_hour,
            end_hour,
            start_minute: 0,
            end_minute: 60,
        }
    }

    /// Every day, all day
    pub fn always() -> Self {
        Self::new(DaySet::ALL, 0, 24)
    }

    pub fn with_minutes(mut self, start_minute: u32, end_minute: u32) -> Self {
        self.start_minute = start_minute;
        self.end_minute = end_minute;
        self
    }

    pub fn should_run_at(&self, day: Weekday, hour: u32, minute: u32) -> bool {
        if !self.days.contains(day) {
            return false;
        }

        let after_start =
            hour > self.start_hour || (hour == self.start_hour && minute >= self.start_minute);
        let before_end = hour < self.end_hour || (hour == self.end_hour && minute <= self.end_minute);

        after_start && before_end
    }

    /// [`should_run_at`](Self::should_run_at) for a local clock reading
    pub fn is_active<T: Datelike + Timelike>(&self, now: &T) -> bool {
        self.should_run_at(now.weekday(), now.hour(), now.minute())
    }

    /// Minutes since the window opened today
    ///
    /// Whole hours past the start hour plus minutes past the start minute;
    /// each part is counted only when it is not negative.
    pub fn minutes_running(&self, hour: u32, minute: u32) -> u32 {
        let mut minutes = 0;
        if hour > self.start_hour {
            minutes += (hour - self.start_hour) * 60;
        }
        if minute >= self.start_minute {
            minutes += minute - self.start_minute;
        }
        minutes
    }
}

/// An effect bound to the window it may run in
pub struct ScheduledEffect {
    pub window: TimeWindow,
    pub effect: Box<dyn Effect>,
}

impl ScheduledEffect {
    pub fn new(window: TimeWindow, effect: Box<dyn Effect>) -> Self {
        Self { window, effect }
    }

    /// Run at any time
    pub fn always(effect: Box<dyn Effect>) -> Self {
        Self::new(TimeWindow::always(), effect)
    }

    pub fn name(&self) -> &str {
        self.effect.name()
    }
}

impl fmt::Debug for ScheduledEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEffect")
            .field("window", &self.window)
            .field("effect", &self.effect.name())
            .finish()
    }
}
