//! Event scheduling: deciding when weekly program entries become due.
//!
//! [`EventScheduler`] is driven once per poll tick with the current time.
//! An entry is due when its start minute equals the current minute of day,
//! exact-minute matching, never retroactive. If the loop skips past a
//! minute (long prior work, clock jump), that slot silently does not fire
//! that day; re-deriving missed work is the operator's job, not the
//! scheduler's.
//!
//! Deduplication is by [`TriggerKey`], (date, weekday, start minute), so
//! a one-second poll interval produces exactly one firing per slot no
//! matter how many ticks land inside the minute. The key set is cleared on
//! every observed date change and never spans two dates, which bounds it to
//! the events scheduled today. Triggering only reports due entries; the
//! caller dispatches them, the scheduler never touches actuator state.

use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike};
use std::collections::HashSet;

use crate::config::{ScheduleEntry, WeekSchedule};

/// Dedup key guaranteeing at-most-once firing per calendar slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    date: NaiveDate,
    weekday: u8,
    start_minute: u16,
}

/// A schedule entry that became due on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEvent {
    /// Weekday index the entry fired under (0 = Monday).
    pub weekday: usize,
    pub entry: ScheduleEntry,
}

/// The next upcoming slot, for operator-visible countdown reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextEvent {
    /// Seconds from `now` until the slot opens.
    pub seconds_until: u64,
    pub weekday: usize,
    pub entry: ScheduleEntry,
}

/// Result of one tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// True when the observed calendar date changed since the last tick.
    pub new_day: bool,
    /// Entries that became due this tick, in start-minute order.
    pub due: Vec<DueEvent>,
}

/// Per-config scheduling state. Reconstructed on reload so stale trigger
/// keys can never suppress slots of a schedule they were not created from.
#[derive(Debug, Default)]
pub struct EventScheduler {
    seen: HashSet<TriggerKey>,
    current_date: Option<NaiveDate>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the schedule against `now`.
    ///
    /// Handles day rollover (clearing the key set) and returns every entry
    /// of today's weekday whose start minute equals the current minute and
    /// whose trigger key has not been seen yet. Inserting the key and
    /// reporting the entry happen together, so repeated ticks within the
    /// minute cannot produce a second firing.
    pub fn tick(&mut self, schedule: &WeekSchedule, now: DateTime<Local>) -> TickOutcome {
        let date = now.date_naive();
        let weekday = now.weekday().num_days_from_monday() as usize;
        let minute_of_day = (now.hour() * 60 + now.minute()) as u16;

        let new_day = match self.current_date {
            Some(previous) => previous != date,
            None => false,
        };
        if new_day {
            self.seen.clear();
        }
        self.current_date = Some(date);

        let mut due = Vec::new();
        for entry in schedule.day(weekday) {
            if entry.start_minute != minute_of_day {
                continue;
            }
            let key = TriggerKey {
                date,
                weekday: weekday as u8,
                start_minute: entry.start_minute,
            };
            if self.seen.insert(key) {
                due.push(DueEvent {
                    weekday,
                    entry: entry.clone(),
                });
            }
        }

        TickOutcome { new_day, due }
    }

    /// Drop all scheduling state. Called on config reload: trigger keys are
    /// part of scheduler state and must not survive a snapshot swap.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.current_date = None;
    }

    /// Number of trigger keys currently held. Exposed for tests asserting
    /// the rollover and reload invariants.
    #[cfg(any(test, feature = "testing-support"))]
    pub fn trigger_key_count(&self) -> usize {
        self.seen.len()
    }

    /// Seconds until the next scheduled slot, scanning the full week
    /// cyclically from `now`. Purely informational: computing it never
    /// fires anything. Returns `None` for an empty schedule.
    pub fn next_event(&self, schedule: &WeekSchedule, now: DateTime<Local>) -> Option<NextEvent> {
        let weekday = now.weekday().num_days_from_monday() as usize;
        let minute_of_day = (now.hour() * 60 + now.minute()) as u16;
        let second_of_minute = now.second() as u64;

        for day_offset in 0..=7usize {
            let day = (weekday + day_offset) % 7;
            for entry in schedule.day(day) {
                // Today only slots still ahead of us count; a week out,
                // only slots at or before the current minute (anything
                // later was already found at day_offset 0).
                let candidate = match day_offset {
                    0 => entry.start_minute > minute_of_day,
                    7 => entry.start_minute <= minute_of_day,
                    _ => true,
                };
                if !candidate {
                    continue;
                }

                let minutes_ahead =
                    day_offset as u64 * 1440 + entry.start_minute as u64 - minute_of_day as u64;
                return Some(NextEvent {
                    seconds_until: minutes_ahead * 60 - second_of_minute,
                    weekday: day,
                    entry: entry.clone(),
                });
            }
        }
        None
    }
}
