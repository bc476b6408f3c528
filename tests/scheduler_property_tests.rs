use chrono::{Local, TimeZone};
use proptest::prelude::*;
use std::collections::HashMap;

use riegor::config::validation::normalize_schedule;
use riegor::scheduler::EventScheduler;

/// Generate a weekday index
fn weekday_strategy() -> impl Strategy<Value = usize> {
    0..7usize
}

/// Generate a start minute within the day
fn start_minute_strategy() -> impl Strategy<Value = u16> {
    0..1440u16
}

const WEEKDAYS: [&str; 7] = [
    "lunes",
    "martes",
    "miercoles",
    "jueves",
    "viernes",
    "sabado",
    "domingo",
];

/// Local time within the week of Monday 2026-03-02, so day offset equals
/// weekday index.
fn week_time(weekday: usize, minute: u16, second: u32) -> chrono::DateTime<Local> {
    Local
        .with_ymd_and_hms(
            2026,
            3,
            2 + weekday as u32,
            u32::from(minute / 60),
            u32::from(minute % 60),
            second,
        )
        .unwrap()
}

/// Build a schedule document from (weekday, start_minute) pairs and run it
/// through the same normalization path the config loader uses.
fn build_schedule(slots: &[(usize, u16)]) -> riegor::config::WeekSchedule {
    let mut by_day: HashMap<usize, Vec<u16>> = HashMap::new();
    for (weekday, start) in slots {
        by_day.entry(*weekday).or_default().push(*start);
    }

    let mut doc = serde_json::Map::new();
    for (weekday, starts) in by_day {
        let entries: Vec<serde_json::Value> = starts
            .iter()
            .map(|start| {
                serde_json::json!({
                    "start": format!("{:02}:{:02}", start / 60, start % 60),
                    "duration_min": 5
                })
            })
            .collect();
        doc.insert(
            WEEKDAYS[weekday].to_string(),
            serde_json::Value::Array(entries),
        );
    }

    riegor::logger::Log::set_enabled(false);
    let schedule = normalize_schedule(&doc);
    riegor::logger::Log::set_enabled(true);
    schedule
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// At most one firing per (date, weekday, start_minute) slot, no
    /// matter how many ticks land inside the same minute.
    #[test]
    fn at_most_once_per_slot(
        slots in prop::collection::vec((weekday_strategy(), start_minute_strategy()), 1..20),
        ticks_per_minute in 2..8usize,
    ) {
        let schedule = build_schedule(&slots);
        let mut scheduler = EventScheduler::new();

        let mut fired: HashMap<(usize, u16), usize> = HashMap::new();

        // Walk the week day by day, ticking several times inside every
        // programmed minute plus its neighbors.
        for weekday in 0..7usize {
            // Rollover tick at midnight.
            for due in scheduler.tick(&schedule, week_time(weekday, 0, 0)).due {
                *fired.entry((due.weekday, due.entry.start_minute)).or_default() += 1;
            }

            let mut minutes: Vec<u16> = schedule
                .day(weekday)
                .iter()
                .flat_map(|e| {
                    [e.start_minute.saturating_sub(1), e.start_minute,
                     (e.start_minute + 1).min(1439)]
                })
                .collect();
            minutes.sort_unstable();
            minutes.dedup();

            for minute in minutes {
                for tick in 0..ticks_per_minute {
                    let now = week_time(weekday, minute, (tick * 7 % 60) as u32);
                    for due in scheduler.tick(&schedule, now).due {
                        *fired.entry((due.weekday, due.entry.start_minute)).or_default() += 1;
                    }
                }
            }
        }

        // Every firing count is exactly one...
        for ((weekday, start), count) in &fired {
            prop_assert_eq!(
                *count, 1,
                "slot {}@{} fired {} times", weekday, start, count
            );
        }
        // ...and every unique programmed slot fired.
        let mut unique_slots: Vec<(usize, u16)> = slots.clone();
        unique_slots.sort_unstable();
        unique_slots.dedup();
        prop_assert_eq!(fired.len(), unique_slots.len());
    }

    /// The trigger-key set never outlives the day that created it.
    #[test]
    fn key_set_resets_on_every_date_change(
        slots in prop::collection::vec((weekday_strategy(), start_minute_strategy()), 1..10),
    ) {
        let schedule = build_schedule(&slots);
        let mut scheduler = EventScheduler::new();

        for weekday in 0..7usize {
            // Touch a few minutes of the day so keys can accumulate.
            for minute in [0u16, 360, 720, 1080, 1439] {
                let outcome = scheduler.tick(&schedule, week_time(weekday, minute, 0));
                if outcome.new_day {
                    // Rollover tick: whatever was seen yesterday is gone;
                    // at most this tick's own firings are in the set.
                    prop_assert!(scheduler.trigger_key_count() <= outcome.due.len());
                }
            }
        }
    }

    /// next_event never mutates scheduler state and always lands on a
    /// programmed slot, at most a full week away.
    #[test]
    fn next_event_is_pure_and_lands_on_a_slot(
        slots in prop::collection::vec((weekday_strategy(), start_minute_strategy()), 1..10),
        ask_weekday in weekday_strategy(),
        ask_minute in start_minute_strategy(),
    ) {
        let schedule = build_schedule(&slots);
        let scheduler = EventScheduler::new();

        let now = week_time(ask_weekday, ask_minute, 0);
        let next = scheduler.next_event(&schedule, now);
        prop_assert_eq!(scheduler.trigger_key_count(), 0);

        let next = next.expect("non-empty schedule always has a next event");
        prop_assert!(schedule
            .day(next.weekday)
            .iter()
            .any(|e| e.start_minute == next.entry.start_minute));
        prop_assert!(next.seconds_until <= 7 * 24 * 3600);
    }
}
