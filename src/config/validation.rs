//! Entry-level validation and normalization of the raw config document.
//!
//! Everything here follows the drop-and-warn rule: a bad item is logged and
//! discarded, the rest of the document survives. Nothing in this module
//! returns an error for a merely malformed entry.

use std::collections::HashMap;
use std::time::Duration;

use super::loading::{RawEntry, RawPolicy};
use super::{Policy, PolicyMode, ScheduleEntry, WeekSchedule, Zone, ZoneMap};
use crate::constants::*;

/// Canonical weekday names, index 0 = Monday, as written in config files
/// and logs.
const WEEKDAY_NAMES: [&str; 7] = [
    "lunes",
    "martes",
    "miercoles",
    "jueves",
    "viernes",
    "sabado",
    "domingo",
];

/// Which days a `programed_times` key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySelector {
    /// A single weekday, 0 = Monday .. 6 = Sunday.
    Day(usize),
    /// The literal `"all"`: every day of the week.
    All,
}

/// Parse a weekday token. Accepts the accented and unaccented spellings
/// and is case- and whitespace-insensitive.
pub fn parse_day_selector(token: &str) -> Option<DaySelector> {
    let token = token.trim().to_lowercase();
    let day = match token.as_str() {
        "all" => return Some(DaySelector::All),
        "lunes" => 0,
        "martes" => 1,
        "miercoles" | "miércoles" => 2,
        "jueves" => 3,
        "viernes" => 4,
        "sabado" | "sábado" => 5,
        "domingo" => 6,
        _ => return None,
    };
    Some(DaySelector::Day(day))
}

/// Canonical name for a weekday index, for log output.
pub fn weekday_name(weekday: usize) -> &'static str {
    WEEKDAY_NAMES[weekday % 7]
}

/// Parse an `"HH:MM"` start time into minutes since midnight.
pub fn parse_start_minute(text: &str) -> Option<u16> {
    let (hours, minutes) = text.trim().split_once(':')?;
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Build the zone map from the raw `zones` object, document order
/// preserved. Entries whose value is not a small non-negative integer are
/// dropped with a warning.
pub fn normalize_zones(raw: &serde_json::Map<String, serde_json::Value>) -> ZoneMap {
    let mut zones = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        match value.as_u64().and_then(|id| u32::try_from(id).ok()) {
            Some(actuator_id) => zones.push(Zone {
                name: name.clone(),
                actuator_id,
            }),
            None => {
                log_warning!("Dropping zone '{}': actuator id {} is not a valid pin number", name, value);
            }
        }
    }
    ZoneMap::new(zones)
}

/// Build the weekly program from the raw `programed_times` object.
///
/// Unknown weekday keys drop their whole block; individual entries are
/// dropped for an unparseable start, a non-positive duration, or a start
/// minute already taken that day (the trigger key could not tell two such
/// entries apart). Surviving entries are sorted ascending by start minute.
pub fn normalize_schedule(
    raw: &serde_json::Map<String, serde_json::Value>,
) -> WeekSchedule {
    let mut schedule = WeekSchedule::default();

    for (day_token, value) in raw {
        let Some(selector) = parse_day_selector(day_token) else {
            log_warning!("Dropping schedule block '{}': not a recognized weekday", day_token);
            continue;
        };

        let Some(entries) = value.as_array() else {
            log_warning!("Dropping schedule block '{}': expected a list of entries", day_token);
            continue;
        };

        for entry_value in entries {
            let Some(entry) = normalize_entry(day_token, entry_value) else {
                continue;
            };
            match selector {
                DaySelector::Day(weekday) => schedule.day_mut(weekday).push(entry),
                DaySelector::All => {
                    for weekday in 0..7 {
                        schedule.day_mut(weekday).push(entry.clone());
                    }
                }
            }
        }
    }

    for weekday in 0..7 {
        let day = schedule.day_mut(weekday);
        day.sort_by_key(|e| e.start_minute);
        day.dedup_by(|later, earlier| {
            if later.start_minute == earlier.start_minute {
                log_warning!(
                    "Dropping duplicate {} entry at {}: slot already programmed",
                    weekday_name(weekday),
                    later.start_display()
                );
                true
            } else {
                false
            }
        });
    }

    schedule
}

fn normalize_entry(day_token: &str, value: &serde_json::Value) -> Option<ScheduleEntry> {
    let raw: RawEntry = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            log_warning!("Dropping malformed entry under '{}': {}", day_token, e);
            return None;
        }
    };

    let Some(start_minute) = parse_start_minute(&raw.start) else {
        log_warning!(
            "Dropping entry under '{}': start '{}' is not a valid HH:MM time",
            day_token,
            raw.start
        );
        return None;
    };
    debug_assert!(start_minute < MINUTES_PER_DAY);

    if raw.duration_min <= 0 {
        log_warning!(
            "Dropping entry under '{}' at {}: duration_min must be positive (got {})",
            day_token,
            raw.start,
            raw.duration_min
        );
        return None;
    }

    Some(ScheduleEntry {
        start_minute,
        duration: Duration::from_secs(raw.duration_min as u64 * 60),
        policy: raw.policy,
    })
}

/// Build the policy table from the raw `policies` object. Unknown modes
/// fall back to uniform; negative multiplier factors are dropped.
pub fn normalize_policies(
    raw: &serde_json::Map<String, serde_json::Value>,
) -> HashMap<String, Policy> {
    let mut policies = HashMap::with_capacity(raw.len());

    for (name, value) in raw {
        let raw_policy: RawPolicy = match serde_json::from_value(value.clone()) {
            Ok(raw_policy) => raw_policy,
            Err(e) => {
                log_warning!("Dropping malformed policy '{}': {}", name, e);
                continue;
            }
        };

        let mode = match raw_policy.mode.as_deref() {
            None | Some("uniform") => PolicyMode::Uniform,
            Some("restricted-set") | Some("restricted_set") => PolicyMode::RestrictedSet,
            Some("multiplier") | Some("multipliers") => PolicyMode::Multipliers,
            Some(other) => {
                log_warning!(
                    "Policy '{}': unknown mode '{}', falling back to uniform",
                    name,
                    other
                );
                PolicyMode::Uniform
            }
        };

        let mut multipliers = raw_policy.multipliers.unwrap_or_default();
        multipliers.retain(|zone, factor| {
            if *factor < 0.0 {
                log_warning!(
                    "Policy '{}': dropping negative multiplier {} for zone '{}'",
                    name,
                    factor,
                    zone
                );
                false
            } else {
                true
            }
        });

        policies.insert(
            name.clone(),
            Policy {
                mode,
                include: raw_policy.include,
                multipliers,
            },
        );
    }

    policies
}

/// Clamp a tuning interval to its accepted range, warning when the config
/// asked for something outside it.
pub fn normalize_interval(field: &str, value: u64, min: u64, max: u64, default: u64) -> Duration {
    if (min..=max).contains(&value) {
        Duration::from_secs(value)
    } else {
        log_warning!(
            "{} ({}s) must be between {} and {} seconds, using default {}s",
            field,
            value,
            min,
            max,
            default
        );
        Duration::from_secs(default)
    }
}
