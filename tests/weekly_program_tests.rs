//! End-to-end exercises of the scheduling pipeline through the public
//! API: normalize a config fragment, tick the scheduler across a window,
//! resolve the due entry into a plan and execute it against a recording
//! relay backend.

use anyhow::Result;
use chrono::{Local, TimeZone};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use riegor::actuator::{RelayBackend, ZoneActuator};
use riegor::config::validation::{normalize_policies, normalize_schedule, normalize_zones};
use riegor::plan;
use riegor::runner::{ProgramRunner, RunEvent, RunJob};
use riegor::scheduler::EventScheduler;
use riegor::weather::WeatherClient;

struct RecordingRelay {
    calls: Arc<Mutex<Vec<(u32, bool)>>>,
    fail_on: Option<u32>,
}

impl RelayBackend for RecordingRelay {
    fn set(&mut self, actuator_id: u32, on: bool) -> Result<()> {
        if on && self.fail_on == Some(actuator_id) {
            anyhow::bail!("relay {actuator_id} stuck");
        }
        self.calls.lock().unwrap().push((actuator_id, on));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

fn raw_map(json: &str) -> serde_json::Map<String, serde_json::Value> {
    serde_json::from_str(json).unwrap()
}

/// 2026-03-02 is a Monday.
fn monday(hour: u32, minute: u32, second: u32) -> chrono::DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, 2, hour, minute, second)
        .unwrap()
}

#[test]
fn monday_evening_program_fires_once_and_waters_every_zone() {
    riegor::logger::Log::set_enabled(false);

    let zones = normalize_zones(&raw_map(r#"{ "zona1": 4, "zona2": 5, "zona3": 18 }"#));
    let schedule = normalize_schedule(&raw_map(
        r#"{ "lunes": [ {"start": "20:00", "duration_min": 10, "policy": "verano"} ] }"#,
    ));
    let policies = normalize_policies(&raw_map(
        r#"{ "verano": { "mode": "multipliers", "multipliers": {"zona2": 2.0} } }"#,
    ));

    // Tick from 19:59 to 20:01 at one-second cadence; the slot opens once.
    let mut scheduler = EventScheduler::new();
    let mut due_events = Vec::new();
    for offset in 0..120u32 {
        let now = monday(19, 59, 0) + chrono::Duration::seconds(i64::from(offset));
        due_events.extend(scheduler.tick(&schedule, now).due);
    }
    assert_eq!(due_events.len(), 1);
    let due = &due_events[0];

    // Resolve under the named policy: zona2 doubled, others at base.
    let policy = &policies[due.entry.policy.as_deref().unwrap()];
    let resolved = plan::resolve(policy, &zones, due.entry.duration);
    assert_eq!(resolved.len(), 3);
    assert_eq!(resolved[0].duration, Duration::from_secs(600));
    assert_eq!(resolved[1].duration, Duration::from_secs(1200));
    assert_eq!(resolved[2].duration, Duration::from_secs(600));

    // Execute a trimmed copy of the plan (zero durations, zona2's relay
    // stuck) against a recording backend.
    let calls = Arc::new(Mutex::new(Vec::new()));
    let actuator = Arc::new(ZoneActuator::new(
        vec![4, 5, 18],
        Box::new(RecordingRelay {
            calls: Arc::clone(&calls),
            fail_on: Some(5),
        }),
    ));

    let mut instant_plan = resolved.clone();
    for step in &mut instant_plan {
        step.duration = Duration::ZERO;
    }

    let (event_tx, event_rx) = channel();
    let runner = ProgramRunner::spawn(event_tx);
    runner.dispatch(RunJob {
        label: "lunes 20:00".into(),
        plan: instant_plan,
        actuator,
        weather: WeatherClient::new(None),
    });

    let mut failed_zones = Vec::new();
    loop {
        match event_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            RunEvent::ZoneFailed { zone, .. } => failed_zones.push(zone),
            RunEvent::Finished { watered, failed, .. } => {
                assert_eq!(watered, 2);
                assert_eq!(failed, 1);
                break;
            }
            RunEvent::Started { .. } => {}
        }
    }
    assert_eq!(failed_zones, ["zona2"]);

    // zona1 and zona3 watered despite zona2's failure, and the final
    // sweep left every valve off.
    let calls = calls.lock().unwrap();
    assert!(calls.contains(&(4, true)));
    assert!(calls.contains(&(18, true)));
    assert!(!calls.contains(&(5, true)));
    assert_eq!(calls.last(), Some(&(18, false)));

    riegor::logger::Log::set_enabled(true);
}

#[test]
fn reload_does_not_disturb_a_dispatched_run() {
    riegor::logger::Log::set_enabled(false);

    let old_calls = Arc::new(Mutex::new(Vec::new()));
    let old_actuator = Arc::new(ZoneActuator::new(
        vec![4, 5],
        Box::new(RecordingRelay {
            calls: Arc::clone(&old_calls),
            fail_on: None,
        }),
    ));

    let zones = normalize_zones(&raw_map(r#"{ "zona1": 4, "zona2": 5 }"#));
    let mut resolved = plan::resolve(&riegor::config::Policy::default(), &zones, Duration::ZERO);
    for step in &mut resolved {
        step.duration = Duration::ZERO;
    }

    let (event_tx, event_rx) = channel();
    let runner = ProgramRunner::spawn(event_tx);
    runner.dispatch(RunJob {
        label: "lunes 20:00".into(),
        plan: resolved,
        actuator: Arc::clone(&old_actuator),
        weather: WeatherClient::new(None),
    });

    // A "reload" builds a fresh snapshot without zona2. The dispatched
    // job keeps its own snapshot and still drives both old zones.
    let new_calls = Arc::new(Mutex::new(Vec::new()));
    let _new_actuator = Arc::new(ZoneActuator::new(
        vec![4],
        Box::new(RecordingRelay {
            calls: Arc::clone(&new_calls),
            fail_on: None,
        }),
    ));
    drop(old_actuator);

    loop {
        if let RunEvent::Finished { watered, .. } =
            event_rx.recv_timeout(Duration::from_secs(5)).unwrap()
        {
            assert_eq!(watered, 2);
            break;
        }
    }

    assert!(old_calls.lock().unwrap().contains(&(5, true)));
    assert!(new_calls.lock().unwrap().is_empty());

    riegor::logger::Log::set_enabled(true);
}
