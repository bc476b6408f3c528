//! Plan execution, serialized on a dedicated runner thread.
//!
//! Triggering and running are decoupled: the poll loop dispatches a
//! [`RunJob`] and moves on; the runner thread consumes jobs one at a time.
//! A single consumer gives both guarantees the actuation path needs: at
//! most one plan executing at any instant, and first-dispatched-first-run
//! ordering for plans that became due while another was executing (an mpsc
//! queue is FIFO; a bare `Mutex` promises no fairness).
//!
//! There is no cancellation. A job that has started runs to completion,
//! including its final all-zones-off, regardless of config reloads; each
//! job carries the actuator snapshot it was dispatched with, so a reload
//! that drops a zone cannot pull handles out from under a running plan.
//!
//! Failures inside a run are reported back to the poll loop as
//! [`RunEvent`]s rather than being swallowed with the thread.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::actuator::ZoneActuator;
use crate::plan::ResolvedPlan;
use crate::weather::WeatherClient;

/// One watering cycle, ready to execute.
pub struct RunJob {
    /// Human-readable slot label for logs, e.g. `"jueves 21:15"`.
    pub label: String,
    pub plan: ResolvedPlan,
    /// Actuator snapshot captured at dispatch time.
    pub actuator: Arc<ZoneActuator>,
    /// Weather client captured at dispatch time, so a reload that changes
    /// the weather endpoint applies to every job dispatched after it.
    pub weather: WeatherClient,
}

/// Progress and failure reports emitted by the runner thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        label: String,
        multiplier: f64,
        zones: usize,
    },
    ZoneFailed {
        label: String,
        zone: String,
        error: String,
    },
    Finished {
        label: String,
        watered: usize,
        failed: usize,
    },
}

/// Handle to the runner thread. Dropping it closes the queue; queued jobs
/// still drain before the thread exits.
pub struct ProgramRunner {
    jobs: Sender<RunJob>,
    handle: Option<JoinHandle<()>>,
}

impl ProgramRunner {
    /// Start the runner thread.
    pub fn spawn(events: Sender<RunEvent>) -> Self {
        let (jobs, job_receiver): (Sender<RunJob>, Receiver<RunJob>) = channel();

        let handle = std::thread::spawn(move || {
            for job in job_receiver {
                execute_job(job, &events);
            }
        });

        Self {
            jobs,
            handle: Some(handle),
        }
    }

    /// Enqueue a job. Never blocks; returns false if the runner thread is
    /// gone (only during shutdown).
    pub fn dispatch(&self, job: RunJob) -> bool {
        self.jobs.send(job).is_ok()
    }
}

impl Drop for ProgramRunner {
    fn drop(&mut self) {
        // Detach rather than join: a watering cycle can hold the thread
        // for many minutes and shutdown drives all zones off separately.
        self.handle.take();
    }
}

/// Guarantees the all-zones-off sweep on every exit path of a run.
struct AllOffGuard<'a>(&'a ZoneActuator);

impl Drop for AllOffGuard<'_> {
    fn drop(&mut self) {
        self.0.all_off();
    }
}

fn execute_job(job: RunJob, events: &Sender<RunEvent>) {
    let multiplier = job.weather.fetch_multiplier();
    let plan = scale_plan(job.plan, multiplier);

    let _ = events.send(RunEvent::Started {
        label: job.label.clone(),
        multiplier,
        zones: plan.len(),
    });

    let mut watered = 0;
    let mut failed = 0;
    {
        let _all_off = AllOffGuard(&job.actuator);

        for step in &plan {
            match job.actuator.zone_on(step.actuator_id) {
                Ok(()) => {
                    crate::time_source::sleep(step.duration);
                    watered += 1;
                }
                Err(e) => {
                    failed += 1;
                    let _ = events.send(RunEvent::ZoneFailed {
                        label: job.label.clone(),
                        zone: step.zone.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }

            // Off is attempted even when on failed; worst case it is a
            // redundant write to an already-closed valve.
            if let Err(e) = job.actuator.zone_off(step.actuator_id) {
                failed += 1;
                let _ = events.send(RunEvent::ZoneFailed {
                    label: job.label.clone(),
                    zone: step.zone.clone(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    let _ = events.send(RunEvent::Finished {
        label: job.label,
        watered,
        failed,
    });
}

/// Apply the weather multiplier to a plan. Steps whose scaled duration
/// rounds to zero are dropped; a 0.0 multiplier empties the plan, which
/// is "it rained, water nothing". The neutral multiplier leaves the plan
/// untouched.
pub(crate) fn scale_plan(plan: ResolvedPlan, multiplier: f64) -> ResolvedPlan {
    if multiplier == crate::weather::NEUTRAL_MULTIPLIER {
        return plan;
    }

    plan.into_iter()
        .filter_map(|mut step| {
            let secs = (step.duration.as_secs_f64() * multiplier).round();
            if secs <= 0.0 {
                return None;
            }
            step.duration = Duration::from_secs(secs as u64);
            Some(step)
        })
        .collect()
}
