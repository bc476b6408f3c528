//! Policy resolution: expanding a schedule entry into a watering plan.
//!
//! A [`ResolvedPlan`] is the ordered list of (zone, duration) actuation
//! steps produced from one trigger. Resolution is a pure function of the
//! policy, the available zones and the base duration (no clock, no I/O),
//! so it is exercised directly by unit tests. Plans are produced fresh per
//! trigger and consumed exactly once by the runner.

use std::time::Duration;

use crate::config::{Policy, PolicyMode, ZoneMap};

/// One actuation step: which valve, for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub zone: String,
    pub actuator_id: u32,
    pub duration: Duration,
}

/// Ordered actuation steps for one trigger. Order is deterministic: config
/// document order, or the policy's `include` order when one is given.
pub type ResolvedPlan = Vec<PlanStep>;

/// Expand `base_duration` into a per-zone plan under `policy`.
///
/// Zone selection: without an `include` set every configured zone
/// participates, in config order; with one, only the intersection with the
/// configured zones, preserving `include`'s order. Names in `include` that
/// match no configured zone are silently skipped; the reload path already
/// warned about them once.
///
/// Durations: `Uniform` and `RestrictedSet` assign the base unchanged;
/// `Multipliers` scales per zone (missing factor = 1.0) and drops steps
/// whose scaled duration rounds to zero or less.
pub fn resolve(policy: &Policy, zones: &ZoneMap, base_duration: Duration) -> ResolvedPlan {
    let selected: Vec<_> = match &policy.include {
        None => zones.iter().collect(),
        Some(include) => include.iter().filter_map(|name| zones.get(name)).collect(),
    };

    let mut plan = Vec::with_capacity(selected.len());
    for zone in selected {
        let duration = match policy.mode {
            PolicyMode::Uniform | PolicyMode::RestrictedSet => base_duration,
            PolicyMode::Multipliers => {
                let factor = policy.multipliers.get(&zone.name).copied().unwrap_or(1.0);
                let secs = (base_duration.as_secs_f64() * factor).round();
                if secs <= 0.0 {
                    continue;
                }
                Duration::from_secs(secs as u64)
            }
        };
        plan.push(PlanStep {
            zone: zone.name.clone(),
            actuator_id: zone.actuator_id,
            duration,
        });
    }
    plan
}

/// Total watering time of a plan, for log summaries.
pub fn total_duration(plan: &ResolvedPlan) -> Duration {
    plan.iter().map(|step| step.duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Policy, PolicyMode, Zone, ZoneMap};
    use std::collections::HashMap;

    fn test_zones(names: &[(&str, u32)]) -> ZoneMap {
        ZoneMap::new(
            names
                .iter()
                .map(|(name, id)| Zone {
                    name: (*name).to_string(),
                    actuator_id: *id,
                })
                .collect(),
        )
    }

    fn multiplier_policy(factors: &[(&str, f64)]) -> Policy {
        Policy {
            mode: PolicyMode::Multipliers,
            include: None,
            multipliers: factors
                .iter()
                .map(|(zone, factor)| ((*zone).to_string(), *factor))
                .collect(),
        }
    }

    #[test]
    fn uniform_assigns_base_to_every_zone() {
        let zones = test_zones(&[("zona1", 4), ("zona2", 5), ("zona3", 18)]);
        let plan = resolve(&Policy::default(), &zones, Duration::from_secs(600));

        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|s| s.duration == Duration::from_secs(600)));
        // Config document order is preserved.
        let order: Vec<&str> = plan.iter().map(|s| s.zone.as_str()).collect();
        assert_eq!(order, ["zona1", "zona2", "zona3"]);
    }

    #[test]
    fn multipliers_scale_and_default_to_one() {
        let zones = test_zones(&[("z1", 1), ("z2", 2)]);
        let policy = multiplier_policy(&[("z2", 2.0)]);
        let plan = resolve(&policy, &zones, Duration::from_secs(600));

        assert_eq!(
            plan,
            vec![
                PlanStep {
                    zone: "z1".into(),
                    actuator_id: 1,
                    duration: Duration::from_secs(600)
                },
                PlanStep {
                    zone: "z2".into(),
                    actuator_id: 2,
                    duration: Duration::from_secs(1200)
                },
            ]
        );
    }

    #[test]
    fn zero_factor_drops_the_zone() {
        let zones = test_zones(&[("z1", 1), ("z2", 2)]);
        let policy = multiplier_policy(&[("z1", 0.0)]);
        let plan = resolve(&policy, &zones, Duration::from_secs(600));

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].zone, "z2");
    }

    #[test]
    fn tiny_factor_rounding_to_zero_drops_the_zone() {
        let zones = test_zones(&[("z1", 1)]);
        let policy = multiplier_policy(&[("z1", 0.0001)]);
        // 600s * 0.0001 = 0.06s, rounds to 0
        assert!(resolve(&policy, &zones, Duration::from_secs(600)).is_empty());
    }

    #[test]
    fn include_restricts_regardless_of_mode() {
        let zones = test_zones(&[("z1", 1), ("z2", 2), ("z3", 3)]);
        for mode in [
            PolicyMode::Uniform,
            PolicyMode::RestrictedSet,
            PolicyMode::Multipliers,
        ] {
            let policy = Policy {
                mode,
                include: Some(vec!["z2".into()]),
                multipliers: HashMap::new(),
            };
            let plan = resolve(&policy, &zones, Duration::from_secs(300));
            assert_eq!(plan.len(), 1, "mode {mode:?}");
            assert_eq!(plan[0].zone, "z2");
        }
    }

    #[test]
    fn include_order_wins_over_config_order() {
        let zones = test_zones(&[("z1", 1), ("z2", 2), ("z3", 3)]);
        let policy = Policy {
            mode: PolicyMode::RestrictedSet,
            include: Some(vec!["z3".into(), "z1".into()]),
            multipliers: HashMap::new(),
        };
        let plan = resolve(&policy, &zones, Duration::from_secs(120));
        let order: Vec<&str> = plan.iter().map(|s| s.zone.as_str()).collect();
        assert_eq!(order, ["z3", "z1"]);
    }

    #[test]
    fn unknown_include_names_are_skipped() {
        let zones = test_zones(&[("z1", 1)]);
        let policy = Policy {
            mode: PolicyMode::Uniform,
            include: Some(vec!["ghost".into(), "z1".into()]),
            multipliers: HashMap::new(),
        };
        let plan = resolve(&policy, &zones, Duration::from_secs(60));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].zone, "z1");
    }

    #[test]
    fn empty_zone_map_resolves_to_empty_plan() {
        let zones = ZoneMap::default();
        assert!(resolve(&Policy::default(), &zones, Duration::from_secs(60)).is_empty());
    }
}
