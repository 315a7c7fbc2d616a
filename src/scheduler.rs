//! Multi-rate periodic callback scheduling

use tokio::time::Instant;
use tracing::trace;

use crate::Tier;
use crate::registry::HandlerRegistry;

/// Four independent deadlines, one per [`Tier`].
///
/// A deadline only ever moves forward by exactly its period, never to "now".
/// If the loop stalls, each later poll fires an overdue tier once more until
/// it has caught up. One poll fires each tier at most once, which bounds the
/// work done per loop iteration.
#[derive(Debug, Clone)]
pub struct Scheduler {
    deadlines: [Instant; 4],
}

impl Scheduler {
    /// Every tier is due at `start`, so the first poll fires all four.
    pub fn new(start: Instant) -> Self {
        Self { deadlines: [start; 4] }
    }

    pub fn next_deadline(&self, tier: Tier) -> Instant {
        self.deadlines[tier.index()]
    }

    /// Fire every due tier across the registry.
    ///
    /// Returns how many tiers fired.
    pub fn poll(&mut self, now: Instant, registry: &mut HandlerRegistry) -> usize {
        let mut fired = 0;
        for tier in Tier::ALL {
            let deadline = &mut self.deadlines[tier.index()];
            if *deadline > now {
                continue;
            }
            trace!("Firing {} tier ({:?} overdue)", tier, now - *deadline);
            registry.dispatch_tick(tier, now);
            *deadline += tier.period();
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingHandler, call_log, ticks};
    use std::time::Duration;

    fn recording_registry() -> (HandlerRegistry, crate::test_utils::CallLog) {
        let log = call_log();
        let mut registry = HandlerRegistry::new(1);
        registry.register(Box::new(RecordingHandler::new("rec", log.clone()))).unwrap();
        (registry, log)
    }

    #[test]
    fn first_poll_fires_every_tier() {
        let start = Instant::now();
        let (mut registry, log) = recording_registry();
        let mut scheduler = Scheduler::new(start);

        assert_eq!(scheduler.poll(start, &mut registry), 4);
        for tier in Tier::ALL {
            assert_eq!(ticks(&log, "rec", tier), 1);
            assert_eq!(scheduler.next_deadline(tier), start + tier.period());
        }
    }

    #[test]
    fn nothing_fires_before_a_deadline() {
        let start = Instant::now();
        let (mut registry, _log) = recording_registry();
        let mut scheduler = Scheduler::new(start);
        scheduler.poll(start, &mut registry);

        assert_eq!(scheduler.poll(start + Duration::from_millis(9), &mut registry), 0);
        assert_eq!(scheduler.poll(start + Duration::from_millis(10), &mut registry), 1);
    }

    #[test]
    fn stalled_tier_catches_up_one_tick_per_poll() {
        let start = Instant::now();
        let (mut registry, log) = recording_registry();
        let mut scheduler = Scheduler::new(start);
        scheduler.poll(start, &mut registry);

        // The 10ms deadline is at start+10ms; now is 35ms past it
        let now = start + Duration::from_millis(45);
        for expected in 2..=5 {
            scheduler.poll(now, &mut registry);
            assert_eq!(ticks(&log, "rec", Tier::Hz100), expected);
        }
        // Caught up: next deadline is start+50ms, beyond now
        scheduler.poll(now, &mut registry);
        assert_eq!(ticks(&log, "rec", Tier::Hz100), 5);
        assert_eq!(scheduler.next_deadline(Tier::Hz100), start + Duration::from_millis(50));
    }

    #[test]
    fn deadlines_are_never_rebased_to_now() {
        let start = Instant::now();
        let (mut registry, _log) = recording_registry();
        let mut scheduler = Scheduler::new(start);

        scheduler.poll(start + Duration::from_secs(3), &mut registry);

        assert_eq!(scheduler.next_deadline(Tier::Hz1), start + Duration::from_secs(1));
        assert_eq!(scheduler.next_deadline(Tier::TenthHz), start + Duration::from_secs(10));
    }

    #[test]
    fn tiers_fire_fastest_first_within_a_poll() {
        let start = Instant::now();
        let (mut registry, log) = recording_registry();
        let mut scheduler = Scheduler::new(start);
        scheduler.poll(start, &mut registry);

        let fired: Vec<Tier> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                crate::test_utils::Call::Tick { tier, .. } => Some(*tier),
                _ => None,
            })
            .collect();
        assert_eq!(fired, Tier::ALL);
    }
}
