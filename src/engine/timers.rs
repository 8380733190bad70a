//! Timer registry - at most one live timer per (device, purpose).
//!
//! The registry does not spawn anything itself. `schedule` hands back a
//! [`TimerTicket`] and a cancellation token; the engine spawns the waiting
//! task and, when it wakes, asks the registry whether the ticket is still
//! current before running the timer's action. Both checks happen under the
//! engine lock, so a cancel or replace that commits before a firing makes
//! that firing a no-op, even if the task already woke up.
//!
//! NOT a separate actor - owned by the engine core and called via &mut self.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::DeviceId;

/// One-shot or repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    OneShot,
    Repeating,
}

/// Registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub device_id: DeviceId,
    pub purpose: String,
}

impl TimerKey {
    pub fn new(device_id: &DeviceId, purpose: &str) -> Self {
        Self {
            device_id: device_id.clone(),
            purpose: purpose.to_string(),
        }
    }
}

/// Proof of a particular scheduling of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTicket {
    pub key: TimerKey,
    pub generation: u64,
    pub kind: TimerKind,
}

#[derive(Debug)]
struct TimerEntry {
    generation: u64,
    kind: TimerKind,
    period: Duration,
    token: CancellationToken,
}

/// Read-only view of a live timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerInfo {
    pub purpose: String,
    pub kind: TimerKind,
    #[serde(with = "humantime_serde")]
    pub period: Duration,
}

#[derive(Debug, Default)]
pub struct TimerRegistry {
    entries: HashMap<TimerKey, TimerEntry>,
    next_generation: u64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer, cancelling any live timer under the same key first.
    ///
    /// The returned token is cancelled when the timer is cancelled or replaced;
    /// the waiting task should stop on it.
    pub fn schedule(
        &mut self,
        device_id: &DeviceId,
        purpose: &str,
        kind: TimerKind,
        period: Duration,
    ) -> (TimerTicket, CancellationToken) {
        let key = TimerKey::new(device_id, purpose);
        if let Some(previous) = self.entries.remove(&key) {
            previous.token.cancel();
            tracing::trace!(device = %device_id, purpose, "timer_replaced");
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();

        self.entries.insert(
            key.clone(),
            TimerEntry {
                generation,
                kind,
                period,
                token: token.clone(),
            },
        );

        (
            TimerTicket {
                key,
                generation,
                kind,
            },
            token,
        )
    }

    /// Cancel the timer under `(device, purpose)`. Returns whether one was live.
    pub fn cancel(&mut self, device_id: &DeviceId, purpose: &str) -> bool {
        match self.entries.remove(&TimerKey::new(device_id, purpose)) {
            Some(entry) => {
                entry.token.cancel();
                tracing::trace!(device = %device_id, purpose, "timer_cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every timer of one device.
    pub fn cancel_device(&mut self, device_id: &DeviceId) -> usize {
        let keys: Vec<TimerKey> = self
            .entries
            .keys()
            .filter(|k| &k.device_id == device_id)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                entry.token.cancel();
            }
        }
        keys.len()
    }

    /// Cancel everything.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.token.cancel();
        }
        count
    }

    /// Whether `ticket` is still the live scheduling of its key.
    pub fn is_current(&self, ticket: &TimerTicket) -> bool {
        self.entries
            .get(&ticket.key)
            .is_some_and(|entry| entry.generation == ticket.generation)
    }

    /// Claim a firing.
    ///
    /// Returns `false` when the ticket was cancelled or replaced. A one-shot
    /// timer is removed by a successful claim; a repeating one stays live.
    pub fn claim(&mut self, ticket: &TimerTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if ticket.kind == TimerKind::OneShot {
            self.entries.remove(&ticket.key);
        }
        true
    }

    pub fn is_active(&self, device_id: &DeviceId, purpose: &str) -> bool {
        self.entries.contains_key(&TimerKey::new(device_id, purpose))
    }

    /// Live timers of one device, sorted by purpose.
    pub fn timers_for(&self, device_id: &DeviceId) -> Vec<TimerInfo> {
        let mut timers: Vec<TimerInfo> = self
            .entries
            .iter()
            .filter(|(k, _)| &k.device_id == device_id)
            .map(|(k, e)| TimerInfo {
                purpose: k.purpose.clone(),
                kind: e.kind,
                period: e.period,
            })
            .collect();
        timers.sort_by(|a, b| a.purpose.cmp(&b.purpose));
        timers
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_millis(300);

    #[test]
    fn test_schedule_replaces_and_cancels_previous() {
        let mut registry = TimerRegistry::new();
        let dev = DeviceId::must("dev1");

        let (first, first_token) = registry.schedule(&dev, "pulse:click", TimerKind::OneShot, HOLD);
        let (second, second_token) = registry.schedule(&dev, "pulse:click", TimerKind::OneShot, HOLD);

        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(!registry.is_current(&first));
        assert!(registry.is_current(&second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_cancel_wins_over_pending_firing() {
        let mut registry = TimerRegistry::new();
        let dev = DeviceId::must("dev1");

        let (ticket, token) = registry.schedule(&dev, "in_motion", TimerKind::OneShot, HOLD);
        assert!(registry.cancel(&dev, "in_motion"));
        assert!(token.is_cancelled());

        // The task woke up anyway: its claim must fail.
        assert!(!registry.claim(&ticket));
        assert!(!registry.cancel(&dev, "in_motion"));
    }

    #[test]
    fn test_one_shot_claim_is_single_use() {
        let mut registry = TimerRegistry::new();
        let dev = DeviceId::must("dev1");

        let (ticket, _token) = registry.schedule(&dev, "pulse:tap", TimerKind::OneShot, HOLD);
        assert!(registry.claim(&ticket));
        assert!(!registry.claim(&ticket));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_repeating_claim_keeps_entry() {
        let mut registry = TimerRegistry::new();
        let dev = DeviceId::must("dev1");

        let (ticket, _token) =
            registry.schedule(&dev, "no_motion", TimerKind::Repeating, Duration::from_secs(1));
        assert!(registry.claim(&ticket));
        assert!(registry.claim(&ticket));
        assert!(registry.is_active(&dev, "no_motion"));
    }

    #[test]
    fn test_keys_are_per_device() {
        let mut registry = TimerRegistry::new();
        let a = DeviceId::must("a");
        let b = DeviceId::must("b");

        registry.schedule(&a, "in_motion", TimerKind::OneShot, HOLD);
        registry.schedule(&b, "in_motion", TimerKind::OneShot, HOLD);
        registry.schedule(&a, "pulse:click", TimerKind::OneShot, HOLD);

        assert_eq!(registry.cancel_device(&a), 2);
        assert!(registry.is_active(&b, "in_motion"));
        assert_eq!(registry.timers_for(&a), vec![]);
        assert_eq!(registry.timers_for(&b).len(), 1);
        assert_eq!(registry.cancel_all(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_absent_is_noop() {
        let mut registry = TimerRegistry::new();
        assert!(!registry.cancel(&DeviceId::must("ghost"), "pulse:click"));
    }
}
