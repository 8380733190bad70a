//! Engine - the driver between decode routines, timers and the store.
//!
//! The engine owns all mutable per-device state (press sessions, occupancy,
//! live timers) behind one async mutex. Messages and timer firings both take
//! that lock, decode, apply the resulting timer requests and forward the
//! writes to the [`StateStore`] before releasing it. That makes the engine a
//! single logical thread of control even when timer tasks run on other
//! workers.
//!
//! Subsystems (timer registry, device states, stats) are plain structs owned
//! by the core, not separate actors.

pub mod recovery;
pub mod state;
pub mod timers;

pub use recovery::with_recovery;
pub use state::{DeviceSnapshot, DeviceState};
pub use timers::{TimerInfo, TimerKind, TimerRegistry};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::decode::{Decoded, TimerAction, TimerRequest};
use crate::message::NormalizedMessage;
use crate::rules::{DecodeContext, RuleTable};
use crate::store::StateStore;
use crate::types::{DeviceId, TimingConfig};
use timers::TimerTicket;

/// Shortest period a repeating timer may run at.
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Counters over the engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub messages_processed: u64,
    /// Messages no rule matched.
    pub messages_unmatched: u64,
    pub writes_emitted: u64,
    pub writes_failed: u64,
    /// Writes with a `null` value, never forwarded.
    pub writes_suppressed: u64,
    pub timers_scheduled: u64,
    pub timers_fired: u64,
    pub timers_cancelled: u64,
    pub rule_failures: u64,
}

/// What happened to one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub matched_rules: Vec<&'static str>,
    /// Writes the store accepted.
    pub writes: usize,
}

#[derive(Debug, Default)]
struct EngineCore {
    devices: HashMap<DeviceId, DeviceState>,
    timers: TimerRegistry,
    stats: EngineStats,
    shut_down: bool,
}

struct EngineInner {
    core: Mutex<EngineCore>,
    rules: RuleTable,
    timing: TimingConfig,
    store: Arc<dyn StateStore>,
}

/// The semantic event translator.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.inner.rules.len())
            .field("timing", &self.inner.timing)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with the standard Xiaomi/Aqara rule table.
    pub fn new(timing: TimingConfig, store: Arc<dyn StateStore>) -> Self {
        Self::with_rules(timing, store, RuleTable::standard())
    }

    pub fn with_rules(timing: TimingConfig, store: Arc<dyn StateStore>, rules: RuleTable) -> Self {
        tracing::info!(rules = rules.len(), "engine_started");
        Self {
            inner: Arc::new(EngineInner {
                core: Mutex::new(EngineCore::default()),
                rules,
                timing,
                store,
            }),
        }
    }

    /// Decode one message and apply its effects.
    ///
    /// Never fails: unmatched input is dropped, malformed fields and
    /// panicking rules are logged and skipped, store errors are logged per
    /// write.
    pub async fn process(&self, msg: &NormalizedMessage) -> ProcessReport {
        let mut guard = self.inner.core.lock().await;
        let core = &mut *guard;
        core.stats.messages_processed += 1;

        let state = core.devices.entry(msg.device_id.clone()).or_default();
        let mut cx = DecodeContext {
            msg,
            state,
            timing: &self.inner.timing,
            now: Instant::now(),
        };
        let dispatch = self.inner.rules.dispatch(&mut cx);
        core.stats.rule_failures += dispatch.failures as u64;

        if dispatch.matched.is_empty() {
            core.stats.messages_unmatched += 1;
            tracing::debug!(
                device = %msg.device_id,
                cluster = %msg.cluster_id,
                model = %msg.model_id,
                "message_unmatched"
            );
            return ProcessReport::default();
        }

        tracing::debug!(
            device = %msg.device_id,
            cluster = %msg.cluster_id,
            rules = ?dispatch.matched,
            "message_dispatched"
        );

        let writes = self.apply(core, &msg.device_id, dispatch.decoded).await;
        ProcessReport {
            matched_rules: dispatch.matched,
            writes,
        }
    }

    /// Forget a device: cancel its timers and drop its state.
    ///
    /// Returns whether the engine knew the device.
    pub async fn remove_device(&self, device_id: &DeviceId) -> bool {
        let mut core = self.inner.core.lock().await;
        let cancelled = core.timers.cancel_device(device_id);
        core.stats.timers_cancelled += cancelled as u64;
        let known = core.devices.remove(device_id).is_some();
        tracing::debug!(device = %device_id, timers = cancelled, "device_removed");
        known || cancelled > 0
    }

    /// Cancel every timer; later messages are still decoded but schedule nothing.
    pub async fn shutdown(&self) {
        let mut core = self.inner.core.lock().await;
        core.shut_down = true;
        let cancelled = core.timers.cancel_all();
        core.stats.timers_cancelled += cancelled as u64;
        tracing::info!(timers_cancelled = cancelled, "engine_shutdown");
    }

    pub async fn is_shut_down(&self) -> bool {
        self.inner.core.lock().await.shut_down
    }

    /// Copy of one device's explicit state and live timers.
    pub async fn snapshot(&self, device_id: &DeviceId) -> Option<DeviceSnapshot> {
        let core = self.inner.core.lock().await;
        core.devices.get(device_id).map(|state| DeviceSnapshot {
            press_active: state.press.is_some(),
            occupancy: state.occupancy,
            timers: core.timers.timers_for(device_id),
        })
    }

    pub async fn stats(&self) -> EngineStats {
        self.inner.core.lock().await.stats.clone()
    }

    pub async fn active_timers(&self) -> usize {
        self.inner.core.lock().await.timers.len()
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Apply timer requests, then forward writes. Returns accepted writes.
    async fn apply(&self, core: &mut EngineCore, device_id: &DeviceId, decoded: Decoded) -> usize {
        for request in decoded.timers {
            match request {
                TimerRequest::Schedule {
                    purpose,
                    kind,
                    delay,
                    action,
                } => self.arm(core, device_id, &purpose, kind, delay, action),
                TimerRequest::Cancel { purpose } => {
                    if core.timers.cancel(device_id, &purpose) {
                        core.stats.timers_cancelled += 1;
                    }
                }
            }
        }

        let mut accepted = 0;
        for write in decoded.writes {
            if write.value.is_null() {
                core.stats.writes_suppressed += 1;
                continue;
            }
            match self
                .inner
                .store
                .write(device_id, &write.key, &write.value, &write.metadata)
                .await
            {
                Ok(()) => {
                    accepted += 1;
                    core.stats.writes_emitted += 1;
                }
                Err(e) => {
                    core.stats.writes_failed += 1;
                    tracing::warn!(
                        device = %device_id,
                        key = %write.key,
                        error = %e,
                        "state_write_failed"
                    );
                }
            }
        }
        accepted
    }

    fn arm(
        &self,
        core: &mut EngineCore,
        device_id: &DeviceId,
        purpose: &str,
        kind: TimerKind,
        delay: Duration,
        action: TimerAction,
    ) {
        if core.shut_down {
            tracing::trace!(device = %device_id, purpose, "timer_ignored_after_shutdown");
            return;
        }

        let (ticket, token) = core.timers.schedule(device_id, purpose, kind, delay);
        core.stats.timers_scheduled += 1;
        tracing::trace!(device = %device_id, purpose, ?kind, ?delay, "timer_scheduled");

        // Deadline is fixed here, not when the task first gets polled.
        let period = match kind {
            TimerKind::OneShot => delay,
            TimerKind::Repeating => delay.max(MIN_TIMER_PERIOD),
        };
        let deadline = Instant::now() + period;
        let engine = Arc::downgrade(&self.inner);
        tokio::spawn(run_timer(engine, ticket, token, deadline, period, action));
    }

    /// Run one firing if `ticket` is still current. Returns `false` if stale.
    async fn fire(&self, ticket: &TimerTicket, action: &TimerAction) -> bool {
        let mut guard = self.inner.core.lock().await;
        let core = &mut *guard;

        if !core.timers.claim(ticket) {
            tracing::trace!(device = %ticket.key.device_id, purpose = %ticket.key.purpose, "timer_stale");
            return false;
        }
        core.stats.timers_fired += 1;
        tracing::trace!(device = %ticket.key.device_id, purpose = %ticket.key.purpose, "timer_fired");

        let device_id = &ticket.key.device_id;
        let state = core.devices.entry(device_id.clone()).or_default();
        let decoded = action.run(state, &self.inner.timing);
        self.apply(core, device_id, decoded).await;
        true
    }
}

/// Wait for a timer and fire it until it is cancelled or replaced.
///
/// The task holds only a weak reference, so a dropped engine ends it at the
/// next wake-up.
async fn run_timer(
    engine: Weak<EngineInner>,
    ticket: TimerTicket,
    token: CancellationToken,
    deadline: Instant,
    period: Duration,
    action: TimerAction,
) {
    match ticket.kind {
        TimerKind::OneShot => {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(inner) = engine.upgrade() {
                        Engine { inner }.fire(&ticket, &action).await;
                    }
                }
            }
        }
        TimerKind::Repeating => {
            let mut ticker = interval_at(deadline, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                if !(Engine { inner }).fire(&ticket, &action).await {
                    break;
                }
            }
        }
    }
}
