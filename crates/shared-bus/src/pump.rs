//! # Event Pump
//!
//! Defines the pump port and its in-memory implementation.

use crate::events::{EventKind, PumpEvent, TargetId};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Receiver of pump events.
pub trait EventTarget: Send + Sync {
    /// Address this target is registered under.
    fn target_id(&self) -> TargetId;

    /// Handle one event. Runs on the pump thread.
    fn process_event(&self, event: PumpEvent);
}

/// Trait for posting events to a single-consumer pump.
pub trait EventPump: Send + Sync {
    /// Queue an event for delivery after `delay`.
    fn post(&self, event: PumpEvent, delay: Duration);

    /// Drop every queued event addressed to `target` with `kind`.
    ///
    /// Returns the number of events removed.
    fn remove(&self, target: TargetId, kind: EventKind) -> usize;

    /// Start delivering events to `target`. Held weakly.
    fn register(&self, target: Weak<dyn EventTarget>);

    /// Stop delivering events to `target`.
    fn unregister(&self, target: TargetId);
}

/// Ordering key: due time, then posting order.
type Slot = (Instant, u64);

struct PumpState {
    queue: BTreeMap<Slot, PumpEvent>,
    targets: HashMap<TargetId, Weak<dyn EventTarget>>,
    next_seq: u64,
    stopped: bool,
}

/// In-memory event pump.
///
/// Any thread may post; events are delivered either by `dispatch_pending`
/// (caller-driven) or by `run` (blocking loop, usually on a dedicated thread
/// started through [`crate::PumpHandle`]). Once stopped, `run` returns
/// immediately; `dispatch_pending` keeps working.
pub struct InMemoryEventPump {
    state: Mutex<PumpState>,
    wakeup: Condvar,
    events_delivered: AtomicU64,
}

impl InMemoryEventPump {
    /// Create an empty pump.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PumpState {
                queue: BTreeMap::new(),
                targets: HashMap::new(),
                next_seq: 0,
                stopped: false,
            }),
            wakeup: Condvar::new(),
            events_delivered: AtomicU64::new(0),
        }
    }

    /// Number of queued events, due or not.
    pub fn pending_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Total events handed to a live target.
    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    /// Whether `target` is currently registered.
    pub fn is_registered(&self, target: TargetId) -> bool {
        self.state.lock().targets.contains_key(&target)
    }

    /// Deliver every event that is due now, on the calling thread.
    ///
    /// Events posted by handlers with no delay are delivered in the same
    /// call. Returns the number of events taken off the queue.
    pub fn dispatch_pending(&self) -> usize {
        let mut dispatched = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                Self::pop_due(&mut state, Instant::now())
            };
            match next {
                Some((event, target)) => {
                    self.deliver(event, target);
                    dispatched += 1;
                }
                None => return dispatched,
            }
        }
    }

    /// Deliver events on the calling thread until `stop` is called.
    pub fn run(&self) {
        debug!("Event pump loop started");
        loop {
            let (event, target) = {
                let mut state = self.state.lock();
                loop {
                    if state.stopped {
                        debug!("Event pump loop stopped");
                        return;
                    }
                    let now = Instant::now();
                    if let Some(next) = Self::pop_due(&mut state, now) {
                        break next;
                    }
                    match state.queue.keys().next().map(|slot| slot.0) {
                        Some(due) => {
                            self.wakeup.wait_until(&mut state, due);
                        }
                        None => self.wakeup.wait(&mut state),
                    }
                }
            };
            self.deliver(event, target);
        }
    }

    /// Ask `run` to return. Queued events are kept.
    pub fn stop(&self) {
        self.state.lock().stopped = true;
        self.wakeup.notify_all();
    }

    /// Whether `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    fn pop_due(
        state: &mut PumpState,
        now: Instant,
    ) -> Option<(PumpEvent, Option<Arc<dyn EventTarget>>)> {
        let slot = *state.queue.keys().next()?;
        if slot.0 > now {
            return None;
        }
        let event = state.queue.remove(&slot)?;
        let target = state.targets.get(&event.target()).and_then(Weak::upgrade);
        if target.is_none() {
            state.targets.remove(&event.target());
        }
        Some((event, target))
    }

    fn deliver(&self, event: PumpEvent, target: Option<Arc<dyn EventTarget>>) {
        match target {
            Some(target) => {
                trace!(target = %event.target(), kind = %event.kind(), "Delivering event");
                self.events_delivered.fetch_add(1, Ordering::Relaxed);
                target.process_event(event);
            }
            None => {
                debug!(
                    target = %event.target(),
                    kind = %event.kind(),
                    "Event dropped (target not registered)"
                );
            }
        }
    }
}

impl Default for InMemoryEventPump {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPump for InMemoryEventPump {
    fn post(&self, event: PumpEvent, delay: Duration) {
        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            trace!(
                target = %event.target(),
                kind = %event.kind(),
                delay_ms = delay.as_millis(),
                "Event posted"
            );
            state.queue.insert((Instant::now() + delay, seq), event);
        }
        self.wakeup.notify_all();
    }

    fn remove(&self, target: TargetId, kind: EventKind) -> usize {
        let mut state = self.state.lock();
        let before = state.queue.len();
        state
            .queue
            .retain(|_, event| !(event.target() == target && event.kind() == kind));
        let removed = before - state.queue.len();
        if removed > 0 {
            trace!(target = %target, kind = %kind, removed, "Events removed");
        }
        removed
    }

    fn register(&self, target: Weak<dyn EventTarget>) {
        let Some(live) = target.upgrade() else {
            return;
        };
        let id = live.target_id();
        self.state.lock().targets.insert(id, target);
        debug!(target = %id, "Event target registered");
    }

    fn unregister(&self, target: TargetId) {
        if self.state.lock().targets.remove(&target).is_some() {
            debug!(target = %target, "Event target unregistered");
        }
    }
}
