//! # Pump Events
//!
//! An event is addressed to a target, tagged with a kind, and may carry an
//! arbitrary owned payload.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Address of an event target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh target address.
    pub fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// Event tag; meaning is private to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind(pub u32);

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tagged event on its way to a target.
pub struct PumpEvent {
    target: TargetId,
    kind: EventKind,
    payload: Option<Box<dyn Any + Send>>,
}

impl PumpEvent {
    /// Event without a payload.
    pub fn new(target: TargetId, kind: EventKind) -> Self {
        Self {
            target,
            kind,
            payload: None,
        }
    }

    /// Attach an owned payload.
    #[must_use]
    pub fn with_payload<T: Any + Send>(mut self, payload: T) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    /// Destination target.
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Event kind.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Borrow the payload if it has type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Take the payload out if it has type `T`.
    ///
    /// A payload of another type is left in place.
    pub fn take_payload<T: Any>(&mut self) -> Option<T> {
        match self.payload.take() {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(value) => Some(*value),
                Err(original) => {
                    self.payload = Some(original);
                    None
                }
            },
            None => None,
        }
    }
}

impl fmt::Debug for PumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PumpEvent")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}
