//! # Pump Runner
//!
//! Owns the dedicated thread that drains an [`InMemoryEventPump`].

use crate::pump::InMemoryEventPump;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{info, warn};

/// Errors starting the pump thread.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The OS refused to create the thread.
    #[error("Failed to spawn pump thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Running pump thread. Stops and joins the thread on drop.
pub struct PumpHandle {
    pump: Arc<InMemoryEventPump>,
    thread: Option<JoinHandle<()>>,
}

impl PumpHandle {
    /// Start `pump.run()` on a new thread called `name`.
    pub fn spawn(pump: Arc<InMemoryEventPump>, name: &str) -> Result<Self, PumpError> {
        let runner = pump.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner.run())?;
        info!(thread = name, "Event pump thread started");
        Ok(Self {
            pump,
            thread: Some(thread),
        })
    }

    /// The pump being drained.
    pub fn pump(&self) -> &Arc<InMemoryEventPump> {
        &self.pump
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.pump.stop();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!("Event pump thread panicked");
            }
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, PumpEvent, TargetId};
    use crate::pump::{EventPump, EventTarget};
    use parking_lot::Mutex;
    use std::sync::Weak;
    use std::time::{Duration, Instant};

    struct ThreadRecorder {
        id: TargetId,
        threads: Mutex<Vec<Option<String>>>,
    }

    impl EventTarget for ThreadRecorder {
        fn target_id(&self) -> TargetId {
            self.id
        }

        fn process_event(&self, _event: PumpEvent) {
            let name = thread::current().name().map(str::to_string);
            self.threads.lock().push(name);
        }
    }

    #[test]
    fn test_events_run_on_named_pump_thread() {
        let pump = Arc::new(InMemoryEventPump::new());
        let target = Arc::new(ThreadRecorder {
            id: TargetId::next(),
            threads: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn EventTarget> = Arc::downgrade(&target) as Weak<dyn EventTarget>;
        pump.register(weak);

        let handle = PumpHandle::spawn(pump.clone(), "test-pump").unwrap();
        pump.post(PumpEvent::new(target.id, EventKind(1)), Duration::ZERO);

        let deadline = Instant::now() + Duration::from_secs(5);
        while target.threads.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown();

        assert_eq!(
            target.threads.lock().as_slice(),
            &[Some("test-pump".to_string())]
        );
        assert!(pump.is_stopped());
    }

    #[test]
    fn test_drop_stops_pump() {
        let pump = Arc::new(InMemoryEventPump::new());
        {
            let _handle = PumpHandle::spawn(pump.clone(), "drop-pump").unwrap();
        }
        assert!(pump.is_stopped());
    }
}
