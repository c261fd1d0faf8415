//! Event recorders.
//!
//! Recording is fire-and-forget: [`EventRecorder::record`] returns nothing,
//! and implementations must not block the caller.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::event::{Event, EventType, ObjectRef};

/// Sink for lifecycle events.
pub trait EventRecorder: Send + Sync {
    /// Record an event. Must not block and must not fail.
    fn record(&self, event: Event);

    /// Record a Normal event.
    fn eventf(&self, object: &ObjectRef, reason: &str, message: String) {
        self.record(Event::new(object.clone(), EventType::Normal, reason, message));
    }

    /// Record a Warning event.
    fn warnf(&self, object: &ObjectRef, reason: &str, message: String) {
        self.record(Event::new(object.clone(), EventType::Warning, reason, message));
    }
}

/// Recorder that writes events to the tracing pipeline.
#[derive(Debug, Clone)]
pub struct TracingRecorder {
    component: String,
}

impl TracingRecorder {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl EventRecorder for TracingRecorder {
    fn record(&self, event: Event) {
        match event.event_type {
            EventType::Normal => info!(
                component = %self.component,
                event_id = %event.event_id,
                object = %event.involved_object,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => warn!(
                component = %self.component,
                event_id = %event.event_id,
                object = %event.involved_object,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Recorder that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events recorded with the given reason.
    pub fn with_reason(&self, reason: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: Event) {
        // A poisoned lock only means another recorder call panicked; keep recording.
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }
}
