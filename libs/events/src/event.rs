//! Event record and the object it refers to.

use chrono::{DateTime, Utc};
use machinery_id::EventId;
use serde::{Deserialize, Serialize};

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Expected progress.
    Normal,
    /// A failure the operator should look at.
    Warning,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Warning => write!(f, "Warning"),
        }
    }
}

/// Reference to the object an event is recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl ObjectRef {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_id: EventId,
    pub involved_object: ObjectRef,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Machine-readable reason, e.g. `CreateSuccess`.
    pub reason: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        involved_object: ObjectRef,
        event_type: EventType,
        reason: &str,
        message: String,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            involved_object,
            event_type,
            reason: reason.to_string(),
            message,
            occurred_at: Utc::now(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.event_type == EventType::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        let obj = ObjectRef::new("Machine", "default", "cp-0", "mach_x");
        assert_eq!(obj.to_string(), "Machine/default/cp-0");
    }

    #[test]
    fn test_event_json_shape() {
        let obj = ObjectRef::new("Machine", "default", "cp-0", "mach_x");
        let event = Event::new(obj, EventType::Warning, "CreateFailure", "boom".into());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Warning");
        assert_eq!(json["reason"], "CreateFailure");
        assert_eq!(json["involvedObject"]["name"], "cp-0");
        assert!(event.is_warning());
    }
}
