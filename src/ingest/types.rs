// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only notification type that triggers ingestion.
pub const EVENT_DETECTED: &str = "monitor.event.detected";

/// Loosely-typed view of an inbound webhook body.
/// Every field is optional so that ignored types never fail to parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundNotification {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub monitor_id: Option<Value>,
    #[serde(default)]
    pub event: Option<NotificationEvent>,
    #[serde(default)]
    pub metadata: Option<NotificationMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEvent {
    #[serde(default)]
    pub event_group_id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationMetadata {
    #[serde(default)]
    pub monitor_type: Option<Value>,
}

impl InboundNotification {
    /// Lenient parse from an already decoded JSON value. Each field is read
    /// on its own, so a badly shaped `metadata` or `event` only loses itself.
    pub fn from_value(v: &Value) -> Self {
        let data = v.get("data").filter(|d| d.is_object()).map(|d| NotificationData {
            monitor_id: d.get("monitor_id").cloned(),
            event: d.get("event").map(|e| NotificationEvent {
                event_group_id: e.get("event_group_id").cloned(),
            }),
            metadata: d.get("metadata").map(|m| NotificationMetadata {
                monitor_type: m.get("monitor_type").cloned(),
            }),
        });
        Self {
            kind: v.get("type").and_then(Value::as_str).map(str::to_string),
            timestamp: v.get("timestamp").cloned(),
            data,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn is_event_detected(&self) -> bool {
        self.kind() == Some(EVENT_DETECTED)
    }

    pub fn monitor_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.monitor_id.as_ref())
            .and_then(non_empty_str)
    }

    pub fn event_group_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.event.as_ref())
            .and_then(|e| e.event_group_id.as_ref())
            .and_then(non_empty_str)
    }

    /// Category explicitly attached to the monitor at creation time.
    pub fn metadata_monitor_type(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.metadata.as_ref())
            .and_then(|m| m.monitor_type.as_ref())
            .and_then(non_empty_str)
    }
}

fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// One detected change inside an event group, kept verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEvent {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

/// Full set of events behind one `event_group_id`, in API order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventGroup {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl EventGroup {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_notification() {
        let v = json!({
            "type": "monitor.event.detected",
            "timestamp": "2026-01-24T10:00:00Z",
            "data": {
                "monitor_id": "m1",
                "event": { "event_group_id": "g1" },
                "metadata": { "monitor_type": "policy_reports" }
            }
        });
        let n = InboundNotification::from_value(&v);
        assert!(n.is_event_detected());
        assert_eq!(n.monitor_id(), Some("m1"));
        assert_eq!(n.event_group_id(), Some("g1"));
        assert_eq!(n.metadata_monitor_type(), Some("policy_reports"));
    }

    #[test]
    fn odd_shapes_degrade_to_absent_fields() {
        let v = json!({ "type": "monitor.event.detected", "data": "oops" });
        let n = InboundNotification::from_value(&v);
        assert!(n.is_event_detected());
        assert!(n.monitor_id().is_none());

        let v = json!({
            "type": "monitor.event.detected",
            "data": { "monitor_id": 42, "event": { "event_group_id": "  " } }
        });
        let n = InboundNotification::from_value(&v);
        assert!(n.monitor_id().is_none());
        assert!(n.event_group_id().is_none());

        let v = json!({
            "type": "monitor.event.detected",
            "data": { "monitor_id": "m1", "event": { "event_group_id": "g1" }, "metadata": "policy_reports" }
        });
        let n = InboundNotification::from_value(&v);
        assert_eq!(n.monitor_id(), Some("m1"));
        assert_eq!(n.event_group_id(), Some("g1"));
        assert!(n.metadata_monitor_type().is_none());
    }

    #[test]
    fn raw_event_tolerates_missing_fields() {
        let ev: RawEvent = serde_json::from_value(json!({ "output": "x" })).unwrap();
        assert_eq!(ev.event_date, None);
        assert!(ev.source_urls.is_empty());
    }
}
