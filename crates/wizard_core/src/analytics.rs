use std::sync::Mutex;

use serde::Serialize;
use shared::domain::SourceType;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    #[serde(rename = "proj_source_ready")]
    SourceReady { mode: SourceType },
    #[serde(rename = "proj_creation_complete")]
    CreationComplete { title: String, targets: Vec<String> },
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::SourceReady { .. } => "proj_source_ready",
            AnalyticsEvent::CreationComplete { .. } => "proj_creation_complete",
        }
    }
}

/// Fire-and-forget event sink; implementations must not block.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &AnalyticsEvent);
}

pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: &AnalyticsEvent) {
        let properties = serde_json::to_string(event).unwrap_or_default();
        info!(target: "analytics", event = event.name(), %properties, "analytics event");
    }
}

#[derive(Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: &AnalyticsEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
