//! Toast-style notification sink shared by the whole process.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "Notice";
pub const DEFAULT_AUTO_DISMISS_MS: u64 = 3500;

pub type ActionCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct NotificationPayload {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub action_label: Option<String>,
    pub on_action: Option<ActionCallback>,
    /// Milliseconds before the notification dismisses itself; `Some(0)` keeps it until dismissed.
    pub auto_dismiss_ms: Option<u64>,
}

impl NotificationPayload {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_action<F>(mut self, label: impl Into<String>, on_action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.action_label = Some(label.into());
        self.on_action = Some(Arc::new(on_action));
        self
    }

    pub fn with_auto_dismiss(mut self, ms: u64) -> Self {
        self.auto_dismiss_ms = Some(ms);
        self
    }
}

impl fmt::Debug for NotificationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationPayload")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("action_label", &self.action_label)
            .field("has_action", &self.on_action.is_some())
            .field("auto_dismiss_ms", &self.auto_dismiss_ms)
            .finish()
    }
}

#[derive(Clone)]
pub struct NotificationAction {
    pub label: String,
    callback: ActionCallback,
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub action: Option<NotificationAction>,
    pub duration: Option<Duration>,
    pub shown_at: DateTime<Utc>,
    revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Shown { id: String, title: String },
    Replaced { id: String, title: String },
    Dismissed { id: String },
}

pub struct NotificationCenter {
    default_duration_ms: u64,
    active: Mutex<HashMap<String, Notification>>,
    next_revision: AtomicU64,
    events: broadcast::Sender<NotificationEvent>,
    me: Weak<NotificationCenter>,
}

impl NotificationCenter {
    pub fn new() -> Arc<Self> {
        Self::with_default_duration(DEFAULT_AUTO_DISMISS_MS)
    }

    pub fn with_default_duration(default_duration_ms: u64) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new_cyclic(|me| Self {
            default_duration_ms,
            active: Mutex::new(HashMap::new()),
            next_revision: AtomicU64::new(1),
            events,
            me: me.clone(),
        })
    }

    /// Shows a notification and returns its identity. An existing notification with the
    /// same identity is replaced in place.
    pub async fn notify(&self, payload: NotificationPayload) -> String {
        let id = payload.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let title = payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let action = match (payload.action_label, payload.on_action) {
            (Some(label), Some(callback)) => Some(NotificationAction { label, callback }),
            _ => None,
        };
        let duration = match payload.auto_dismiss_ms.unwrap_or(self.default_duration_ms) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let revision = self.next_revision.fetch_add(1, Ordering::Relaxed);

        let notification = Notification {
            id: id.clone(),
            title: title.clone(),
            description: payload.description,
            action,
            duration,
            shown_at: Utc::now(),
            revision,
        };

        let replaced = {
            let mut active = self.active.lock().await;
            active.insert(id.clone(), notification).is_some()
        };

        let event = if replaced {
            NotificationEvent::Replaced {
                id: id.clone(),
                title,
            }
        } else {
            NotificationEvent::Shown {
                id: id.clone(),
                title,
            }
        };
        debug!(notification_id = %id, replaced, "notification shown");
        let _ = self.events.send(event);

        if let Some(duration) = duration {
            self.schedule_auto_dismiss(id.clone(), revision, duration);
        }

        id
    }

    pub async fn dismiss(&self, id: &str) -> bool {
        let removed = self.active.lock().await.remove(id).is_some();
        if removed {
            let _ = self.events.send(NotificationEvent::Dismissed { id: id.to_string() });
        }
        removed
    }

    /// Runs the notification's action, then dismisses it. Returns `false` if there was nothing to run.
    pub async fn trigger_action(&self, id: &str) -> bool {
        let callback = {
            let active = self.active.lock().await;
            active
                .get(id)
                .and_then(|notification| notification.action.as_ref())
                .map(|action| Arc::clone(&action.callback))
        };
        let Some(callback) = callback else {
            return false;
        };
        self.dismiss(id).await;
        callback();
        true
    }

    pub async fn get(&self, id: &str) -> Option<Notification> {
        self.active.lock().await.get(id).cloned()
    }

    pub async fn active(&self) -> Vec<Notification> {
        let mut notifications: Vec<Notification> =
            self.active.lock().await.values().cloned().collect();
        notifications.sort_by_key(|notification| notification.revision);
        notifications
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    fn schedule_auto_dismiss(&self, id: String, revision: u64, duration: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(notification_id = %id, "no async runtime; notification will not auto-dismiss");
            return;
        };
        let center = self.me.clone();
        runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(center) = center.upgrade() {
                center.expire(&id, revision).await;
            }
        });
    }

    async fn expire(&self, id: &str, revision: u64) {
        let expired = {
            let mut active = self.active.lock().await;
            match active.get(id) {
                Some(notification) if notification.revision == revision => {
                    active.remove(id);
                    true
                }
                _ => false,
            }
        };
        if expired {
            debug!(notification_id = %id, "notification auto-dismissed");
            let _ = self.events.send(NotificationEvent::Dismissed { id: id.to_string() });
        }
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
