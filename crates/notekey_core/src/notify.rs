//! Broadcast notifications and the subscriber registry.
//!
//! # Responsibility
//! - Define the closed set of state-change notifications sent to panels.
//! - Fan notifications out to every live subscriber.
//!
//! # Invariants
//! - Publishing with zero subscribers is not an error.
//! - Each subscriber receives notifications in publish order.
//! - Subscribers whose receiver was dropped are pruned on the next publish.

use crate::model::note::{Note, NoteId};
use crate::model::settings::Settings;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// State-change notification. Serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    SetHighlightedText {
        text: String,
    },
    ClearHighlightedText,
    ShowPanel,
    NoteUpdated {
        note: Note,
    },
    NoteCreated {
        note: Note,
    },
    #[serde(rename_all = "camelCase")]
    NoteDeleted {
        note_id: NoteId,
    },
    NoteRenamed {
        note: Note,
    },
    NoteSwitched {
        note: Note,
    },
    ExplanationLoading,
    ExplanationComplete {
        explanation: String,
        note: Note,
    },
    Error {
        error: String,
    },
    SettingsUpdated {
        settings: Settings,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetHighlightedText { .. } => "setHighlightedText",
            Self::ClearHighlightedText => "clearHighlightedText",
            Self::ShowPanel => "showPanel",
            Self::NoteUpdated { .. } => "noteUpdated",
            Self::NoteCreated { .. } => "noteCreated",
            Self::NoteDeleted { .. } => "noteDeleted",
            Self::NoteRenamed { .. } => "noteRenamed",
            Self::NoteSwitched { .. } => "noteSwitched",
            Self::ExplanationLoading => "explanationLoading",
            Self::ExplanationComplete { .. } => "explanationComplete",
            Self::Error { .. } => "error",
            Self::SettingsUpdated { .. } => "settingsUpdated",
        }
    }
}

/// Receiving end held by one panel.
pub type Subscription = UnboundedReceiver<Notification>;

/// Observer registry. Clones share the same subscriber list.
#[derive(Debug, Clone, Default)]
pub struct NotificationHub {
    subscribers: Arc<Mutex<Vec<UnboundedSender<Notification>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = unbounded_channel();
        self.lock().push(sender);
        receiver
    }

    /// Delivers `notification` to every live subscriber.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, notification: Notification) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|sender| sender.send(notification.clone()).is_ok());
        let delivered = subscribers.len();
        debug!(
            "event=notify module=notify status=ok type={} delivered={}",
            notification.kind(),
            delivered
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<Notification>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{Notification, NotificationHub};
    use serde_json::json;

    #[test]
    fn publish_without_subscribers_is_fine() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish(Notification::ExplanationLoading), 0);
    }

    #[test]
    fn each_subscriber_sees_publish_order() {
        let hub = NotificationHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        hub.publish(Notification::ExplanationLoading);
        hub.publish(Notification::ClearHighlightedText);

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.try_recv().unwrap(), Notification::ExplanationLoading);
            assert_eq!(
                receiver.try_recv().unwrap(),
                Notification::ClearHighlightedText
            );
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = NotificationHub::new();
        let keep = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.publish(Notification::ShowPanel), 1);
        assert_eq!(hub.subscriber_count(), 1);
        drop(keep);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn serializes_with_type_tag() {
        let value = serde_json::to_value(Notification::NoteDeleted {
            note_id: "7".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "noteDeleted", "noteId": "7" }));
    }
}
