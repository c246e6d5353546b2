//! Notifications for the control surface.
//!
//! The companion publishes event lines, spoken responses and status changes;
//! every subscriber gets its own [`Inbox`] and drains it without blocking.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PipelineStatus {
    Running,
    Stopped,
    /// Running, but nothing to tail yet.
    Idle(String),
    Error(String),
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Idle(reason) => write!(f, "idle: {reason}"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Notification {
    Event(String),
    Response(String),
    Status(PipelineStatus),
}

/// One subscriber's queue of notifications.
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Inbox {
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

/// Fan-out to every live inbox. Inboxes that were dropped are forgotten on
/// the next publish.
#[derive(Default)]
pub struct InboxHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Notification>>>,
}

impl InboxHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Inbox { rx }
    }

    pub fn publish(&self, notification: Notification) {
        trace!(target = "inbox", ?notification, "Publishing");
        self.subscribers
            .lock()
            .retain(|tx| tx.send(notification.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
