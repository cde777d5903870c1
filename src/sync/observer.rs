use std::sync::mpsc;

use serde::Serialize;

use crate::model::task::Task;

/// Why the task list changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Through one of the reconciler's mutation operations
    Mutation,
    /// The file was edited by someone else and reloaded
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    TasksChanged {
        tasks: Vec<Task>,
        origin: ChangeOrigin,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

/// Fan-out of [`SyncEvent`]s to any number of subscribers. A subscriber that
/// has been dropped or disposed is pruned on the next publish.
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<mpsc::Sender<SyncEvent>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        Subscription { rx }
    }

    pub fn publish(&mut self, event: &SyncEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Receiving end of a subscription. Events queue up until polled.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<SyncEvent>,
}

impl Subscription {
    /// Non-blocking: every event queued since the last poll.
    pub fn poll(&self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Stop receiving. Equivalent to dropping the subscription.
    pub fn dispose(self) {}
}
