use tokio::sync::broadcast;

use chatloom_types::TaskId;

/// Change notifications for reactive observers. The store mutates its task
/// graph in place; observers that need to know what changed subscribe here
/// instead of diffing the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TaskCreated(TaskId),
    TaskUpdated(TaskId),
    TaskDeleted(TaskId),
    SelectionChanged(Option<TaskId>),
}

#[derive(Clone)]
pub struct StoreEvents {
    tx: broadcast::Sender<StoreEvent>,
}

impl StoreEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(2048);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publishing never fails; with no subscribers the event is dropped.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for StoreEvents {
    fn default() -> Self {
        Self::new()
    }
}
