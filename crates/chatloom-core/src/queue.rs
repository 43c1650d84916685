use tokio::sync::mpsc;

use chatloom_types::TaskId;

/// Hand-off to the external execution collaborator. The queue receives a
/// task id only after the task's graph linkage is fully established; the
/// collaborator resolves the task asynchronously and advances its state
/// through the store.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, id: TaskId);
}

/// Channel-backed queue for embedding: the executor drains the receiver.
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<TaskId>,
}

impl ChannelQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TaskQueue for ChannelQueue {
    fn enqueue(&self, id: TaskId) {
        // A dropped receiver means no executor is attached; the task stays
        // Queued until one is.
        let _ = self.tx.send(id);
    }
}
