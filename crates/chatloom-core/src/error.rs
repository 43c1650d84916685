use chatloom_types::{TaskId, TaskState};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown task `{0}`")]
    UnknownTask(TaskId),
    #[error("unknown parent task `{0}`")]
    UnknownParent(TaskId),
    #[error("task id `{0}` already exists")]
    DuplicateTaskId(TaskId),
    #[error("invalid state transition {from:?} -> {to:?} for task `{id}`")]
    InvalidTransition {
        id: TaskId,
        from: TaskState,
        to: TaskState,
    },
}
