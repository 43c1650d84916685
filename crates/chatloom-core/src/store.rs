use std::collections::HashMap;

use tokio::sync::broadcast;

use chatloom_providers::ChatConfig;
use chatloom_types::{
    new_task_id, DebugInfo, Task, TaskContext, TaskId, TaskResult, TaskRole, TaskState,
};

use crate::error::StoreError;
use crate::events::{StoreEvent, StoreEvents};
use crate::queue::TaskQueue;

/// Partial task handed to [`TaskStore::create_task`]; unset fields get
/// defaults (fresh id, `Open` state, empty children and debugging).
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub role: TaskRole,
    pub content: Option<String>,
    pub context: Option<TaskContext>,
    pub state: Option<TaskState>,
    pub id: Option<TaskId>,
    pub debugging: Option<DebugInfo>,
    pub allowed_tools: Vec<String>,
}

/// The task graph plus per-session state.
///
/// Mutation-in-place contract: the arena and its entries are never replaced
/// wholesale. Every operation edits the existing `Task` values and publishes
/// a [`StoreEvent`] so reactive observers can track changes without diffing.
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
    selected_task_id: Option<TaskId>,
    config: ChatConfig,
    events: StoreEvents,
}

impl TaskStore {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            tasks: HashMap::new(),
            selected_task_id: None,
            config,
            events: StoreEvents::new(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ChatConfig {
        &mut self.config
    }

    pub fn tasks(&self) -> &HashMap<TaskId, Task> {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Raw mutable access, intended for debugging writes. Observers are not
    /// notified; use [`TaskStore::with_task_mut`] for observable edits.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Edits a task in place and publishes `TaskUpdated`.
    pub fn with_task_mut<R>(
        &mut self,
        id: &str,
        edit: impl FnOnce(&mut Task) -> R,
    ) -> Result<R, StoreError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownTask(id.to_string()))?;
        let out = edit(task);
        self.events.publish(StoreEvent::TaskUpdated(id.to_string()));
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn selected_task_id(&self) -> Option<&TaskId> {
        self.selected_task_id.as_ref()
    }

    pub fn select(&mut self, id: Option<TaskId>) -> Result<(), StoreError> {
        if let Some(id) = &id {
            if !self.tasks.contains_key(id) {
                return Err(StoreError::UnknownTask(id.clone()));
            }
        }
        self.selected_task_id = id.clone();
        self.events.publish(StoreEvent::SelectionChanged(id));
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Creates a task, links it under `parent` and makes it the selection.
    /// With `execute` the task transitions to `Queued` and is handed to the
    /// external queue, strictly after its linkage is established so the
    /// collaborator never observes a partially linked task.
    pub fn create_task(
        &mut self,
        spec: TaskSpec,
        parent: Option<&str>,
        execute: bool,
        queue: &dyn TaskQueue,
    ) -> Result<TaskId, StoreError> {
        let id = spec.id.unwrap_or_else(new_task_id);
        if self.tasks.contains_key(&id) {
            return Err(StoreError::DuplicateTaskId(id));
        }
        if let Some(parent_id) = parent {
            if !self.tasks.contains_key(parent_id) {
                return Err(StoreError::UnknownParent(parent_id.to_string()));
            }
        }

        let mut task = Task::new(spec.role, spec.content);
        task.id = id.clone();
        task.context = spec.context;
        task.state = if execute {
            TaskState::Queued
        } else {
            spec.state.unwrap_or(TaskState::Open)
        };
        task.debugging = spec.debugging.unwrap_or_default();
        task.allowed_tools = spec.allowed_tools;
        if task.role == TaskRole::Function {
            task.author_id = task
                .context
                .as_ref()
                .and_then(|c| c.function.as_ref())
                .map(|f| f.name.clone());
        }
        task.parent_id = parent.map(str::to_string);

        self.tasks.insert(id.clone(), task);
        if let Some(parent_id) = parent {
            if let Some(parent_task) = self.tasks.get_mut(parent_id) {
                parent_task.children_ids.push(id.clone());
            }
        }

        tracing::debug!(target: "chatloom.store", task_id = %id, execute, "task created");
        self.events.publish(StoreEvent::TaskCreated(id.clone()));

        if execute {
            queue.enqueue(id.clone());
        }

        self.selected_task_id = Some(id.clone());
        self.events
            .publish(StoreEvent::SelectionChanged(Some(id.clone())));
        Ok(id)
    }

    /// Adds a user turn under the current selection (or as a new root) and
    /// enqueues it. Blank input is a no-op.
    pub fn send_message(
        &mut self,
        message: &str,
        allowed_tools: Vec<String>,
        queue: &dyn TaskQueue,
    ) -> Result<Option<TaskId>, StoreError> {
        if message.trim().is_empty() {
            return Ok(None);
        }
        tracing::debug!(
            target: "chatloom.store",
            content = %chatloom_observability::redact_text(message),
            "user message received"
        );
        let parent = self.selected_task_id.clone();
        let id = self.create_task(
            TaskSpec {
                role: TaskRole::User,
                content: Some(message.to_string()),
                allowed_tools,
                ..TaskSpec::default()
            },
            parent.as_deref(),
            true,
            queue,
        )?;
        Ok(Some(id))
    }

    /// Monotonic state advancement; regressions and transitions out of a
    /// terminal state are rejected.
    pub fn advance_state(&mut self, id: &str, next: TaskState) -> Result<(), StoreError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownTask(id.to_string()))?;
        if !task.state.can_advance_to(next) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: task.state,
                to: next,
            });
        }
        task.state = next;
        self.events.publish(StoreEvent::TaskUpdated(id.to_string()));
        Ok(())
    }

    /// Resolution hand-back from the external executor: records the outcome
    /// and advances the state in one step.
    pub fn complete_task(
        &mut self,
        id: &str,
        result: Option<TaskResult>,
        state: TaskState,
    ) -> Result<(), StoreError> {
        {
            let task = self
                .tasks
                .get_mut(id)
                .ok_or_else(|| StoreError::UnknownTask(id.to_string()))?;
            if !task.state.can_advance_to(state) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: task.state,
                    to: state,
                });
            }
            task.result = result;
            task.state = state;
        }
        self.events.publish(StoreEvent::TaskUpdated(id.to_string()));
        Ok(())
    }

    /// Removes an entry outright. Parent/child consistency is the caller's
    /// responsibility; only the pruner should use this, leaf upward. The
    /// selection is cleared when it pointed at the removed task, so it never
    /// dangles.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let removed = self.tasks.remove(id);
        if removed.is_some() {
            self.events.publish(StoreEvent::TaskDeleted(id.to_string()));
            if self.selected_task_id.as_deref() == Some(id) {
                self.selected_task_id = None;
                self.events.publish(StoreEvent::SelectionChanged(None));
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ChannelQueue;

    fn store() -> TaskStore {
        TaskStore::new(ChatConfig::default())
    }

    #[test]
    fn root_message_becomes_queued_selected_root() {
        let mut store = store();
        let (queue, mut rx) = ChannelQueue::new();

        let id = store
            .send_message("Hello", vec![], &queue)
            .expect("create")
            .expect("non-blank");

        let task = store.get(&id).expect("task");
        assert_eq!(task.state, TaskState::Queued);
        assert!(task.parent_id.is_none());
        assert_eq!(task.content.as_deref(), Some("Hello"));
        assert_eq!(store.selected_task_id(), Some(&id));
        assert_eq!(rx.try_recv().ok(), Some(id));
    }

    #[test]
    fn blank_message_is_ignored() {
        let mut store = store();
        let (queue, mut rx) = ChannelQueue::new();
        assert!(store
            .send_message("   ", vec![], &queue)
            .expect("ok")
            .is_none());
        assert!(store.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn follow_up_links_under_selection_exactly_once() {
        let mut store = store();
        let (queue, _rx) = ChannelQueue::new();

        let root = store
            .send_message("first", vec![], &queue)
            .expect("create")
            .expect("id");
        let child = store
            .send_message("second", vec![], &queue)
            .expect("create")
            .expect("id");

        let child_task = store.get(&child).expect("child");
        assert_eq!(child_task.parent_id.as_deref(), Some(root.as_str()));
        let root_task = store.get(&root).expect("root");
        assert_eq!(
            root_task.children_ids.iter().filter(|c| **c == child).count(),
            1
        );
        assert_eq!(store.selected_task_id(), Some(&child));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = store();
        let (queue, _rx) = ChannelQueue::new();

        let spec = TaskSpec {
            id: Some("fixed-id".to_string()),
            content: Some("hi".to_string()),
            ..TaskSpec::default()
        };
        store
            .create_task(spec.clone(), None, false, &queue)
            .expect("first insert");
        let err = store.create_task(spec, None, false, &queue).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTaskId(id) if id == "fixed-id"));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut store = store();
        let (queue, _rx) = ChannelQueue::new();
        let err = store
            .create_task(TaskSpec::default(), Some("missing"), false, &queue)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownParent(_)));
    }

    #[test]
    fn states_cannot_regress() {
        let mut store = store();
        let (queue, _rx) = ChannelQueue::new();
        let id = store
            .send_message("hi", vec![], &queue)
            .expect("create")
            .expect("id");

        store
            .advance_state(&id, TaskState::Completed)
            .expect("queued -> completed");
        let err = store.advance_state(&id, TaskState::Open).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        let err = store.advance_state(&id, TaskState::Error).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn selection_must_reference_existing_task() {
        let mut store = store();
        let err = store.select(Some("ghost".to_string())).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTask(_)));
        store.select(None).expect("clearing always allowed");
    }

    #[test]
    fn mutations_publish_events() {
        let mut store = store();
        let mut events = store.subscribe();
        let (queue, _rx) = ChannelQueue::new();

        let id = store
            .send_message("hi", vec![], &queue)
            .expect("create")
            .expect("id");
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::TaskCreated(id.clone())));
        assert_eq!(
            events.try_recv().ok(),
            Some(StoreEvent::SelectionChanged(Some(id.clone())))
        );

        store.remove(&id);
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::TaskDeleted(id)));
    }

    #[test]
    fn removing_the_selected_task_clears_the_selection() {
        let mut store = store();
        let (queue, _rx) = ChannelQueue::new();
        let root = store
            .send_message("a", vec![], &queue)
            .expect("create")
            .expect("id");
        let child = store
            .send_message("b", vec![], &queue)
            .expect("create")
            .expect("id");
        store.select(Some(root.clone())).expect("select");

        store.remove(&child);
        assert_eq!(store.selected_task_id(), Some(&root));

        store.remove(&root);
        assert!(store.selected_task_id().is_none());
    }

    #[test]
    fn executor_hand_back_records_result_and_state() {
        let mut store = store();
        let (queue, _rx) = ChannelQueue::new();
        let id = store
            .send_message("hi", vec![], &queue)
            .expect("create")
            .expect("id");

        store
            .complete_task(
                &id,
                Some(TaskResult::FunctionOutput {
                    content: Some("done".to_string()),
                }),
                TaskState::Completed,
            )
            .expect("complete");
        let task = store.get(&id).expect("task");
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.result.as_ref().and_then(|r| r.content()), Some("done"));
    }
}
