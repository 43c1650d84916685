use chatloom_types::{ChatMessage, TaskRole};

use crate::chain::task_chain;
use crate::store::TaskStore;

/// Linearizes the ancestor chain of `leaf` into a backend-ready message
/// list. Function tasks contribute their recorded result content under the
/// function's name; messages without content are dropped because the backend
/// rejects empty-content messages even though it can produce them itself.
pub fn build_conversation(leaf: &str, store: &TaskStore) -> Vec<ChatMessage> {
    let Some(chain) = task_chain(leaf, store.tasks()) else {
        return Vec::new();
    };

    let mut messages = Vec::new();
    for id in chain {
        let Some(task) = store.get(&id) else { continue };
        let mut message = ChatMessage {
            role: task.role,
            content: task.content.clone(),
            name: None,
        };
        if task.role == TaskRole::Function {
            message.name = task.author_id.clone();
            message.content = task
                .result
                .as_ref()
                .and_then(|r| r.content())
                .map(str::to_string);
        }
        if message.content.as_deref().map_or(true, str::is_empty) {
            continue;
        }
        messages.push(message);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ChannelQueue;
    use crate::store::TaskSpec;
    use chatloom_providers::ChatConfig;
    use chatloom_types::{FunctionInvocation, TaskContext, TaskResult, TaskState};
    use serde_json::json;

    #[test]
    fn conversation_preserves_chain_order() {
        let mut store = TaskStore::new(ChatConfig::default());
        let (queue, _rx) = ChannelQueue::new();
        store
            .send_message("question", vec![], &queue)
            .expect("create");
        store.send_message("follow-up", vec![], &queue).expect("create");

        let leaf = store.selected_task_id().cloned().expect("selection");
        let messages = build_conversation(&leaf, &store);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.as_deref(), Some("question"));
        assert_eq!(messages[1].content.as_deref(), Some("follow-up"));
    }

    #[test]
    fn function_tasks_use_result_content_and_author_name() {
        let mut store = TaskStore::new(ChatConfig::default());
        let (queue, _rx) = ChannelQueue::new();
        let root = store
            .send_message("look this up", vec![], &queue)
            .expect("create")
            .expect("id");
        let func = store
            .create_task(
                TaskSpec {
                    role: TaskRole::Function,
                    context: Some(TaskContext {
                        function: Some(FunctionInvocation {
                            name: "lookup".to_string(),
                            arguments: json!({"q": 1}),
                        }),
                    }),
                    ..TaskSpec::default()
                },
                Some(&root),
                true,
                &queue,
            )
            .expect("function task");
        store
            .complete_task(
                &func,
                Some(TaskResult::FunctionOutput {
                    content: Some("the answer".to_string()),
                }),
                TaskState::Completed,
            )
            .expect("complete");

        let messages = build_conversation(&func, &store);
        assert_eq!(messages.len(), 2);
        let function_message = &messages[1];
        assert_eq!(function_message.role, TaskRole::Function);
        assert_eq!(function_message.name.as_deref(), Some("lookup"));
        assert_eq!(function_message.content.as_deref(), Some("the answer"));
    }

    #[test]
    fn contentless_tasks_are_dropped() {
        let mut store = TaskStore::new(ChatConfig::default());
        let (queue, _rx) = ChannelQueue::new();
        let root = store
            .send_message("hello", vec![], &queue)
            .expect("create")
            .expect("id");
        // Assistant task without content, as produced by a function-call
        // response.
        let empty = store
            .create_task(
                TaskSpec {
                    role: TaskRole::Assistant,
                    state: Some(TaskState::Completed),
                    ..TaskSpec::default()
                },
                Some(&root),
                false,
                &queue,
            )
            .expect("assistant task");

        let messages = build_conversation(&empty, &store);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content.as_deref(), Some("hello"));
    }

    #[test]
    fn unknown_leaf_yields_empty_conversation() {
        let store = TaskStore::new(ChatConfig::default());
        assert!(build_conversation("ghost", &store).is_empty());
    }
}
