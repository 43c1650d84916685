use std::sync::Arc;

use anyhow::Result;

use chatloom_providers::BackendClient;
use chatloom_types::TaskId;

use crate::conversation::build_conversation;
use crate::expand::expand_response;
use crate::queue::TaskQueue;
use crate::store::TaskStore;
use crate::tokens::estimate_request_budget;
use crate::tools::ToolRegistry;

/// Drives one conversation round: assemble the chain, submit it, expand the
/// response. The store is passed by reference into every operation; this
/// type owns only the collaborators (backend client, tool registry, the
/// external execution queue).
pub struct ChatOrchestrator {
    client: BackendClient,
    tools: ToolRegistry,
    queue: Arc<dyn TaskQueue>,
}

impl ChatOrchestrator {
    pub fn new(client: BackendClient, tools: ToolRegistry, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            client,
            tools,
            queue,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn queue(&self) -> &dyn TaskQueue {
        self.queue.as_ref()
    }

    /// Adds a user turn (root or follow-up) and enqueues it for processing.
    pub fn send_message(
        &self,
        store: &mut TaskStore,
        message: &str,
        allowed_tools: Vec<String>,
    ) -> Result<Option<TaskId>> {
        Ok(store.send_message(message, allowed_tools, self.queue.as_ref())?)
    }

    /// Processes a queued task: builds the conversation from its chain,
    /// submits a completion and expands the response into new tasks. Returns
    /// the last task the expansion created, if any. Transport errors
    /// propagate unchanged; an unknown task id is a no-op.
    pub async fn process_conversation(
        &self,
        store: &mut TaskStore,
        task_id: &str,
    ) -> Result<Option<TaskId>> {
        let Some(task) = store.get(task_id) else {
            tracing::warn!(target: "chatloom.orchestrator", task_id, "task vanished before processing");
            return Ok(None);
        };
        let allowed_tools = task.allowed_tools.clone();
        let messages = build_conversation(task_id, store);
        let schemas = self.tools.resolve(&allowed_tools);

        let budget = estimate_request_budget(task_id, store, &self.tools);
        if let Some(task) = store.get_mut(task_id) {
            task.debugging.token_budget = serde_json::to_value(budget).ok();
        }
        tracing::debug!(
            target: "chatloom.orchestrator",
            task_id,
            chat_tokens = budget.chat_tokens,
            function_tokens = budget.function_tokens,
            "submitting completion"
        );

        let response = self
            .client
            .submit_completion(messages, &schemas, store.config())
            .await?;

        // The provider reports the exact prompt size; prefer it over the
        // estimate on the requesting task.
        if let Some(usage) = &response.usage {
            if let Some(task) = store.get_mut(task_id) {
                task.debugging.used_tokens = Some(usage.prompt_tokens);
            }
        }

        let next = expand_response(store, &response, task_id, self.queue.as_ref())?;
        Ok(next)
    }
}
