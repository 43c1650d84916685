//! Interprets a completion response and grows the task tree accordingly.
//!
//! Three outcomes: an empty choice list is a no-op; a content-bearing choice
//! ends the round with a Completed assistant task; a function-call finish
//! creates the assistant task plus a Queued function task for the external
//! executor, whose result feeds the next orchestrator pass.

use serde_json::Value;

use chatloom_types::{
    ChatCompletionResponse, DebugInfo, FunctionInvocation, TaskContext, TaskId, TaskResult,
    TaskRole, TaskState,
};

use crate::error::StoreError;
use crate::queue::TaskQueue;
use crate::store::{TaskSpec, TaskStore};

/// Parses function-call arguments. Invalid JSON degrades to the raw text as
/// a single string value; this never fails.
pub fn parse_function_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Expands `response` under the task that requested it. Returns the id of
/// the last task created: the assistant task for content responses, the
/// queued function task for function-call responses, `None` otherwise.
pub fn expand_response(
    store: &mut TaskStore,
    response: &ChatCompletionResponse,
    parent_id: &str,
    queue: &dyn TaskQueue,
) -> Result<Option<TaskId>, StoreError> {
    let Some(choice) = response.choices.first() else {
        return Ok(None);
    };

    let debugging = DebugInfo {
        used_tokens: response.usage.as_ref().map(|u| u.total_tokens),
        inference_costs: response
            .usage
            .as_ref()
            .and_then(|u| u.inference_costs.clone()),
        raw_response: serde_json::to_value(response).ok(),
        token_budget: None,
    };

    // The response is already resolved, so the task is born Completed and
    // must not be re-enqueued.
    let response_task_id = store.create_task(
        TaskSpec {
            role: TaskRole::from_wire(&choice.message.role),
            content: choice.message.content.clone(),
            state: Some(TaskState::Completed),
            id: Some(response.id.clone()),
            debugging: Some(debugging),
            ..TaskSpec::default()
        },
        Some(parent_id),
        false,
        queue,
    )?;

    if choice
        .message
        .content
        .as_deref()
        .map_or(false, |c| !c.is_empty())
    {
        // Conversation terminates here until the next user input.
        return Ok(Some(response_task_id));
    }

    if choice.finish_reason.as_deref() == Some("function_call") {
        if let Some(call) = &choice.message.function_call {
            let arguments = parse_function_arguments(&call.arguments);
            store.with_task_mut(&response_task_id, |task| {
                task.result = Some(TaskResult::FunctionCall {
                    details: call.clone(),
                });
            })?;

            let function_task_id = store.create_task(
                TaskSpec {
                    role: TaskRole::Function,
                    context: Some(TaskContext {
                        function: Some(FunctionInvocation {
                            name: call.name.clone(),
                            arguments,
                        }),
                    }),
                    ..TaskSpec::default()
                },
                Some(&response_task_id),
                true,
                queue,
            )?;
            tracing::debug!(
                target: "chatloom.expand",
                function = %call.name,
                task_id = %function_task_id,
                "queued function task"
            );
            return Ok(Some(function_task_id));
        }
    }

    Ok(None)
}
