//! Advisory token accounting. Counts are used for cost/limit awareness in
//! UIs and debugging output; nothing here enforces a hard budget.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tiktoken_rs::{cl100k_base, CoreBPE};

use chatloom_types::{ChatMessage, Task, ToolSchema};

use crate::conversation::build_conversation;
use crate::store::TaskStore;
use crate::tools::ToolRegistry;

static BPE: Lazy<CoreBPE> = Lazy::new(|| cl100k_base().expect("cl100k tokenizer data is bundled"));

/// Structured tool schemas compress better than their serialized JSON, so
/// the raw tool token count is discounted by this factor.
pub const FUNCTION_TOKEN_DISCOUNT: f64 = 0.7;

pub fn count_tokens(text: &str) -> usize {
    BPE.encode_with_special_tokens(text).len()
}

pub fn estimate_task_tokens(task: &Task) -> usize {
    task.content.as_deref().map_or(0, count_tokens)
}

pub fn count_conversation_tokens(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .filter_map(|m| m.content.as_deref())
        .map(count_tokens)
        .sum()
}

/// Raw (undiscounted) token count of tool definitions: description plus
/// pretty-printed parameter schema per tool.
pub fn count_tool_tokens(tools: &[ToolSchema]) -> usize {
    tools
        .iter()
        .map(|tool| {
            let parameters =
                serde_json::to_string_pretty(&tool.parameters).unwrap_or_default();
            count_tokens(&tool.description) + count_tokens(&parameters)
        })
        .sum()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenBudget {
    pub prompt_tokens: usize,
    pub chat_tokens: usize,
    pub function_tokens: usize,
    pub total: usize,
}

/// Estimates what a request built from `task_id` would cost. Deterministic
/// for identical task and tool inputs.
pub fn estimate_request_budget(
    task_id: &str,
    store: &TaskStore,
    tools: &ToolRegistry,
) -> TokenBudget {
    let messages = build_conversation(task_id, store);
    let task = store.get(task_id);
    let schemas = task
        .map(|t| tools.resolve(&t.allowed_tools))
        .unwrap_or_default();

    let prompt_tokens = task.map_or(0, estimate_task_tokens);
    let chat_tokens = count_conversation_tokens(&messages);
    let function_tokens =
        (count_tool_tokens(&schemas) as f64 * FUNCTION_TOKEN_DISCOUNT).floor() as usize;
    TokenBudget {
        prompt_tokens,
        chat_tokens,
        function_tokens,
        total: chat_tokens + function_tokens,
    }
}
