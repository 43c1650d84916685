use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Task ids are plain strings: locally created tasks get a UUIDv7
/// (time-ordered, collision-resistant), while assistant-response tasks reuse
/// the provider's response id verbatim.
pub type TaskId = String;

pub fn new_task_id() -> TaskId {
    Uuid::now_v7().to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    #[default]
    User,
    Assistant,
    System,
    Function,
}

impl TaskRole {
    /// Maps a provider role string onto a task role. Providers only ever
    /// answer as the assistant, so unknown strings degrade to that.
    pub fn from_wire(role: &str) -> Self {
        match role {
            "user" => TaskRole::User,
            "system" => TaskRole::System,
            "function" => TaskRole::Function,
            _ => TaskRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    Open,
    Queued,
    Completed,
    Error,
}

impl TaskState {
    fn rank(self) -> u8 {
        match self {
            TaskState::Open => 0,
            TaskState::Queued => 1,
            TaskState::Completed | TaskState::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Error)
    }

    /// States only move forward: Open -> Queued -> {Completed | Error}.
    /// A terminal task never transitions again.
    pub fn can_advance_to(self, next: TaskState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// The function call exactly as the provider returned it, arguments still a
/// raw JSON string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCallDetails {
    pub name: String,
    pub arguments: String,
}

/// A function call after argument parsing. When the raw arguments were not
/// valid JSON, `arguments` holds the raw text as a JSON string instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionInvocation {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionInvocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TaskResult {
    /// Written onto an assistant task whose response requested a call.
    FunctionCall { details: FunctionCallDetails },
    /// Written onto a function task by the external executor.
    FunctionOutput {
        #[serde(default)]
        content: Option<String>,
    },
}

impl TaskResult {
    /// Content carried by a resolved function task, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            TaskResult::FunctionOutput { content } => content.as_deref(),
            TaskResult::FunctionCall { .. } => None,
        }
    }
}

/// Write-only diagnostics bag. Core logic fills it in but never reads it
/// back; it exists for UI inspection and debugging.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_costs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<Value>,
}

/// A node in the conversation tree: a user turn, an assistant turn, or a
/// function invocation/result.
///
/// Parent links are back-references; the parent's `children_ids` is the
/// owning edge and its insertion order reflects creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub role: TaskRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub children_ids: Vec<TaskId>,
    pub state: TaskState,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<TaskContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default)]
    pub debugging: DebugInfo,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(role: TaskRole, content: Option<String>) -> Self {
        Self {
            id: new_task_id(),
            role,
            parent_id: None,
            children_ids: Vec::new(),
            state: TaskState::Open,
            content,
            context: None,
            result: None,
            allowed_tools: Vec::new(),
            author_id: None,
            debugging: DebugInfo::default(),
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
