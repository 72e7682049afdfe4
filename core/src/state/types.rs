use serde::{Deserialize, Serialize};

/// Status of an externally observed todo item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl TodoStatus {
    /// Pending and in-progress todos are still open work
    pub fn is_open(self) -> bool {
        matches!(self, TodoStatus::Pending | TodoStatus::InProgress)
    }
}

/// Last observed todo list entry.
///
/// Carried through snapshots untouched; unknown fields are preserved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservedTodo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ObservedTodo {
    pub fn new(content: impl Into<String>, status: TodoStatus) -> Self {
        Self {
            id: None,
            content: content.into(),
            status,
            extra: serde_json::Map::new(),
        }
    }
}
