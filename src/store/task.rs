//! Task records and the persisted document shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a task within the collection.
pub type TaskId = u64;

/// A single task record.
///
/// Fields other than `id`, `title` and `isCompleted` that a client merged in
/// through an update are kept in `extra` and serialized back flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// A fresh, not yet completed task.
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            is_completed: false,
            extra: Map::new(),
        }
    }

    /// Overlay `patch` onto this record, one level deep.
    ///
    /// The `id` key of the patch is ignored. Fails when the merged object no
    /// longer has the task shape.
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<Task, serde_json::Error> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => unreachable!("a task always serializes to an object"),
        };
        for (key, value) in patch {
            if key == "id" {
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(fields))
    }
}

/// The durable document: the whole collection plus the id counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<TaskId>,
}

impl TaskDocument {
    /// The collection a fresh store is seeded with.
    pub fn seed() -> Self {
        let mut two = Task::new(2, "Task Two");
        two.is_completed = true;
        Self {
            tasks: vec![Task::new(1, "Task One"), two, Task::new(3, "Task Three")],
            next_id: Some(4),
        }
    }

    /// Next id to hand out, never lower than any id already present.
    ///
    /// `None` when an id of `TaskId::MAX` leaves no room above it.
    pub fn resolved_next_id(&self) -> Option<TaskId> {
        let after_max = match self.tasks.iter().map(|t| t.id).max() {
            Some(max) => max.checked_add(1)?,
            None => 1,
        };
        Some(self.next_id.map_or(after_max, |n| n.max(after_max)))
    }

    /// Ids that occur more than once, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<TaskId> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for task in &self.tasks {
            if !seen.insert(task.id) && !dupes.contains(&task.id) {
                dupes.push(task.id);
            }
        }
        dupes
    }
}

/// Predicates for listing tasks. Absent predicates match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_completed.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        let title_ok = self
            .title
            .as_ref()
            .map_or(true, |needle| {
                task.title.to_lowercase().contains(&needle.to_lowercase())
            });
        let completed_ok = self
            .is_completed
            .map_or(true, |wanted| task.is_completed == wanted);
        title_ok && completed_ok
    }
}

const TRUE_TOKENS: [&str; 4] = ["true", "1", "yes", "on"];

/// Parse a query-string boolean. Anything not in the true-token list is `false`.
pub fn parse_bool_token(raw: &str) -> bool {
    let raw = raw.trim();
    TRUE_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(raw))
}
