use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Task record. `completed_at` is epoch milliseconds and only set while completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub creator: Uuid,
}

/// Equality filter over todos. The creator predicate cannot be left out.
#[derive(Debug, Clone, Copy)]
pub struct TodoFilter {
    pub creator: Uuid,
    pub id: Option<Uuid>,
}

impl TodoFilter {
    pub fn owned_by(creator: Uuid) -> Self {
        Self { creator, id: None }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn matches(&self, todo: &Todo) -> bool {
        todo.creator == self.creator && self.id.map_or(true, |id| todo.id == id)
    }
}

/// Partial overwrite of a todo. Completion fields are always written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

impl TodoPatch {
    pub fn apply(&self, todo: &mut Todo) {
        if let Some(text) = &self.text {
            todo.text = text.clone();
        }
        todo.completed = self.completed;
        todo.completed_at = self.completed_at;
    }
}
