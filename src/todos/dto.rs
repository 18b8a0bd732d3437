use serde::{Deserialize, Serialize};

use crate::todos::repo_types::Todo;

/// Body for `POST /todos`. Server-controlled fields such as `creator` are
/// not part of the type and are dropped on deserialization.
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: String,
}

/// Body for `PATCH /todos/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct TodoEnvelope {
    pub todo: Todo,
}
