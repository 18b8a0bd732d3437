use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, UpdateTodoRequest},
        repo_types::{Todo, TodoFilter, TodoPatch},
    },
};

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Ids that are not UUIDs can never match; treat them as missing.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        debug!(id = %raw, "malformed todo id");
        AppError::NotFound
    })
}

fn check_text(text: &str, min_len: usize) -> Result<(), AppError> {
    if text.chars().count() < min_len.max(1) {
        return Err(AppError::validation(format!(
            "text must be at least {} characters",
            min_len.max(1)
        )));
    }
    Ok(())
}

/// `completed == true` stamps `completed_at`; anything else clears both.
pub fn completion_patch(req: UpdateTodoRequest, now_ms: i64) -> TodoPatch {
    match req.completed {
        Some(true) => TodoPatch {
            text: req.text,
            completed: true,
            completed_at: Some(now_ms),
        },
        _ => TodoPatch {
            text: req.text,
            completed: false,
            completed_at: None,
        },
    }
}

pub async fn create_todo(
    state: &AppState,
    creator: Uuid,
    req: CreateTodoRequest,
) -> Result<Todo, AppError> {
    check_text(&req.text, state.config.validation.min_todo_text_len)?;
    let todo = Todo {
        id: Uuid::new_v4(),
        text: req.text,
        completed: false,
        completed_at: None,
        creator,
    };
    Ok(state.store.insert_todo(todo).await?)
}

pub async fn list_todos(state: &AppState, creator: Uuid) -> Result<Vec<Todo>, AppError> {
    Ok(state.store.find_todos(&TodoFilter::owned_by(creator)).await?)
}

pub async fn get_todo(state: &AppState, creator: Uuid, raw_id: &str) -> Result<Todo, AppError> {
    let filter = TodoFilter::owned_by(creator).with_id(parse_id(raw_id)?);
    state.store.find_todo(&filter).await?.ok_or(AppError::NotFound)
}

pub async fn update_todo(
    state: &AppState,
    creator: Uuid,
    raw_id: &str,
    req: UpdateTodoRequest,
) -> Result<Todo, AppError> {
    let filter = TodoFilter::owned_by(creator).with_id(parse_id(raw_id)?);
    if let Some(text) = &req.text {
        check_text(text, state.config.validation.min_todo_text_len)?;
    }
    let patch = completion_patch(req, now_millis());
    state
        .store
        .find_one_and_update_todo(&filter, patch)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn delete_todo(state: &AppState, creator: Uuid, raw_id: &str) -> Result<Todo, AppError> {
    let filter = TodoFilter::owned_by(creator).with_id(parse_id(raw_id)?);
    state
        .store
        .find_one_and_delete_todo(&filter)
        .await?
        .ok_or(AppError::NotFound)
}
