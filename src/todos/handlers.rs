use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, TodoEnvelope, TodoList, UpdateTodoRequest},
        repo_types::Todo,
        services,
    },
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn create_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<Json<Todo>, AppError> {
    let Json(payload) = payload?;
    let todo = services::create_todo(&state, auth.user.id, payload).await?;
    info!(todo_id = %todo.id, "todo created");
    Ok(Json(todo))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn list_todos(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<TodoList>, AppError> {
    let todos = services::list_todos(&state, auth.user.id).await?;
    Ok(Json(TodoList { todos }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn get_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let todo = services::get_todo(&state, auth.user.id, &id).await?;
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn update_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let Json(payload) = payload?;
    let todo = services::update_todo(&state, auth.user.id, &id, payload).await?;
    info!(todo_id = %todo.id, completed = todo.completed, "todo updated");
    Ok(Json(TodoEnvelope { todo }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn delete_todo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TodoEnvelope>, AppError> {
    let todo = services::delete_todo(&state, auth.user.id, &id).await?;
    info!(todo_id = %todo.id, "todo deleted");
    Ok(Json(TodoEnvelope { todo }))
}
