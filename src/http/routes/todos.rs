use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use serde::Deserialize;

pub use crate::http::types::AppState;
use crate::{
    application::todo_service::TodoService,
    domain::{file_resource::FileId, todo::{parse_deadline, CreateTodo, TodoId}},
    http::types::{parse_id, todo_json, ApiError},
};

pub fn router<S: TodoService + Clone + Send + Sync + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/todos", post(create_todo::<S>).get(list_todos::<S>))
        .route("/todos/:id", get(get_todo::<S>).put(toggle_todo::<S>).delete(delete_todo::<S>))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    title: String,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    file_ids: Vec<u64>,
}

async fn create_todo<S: TodoService>(State(state): State<AppState<S>>, Json(payload): Json<CreateBody>) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let deadline = match payload.deadline.as_deref() {
        Some(text) => parse_deadline(text)?,
        None => None,
    };
    let input = CreateTodo { title: payload.title, deadline, file_ids: payload.file_ids.into_iter().map(FileId).collect() };
    let todo = state.service.create(input).await?;
    Ok((StatusCode::CREATED, Json(todo_json(&todo))))
}

async fn list_todos<S: TodoService>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
    let todos = state.service.list_sorted().await;
    Json(serde_json::json!({ "items": todos.iter().map(todo_json).collect::<Vec<_>>() }))
}

async fn get_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let id = TodoId(parse_id(&id)?);
    match state.service.get(id).await {
        Some(t) => Ok(Json(todo_json(&t))),
        None => Err(ApiError::not_found()),
    }
}

#[derive(Deserialize)]
struct ToggleBody { completed: bool }

async fn toggle_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>, Json(payload): Json<ToggleBody>) -> Result<StatusCode, ApiError> {
    let id = TodoId(parse_id(&id)?);
    state.service.toggle(id, payload.completed).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_todo<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = TodoId(parse_id(&id)?);
    state.service.delete(id).await;
    Ok(StatusCode::NO_CONTENT)
}
