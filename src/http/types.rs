use axum::response::{IntoResponse, Response};
use ::http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::application::todo_service::TodoService;
use crate::domain::{error::TodoError, file_resource::FileResource, timestamp::to_iso, todo::Todo};

#[derive(Clone)]
pub struct AppState<S: TodoService> { pub service: S }

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self { Self { status: StatusCode::BAD_REQUEST, message: message.into() } }

    pub fn not_found() -> Self { Self { status: StatusCode::NOT_FOUND, message: "Not found".into() } }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: e.to_string() } }
}

impl From<TodoError> for ApiError {
    fn from(e: TodoError) -> Self {
        match e {
            TodoError::Validation(_) => Self::bad_request(e.to_string()),
            TodoError::Upload(_) | TodoError::IdsExhausted(_) => Self::internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response { (self.status, axum::Json(self)).into_response() }
}

/// File metadata without the inline content.
pub fn file_json(f: &FileResource) -> serde_json::Value {
    let kind = f.kind();
    json!({ "id": f.id, "name": f.name, "type": f.mime, "kind": kind, "icon": kind.icon(), "uploadedAt": to_iso(&f.uploaded_at) })
}

pub fn todo_json(t: &Todo) -> serde_json::Value {
    json!({
        "id": t.id,
        "title": t.title,
        "completed": t.completed,
        "createdAt": to_iso(&t.created_at),
        "updatedAt": to_iso(&t.updated_at),
        "deadline": t.deadline.as_ref().map(to_iso),
        "files": t.files.iter().map(file_json).collect::<Vec<_>>(),
    })
}

pub fn parse_id(s: &str) -> Result<u64, ApiError> { s.parse().map_err(|_| ApiError::bad_request("invalid id")) }
