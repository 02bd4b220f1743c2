use axum::{extract::{Path, State}, http::{header, StatusCode}, response::IntoResponse, routing::get, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::{
    application::todo_service::TodoService,
    domain::file_resource::{guess_mime, is_accepted_upload, FileId, ACCEPTED_EXTENSIONS},
    http::types::{file_json, parse_id, ApiError, AppState},
    infrastructure::content::decode_data_url,
};

pub fn router<S: TodoService + Clone + Send + Sync + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/files", get(list_files::<S>).post(upload_file::<S>))
        .route("/files/:id", axum::routing::delete(delete_file::<S>))
        .route("/files/:id/content", get(file_content::<S>))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadBody {
    name: String,
    #[serde(default, rename = "type")]
    mime: Option<String>,
    content_base64: String,
}

/// One upload object, or an array of them picked together.
#[derive(Deserialize)]
#[serde(untagged)]
enum UploadRequest {
    One(UploadBody),
    Many(Vec<UploadBody>),
}

struct Decoded {
    name: String,
    mime: String,
    bytes: Vec<u8>,
}

fn decode_upload(body: UploadBody) -> Result<Decoded, ApiError> {
    if !is_accepted_upload(&body.name) {
        return Err(ApiError::bad_request(format!(
            "unsupported file type `{}`; accepted: {}",
            body.name,
            ACCEPTED_EXTENSIONS.join(", ")
        )));
    }
    let bytes = STANDARD
        .decode(body.content_base64.as_bytes())
        .map_err(|_| ApiError::bad_request(format!("contentBase64 of `{}` is not valid base64", body.name)))?;
    let mime = match body.mime {
        Some(m) if !m.trim().is_empty() => m,
        _ => guess_mime(&body.name).to_string(),
    };
    Ok(Decoded { name: body.name, mime, bytes })
}

/// Every upload in a batch is checked before any of them is added.
async fn upload_file<S: TodoService>(State(state): State<AppState<S>>, Json(payload): Json<UploadRequest>) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (bodies, batch) = match payload {
        UploadRequest::One(body) => (vec![body], false),
        UploadRequest::Many(bodies) if bodies.is_empty() => return Err(ApiError::bad_request("no files to upload")),
        UploadRequest::Many(bodies) => (bodies, true),
    };
    let decoded = bodies.into_iter().map(decode_upload).collect::<Result<Vec<_>, _>>()?;

    let mut added = Vec::with_capacity(decoded.len());
    for Decoded { name, mime, bytes } in decoded {
        let file = state.service.upload_file(name, mime, bytes).await?;
        added.push(file_json(&file));
    }
    let body = if batch { serde_json::json!({ "items": added }) } else { added.into_iter().next().unwrap_or_default() };
    Ok((StatusCode::CREATED, Json(body)))
}

async fn list_files<S: TodoService>(State(state): State<AppState<S>>) -> Json<serde_json::Value> {
    let files = state.service.list_files().await;
    Json(serde_json::json!({ "items": files.iter().map(file_json).collect::<Vec<_>>() }))
}

async fn file_content<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = FileId(parse_id(&id)?);
    let file = state.service.get_file(id).await.ok_or_else(ApiError::not_found)?;
    let (mime, bytes) = decode_data_url(&file.content_ref).map_err(ApiError::internal)?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes))
}

async fn delete_file<S: TodoService>(State(state): State<AppState<S>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = FileId(parse_id(&id)?);
    state.service.delete_file(id).await;
    Ok(StatusCode::NO_CONTENT)
}
