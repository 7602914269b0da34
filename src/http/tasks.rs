//! `/api/tasks` handlers.

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, Uri},
};
use serde_json::Value;

use crate::http::envelope::{ApiError, Envelope};
use crate::http::request::{id_from_path, parse_json_object, query_params, read_body};
use crate::http::server::AppState;
use crate::store::{parse_bool_token, TaskFilter};

/// `GET /api/tasks[?title=..&isCompleted=..]`
pub async fn list_tasks(State(state): State<AppState>, uri: Uri) -> Envelope {
    let params = query_params(uri.query());
    let filter = TaskFilter {
        title: params.get("title").cloned(),
        is_completed: params.get("isCompleted").map(|v| parse_bool_token(v)),
    };

    let tasks = if filter.is_empty() {
        state.tasks.list_all().await
    } else {
        state.tasks.filter(&filter).await
    };
    Envelope::ok(tasks)
}

/// `GET /api/tasks/{id}`
pub async fn get_task(State(state): State<AppState>, uri: Uri) -> Result<Envelope, ApiError> {
    let id = id_from_path(uri.path()).ok_or(ApiError::NotFound)?;
    let task = state.tasks.find_by_id(id).await?;
    Ok(Envelope::ok(task))
}

/// `POST /api/tasks` with `{"title": ..}`
pub async fn create_task(
    State(state): State<AppState>,
    body: Body,
) -> Result<Envelope, ApiError> {
    let bytes = read_body(body, state.max_body_size).await?;
    let payload = parse_json_object(&bytes)?;
    let title = match payload.get("title") {
        Some(Value::String(title)) => title.clone(),
        Some(_) => return Err(ApiError::BadRequest("Field 'title' must be a string".to_string())),
        None => return Err(ApiError::BadRequest("Field 'title' is required".to_string())),
    };

    let task = state.tasks.create(title).await?;
    Ok(Envelope::new(StatusCode::CREATED)
        .with_message("Task created successfully")
        .with_data(task))
}

/// `PUT /api/tasks/{id}` with any subset of the task fields.
pub async fn update_task(
    State(state): State<AppState>,
    uri: Uri,
    body: Body,
) -> Result<Envelope, ApiError> {
    let bytes = read_body(body, state.max_body_size).await?;
    let patch = parse_json_object(&bytes)?;
    let id = id_from_path(uri.path()).ok_or(ApiError::NotFound)?;

    let task = state.tasks.update(id, &patch).await?;
    Ok(Envelope::ok(task).with_message("Task updated successfully"))
}

/// `DELETE /api/tasks/{id}`
pub async fn delete_task(State(state): State<AppState>, uri: Uri) -> Result<Envelope, ApiError> {
    let id = id_from_path(uri.path()).ok_or(ApiError::NotFound)?;
    state.tasks.delete(id).await?;
    Ok(Envelope::new(StatusCode::OK).with_message("Task deleted successfully"))
}

/// Anything the route table does not cover.
pub async fn not_found() -> Envelope {
    Envelope::not_found()
}
