use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::domain::todo::TodoInput;
use crate::repo::{Deadline, RepoError};
use crate::usecase::todo::TodoService;

use super::models::ApiError;
use super::routes::AppState;

/// Repository calls are synchronous; keep them off the async workers.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&TodoService) -> Result<T, RepoError> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || f(service.as_ref()))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

fn parse_body(body: Result<Json<TodoInput>, JsonRejection>) -> Result<TodoInput, ApiError> {
    match body {
        Ok(Json(input)) => Ok(input),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected request body");
            Err(ApiError::bad_request("invalid request"))
        }
    }
}

pub async fn list_todos(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let todos = blocking(&state, |svc| svc.get_all_todos()).await?;
    Ok(Json(todos))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let todo = blocking(&state, move |svc| svc.get_todo_by_id(&id)).await?;
    Ok(Json(todo))
}

pub async fn create_todo(
    State(state): State<AppState>,
    body: Result<Json<TodoInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = parse_body(body)?;
    let todo = blocking(&state, move |svc| svc.create_todo(input)).await?;
    tracing::info!(id = %todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TodoInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = parse_body(body)?;
    let todo = blocking(&state, move |svc| svc.update_todo(&id, input)).await?;
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |svc| svc.delete_todo(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn todo_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let deadline = Deadline::after(state.metrics_timeout);
    let metrics = blocking(&state, move |svc| svc.get_todo_metrics(&deadline)).await?;
    Ok(Json(metrics))
}
