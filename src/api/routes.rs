use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::usecase::todo::TodoService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TodoService>,
    pub metrics_timeout: Duration,
}

async fn health_check() -> &'static str {
    "ok"
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route(
            "/todos/{id}",
            get(handlers::get_todo)
                .put(handlers::update_todo)
                .delete(handlers::delete_todo),
        )
        .route("/metrics", get(handlers::todo_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
