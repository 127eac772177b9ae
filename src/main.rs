use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use todoapi::api::{self, AppState};
use todoapi::config::{Args, BackendKind};
use todoapi::domain::todo::TodoInput;
use todoapi::repo::TodoRepository;
use todoapi::repo::document::DocumentStore;
use todoapi::repo::memory::InMemoryTodoRepo;
use todoapi::usecase::todo::TodoService;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables take precedence
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();
    init_logging();
    if let Err(err) = dotenv {
        tracing::debug!(error = %err, "no .env file loaded");
    }

    let repo: Box<dyn TodoRepository> = match args.backend {
        BackendKind::Memory if args.demo => Box::new(InMemoryTodoRepo::with_seed(seed_todos())),
        BackendKind::Memory => Box::new(InMemoryTodoRepo::default()),
        BackendKind::Document => Box::new(
            DocumentStore::connect(&args.document_store())
                .context("failed to connect to document store")?,
        ),
    };
    tracing::info!(backend = ?args.backend, "repository ready");
    if args.demo && args.backend != BackendKind::Memory {
        tracing::warn!("--demo only seeds the in-memory backend; ignoring");
    }

    let state = AppState {
        service: Arc::new(TodoService::new(repo, args.op_timeout())),
        metrics_timeout: args.metrics_timeout(),
    };
    let app = api::create_router(state);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

fn seed_todos() -> Vec<TodoInput> {
    vec![
        TodoInput::new("Write documentation", "README and API examples")
            .with_kind("docs")
            .with_effort(3),
        TodoInput::new("Review open pull requests", "")
            .with_kind("review")
            .with_effort(1)
            .with_done(true),
        TodoInput::new("Draft release notes", "")
            .with_kind("docs")
            .with_effort(2),
    ]
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
