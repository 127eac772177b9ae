use std::time::Duration;

use thiserror::Error;

use crate::domain::metrics::{TotalsOverflow, TypeMetrics};
use crate::domain::todo::{Todo, TodoInput};

pub mod deadline;
pub mod document;
pub mod memory;

pub use deadline::Deadline;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("todo not found: {0}")]
    NotFound(String),
    #[error("invalid ID format: {0}")]
    InvalidId(String),
    #[error("todo found but nothing was updated: {0}")]
    NoChange(String),
    #[error("backend call exceeded its {0:?} budget")]
    Timeout(Duration),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("document store query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Overflow(#[from] TotalsOverflow),
    #[error("metrics aggregation failed: {0}")]
    Aggregation(#[source] Box<RepoError>),
}

impl RepoError {
    /// Connection, query and timeout failures, as opposed to request errors.
    pub fn is_backend_failure(&self) -> bool {
        match self {
            RepoError::Timeout(_)
            | RepoError::Unavailable(_)
            | RepoError::Query(_)
            | RepoError::Decode(_)
            | RepoError::Overflow(_) => true,
            RepoError::Aggregation(inner) => inner.is_backend_failure(),
            RepoError::NotFound(_) | RepoError::InvalidId(_) | RepoError::NoChange(_) => false,
        }
    }

    /// Wrap a failure raised while computing metrics. Timeouts stay distinct.
    pub fn into_aggregation(self) -> RepoError {
        match self {
            RepoError::Timeout(_) | RepoError::Aggregation(_) => self,
            other => RepoError::Aggregation(Box::new(other)),
        }
    }
}

pub trait TodoRepository: Send + Sync {
    fn get_all(&self, deadline: &Deadline) -> Result<Vec<Todo>, RepoError>;
    fn get_by_id(&self, id: &str, deadline: &Deadline) -> Result<Todo, RepoError>;
    fn create(&self, input: TodoInput, deadline: &Deadline) -> Result<Todo, RepoError>;
    fn update(&self, id: &str, input: TodoInput, deadline: &Deadline) -> Result<Todo, RepoError>;
    fn delete(&self, id: &str, deadline: &Deadline) -> Result<(), RepoError>;
    fn metrics(&self, deadline: &Deadline) -> Result<Vec<TypeMetrics>, RepoError>;
}
