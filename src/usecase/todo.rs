use std::time::Duration;

use crate::domain::metrics::TypeMetrics;
use crate::domain::todo::{Todo, TodoInput};
use crate::repo::{Deadline, RepoError, TodoRepository};

/// Delegates to the selected backend, giving each call its own deadline.
pub struct TodoService {
    repo: Box<dyn TodoRepository>,
    op_timeout: Duration,
}

impl TodoService {
    pub fn new(repo: Box<dyn TodoRepository>, op_timeout: Duration) -> Self {
        Self { repo, op_timeout }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.op_timeout)
    }

    pub fn get_all_todos(&self) -> Result<Vec<Todo>, RepoError> {
        self.repo.get_all(&self.deadline())
    }

    pub fn get_todo_by_id(&self, id: &str) -> Result<Todo, RepoError> {
        self.repo.get_by_id(id, &self.deadline())
    }

    pub fn create_todo(&self, input: TodoInput) -> Result<Todo, RepoError> {
        self.repo.create(input, &self.deadline())
    }

    pub fn update_todo(&self, id: &str, input: TodoInput) -> Result<Todo, RepoError> {
        self.repo.update(id, input, &self.deadline())
    }

    pub fn delete_todo(&self, id: &str) -> Result<(), RepoError> {
        self.repo.delete(id, &self.deadline())
    }

    pub fn get_todo_metrics(&self, deadline: &Deadline) -> Result<Vec<TypeMetrics>, RepoError> {
        self.repo.metrics(deadline)
    }
}
