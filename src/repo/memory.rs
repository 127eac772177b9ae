use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{Deadline, RepoError, TodoRepository};
use crate::domain::metrics::{TypeMetrics, aggregate};
use crate::domain::todo::{Todo, TodoInput};

/// Every operation holds the single lock for its whole duration.
#[derive(Default)]
pub struct InMemoryTodoRepo {
    items: Mutex<HashMap<Uuid, Todo>>,
}

impl InMemoryTodoRepo {
    pub fn with_seed(seed: impl IntoIterator<Item = TodoInput>) -> Self {
        let mut items = HashMap::new();
        for input in seed {
            let id = fresh_id(&items);
            items.insert(id, input.into_todo(id.to_string()));
        }
        Self {
            items: Mutex::new(items),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Todo>>, RepoError> {
        self.items
            .lock()
            .map_err(|_| RepoError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn parse_id(id: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(id).map_err(|_| RepoError::InvalidId(id.to_string()))
}

fn fresh_id(items: &HashMap<Uuid, Todo>) -> Uuid {
    loop {
        let id = Uuid::new_v4();
        if !items.contains_key(&id) {
            return id;
        }
    }
}

impl TodoRepository for InMemoryTodoRepo {
    fn get_all(&self, _deadline: &Deadline) -> Result<Vec<Todo>, RepoError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn get_by_id(&self, id: &str, _deadline: &Deadline) -> Result<Todo, RepoError> {
        let key = parse_id(id)?;
        self.lock()?
            .get(&key)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    fn create(&self, input: TodoInput, _deadline: &Deadline) -> Result<Todo, RepoError> {
        let mut items = self.lock()?;
        let id = fresh_id(&items);
        let todo = input.into_todo(id.to_string());
        items.insert(id, todo.clone());
        tracing::debug!(id = %todo.id, "created todo in memory");
        Ok(todo)
    }

    /// Replaces every client-writable field; only `id` and `created` survive.
    fn update(&self, id: &str, input: TodoInput, _deadline: &Deadline) -> Result<Todo, RepoError> {
        let key = parse_id(id)?;
        let mut items = self.lock()?;
        let Some(existing) = items.get_mut(&key) else {
            return Err(RepoError::NotFound(id.to_string()));
        };
        let created = existing.created;
        *existing = input.into_todo(existing.id.clone());
        existing.created = created;
        Ok(existing.clone())
    }

    fn delete(&self, id: &str, _deadline: &Deadline) -> Result<(), RepoError> {
        let key = parse_id(id)?;
        match self.lock()?.remove(&key) {
            Some(_) => Ok(()),
            None => Err(RepoError::NotFound(id.to_string())),
        }
    }

    fn metrics(&self, _deadline: &Deadline) -> Result<Vec<TypeMetrics>, RepoError> {
        let todos: Vec<Todo> = {
            let items = self.lock().map_err(RepoError::into_aggregation)?;
            items.values().cloned().collect()
        };
        aggregate(&todos).map_err(|err| RepoError::from(err).into_aggregation())
    }
}
