pub mod object_id;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use super::{Deadline, RepoError, TodoRepository};
use crate::domain::metrics::TypeMetrics;
use crate::domain::todo::{Todo, TodoInput};
pub use object_id::ObjectId;

/// SQLite VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1_000;

#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    /// `memory:`, `:memory:`, `sqlite://<dir>` or a bare directory.
    /// `None` means the OS data dir.
    pub uri: Option<String>,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl DocumentStoreConfig {
    pub fn location(&self) -> Result<StoreLocation> {
        if !is_valid_name(&self.database) {
            bail!("invalid database name {:?}", self.database);
        }
        let dir = match self.uri.as_deref().map(str::trim) {
            Some("memory:" | ":memory:") => return Ok(StoreLocation::Memory),
            Some(uri) if !uri.is_empty() => {
                PathBuf::from(uri.strip_prefix("sqlite://").unwrap_or(uri))
            }
            _ => default_store_dir()?,
        };
        Ok(StoreLocation::File(
            dir.join(format!("{}.sqlite", self.database)),
        ))
    }
}

/// Todos kept as JSON documents, one table per collection.
pub struct DocumentStore {
    conn: Mutex<Connection>,
    collection: String,
}

impl DocumentStore {
    pub fn connect(config: &DocumentStoreConfig) -> Result<Self> {
        match config.location()? {
            StoreLocation::Memory => Self::open_in_memory(&config.collection),
            StoreLocation::File(path) => Self::open(path, &config.collection),
        }
    }

    pub fn open(path: impl AsRef<Path>, collection: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("failed to enable WAL")?;
        Self::from_connection(conn, collection)
    }

    pub fn open_in_memory(collection: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::from_connection(conn, collection)
    }

    fn from_connection(conn: Connection, collection: &str) -> Result<Self> {
        if !is_valid_name(collection) {
            return Err(anyhow!("invalid collection name {collection:?}"));
        }
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .context("document store did not answer ping")?;
        init_collection(&conn, collection)?;
        tracing::info!(collection, "connected to document store");
        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
        })
    }

    /// Runs `op` with the connection, interrupting it once `deadline` passes.
    fn run<T>(
        &self,
        deadline: &Deadline,
        op: impl FnOnce(&Connection, &str) -> Result<T, RepoError>,
    ) -> Result<T, RepoError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RepoError::Unavailable("document store lock poisoned".to_string()))?;
        deadline.check()?;

        let expires_at = deadline.expires_at();
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= expires_at));
        let result = op(&*conn, &self.collection);
        conn.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);

        result.map_err(|err| match err {
            RepoError::Query(ref e)
                if e.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) =>
            {
                deadline.expired()
            }
            other => other,
        })
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn init_collection(conn: &Connection, collection: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
CREATE TABLE IF NOT EXISTS "{collection}" (
  _id TEXT PRIMARY KEY,
  doc TEXT NOT NULL
);
"#
    ))
    .with_context(|| format!("failed to initialize collection {collection}"))?;
    Ok(())
}

fn parse_id(id: &str) -> Result<ObjectId, RepoError> {
    id.parse::<ObjectId>()
        .map_err(|_| RepoError::InvalidId(id.to_string()))
}

fn fetch_doc(conn: &Connection, collection: &str, id: &ObjectId) -> Result<Option<Todo>, RepoError> {
    let raw: Option<String> = conn
        .query_row(
            &format!(r#"SELECT doc FROM "{collection}" WHERE _id = ?1"#),
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|doc| serde_json::from_str(&doc).map_err(RepoError::from))
        .transpose()
}

impl TodoRepository for DocumentStore {
    fn get_all(&self, deadline: &Deadline) -> Result<Vec<Todo>, RepoError> {
        self.run(deadline, |conn, collection| {
            let mut stmt = conn.prepare(&format!(r#"SELECT doc FROM "{collection}""#))?;
            let docs = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            docs.iter()
                .map(|doc| serde_json::from_str(doc).map_err(RepoError::from))
                .collect()
        })
    }

    fn get_by_id(&self, id: &str, deadline: &Deadline) -> Result<Todo, RepoError> {
        let key = parse_id(id)?;
        self.run(deadline, |conn, collection| {
            fetch_doc(conn, collection, &key)?.ok_or_else(|| RepoError::NotFound(id.to_string()))
        })
    }

    fn create(&self, input: TodoInput, deadline: &Deadline) -> Result<Todo, RepoError> {
        let todo = input.into_todo(ObjectId::new().to_string());
        let doc = serde_json::to_string(&todo)?;
        self.run(deadline, |conn, collection| {
            conn.execute(
                &format!(r#"INSERT INTO "{collection}" (_id, doc) VALUES (?1, ?2)"#),
                params![todo.id, doc],
            )?;
            Ok(())
        })?;
        tracing::debug!(id = %todo.id, "inserted todo document");
        Ok(todo)
    }

    /// Sets title, content and done only. Identical values fail with `NoChange`.
    fn update(&self, id: &str, input: TodoInput, deadline: &Deadline) -> Result<Todo, RepoError> {
        let key = parse_id(id)?;
        self.run(deadline, |conn, collection| {
            let Some(mut todo) = fetch_doc(conn, collection, &key)? else {
                return Err(RepoError::NotFound(id.to_string()));
            };
            if todo.same_status(&input) {
                return Err(RepoError::NoChange(id.to_string()));
            }
            todo.title = input.title;
            todo.content = input.content;
            todo.done = input.done;

            let changed = conn.execute(
                &format!(r#"UPDATE "{collection}" SET doc = ?1 WHERE _id = ?2"#),
                params![serde_json::to_string(&todo)?, key.to_string()],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(id.to_string()));
            }
            Ok(todo)
        })
    }

    fn delete(&self, id: &str, deadline: &Deadline) -> Result<(), RepoError> {
        let key = parse_id(id)?;
        let removed = self.run(deadline, |conn, collection| {
            Ok(conn.execute(
                &format!(r#"DELETE FROM "{collection}" WHERE _id = ?1"#),
                params![key.to_string()],
            )?)
        })?;
        if removed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Single grouped conditional-sum pass over the collection.
    fn metrics(&self, deadline: &Deadline) -> Result<Vec<TypeMetrics>, RepoError> {
        self.run(deadline, |conn, collection| {
            let mut stmt = conn.prepare(&format!(
                r#"
SELECT
  json_extract(doc, '$.type') AS kind,
  SUM(CASE WHEN json_extract(doc, '$.done') THEN 1 ELSE 0 END) AS completed_tasks,
  SUM(CASE WHEN json_extract(doc, '$.done') THEN 0 ELSE 1 END) AS not_completed_tasks,
  COALESCE(SUM(json_extract(doc, '$.effortHr')), 0) AS total_effort
FROM "{collection}"
GROUP BY kind
ORDER BY kind
"#
            ))?;
            let rows = stmt
                .query_map([], |row| {
                    let kind: Option<String> = row.get("kind")?;
                    let completed: i64 = row.get("completed_tasks")?;
                    let not_completed: i64 = row.get("not_completed_tasks")?;
                    let effort: i64 = row.get("total_effort")?;
                    Ok(TypeMetrics::new(
                        kind.unwrap_or_default(),
                        completed as u64,
                        not_completed as u64,
                        effort,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .map_err(RepoError::into_aggregation)
    }
}

fn default_store_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("failed to resolve data dir")?;
    Ok(base.join("todoapi"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::metrics::aggregate;
    use crate::domain::metrics::tests::sample_inputs;
    use crate::repo::memory::InMemoryTodoRepo;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    fn store() -> DocumentStore {
        DocumentStore::open_in_memory("todos").unwrap()
    }

    #[test]
    fn document_store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("todo_app.sqlite");
        let created = {
            let repo = DocumentStore::open(&path, "todos").unwrap();
            repo.create(
                TodoInput::new("hello", "world")
                    .with_kind("work")
                    .with_effort(3),
                &deadline(),
            )
            .unwrap()
        };
        assert!(created.id.parse::<ObjectId>().is_ok());

        let reopened = DocumentStore::open(&path, "todos").unwrap();
        assert_eq!(reopened.get_by_id(&created.id, &deadline()).unwrap(), created);
        assert_eq!(reopened.get_all(&deadline()).unwrap(), vec![created]);
    }

    #[test]
    fn update_sets_status_fields_only() {
        let repo = store();
        let created = repo
            .create(
                TodoInput::new("draft", "v1")
                    .with_kind("docs")
                    .with_effort(8)
                    .with_created(datetime!(2024-02-10 8:00 UTC)),
                &deadline(),
            )
            .unwrap();

        let patch = TodoInput::new("final", "v2")
            .with_done(true)
            .with_kind("ignored")
            .with_effort(1);
        let stored = repo.update(&created.id, patch, &deadline()).unwrap();

        let fetched = repo.get_by_id(&created.id, &deadline()).unwrap();
        assert_eq!(stored, fetched);
        assert_eq!(fetched.title, "final");
        assert_eq!(fetched.content, "v2");
        assert!(fetched.done);
        assert_eq!(fetched.kind, "docs");
        assert_eq!(fetched.effort_hr, 8);
        assert_eq!(fetched.created, created.created);
    }

    #[test]
    fn identical_update_is_no_change() {
        let repo = store();
        let created = repo.create(TodoInput::new("same", "body"), &deadline()).unwrap();
        let result = repo.update(&created.id, TodoInput::new("same", "body"), &deadline());
        assert!(matches!(result, Err(RepoError::NoChange(_))));
    }

    #[test]
    fn missing_and_malformed_ids() {
        let repo = store();
        let unknown = ObjectId::new().to_string();
        assert!(matches!(
            repo.get_by_id(&unknown, &deadline()),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            repo.update(&unknown, TodoInput::new("x", ""), &deadline()),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(&unknown, &deadline()),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_by_id("123", &deadline()),
            Err(RepoError::InvalidId(_))
        ));
        assert!(matches!(
            repo.delete("not-hex-not-hex-not-hex!", &deadline()),
            Err(RepoError::InvalidId(_))
        ));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let repo = store();
        let created = repo.create(TodoInput::new("gone", ""), &deadline()).unwrap();
        repo.delete(&created.id, &deadline()).unwrap();
        assert!(matches!(
            repo.get_by_id(&created.id, &deadline()),
            Err(RepoError::NotFound(_))
        ));
    }

    #[test]
    fn metrics_match_in_process_pipeline() {
        let repo = store();
        let mut created = Vec::new();
        for input in sample_inputs() {
            created.push(repo.create(input, &deadline()).unwrap());
        }

        let from_store = repo.metrics(&deadline()).unwrap();
        assert_eq!(from_store, aggregate(&created).unwrap());

        let memory = InMemoryTodoRepo::with_seed(sample_inputs());
        assert_eq!(from_store, memory.metrics(&deadline()).unwrap());

        assert_eq!(from_store[0].kind, "A");
        assert_eq!(from_store[0].total_tasks, 2);
        assert_eq!(from_store[0].completed_tasks, 1);
        assert_eq!(from_store[0].not_completed_tasks, 1);
        assert_eq!(from_store[0].total_effort, 5);
        assert_eq!(from_store[0].completion_percentage, 50.0);
        assert_eq!(from_store[1].completion_percentage, 100.0);
    }

    #[test]
    fn metrics_over_empty_collection() {
        assert!(store().metrics(&deadline()).unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_times_out() {
        let repo = store();
        let expired = Deadline::after(Duration::ZERO);
        assert!(matches!(repo.get_all(&expired), Err(RepoError::Timeout(_))));
        assert!(matches!(repo.metrics(&expired), Err(RepoError::Timeout(_))));
    }

    #[test]
    fn running_statement_is_interrupted_at_deadline() {
        let repo = store();
        let started = Instant::now();
        let result = repo.run(&Deadline::after(Duration::from_millis(50)), |conn, _| {
            Ok(conn.query_row(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 100000000) \
                 SELECT count(*) FROM n",
                [],
                |row| row.get::<_, i64>(0),
            )?)
        });
        assert!(matches!(result, Err(RepoError::Timeout(d)) if d == Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(5));

        // the handler is cleared once the call returns
        assert!(repo.get_all(&deadline()).unwrap().is_empty());
    }

    #[test]
    fn effort_overflow_is_an_aggregation_error() {
        let repo = store();
        for effort in [i64::MAX, 1] {
            repo.create(TodoInput::new("big", "").with_kind("A").with_effort(effort), &deadline())
                .unwrap();
        }
        assert!(matches!(repo.metrics(&deadline()), Err(RepoError::Aggregation(_))));
        assert_eq!(repo.get_all(&deadline()).unwrap().len(), 2);
    }

    #[test]
    fn rejects_unsafe_collection_names() {
        assert!(DocumentStore::open_in_memory("todos; DROP TABLE x").is_err());
        assert!(DocumentStore::open_in_memory("1todos").is_err());
        assert!(DocumentStore::open_in_memory("todo_items").is_ok());
    }

    #[test]
    fn resolves_store_locations() {
        let mut config = DocumentStoreConfig {
            uri: Some(":memory:".to_string()),
            database: "todo_app".to_string(),
            collection: "todos".to_string(),
        };
        assert_eq!(config.location().unwrap(), StoreLocation::Memory);

        config.uri = Some("sqlite:///var/lib/todo".to_string());
        assert_eq!(
            config.location().unwrap(),
            StoreLocation::File(PathBuf::from("/var/lib/todo/todo_app.sqlite"))
        );

        config.database = "../escape".to_string();
        assert!(config.location().is_err());
    }
}
