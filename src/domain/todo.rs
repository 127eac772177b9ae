use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub content: String,
    pub done: bool,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(rename = "effortHr")]
    pub effort_hr: i64,
}

/// Client-supplied fields of a todo. Missing fields take their zero value and
/// anything else in the body, `id` included, is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoInput {
    pub title: String,
    pub content: String,
    pub done: bool,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(rename = "effortHr")]
    pub effort_hr: i64,
}

impl TodoInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_effort(mut self, hours: i64) -> Self {
        self.effort_hr = hours;
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    pub fn with_created(mut self, created: OffsetDateTime) -> Self {
        self.created = Some(created);
        self
    }

    /// Materialize a stored todo under a backend-assigned id.
    pub fn into_todo(self, id: String) -> Todo {
        Todo {
            id,
            title: self.title,
            content: self.content,
            done: self.done,
            kind: self.kind,
            created: self.created.unwrap_or_else(OffsetDateTime::now_utc),
            effort_hr: self.effort_hr,
        }
    }
}

impl Todo {
    /// True when title, content and done already match `input`.
    pub fn same_status(&self, input: &TodoInput) -> bool {
        self.title == input.title && self.content == input.content && self.done == input.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn input_ignores_client_id_and_fills_defaults() {
        let input: TodoInput =
            serde_json::from_str(r#"{"id":"abc","title":"write","effortHr":3}"#).unwrap();
        assert_eq!(input.title, "write");
        assert_eq!(input.effort_hr, 3);
        assert!(input.content.is_empty());
        assert!(!input.done);
        assert!(input.created.is_none());
    }

    #[test]
    fn todo_serializes_wire_names() {
        let todo = TodoInput::new("t", "c")
            .with_kind("work")
            .with_effort(2)
            .with_created(datetime!(2024-03-01 12:00 UTC))
            .into_todo("id-1".to_string());
        let value = serde_json::to_value(&todo).unwrap();
        assert_eq!(value["type"], "work");
        assert_eq!(value["effortHr"], 2);
        assert_eq!(value["created"], "2024-03-01T12:00:00Z");

        let back: Todo = serde_json::from_value(value).unwrap();
        assert_eq!(back, todo);
    }
}
