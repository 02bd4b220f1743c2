use std::cmp::Ordering;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{TodoError, TodoResult};
use super::file_resource::{FileId, FileResource};
use super::timestamp::{parse_iso, truncate_millis};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TodoId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub completed: bool,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "super::timestamp::option")]
    pub deadline: Option<DateTime<Utc>>,
    /// Copies of the attached files as they were when the todo was created.
    #[serde(default)]
    pub files: Vec<FileResource>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTodo {
    pub title: String,
    pub deadline: Option<DateTime<Utc>>,
    pub file_ids: Vec<FileId>,
}

/// Todo records in insertion order, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoStore {
    todos: Vec<Todo>,
    next_id: u64,
}

impl Default for TodoStore {
    fn default() -> Self { Self { todos: Vec::new(), next_id: 1 } }
}

impl TodoStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_parts(todos: Vec<Todo>, next_id: u64) -> Self {
        let floor = todos.iter().map(|t| t.id.0.saturating_add(1)).max().unwrap_or(1);
        Self { todos, next_id: next_id.max(floor) }
    }

    pub fn add(
        &mut self,
        title: &str,
        deadline: Option<DateTime<Utc>>,
        files: Vec<FileResource>,
        now: DateTime<Utc>,
    ) -> TodoResult<Todo> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TodoError::validation("title must not be empty"));
        }
        let after = self.next_id.checked_add(1).ok_or(TodoError::IdsExhausted("todo"))?;
        let todo = Todo {
            id: TodoId(self.next_id),
            title: title.to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
            deadline,
            files,
        };
        self.next_id = after;
        self.todos.insert(0, todo.clone());
        Ok(todo)
    }

    /// Returns `None` when no todo has this id.
    pub fn toggle(&mut self, id: TodoId, completed: bool, now: DateTime<Utc>) -> Option<&Todo> {
        let todo = self.todos.iter_mut().find(|t| t.id == id)?;
        todo.completed = completed;
        todo.updated_at = now.max(todo.created_at);
        Some(todo)
    }

    pub fn remove(&mut self, id: TodoId) -> Option<Todo> {
        let pos = self.todos.iter().position(|t| t.id == id)?;
        Some(self.todos.remove(pos))
    }

    /// Strips `file_id` from every todo's attachments and returns how many todos lost one.
    pub fn remove_file_reference(&mut self, file_id: FileId) -> usize {
        let mut touched = 0;
        for todo in &mut self.todos {
            let before = todo.files.len();
            todo.files.retain(|f| f.id != file_id);
            if todo.files.len() != before {
                touched += 1;
            }
        }
        touched
    }

    pub fn get(&self, id: TodoId) -> Option<&Todo> { self.todos.iter().find(|t| t.id == id) }

    pub fn list(&self) -> &[Todo] { &self.todos }

    pub fn display_order(&self) -> Vec<&Todo> { display_order(&self.todos) }

    pub fn next_id(&self) -> u64 { self.next_id }

    pub fn len(&self) -> usize { self.todos.len() }

    pub fn is_empty(&self) -> bool { self.todos.is_empty() }
}

/// Todos with a deadline first, soonest first; the rest keep their storage order.
pub fn display_order(todos: &[Todo]) -> Vec<&Todo> {
    let mut sorted: Vec<&Todo> = todos.iter().collect();
    sorted.sort_by(|a, b| by_deadline(a, b));
    sorted
}

fn by_deadline(a: &Todo, b: &Todo) -> Ordering {
    match (a.deadline, b.deadline) {
        (Some(da), Some(db)) => da.cmp(&db),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

const LOCAL_DEADLINE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses deadline text as typed into a form. Empty means no deadline; RFC 3339
/// is taken as-is; a bare `YYYY-MM-DDTHH:MM` is read in the local time zone.
pub fn parse_deadline(input: &str) -> TodoResult<Option<DateTime<Utc>>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = parse_iso(input) {
        return Ok(Some(truncate_millis(ts)));
    }
    for fmt in LOCAL_DEADLINE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| Some(truncate_millis(local.with_timezone(&Utc))))
                .ok_or_else(|| TodoError::validation(format!("deadline `{input}` does not exist in the local time zone")));
        }
    }
    Err(TodoError::validation(format!("unrecognised deadline `{input}`")))
}
