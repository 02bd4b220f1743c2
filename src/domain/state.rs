use chrono::{DateTime, Utc};

use super::error::TodoResult;
use super::file_resource::{FileId, FileResource, FileResourceStore, NewFileResource};
use super::todo::{CreateTodo, Todo, TodoId, TodoStore};

/// Both stores and their counters. Every change that touches both goes through
/// a single `&mut self` method so the pair is never seen half-updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoState {
    todos: TodoStore,
    files: FileResourceStore,
}

impl TodoState {
    pub fn new(todos: TodoStore, files: FileResourceStore) -> Self { Self { todos, files } }

    pub fn todos(&self) -> &TodoStore { &self.todos }

    pub fn files(&self) -> &FileResourceStore { &self.files }

    /// Attaches copies of the requested files, in pool order. Ids not in the pool are skipped.
    pub fn add_todo(&mut self, input: CreateTodo, now: DateTime<Utc>) -> TodoResult<Todo> {
        let attachments: Vec<FileResource> = self
            .files
            .list()
            .iter()
            .filter(|f| input.file_ids.contains(&f.id))
            .cloned()
            .collect();
        self.todos.add(&input.title, input.deadline, attachments, now)
    }

    pub fn toggle_todo(&mut self, id: TodoId, completed: bool, now: DateTime<Utc>) -> Option<Todo> {
        self.todos.toggle(id, completed, now).cloned()
    }

    pub fn delete_todo(&mut self, id: TodoId) -> Option<Todo> { self.todos.remove(id) }

    pub fn add_file(&mut self, input: NewFileResource, now: DateTime<Utc>) -> TodoResult<FileResource> {
        self.files.add(input, now)
    }

    /// Removes the file from the pool and strips it from every todo.
    pub fn delete_file(&mut self, id: FileId) -> CascadeOutcome {
        let removed = self.files.remove(id);
        let detached_from = self.todos.remove_file_reference(id);
        CascadeOutcome { removed, detached_from }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub removed: Option<FileResource>,
    /// Number of todos that lost the attachment.
    pub detached_from: usize,
}
