use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::error::{TodoError, TodoResult};
use crate::domain::file_resource::{FileId, FileResource, NewFileResource};
use crate::domain::repository::KeyValueStore;
use crate::domain::state::TodoState;
use crate::domain::todo::{CreateTodo, Todo, TodoId};
use crate::infrastructure::content::encode_data_url;
use crate::infrastructure::persistence::PersistenceAdapter;

#[async_trait]
pub trait TodoService: Send + Sync + 'static {
    async fn create(&self, input: CreateTodo) -> TodoResult<Todo>;
    async fn get(&self, id: TodoId) -> Option<Todo>;
    /// Storage order, newest first.
    async fn list(&self) -> Vec<Todo>;
    /// Deadline order used for display.
    async fn list_sorted(&self) -> Vec<Todo>;
    /// `None` when the id is unknown; nothing is changed in that case.
    async fn toggle(&self, id: TodoId, completed: bool) -> Option<Todo>;
    async fn delete(&self, id: TodoId) -> bool;

    async fn add_file(&self, input: NewFileResource) -> TodoResult<FileResource>;
    /// Encodes the raw bytes into a content reference, then adds the file.
    async fn upload_file(&self, name: String, mime: String, bytes: Vec<u8>) -> TodoResult<FileResource>;
    async fn get_file(&self, id: FileId) -> Option<FileResource>;
    async fn list_files(&self) -> Vec<FileResource>;
    /// Removes the file and detaches it from every todo.
    async fn delete_file(&self, id: FileId) -> bool;
}

#[derive(Clone)]
pub struct TodoServiceImpl<K: KeyValueStore> {
    state: Arc<Mutex<TodoState>>,
    persistence: PersistenceAdapter<K>,
    clock: Arc<dyn Clock>,
}

impl<K: KeyValueStore> TodoServiceImpl<K> {
    pub fn new(state: TodoState, store: K, clock: Arc<dyn Clock>) -> Self {
        Self { state: Arc::new(Mutex::new(state)), persistence: PersistenceAdapter::new(store), clock }
    }

    /// Restores the last saved snapshot from `store` and runs on the system clock.
    pub async fn load(store: K) -> Self { Self::load_with_clock(store, Arc::new(SystemClock::new())).await }

    pub async fn load_with_clock(store: K, clock: Arc<dyn Clock>) -> Self {
        let persistence = PersistenceAdapter::new(store);
        let state = persistence.load().await;
        Self { state: Arc::new(Mutex::new(state)), persistence, clock }
    }

    pub fn store(&self) -> &K { self.persistence.store() }

    /// Applies `apply` and flushes the resulting snapshot before releasing the lock.
    async fn mutate<T: Send>(&self, apply: impl FnOnce(&mut TodoState, &dyn Clock) -> T + Send) -> T {
        let mut state = self.state.lock().await;
        let out = apply(&mut *state, self.clock.as_ref());
        self.persistence.save(&state).await;
        out
    }
}

#[async_trait]
impl<K: KeyValueStore> TodoService for TodoServiceImpl<K> {
    async fn create(&self, input: CreateTodo) -> TodoResult<Todo> {
        let mut state = self.state.lock().await;
        let todo = state.add_todo(input, self.clock.now())?;
        self.persistence.save(&state).await;
        tracing::info!(id = todo.id.0, files = todo.files.len(), "todo created");
        Ok(todo)
    }

    async fn get(&self, id: TodoId) -> Option<Todo> { self.state.lock().await.todos().get(id).cloned() }

    async fn list(&self) -> Vec<Todo> { self.state.lock().await.todos().list().to_vec() }

    async fn list_sorted(&self) -> Vec<Todo> {
        self.state.lock().await.todos().display_order().into_iter().cloned().collect()
    }

    async fn toggle(&self, id: TodoId, completed: bool) -> Option<Todo> {
        let toggled = self.mutate(|state, clock| state.toggle_todo(id, completed, clock.now())).await;
        if toggled.is_none() {
            tracing::debug!(id = id.0, "toggle of unknown todo ignored");
        }
        toggled
    }

    async fn delete(&self, id: TodoId) -> bool {
        let removed = self.mutate(|state, _| state.delete_todo(id)).await;
        tracing::info!(id = id.0, removed = removed.is_some(), "todo delete");
        removed.is_some()
    }

    async fn add_file(&self, input: NewFileResource) -> TodoResult<FileResource> {
        let mut state = self.state.lock().await;
        let file = state.add_file(input, self.clock.now())?;
        self.persistence.save(&state).await;
        tracing::info!(id = file.id.0, name = %file.name, mime = %file.mime, "file added");
        Ok(file)
    }

    async fn upload_file(&self, name: String, mime: String, bytes: Vec<u8>) -> TodoResult<FileResource> {
        let encode_mime = mime.clone();
        let content_ref = tokio::task::spawn_blocking(move || encode_data_url(&encode_mime, &bytes))
            .await
            .map_err(|e| TodoError::Upload(e.to_string()))?;
        self.add_file(NewFileResource { name, mime, content_ref }).await
    }

    async fn get_file(&self, id: FileId) -> Option<FileResource> { self.state.lock().await.files().get(id).cloned() }

    async fn list_files(&self) -> Vec<FileResource> { self.state.lock().await.files().list().to_vec() }

    async fn delete_file(&self, id: FileId) -> bool {
        let outcome = self.mutate(|state, _| state.delete_file(id)).await;
        tracing::info!(id = id.0, removed = outcome.removed.is_some(), detached_from = outcome.detached_from, "file delete");
        outcome.removed.is_some()
    }
}
