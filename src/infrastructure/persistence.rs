use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{
    file_resource::{FileResource, FileResourceStore},
    repository::KeyValueStore,
    state::TodoState,
    todo::{Todo, TodoStore},
};

pub const TODOS_KEY: &str = "todos";
pub const FILE_RESOURCES_KEY: &str = "fileResources";
pub const NEXT_ID_KEY: &str = "nextId";
pub const NEXT_FILE_ID_KEY: &str = "nextFileId";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("entry is absent")]
    Missing,
    #[error("medium read failed: {0}")]
    Read(anyhow::Error),
    #[error("malformed records: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("malformed counter `{0}`")]
    BadCounter(String),
    #[error("record id {0} is out of range")]
    IdOutOfRange(u64),
}

/// `u64::MAX` is reserved as the exhausted-counter marker and never names a record.
const MAX_ID: u64 = u64::MAX - 1;

fn parse_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, LoadError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn parse_todos(raw: &str) -> Result<Vec<Todo>, LoadError> {
    let todos: Vec<Todo> = parse_records(raw)?;
    let ids = todos.iter().flat_map(|t| std::iter::once(t.id.0).chain(t.files.iter().map(|f| f.id.0)));
    check_ids(ids)?;
    Ok(todos)
}

pub fn parse_files(raw: &str) -> Result<Vec<FileResource>, LoadError> {
    let files: Vec<FileResource> = parse_records(raw)?;
    check_ids(files.iter().map(|f| f.id.0))?;
    Ok(files)
}

fn check_ids(mut ids: impl Iterator<Item = u64>) -> Result<(), LoadError> {
    match ids.find(|&id| id > MAX_ID) {
        Some(id) => Err(LoadError::IdOutOfRange(id)),
        None => Ok(()),
    }
}

/// A plain run of ASCII digits, at least 1 and at most `u64::MAX - 1`.
pub fn parse_counter(raw: &str) -> Result<u64, LoadError> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LoadError::BadCounter(raw.to_string()));
    }
    match digits.parse::<u64>() {
        Ok(n) if (1..=MAX_ID).contains(&n) => Ok(n),
        _ => Err(LoadError::BadCounter(raw.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveReport {
    /// The medium was not ready; nothing was written.
    Unavailable,
    Saved,
    /// These keys kept their previous value.
    Partial(Vec<&'static str>),
}

/// Moves full snapshots of [`TodoState`] in and out of a [`KeyValueStore`].
#[derive(Clone)]
pub struct PersistenceAdapter<K: KeyValueStore> {
    store: K,
}

impl<K: KeyValueStore> PersistenceAdapter<K> {
    pub fn new(store: K) -> Self { Self { store } }

    pub fn store(&self) -> &K { &self.store }

    async fn read<T>(&self, key: &'static str, parse: impl FnOnce(&str) -> Result<T, LoadError>) -> Result<T, LoadError> {
        match self.store.get(key).await {
            Ok(Some(raw)) => parse(&raw),
            Ok(None) => Err(LoadError::Missing),
            Err(e) => Err(LoadError::Read(e)),
        }
    }

    /// Never fails: an absent or unreadable entry starts that part empty.
    pub async fn load(&self) -> TodoState {
        let todos = or_default(TODOS_KEY, self.read(TODOS_KEY, parse_todos).await);
        let files = or_default(FILE_RESOURCES_KEY, self.read(FILE_RESOURCES_KEY, parse_files).await);
        let next_id = or_first(NEXT_ID_KEY, self.read(NEXT_ID_KEY, parse_counter).await);
        let next_file_id = or_first(NEXT_FILE_ID_KEY, self.read(NEXT_FILE_ID_KEY, parse_counter).await);

        let state = TodoState::new(TodoStore::from_parts(todos, next_id), FileResourceStore::from_parts(files, next_file_id));
        tracing::info!(
            todos = state.todos().len(),
            files = state.files().len(),
            next_id = state.todos().next_id(),
            next_file_id = state.files().next_id(),
            "state loaded"
        );
        state
    }

    pub async fn save(&self, state: &TodoState) -> SaveReport {
        if !self.store.is_available() {
            tracing::debug!("persistence medium not ready, skipping save");
            return SaveReport::Unavailable;
        }
        let entries = [
            (TODOS_KEY, serde_json::to_string(state.todos().list())),
            (FILE_RESOURCES_KEY, serde_json::to_string(state.files().list())),
            (NEXT_ID_KEY, Ok(state.todos().next_id().to_string())),
            (NEXT_FILE_ID_KEY, Ok(state.files().next_id().to_string())),
        ];
        let mut failed = Vec::new();
        for (key, value) in entries {
            let written = match value {
                Ok(value) => self.store.set(key, &value).await,
                Err(e) => Err(e.into()),
            };
            if let Err(error) = written {
                tracing::warn!(key, %error, "failed to persist entry");
                failed.push(key);
            }
        }
        if failed.is_empty() { SaveReport::Saved } else { SaveReport::Partial(failed) }
    }
}

fn or_default<T: Default>(key: &str, loaded: Result<T, LoadError>) -> T {
    loaded.unwrap_or_else(|e| {
        log_discarded(key, &e);
        T::default()
    })
}

fn or_first(key: &str, loaded: Result<u64, LoadError>) -> u64 {
    loaded.unwrap_or_else(|e| {
        log_discarded(key, &e);
        1
    })
}

fn log_discarded(key: &str, error: &LoadError) {
    match error {
        LoadError::Missing => tracing::debug!(key, "no stored entry"),
        other => tracing::warn!(key, error = %other, "discarding stored entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        file_resource::{FileId, NewFileResource},
        timestamp::parse_iso,
        todo::{CreateTodo, TodoId},
    };
    use crate::infrastructure::memory_kv::InMemoryKeyValueStore;
    use chrono::Duration;

    fn sample_state() -> TodoState {
        let t0 = parse_iso("2025-01-01T08:00:00.250Z").unwrap();
        let mut state = TodoState::default();
        let file = state.add_file(
            NewFileResource { name: "spec.pdf".into(), mime: "application/pdf".into(), content_ref: "data:application/pdf;base64,JVBERg==".into() },
            t0,
        )
        .unwrap();
        state
            .add_todo(CreateTodo { title: "Review spec".into(), deadline: Some(t0 + Duration::days(3)), file_ids: vec![file.id] }, t0)
            .unwrap();
        let plain = state.add_todo(CreateTodo { title: "Plain".into(), ..Default::default() }, t0).unwrap();
        state.toggle_todo(plain.id, true, t0 + Duration::minutes(5));
        let gone = state.add_todo(CreateTodo { title: "Gone".into(), ..Default::default() }, t0).unwrap();
        state.delete_todo(gone.id);
        state
    }

    #[tokio::test]
    async fn round_trip_preserves_records_timestamps_and_counters() {
        let medium = InMemoryKeyValueStore::new();
        let adapter = PersistenceAdapter::new(medium.clone());
        let state = sample_state();
        assert_eq!(adapter.save(&state).await, SaveReport::Saved);
        assert_eq!(medium.raw(NEXT_ID_KEY).as_deref(), Some("4"));
        assert_eq!(medium.raw(NEXT_FILE_ID_KEY).as_deref(), Some("2"));

        let loaded = adapter.load().await;
        assert_eq!(loaded, state);
        assert_eq!(loaded.todos().next_id(), 4);
    }

    #[tokio::test]
    async fn first_run_starts_empty_with_counters_at_one() {
        let adapter = PersistenceAdapter::new(InMemoryKeyValueStore::new());
        let state = adapter.load().await;
        assert!(state.todos().is_empty());
        assert!(state.files().is_empty());
        assert_eq!(state.todos().next_id(), 1);
        assert_eq!(state.files().next_id(), 1);
    }

    #[tokio::test]
    async fn malformed_entries_load_as_absent() {
        let medium = InMemoryKeyValueStore::with_entries([
            (TODOS_KEY, "{not json"),
            (FILE_RESOURCES_KEY, r#"[{"id":1,"name":"a.pdf","type":"application/pdf","url":"data:,","uploadedAt":"not a date"}]"#),
            (NEXT_ID_KEY, "seven"),
            (NEXT_FILE_ID_KEY, "0"),
        ]);
        let state = PersistenceAdapter::new(medium).load().await;
        assert_eq!(state, TodoState::default());
    }

    #[tokio::test]
    async fn reads_camel_case_records_with_millisecond_stamps() {
        let todos = r#"[{"id":2,"title":"Ship","completed":false,"createdAt":"2025-01-02T03:04:05.678Z","updatedAt":"2025-01-02T03:04:05.678Z","deadline":"2025-01-10T09:00:00.000Z","files":[{"id":1,"name":"a.png","type":"image/png","url":"data:image/png;base64,","uploadedAt":"2025-01-01T00:00:00.000Z"}]},{"id":1,"title":"Old","completed":true,"createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T01:00:00.000Z","files":[]}]"#;
        let medium = InMemoryKeyValueStore::with_entries([(TODOS_KEY, todos), (NEXT_ID_KEY, "3")]);
        let state = PersistenceAdapter::new(medium).load().await;

        let ship = state.todos().get(TodoId(2)).unwrap();
        assert_eq!(ship.deadline, Some(parse_iso("2025-01-10T09:00:00Z").unwrap()));
        assert_eq!(ship.created_at, parse_iso("2025-01-02T03:04:05.678Z").unwrap());
        assert_eq!(ship.files[0].id, FileId(1));
        assert_eq!(ship.files[0].mime, "image/png");
        assert!(state.todos().get(TodoId(1)).unwrap().completed);
        assert_eq!(state.todos().next_id(), 3);
        assert_eq!(state.files().next_id(), 1);
    }

    #[tokio::test]
    async fn missing_counter_is_raised_past_stored_ids() {
        let medium = InMemoryKeyValueStore::new();
        let adapter = PersistenceAdapter::new(medium.clone());
        adapter.save(&sample_state()).await;
        let medium = InMemoryKeyValueStore::with_entries([(TODOS_KEY, medium.raw(TODOS_KEY).unwrap().as_str())]);
        let state = PersistenceAdapter::new(medium).load().await;
        assert_eq!(state.todos().next_id(), 3);
    }

    #[tokio::test]
    async fn saves_are_skipped_until_the_medium_is_ready() {
        let medium = InMemoryKeyValueStore::pending();
        let adapter = PersistenceAdapter::new(medium.clone());
        assert_eq!(adapter.save(&sample_state()).await, SaveReport::Unavailable);
        assert_eq!(medium.raw(TODOS_KEY), None);

        medium.init().await.unwrap();
        assert_eq!(adapter.save(&sample_state()).await, SaveReport::Saved);
        assert!(medium.raw(TODOS_KEY).is_some());
    }

    #[tokio::test]
    async fn a_failed_write_leaves_that_entry_at_its_previous_value() {
        let medium = InMemoryKeyValueStore::new();
        let adapter = PersistenceAdapter::new(medium.clone());
        adapter.save(&TodoState::default()).await;
        let empty_files = medium.raw(FILE_RESOURCES_KEY);

        medium.fail_writes_to(FILE_RESOURCES_KEY);
        let state = sample_state();
        assert_eq!(adapter.save(&state).await, SaveReport::Partial(vec![FILE_RESOURCES_KEY]));
        assert_eq!(medium.raw(FILE_RESOURCES_KEY), empty_files);
        assert_eq!(medium.raw(NEXT_FILE_ID_KEY).as_deref(), Some("2"));
        assert_ne!(medium.raw(TODOS_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn counters_must_be_positive_decimals() {
        assert_eq!(parse_counter("12").unwrap(), 12);
        assert_eq!(parse_counter(" 3 ").unwrap(), 3);
        assert!(parse_counter("0").is_err());
        assert!(parse_counter("-1").is_err());
        assert!(parse_counter("1.5").is_err());
        assert!(parse_counter("+5").is_err());
        assert!(parse_counter("").is_err());
        assert_eq!(parse_counter("18446744073709551614").unwrap(), u64::MAX - 1);
        assert!(parse_counter("18446744073709551615").is_err());
        assert!(parse_counter("18446744073709551616").is_err());
    }

    #[tokio::test]
    async fn records_at_the_id_ceiling_load_as_absent() {
        let todos = r#"[{"id":18446744073709551615,"title":"x","completed":false,"createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z","files":[]}]"#;
        let files = r#"[{"id":18446744073709551615,"name":"a.pdf","type":"application/pdf","url":"data:,","uploadedAt":"2025-01-01T00:00:00.000Z"}]"#;
        let medium = InMemoryKeyValueStore::with_entries([
            (TODOS_KEY, todos),
            (FILE_RESOURCES_KEY, files),
            (NEXT_ID_KEY, "18446744073709551615"),
            (NEXT_FILE_ID_KEY, "+5"),
        ]);
        let mut state = PersistenceAdapter::new(medium).load().await;
        assert_eq!(state, TodoState::default());
        let fresh = state
            .add_todo(CreateTodo { title: "fresh".into(), ..Default::default() }, parse_iso("2025-01-02T00:00:00Z").unwrap())
            .unwrap();
        assert_eq!(fresh.id, TodoId(1));
    }

    #[test]
    fn attached_copies_at_the_id_ceiling_reject_the_todos_entry() {
        let todos = r#"[{"id":1,"title":"x","completed":false,"createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z","files":[{"id":18446744073709551615,"name":"a.pdf","type":"application/pdf","url":"data:,","uploadedAt":"2025-01-01T00:00:00.000Z"}]}]"#;
        assert!(matches!(parse_todos(todos), Err(LoadError::IdOutOfRange(u64::MAX))));
        assert_eq!(parse_files("[]").unwrap(), Vec::new());
    }
}
