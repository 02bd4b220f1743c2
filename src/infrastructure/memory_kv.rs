use std::collections::{HashMap, HashSet};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::domain::repository::KeyValueStore;

/// Process-local medium. Clones share the same entries, which lets tests hand
/// one handle to the service and inspect writes through another.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    ready: Arc<AtomicBool>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryKeyValueStore {
    /// A medium that is usable right away.
    pub fn new() -> Self {
        let store = Self::default();
        store.ready.store(true, Ordering::Release);
        store
    }

    /// A medium that rejects writes until `init` runs.
    pub fn pending() -> Self { Self::default() }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        store.entries().extend(entries.into_iter().map(|(k, v)| (k.to_string(), v.to_string())));
        store
    }

    /// Makes every later `set` of `key` fail.
    pub fn fail_writes_to(&self, key: &str) {
        self.failing.lock().unwrap_or_else(|p| p.into_inner()).insert(key.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> { self.entries().get(key).cloned() }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn init(&self) -> Result<()> {
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn is_available(&self) -> bool { self.ready.load(Ordering::Acquire) }

    async fn get(&self, key: &str) -> Result<Option<String>> { Ok(self.raw(key)) }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.failing.lock().unwrap_or_else(|p| p.into_inner()).contains(key) {
            bail!("write to `{key}` rejected");
        }
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
