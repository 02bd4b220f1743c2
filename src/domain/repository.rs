use async_trait::async_trait;

/// Durable string-to-string medium the persistence adapter writes snapshots into.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn init(&self) -> anyhow::Result<()>;
    /// False until the medium can take writes; saves before that are skipped.
    fn is_available(&self) -> bool;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
