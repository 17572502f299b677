use async_trait::async_trait;

/// Binary asset storage addressed by relative, `/`-separated paths.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Write `bytes` at `path`, replacing whatever was stored there.
    async fn store(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()>;
    /// Remove the asset. Returns false if nothing was stored at `path`.
    async fn delete(&self, path: &str) -> anyhow::Result<bool>;
    async fn exists(&self, path: &str) -> anyhow::Result<bool>;
}
