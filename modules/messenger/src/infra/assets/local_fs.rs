use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::ports::AssetStore;

/// Asset store backed by a directory on the local filesystem.
///
/// Asset paths are relative and must stay inside the root directory;
/// absolute paths and `..` components are refused.
#[derive(Debug, Clone)]
pub struct LocalFsAssetStore {
    root: PathBuf,
}

impl LocalFsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty() {
            bail!("empty asset path");
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("Path traversal attempt detected: '{path}' is outside the asset directory"),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetStore for LocalFsAssetStore {
    async fn store(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
        }

        // Write next to the target and rename, so readers never see a partial file.
        let staging = target.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        fs::write(&staging, bytes)
            .await
            .with_context(|| format!("Failed to write asset '{path}'"))?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e).with_context(|| format!("Failed to move asset into '{path}'"));
        }

        debug!(path, size = bytes.len(), "Stored asset");
        Ok(())
    }

    async fn delete(&self, path: &str) -> anyhow::Result<bool> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path, "Deleted asset");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete asset '{path}'")),
        }
    }

    async fn exists(&self, path: &str) -> anyhow::Result<bool> {
        let target = self.resolve(path)?;
        fs::try_exists(&target)
            .await
            .with_context(|| format!("Failed to check asset '{path}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsAssetStore::new(dir.path());

        store.store("profiles/u1/a.png", b"png").await.unwrap();
        assert!(store.exists("profiles/u1/a.png").await.unwrap());
        assert_eq!(
            std::fs::read(dir.path().join("profiles/u1/a.png")).unwrap(),
            b"png"
        );

        assert!(store.delete("profiles/u1/a.png").await.unwrap());
        assert!(!store.exists("profiles/u1/a.png").await.unwrap());
        assert!(!store.delete("profiles/u1/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn store_overwrites_existing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsAssetStore::new(dir.path());

        store.store("a.png", b"first").await.unwrap();
        store.store("a.png", b"second").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.png")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsAssetStore::new(dir.path());

        for path in ["../escape.png", "profiles/../../x", "/etc/passwd", ""] {
            assert!(store.store(path, b"x").await.is_err(), "{path}");
            assert!(store.delete(path).await.is_err(), "{path}");
        }
    }
}
