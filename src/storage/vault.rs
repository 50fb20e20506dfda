//! Destination vault capability.
//!
//! The importer only ever needs three operations from the document store it
//! writes into. Paths are vault-relative and `/`-separated.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ImportError, Result};

#[async_trait]
pub trait Vault: Send + Sync {
    /// Create `path` and its parents. An existing directory is not an error.
    async fn ensure_dir(&self, path: &str) -> Result<()>;

    /// Write a UTF-8 file, replacing any previous content in full.
    async fn write(&self, path: &str, content: &str) -> Result<()>;

    /// Write a binary file, replacing any previous content in full.
    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// Join vault path segments, skipping empty ones.
///
/// `join_vault_path(&["", "memos", "2024-01-01"])` -> `"memos/2024-01-01"`
pub fn join_vault_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Vault backed by a directory on disk
#[derive(Debug, Clone)]
pub struct FileSystemVault {
    base_path: PathBuf,
}

impl FileSystemVault {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ImportError::Vault(format!(
                "Path escapes the vault: {}",
                path
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Vault for FileSystemVault {
    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::write(&full, content).await?;
        Ok(())
    }

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::write(&full, data).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryVaultState {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

/// In-memory vault, for embedding hosts without a filesystem and for tests.
///
/// Writing into a directory that was never ensured fails, like a real vault
/// adapter would.
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: Mutex<MemoryVaultState>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryVaultState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn read_to_string(&self, path: &str) -> Option<String> {
        self.read(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// All file paths, sorted
    pub fn file_paths(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    pub fn dir_count(&self) -> usize {
        self.state().dirs.len()
    }

    fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let mut state = self.state();
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !state.dirs.contains(parent) {
                return Err(ImportError::Vault(format!(
                    "Parent directory does not exist: {}",
                    parent
                )));
            }
        }
        state.files.insert(path.to_string(), data);
        Ok(())
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn ensure_dir(&self, path: &str) -> Result<()> {
        let mut state = self.state();
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            state.dirs.insert(current.clone());
        }
        Ok(())
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.put(path, content.as_bytes().to_vec())
    }

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<()> {
        self.put(path, data.to_vec())
    }
}
