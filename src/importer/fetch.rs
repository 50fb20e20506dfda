use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ImportError, Result};
use crate::storage::Vault;

use super::config::ImportConfig;
use super::hooks::PostImportHooks;
use super::orchestrator::{run_import, ImportSummary};
use super::progress::ProgressBus;

/// Account login used to request a fresh backup
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Something that can log in and download a backup archive.
///
/// Failures are reported as a plain reason string; the importer does not
/// look inside them.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch_archive(&self, credentials: &Credentials)
        -> std::result::Result<PathBuf, String>;
}

/// Download a fresh backup and import it.
///
/// A fetch failure returns before the workspace or vault is touched.
pub async fn sync_and_import(
    fetcher: &dyn ArchiveFetcher,
    credentials: &Credentials,
    config: &ImportConfig,
    vault: &dyn Vault,
    progress: &ProgressBus,
    hooks: PostImportHooks<'_>,
) -> Result<ImportSummary> {
    progress.emit("Fetching backup archive", Some(10));
    log::info!("Fetching backup archive for {}", credentials.username);

    let archive_path = fetcher
        .fetch_archive(credentials)
        .await
        .map_err(ImportError::Fetch)?;

    log::info!("Backup archive downloaded to {:?}", archive_path);
    progress.emit("Backup archive downloaded", Some(50));

    let config = ImportConfig {
        archive_path,
        ..config.clone()
    };
    run_import(&config, vault, progress, hooks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::testing::{write_export_zip, SAMPLE_PAGE};
    use crate::storage::MemoryVault;

    struct FailingFetcher;

    #[async_trait]
    impl ArchiveFetcher for FailingFetcher {
        async fn fetch_archive(&self, _: &Credentials) -> std::result::Result<PathBuf, String> {
            Err("login rejected".to_string())
        }
    }

    struct LocalFetcher(PathBuf);

    #[async_trait]
    impl ArchiveFetcher for LocalFetcher {
        async fn fetch_archive(&self, _: &Credentials) -> std::result::Result<PathBuf, String> {
            Ok(self.0.clone())
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "me@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let shown = format!("{:?}", credentials());
        assert!(shown.contains("me@example.com"));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ImportConfig {
            workspace_dir: tmp.path().join("workspace"),
            ..ImportConfig::default()
        };
        let vault = MemoryVault::new();

        let result = sync_and_import(
            &FailingFetcher,
            &credentials(),
            &config,
            &vault,
            &ProgressBus::new(),
            PostImportHooks::none(),
        )
        .await;

        match result {
            Err(ImportError::Fetch(reason)) => assert_eq!(reason, "login rejected"),
            other => panic!("expected fetch error, got {:?}", other),
        }
        assert!(vault.file_paths().is_empty());
        assert!(!config.workspace_dir.exists());
    }

    #[tokio::test]
    async fn test_fetched_archive_is_imported() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_export_zip(tmp.path(), SAMPLE_PAGE, &[]);
        let config = ImportConfig {
            workspace_dir: tmp.path().join("workspace"),
            ..ImportConfig::default()
        };
        let vault = MemoryVault::new();

        let summary = sync_and_import(
            &LocalFetcher(archive),
            &credentials(),
            &config,
            &vault,
            &ProgressBus::new(),
            PostImportHooks::none(),
        )
        .await
        .unwrap();

        assert_eq!(summary.memo_count, 3);
        assert_eq!(vault.file_paths().len(), 3);
    }
}
