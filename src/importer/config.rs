use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::markdown::attachment_base;
use crate::storage::join_vault_path;

use super::hooks::HookMode;

/// Settings for one import run. Read-only while the run is in progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    /// Vault folder everything is imported under (may be empty)
    pub target_root: String,
    /// Folder under `target_root` holding the memo files
    pub memo_subfolder: String,
    /// Write one file per day instead of one per memo
    pub merge_by_date: bool,
    /// Unescape the first `\[\[`/`\]\]` pair in each memo
    pub allow_bi_link: bool,
    /// Export archive to import
    pub archive_path: PathBuf,
    /// Vault base directory on disk
    pub vault_base: PathBuf,
    /// Scratch directory the archive is unpacked into
    pub workspace_dir: PathBuf,
    /// Moments generation after import
    pub moments: HookMode,
    /// Canvas generation after import
    pub canvas: HookMode,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            target_root: "flomo".to_string(),
            memo_subfolder: "memos".to_string(),
            merge_by_date: false,
            allow_bi_link: true,
            archive_path: PathBuf::new(),
            vault_base: PathBuf::new(),
            workspace_dir: default_workspace_dir(),
            moments: HookMode::CopyWithLink,
            canvas: HookMode::CopyWithContent,
        }
    }
}

impl ImportConfig {
    /// Vault folder holding the per-date memo folders
    pub fn memo_root(&self) -> String {
        join_vault_path(&[&self.target_root, &self.memo_subfolder])
    }

    /// Vault folder attachments are copied into, with trailing slash
    pub fn attachment_base(&self) -> String {
        attachment_base(&self.target_root)
    }
}

/// `~/.memoport/cache/data`, or the same under the temp dir without a home
pub fn default_workspace_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".memoport")
        .join("cache")
        .join("data")
}

/// Default settings file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("memoport").join("import.json"))
}

/// Load settings from file, falling back to defaults when it does not exist
pub fn load_import_config(path: &Path) -> Result<ImportConfig> {
    if !path.exists() {
        return Ok(ImportConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: ImportConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save settings to file
pub fn save_import_config(path: &Path, config: &ImportConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_import_config(&tmp.path().join("nope.json")).unwrap();
        assert_eq!(config, ImportConfig::default());
        assert_eq!(config.memo_root(), "flomo/memos");
        assert_eq!(config.attachment_base(), "flomo/files/");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("import.json");
        fs::write(&path, r#"{"targetRoot": "", "mergeByDate": true, "canvas": "skip"}"#).unwrap();

        let config = load_import_config(&path).unwrap();
        assert!(config.merge_by_date);
        assert!(config.allow_bi_link);
        assert_eq!(config.canvas, HookMode::Skip);
        assert_eq!(config.moments, HookMode::CopyWithLink);
        assert_eq!(config.memo_root(), "memos");
        assert_eq!(config.attachment_base(), "files/");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("import.json");

        let config = ImportConfig {
            target_root: "inbox".to_string(),
            archive_path: PathBuf::from("/tmp/export.zip"),
            ..ImportConfig::default()
        };
        save_import_config(&path, &config).unwrap();

        assert_eq!(load_import_config(&path).unwrap(), config);
    }
}
