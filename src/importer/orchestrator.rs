//! Import pipeline.
//!
//! One run moves through these phases in order, and the first error ends it:
//!
//! 1. claim and create the scratch workspace
//! 2. unpack the archive and locate the export page and attachment folder
//! 3. sanitise and parse the page into memos
//! 4. copy attachments into the vault
//! 5. assign memos to destination files and create their folders
//! 6. write every file, replacing any earlier version
//! 7. run the post-import hooks
//!
//! Every format error is raised before step 4, so a malformed export never
//! touches the vault. The workspace guard removes the scratch directory on
//! every exit path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{ImportError, Result};
use crate::markdown::resolve_placeholders;
use crate::memos::{parse_memo_export, read_sanitized, Memo, MemoExport, TagList};
use crate::storage::{
    extract_archive, join_vault_path, locate_export, ExportLayout, ScratchWorkspace, Vault,
};

use super::config::ImportConfig;
use super::hooks::PostImportHooks;
use super::progress::ProgressBus;

/// Joins memos that share a destination file
pub const MEMO_SEPARATOR: &str = "\n\n---\n\n";

/// Attachment writes in flight at once
const COPY_CONCURRENCY: usize = 8;

/// Result of a successful import
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub memo_count: usize,
    pub file_count: usize,
    pub attachment_count: usize,
    pub tags: TagList,
    /// Vault paths of the memo files, in write order
    pub written: Vec<String>,
}

/// Where one memo ends up in the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoTarget {
    pub dir: String,
    pub path: String,
}

/// Destination for the memo at `position` out of `total`.
///
/// Unmerged files are numbered `total - position`, so the first memo in the
/// export gets the highest number.
pub fn memo_target(config: &ImportConfig, memo: &Memo, position: usize, total: usize) -> MemoTarget {
    let dir = join_vault_path(&[&config.memo_root(), &memo.date]);
    let file_name = if config.merge_by_date {
        format!("memo@{}.md", memo.date)
    } else {
        format!("memo@{}_{}.md", memo.title, total - position)
    };
    let path = join_vault_path(&[&dir, &file_name]);
    MemoTarget { dir, path }
}

/// Memo contents bound for one vault file
#[derive(Debug, Clone)]
pub struct FileGroup {
    pub dir: String,
    pub path: String,
    pub contents: Vec<String>,
}

impl FileGroup {
    pub fn joined(&self) -> String {
        self.contents.join(MEMO_SEPARATOR)
    }
}

/// Destination path to contents, in first-seen order
#[derive(Debug, Default)]
pub struct FileGroups {
    groups: Vec<FileGroup>,
    index: HashMap<String, usize>,
}

impl FileGroups {
    pub fn push(&mut self, target: MemoTarget, content: String) {
        match self.index.get(&target.path) {
            Some(&i) => self.groups[i].contents.push(content),
            None => {
                self.index.insert(target.path.clone(), self.groups.len());
                self.groups.push(FileGroup {
                    dir: target.dir,
                    path: target.path,
                    contents: vec![content],
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileGroup> {
        self.groups.iter()
    }

    /// Destination folders without repeats, in first-seen order
    pub fn dirs(&self) -> Vec<&str> {
        let mut dirs: Vec<&str> = Vec::new();
        for group in &self.groups {
            if !dirs.contains(&group.dir.as_str()) {
                dirs.push(&group.dir);
            }
        }
        dirs
    }
}

/// Assign every memo to its file, resolving placeholders on the way
pub fn group_memos(config: &ImportConfig, memos: &[Memo]) -> FileGroups {
    let total = memos.len();
    let mut groups = FileGroups::default();

    for (position, memo) in memos.iter().enumerate() {
        let target = memo_target(config, memo, position, total);
        let content = resolve_placeholders(&memo.content, &config.target_root, config.allow_bi_link);
        groups.push(target, content);
    }

    groups
}

/// Unpack `archive_path` into the workspace and find the export inside it
pub(crate) async fn unpack_export(archive_path: &Path, workspace: &Path) -> Result<ExportLayout> {
    log::info!("Unpacking {:?} into {:?}", archive_path, workspace);

    let archive = archive_path.to_path_buf();
    let dest = workspace.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || extract_archive(&archive, &dest)).await??;

    let layout = locate_export(workspace, &entries)?;
    log::info!(
        "Export page {:?}, {} attachments",
        layout.export_page,
        layout.attachment_count
    );
    Ok(layout)
}

/// Sanitise and parse the located export page
pub(crate) async fn load_export(layout: &ExportLayout) -> Result<MemoExport> {
    let html = read_sanitized(&layout.export_page).await?;
    parse_memo_export(&html)
}

/// Import the archive named in `config` into `vault`
pub async fn run_import(
    config: &ImportConfig,
    vault: &dyn Vault,
    progress: &ProgressBus,
    hooks: PostImportHooks<'_>,
) -> Result<ImportSummary> {
    progress.emit("Creating workspace", Some(60));
    let workspace = ScratchWorkspace::acquire(&config.workspace_dir)?;

    progress.emit("Unpacking archive", Some(65));
    let layout = unpack_export(&config.archive_path, workspace.path()).await?;

    progress.emit("Parsing memos", Some(68));
    let export = load_export(&layout).await?;

    progress.emit("Copying attachments", Some(70));
    let attachment_count = match &layout.attachment_dir {
        Some(dir) => copy_attachments(dir, &config.attachment_base(), vault).await?,
        None => 0,
    };

    let groups = group_memos(config, &export.memos);
    for dir in groups.dirs() {
        vault.ensure_dir(dir).await?;
    }

    let total = groups.len();
    let mut written = Vec::with_capacity(total);
    for (i, group) in groups.iter().enumerate() {
        vault.write(&group.path, &group.joined()).await?;
        log::info!("Wrote {} ({} memos)", group.path, group.contents.len());
        written.push(group.path.clone());
        progress.emit(format!("Writing {}", group.path), Some(write_percent(i + 1, total)));
    }
    progress.emit(format!("Wrote {} files", total), Some(92));

    for (i, (mode, hook)) in hooks.scheduled(config).into_iter().enumerate() {
        let percent = 94 + 2 * i as u8;
        progress.emit(format!("Generating {}", hook.name()), Some(percent));
        log::info!("Running {} hook ({:?})", hook.name(), mode);
        hook.run(mode, &export.memos, config, vault).await?;
    }

    progress.emit("Cleaning up workspace", Some(98));
    drop(workspace);

    let summary = ImportSummary {
        memo_count: export.memos.len(),
        file_count: total,
        attachment_count,
        tags: export.tags,
        written,
    };

    log::info!(
        "Import completed: {} memos, {} files, {} attachments",
        summary.memo_count,
        summary.file_count,
        summary.attachment_count
    );
    progress.emit(
        format!("Import completed. Total: {} memos", summary.memo_count),
        Some(100),
    );

    Ok(summary)
}

/// 70 to 90, scaled by how many files are done
fn write_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    (70 + done * 20 / total) as u8
}

struct AttachmentCopy {
    source: PathBuf,
    target: String,
}

/// Copy everything below `source_dir` into `dest_base` in the vault.
///
/// All folders are created before any file is written.
async fn copy_attachments(source_dir: &Path, dest_base: &str, vault: &dyn Vault) -> Result<usize> {
    log::info!("Copying attachments from {:?} to {}", source_dir, dest_base);

    let root = source_dir.to_path_buf();
    let base = dest_base.to_string();
    let (dirs, files) = tokio::task::spawn_blocking(move || scan_attachments(&root, &base)).await??;

    for dir in &dirs {
        vault.ensure_dir(dir).await?;
    }

    let count = files.len();
    stream::iter(files)
        .map(|file| async move {
            let data = tokio::fs::read(&file.source).await?;
            vault.write_binary(&file.target, &data).await?;
            log::debug!("Copied attachment {}", file.target);
            Ok::<(), ImportError>(())
        })
        .buffer_unordered(COPY_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

    log::info!("Copied {} attachments", count);
    Ok(count)
}

fn scan_attachments(root: &Path, base: &str) -> Result<(Vec<String>, Vec<AttachmentCopy>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| ImportError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let target = join_vault_path(&[base, &relative]);

        if entry.file_type().is_dir() {
            dirs.push(target);
        } else if entry.file_type().is_file() {
            files.push(AttachmentCopy {
                source: entry.into_path(),
                target,
            });
        }
    }

    Ok((dirs, files))
}
