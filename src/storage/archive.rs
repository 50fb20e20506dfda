//! Export archive unpacking
//!
//! A memo export archive holds a single top-level folder named after the
//! export, containing exactly one `.html` page and a `file/` directory with
//! the attachments referenced from that page.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use zip::ZipArchive;

use crate::error::{ImportError, Result};

/// Name of the attachment directory inside an export
pub const ATTACHMENT_DIR_NAME: &str = "file";

/// Kind of an extracted archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One extracted entry, relative to the workspace.
///
/// Paths always use `/` separators and directories end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Where the interesting parts of an unpacked export live
#[derive(Debug, Clone)]
pub struct ExportLayout {
    /// The single `.html` page inside the export's top-level folder
    pub export_page: PathBuf,
    /// The attachment directory, if the export has one
    pub attachment_dir: Option<PathBuf>,
    /// Number of files below `attachment_dir`
    pub attachment_count: usize,
}

/// Extract every entry of `archive_path` into `dest`.
///
/// Tar archives are recognised by their `.tar` extension, everything else is
/// read as zip. Entries that would escape `dest` are skipped.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<Vec<ArchiveEntry>> {
    if !archive_path.exists() {
        return Err(ImportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Archive not found: {}", archive_path.display()),
        )));
    }

    fs::create_dir_all(dest)?;

    let is_tar = archive_path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("tar"))
        .unwrap_or(false);

    let entries = if is_tar {
        extract_tar(archive_path, dest)?
    } else {
        extract_zip(archive_path, dest)?
    };

    if entries.is_empty() {
        return Err(ImportError::EmptyArchive(archive_path.to_path_buf()));
    }

    log::info!(
        "Unpacked {} entries from {:?} into {:?}",
        entries.len(),
        archive_path,
        dest
    );

    Ok(entries)
}

fn extract_zip(zip_path: &Path, dest: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut entries = EntryList::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;

        let Some(relative) = file.enclosed_name() else {
            log::warn!("Skipping unsafe archive entry: {}", file.name());
            continue;
        };

        let outpath = dest.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            entries.record(&relative, EntryKind::Directory);
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
            entries.record(&relative, EntryKind::File);
        }
    }

    Ok(entries.into_vec())
}

fn extract_tar(tar_path: &Path, dest: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);

    let mut entries = EntryList::default();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let relative = entry.path()?.into_owned();

        let kind = match entry.header().entry_type() {
            t if t.is_dir() => EntryKind::Directory,
            t if t.is_file() => EntryKind::File,
            other => {
                log::warn!("Skipping {:?} entry {:?}", other, relative);
                continue;
            }
        };

        if !entry.unpack_in(dest)? {
            log::warn!("Skipping unsafe archive entry: {:?}", relative);
            continue;
        }

        entries.record(&relative, kind);
    }

    Ok(entries.into_vec())
}

/// Ordered, de-duplicated entry list.
///
/// Archives do not always carry explicit directory records, so every
/// ancestor of a recorded path is recorded as a directory first.
#[derive(Default)]
struct EntryList {
    entries: Vec<ArchiveEntry>,
    seen: HashSet<String>,
}

impl EntryList {
    fn record(&mut self, relative: &Path, kind: EntryKind) {
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();

        if segments.is_empty() {
            return;
        }

        for depth in 1..segments.len() {
            let dir = format!("{}/", segments[..depth].join("/"));
            self.push(dir, EntryKind::Directory);
        }

        let joined = segments.join("/");
        let path = match kind {
            EntryKind::Directory => format!("{}/", joined),
            EntryKind::File => joined,
        };
        self.push(path, kind);
    }

    fn push(&mut self, path: String, kind: EntryKind) {
        if self.seen.insert(path.clone()) {
            self.entries.push(ArchiveEntry { path, kind });
        }
    }

    fn into_vec(self) -> Vec<ArchiveEntry> {
        self.entries
    }
}

/// Find the export folder, its `.html` page and the attachment directory.
pub fn locate_export(workspace: &Path, entries: &[ArchiveEntry]) -> Result<ExportLayout> {
    let top_level: Vec<&str> = entries
        .iter()
        .filter(|e| e.is_dir())
        .map(|e| e.path.trim_end_matches('/'))
        .filter(|p| !p.contains('/'))
        .collect();

    let roots: Vec<&str> = top_level
        .iter()
        .copied()
        .filter(|name| *name != ATTACHMENT_DIR_NAME)
        .collect();

    let root = match roots.as_slice() {
        [single] => *single,
        _ => {
            return Err(ImportError::ExportRootNotFound(
                top_level.iter().map(|s| s.to_string()).collect(),
            ))
        }
    };

    let root_prefix = format!("{}/", root);
    let pages: Vec<&str> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::File)
        .filter_map(|e| e.path.strip_prefix(&root_prefix))
        .filter(|name| !name.contains('/') && name.to_lowercase().ends_with(".html"))
        .collect();

    let root_dir = workspace.join(root);
    let export_page = match pages.as_slice() {
        [page] => root_dir.join(page),
        [] => return Err(ImportError::ExportPageNotFound(root_dir)),
        many => {
            return Err(ImportError::AmbiguousExportPage(
                many.iter().map(|s| s.to_string()).collect(),
            ))
        }
    };

    let marker = format!("/{}/", ATTACHMENT_DIR_NAME);
    let attachment_entry = entries
        .iter()
        .find(|e| e.is_dir() && e.path.ends_with(&marker));

    let (attachment_dir, attachment_count) = match attachment_entry {
        Some(dir) => {
            let count = entries
                .iter()
                .filter(|e| e.kind == EntryKind::File && e.path.starts_with(&dir.path))
                .count();
            (Some(workspace.join(dir.path.trim_end_matches('/'))), count)
        }
        None => (None, 0),
    };

    Ok(ExportLayout {
        export_page,
        attachment_dir,
        attachment_count,
    })
}
