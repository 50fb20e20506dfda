use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::ScratchWorkspace;

use super::orchestrator::{load_export, unpack_export};

/// Sample memos included in a preview
const PREVIEW_SAMPLE_SIZE: usize = 10;

/// What an import of an archive would bring in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPreview {
    pub memo_count: usize,
    pub attachment_count: usize,
    pub tags: Vec<String>,
    /// Sample memos (first 10)
    pub memos: Vec<MemoPreview>,
    pub earliest: Option<NaiveDateTime>,
    pub latest: Option<NaiveDateTime>,
}

/// Preview info for a single memo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoPreview {
    pub timestamp: String,
    pub tags: Vec<String>,
    pub has_attachments: bool,
}

/// Unpack and parse an archive without touching any vault
pub async fn preview_export(archive_path: &Path, workspace_dir: &Path) -> Result<ExportPreview> {
    let workspace = ScratchWorkspace::acquire(workspace_dir)?;
    let layout = unpack_export(archive_path, workspace.path()).await?;
    let export = load_export(&layout).await?;

    let dates: Vec<NaiveDateTime> = export.memos.iter().filter_map(|m| m.created_at()).collect();

    let memos = export
        .memos
        .iter()
        .take(PREVIEW_SAMPLE_SIZE)
        .map(|m| MemoPreview {
            timestamp: m.timestamp.clone(),
            tags: m.tags.clone(),
            has_attachments: m.has_attachments(),
        })
        .collect();

    Ok(ExportPreview {
        memo_count: export.memos.len(),
        attachment_count: layout.attachment_count,
        tags: export.tags,
        memos,
        earliest: dates.iter().min().copied(),
        latest: dates.iter().max().copied(),
    })
}
