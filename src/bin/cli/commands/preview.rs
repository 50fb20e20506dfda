use std::path::Path;

use anyhow::Result;
use memoport_lib::importer::{preview_export, ImportConfig};

use crate::OutputFormat;

pub async fn run(archive: &Path, config: &ImportConfig, format: &OutputFormat) -> Result<()> {
    let preview = preview_export(archive, &config.workspace_dir).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        OutputFormat::Plain => {
            println!("Memos:       {}", preview.memo_count);
            println!("Attachments: {}", preview.attachment_count);
            if let (Some(earliest), Some(latest)) = (preview.earliest, preview.latest) {
                println!("Range:       {} .. {}", earliest, latest);
            }
            if !preview.tags.is_empty() {
                let tags: Vec<String> = preview.tags.iter().map(|t| format!("#{}", t)).collect();
                println!("Tags:        {}", tags.join(" "));
            }

            if !preview.memos.is_empty() {
                println!();
                for memo in &preview.memos {
                    let clip = if memo.has_attachments { " [files]" } else { "" };
                    println!("  {}{}  {}", memo.timestamp, clip, memo.tags.join(", "));
                }
                if preview.memo_count > preview.memos.len() {
                    println!("  ... {} more", preview.memo_count - preview.memos.len());
                }
            }
        }
    }

    Ok(())
}
