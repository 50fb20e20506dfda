use anyhow::Result;
use memoport_lib::importer::{run_import, ImportConfig, PostImportHooks, ProgressBus};
use memoport_lib::storage::FileSystemVault;

use crate::OutputFormat;

pub async fn run(config: &ImportConfig, format: &OutputFormat) -> Result<()> {
    let vault = FileSystemVault::new(config.vault_base.clone());

    // Progress goes to stderr so JSON output stays parseable
    let progress = ProgressBus::new();
    let _listener = progress.subscribe(|update| {
        match update.percent {
            Some(percent) => eprintln!("[{:>3}%] {}", percent, update.message),
            None => eprintln!("       {}", update.message),
        }
        Ok(())
    });

    let summary = run_import(config, &vault, &progress, PostImportHooks::none()).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Plain => {
            println!("Import completed. Total: {} memos", summary.memo_count);
            println!(
                "{} files written, {} attachments copied into {}",
                summary.file_count,
                summary.attachment_count,
                config.vault_base.display()
            );
        }
    }

    Ok(())
}
