//! Export import: configuration, progress, hooks and the pipeline itself

pub mod config;
mod fetch;
pub mod hooks;
mod orchestrator;
mod preview;
pub mod progress;

#[cfg(test)]
mod testing;

pub use config::{
    default_config_path, default_workspace_dir, load_import_config, save_import_config,
    ImportConfig,
};
pub use fetch::{sync_and_import, ArchiveFetcher, Credentials};
pub use hooks::{HookMode, PostImportHook, PostImportHooks};
pub use orchestrator::{
    group_memos, memo_target, run_import, FileGroup, FileGroups, ImportSummary, MemoTarget,
    MEMO_SEPARATOR,
};
pub use preview::{preview_export, ExportPreview, MemoPreview};
pub use progress::{ProgressBus, ProgressUpdate, Subscription};
