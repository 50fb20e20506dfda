//! Post-import generation hooks.
//!
//! After memo files are written the importer can hand the parsed memos to
//! two optional generators (a "moments" timeline and a canvas board). What
//! they produce is up to the host; the importer only decides whether to run
//! them. Hooks get shared references, so they cannot alter what was written.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memos::Memo;
use crate::storage::Vault;

use super::config::ImportConfig;

/// How a generation hook should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookMode {
    Skip,
    CopyWithLink,
    CopyWithContent,
}

impl HookMode {
    pub fn is_skip(self) -> bool {
        self == HookMode::Skip
    }
}

#[async_trait]
pub trait PostImportHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        mode: HookMode,
        memos: &[Memo],
        config: &ImportConfig,
        vault: &dyn Vault,
    ) -> Result<()>;
}

/// Hooks available to an import run
#[derive(Default, Clone, Copy)]
pub struct PostImportHooks<'a> {
    pub moments: Option<&'a dyn PostImportHook>,
    pub canvas: Option<&'a dyn PostImportHook>,
}

impl<'a> PostImportHooks<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    /// Hooks paired with their configured mode, in run order
    pub(crate) fn scheduled(
        &self,
        config: &ImportConfig,
    ) -> Vec<(HookMode, &'a dyn PostImportHook)> {
        [(config.moments, self.moments), (config.canvas, self.canvas)]
            .into_iter()
            .filter_map(|(mode, hook)| match hook {
                Some(hook) if !mode.is_skip() => Some((mode, hook)),
                Some(hook) => {
                    log::info!("Skipping {} generation", hook.name());
                    None
                }
                None => None,
            })
            .collect()
    }
}
