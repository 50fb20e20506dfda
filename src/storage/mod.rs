//! Filesystem side of an import: archive unpacking, the scratch workspace
//! and the destination vault.

pub mod archive;
pub mod vault;
mod workspace;

pub use archive::{extract_archive, locate_export, ArchiveEntry, EntryKind, ExportLayout};
pub use vault::{join_vault_path, FileSystemVault, MemoryVault, Vault};
pub use workspace::ScratchWorkspace;
