//! Import memo-service HTML exports into a Markdown vault.
//!
//! The pipeline lives in [`importer`]; the lower layers unpack archives
//! ([`storage`]), parse the export page ([`memos`]) and convert memo markup
//! to Markdown ([`markdown`]).

pub mod error;
pub mod importer;
pub mod markdown;
pub mod memos;
pub mod storage;

pub use error::{ImportError, Result};
