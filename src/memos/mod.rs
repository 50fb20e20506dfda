//! Memo export parsing
//!
//! Turns the export's HTML page into memo records with Markdown content.

mod parser;
mod sanitize;

pub use parser::*;
pub use sanitize::{read_sanitized, sanitize_html};
