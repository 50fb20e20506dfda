//! Markdown generation for imported memos

mod convert;
pub mod placeholder;

pub use convert::{convert_html, html_to_markdown, MarkdownOptions};
pub use placeholder::{
    attachment_base, resolve_placeholders, ATTACHMENT_PLACEHOLDER, HIGHLIGHT_PLACEHOLDER,
};
