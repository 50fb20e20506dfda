//! Export page sanitising.
//!
//! The export page is the user's own data, so no filtering happens here: a
//! full HTML5 parse followed by re-serialisation is enough to close stray
//! tags and normalise entities before the memo parser walks it.

use std::path::Path;

use scraper::Html;

use crate::error::Result;

/// Re-serialise `raw` as a well-formed HTML document
pub fn sanitize_html(raw: &str) -> String {
    Html::parse_document(raw).html()
}

/// Read the export page at `path` and sanitise it
pub async fn read_sanitized(path: &Path) -> Result<String> {
    log::info!("Sanitizing export page {:?}", path);

    let bytes = tokio::fs::read(path).await?;
    let raw = String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());

    Ok(sanitize_html(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unclosed_tags_are_closed() {
        let html = sanitize_html("<div class=\"memo\"><p>open paragraph<div>next");
        assert!(html.starts_with("<html>"));
        assert!(html.contains("<p>open paragraph</p>"));
        assert!(html.ends_with("</html>"));
    }

    #[test]
    fn test_script_and_entities_are_tolerated() {
        let html = sanitize_html("<p>Tom &amp Jerry</p><script>if (a < b) {}</script>");
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("<script>if (a < b) {}</script>"));
    }

    #[test]
    fn test_sanitize_is_stable() {
        let once = sanitize_html("<ul><li>one<li>two</ul>");
        assert_eq!(sanitize_html(&once), once);
    }

    #[tokio::test]
    async fn test_read_sanitized_accepts_invalid_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("page.html");
        std::fs::write(&path, b"<p>caf\xe9</p>").unwrap();

        let html = read_sanitized(&path).await.unwrap();
        assert!(html.contains("<p>caf\u{fffd}</p>"));
    }
}
