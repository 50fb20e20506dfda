//! Memo extraction from a sanitised export page.
//!
//! The export lists memos newest first. Each memo node carries three marker
//! children:
//!
//! ```html
//! <div class="memo">
//!   <div class="time">2024-03-31 10:20:30</div>
//!   <div class="content"><p>...</p></div>
//!   <div class="files"><img src="file/2024-03-31/x.png"></div>
//! </div>
//! ```
//!
//! and the page has one `<select id="tag">` whose first option means "all".

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::{NoExpand, Regex};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::error::{ImportError, Result};
use crate::markdown::{html_to_markdown, HIGHLIGHT_PLACEHOLDER};

/// Ordered tags from the export's tag selector
pub type TagList = Vec<String>;

/// One exported memo
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    /// Raw timestamp text, e.g. `2024-03-31 10:20:30`
    pub timestamp: String,
    /// Filesystem-safe form of the timestamp
    pub title: String,
    /// Date part of the timestamp, the merge-by-date key
    pub date: String,
    /// Time-of-day part of the timestamp
    pub time: String,
    /// Tags from the global list that appear in this memo's text
    pub tags: Vec<String>,
    /// Body markup with highlight tags already replaced
    #[serde(skip)]
    pub body_html: String,
    /// Attachment markup
    #[serde(skip)]
    pub files_html: String,
    /// Converted Markdown with header line, placeholders unresolved
    pub content: String,
}

impl Memo {
    /// Parse the timestamp, if it is in one of the export's formats
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M"))
            .ok()
    }

    pub fn has_attachments(&self) -> bool {
        !self.files_html.trim().is_empty()
    }
}

/// Everything parsed out of one export page
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoExport {
    /// Memos in document order
    pub memos: Vec<Memo>,
    pub tags: TagList,
}

/// Replace `-`, `:` and whitespace with `_`
pub fn memo_title(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|c| {
            if c == '-' || c == ':' || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Header line placed above every memo body
pub fn memo_header(date: &str, time: &str) -> String {
    format!("📅 [[{}]] {}", date, time)
}

/// Collapse `<mark>` and `</mark>` into the same placeholder token.
///
/// Both tags map to one token, so a highlighted span renders as `==text==`
/// whether or not the source tags were balanced.
pub fn replace_highlight_tags(html: &str) -> String {
    static MARK_TAG: OnceLock<Regex> = OnceLock::new();
    let mark_tag =
        MARK_TAG.get_or_init(|| Regex::new(r"(?i)</?mark(\s[^>]*)?>").expect("static regex"));
    mark_tag
        .replace_all(html, NoExpand(HIGHLIGHT_PLACEHOLDER))
        .into_owned()
}

/// Matches `#tag` only when the tag is not the start of a longer tag:
/// `#work` is found in `#work, later` but not in `#workshop` or `#work/sub`.
fn tag_pattern(tag: &str) -> Option<Regex> {
    if tag.is_empty() {
        return None;
    }
    Regex::new(&format!(r"#{}(?:$|[^\w/])", regex::escape(tag))).ok()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ImportError::InvalidSelector(format!("{}: {:?}", css, e)))
}

struct MemoSelectors {
    memo: Selector,
    time: Selector,
    content: Selector,
    files: Selector,
    tag_options: Selector,
}

impl MemoSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            memo: selector(".memo")?,
            time: selector(".time")?,
            content: selector(".content")?,
            files: selector(".files")?,
            tag_options: selector("#tag option")?,
        })
    }
}

fn required<'a>(
    memo: ElementRef<'a>,
    selector: &Selector,
    index: usize,
    marker: &'static str,
) -> Result<ElementRef<'a>> {
    memo.select(selector)
        .next()
        .ok_or(ImportError::MissingMarker { index, marker })
}

/// Parse a sanitised export page into memos and tags.
///
/// A memo node without its `time`, `content` or `files` child aborts the
/// parse: the export format has changed and skipping would lose notes.
pub fn parse_memo_export(html: &str) -> Result<MemoExport> {
    let document = Html::parse_document(html);
    let selectors = MemoSelectors::new()?;

    let tags = load_tags(&document, &selectors);

    let memo_nodes: Vec<ElementRef<'_>> = document.select(&selectors.memo).collect();
    if memo_nodes.is_empty() {
        return Err(ImportError::NoMemos);
    }

    let tag_patterns: Vec<(String, Regex)> = tags
        .iter()
        .filter_map(|tag| tag_pattern(tag).map(|re| (tag.clone(), re)))
        .collect();

    let mut memos = Vec::with_capacity(memo_nodes.len());
    for (index, node) in memo_nodes.into_iter().enumerate() {
        memos.push(load_memo(node, index, &selectors, &tag_patterns)?);
    }

    log::info!("Parsed {} memos and {} tags", memos.len(), tags.len());

    Ok(MemoExport { memos, tags })
}

fn load_tags(document: &Html, selectors: &MemoSelectors) -> TagList {
    let tags: TagList = document
        .select(&selectors.tag_options)
        .skip(1)
        .map(|option| option.text().collect::<String>().trim().to_string())
        .collect();

    if tags.is_empty() {
        log::warn!("Export page has no tag options");
    }

    tags
}

fn load_memo(
    node: ElementRef<'_>,
    index: usize,
    selectors: &MemoSelectors,
    tags: &[(String, Regex)],
) -> Result<Memo> {
    let time_node = required(node, &selectors.time, index, "time")?;
    let content_node = required(node, &selectors.content, index, "content")?;
    let files_node = required(node, &selectors.files, index, "files")?;

    let timestamp = time_node.text().collect::<String>().trim().to_string();
    let mut parts = timestamp.split_whitespace();
    let date = parts.next().unwrap_or_default().to_string();
    let time = parts.next().unwrap_or_default().to_string();

    let body_html = replace_highlight_tags(&content_node.inner_html());
    let files_html = files_node.inner_html();

    let body_text: String = content_node.text().collect();
    let mut memo_tags: Vec<String> = Vec::new();
    for (tag, pattern) in tags {
        if !memo_tags.contains(tag) && pattern.is_match(&body_text) {
            memo_tags.push(tag.clone());
        }
    }

    let content = format!(
        "{}\n\n{}\n{}",
        memo_header(&date, &time),
        html_to_markdown(&body_html),
        html_to_markdown(&files_html)
    );

    log::debug!("Memo #{} at {} converted", index, timestamp);

    Ok(Memo {
        title: memo_title(&timestamp),
        timestamp,
        date,
        time,
        tags: memo_tags,
        body_html,
        files_html,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::ATTACHMENT_PLACEHOLDER;
    use crate::memos::sanitize_html;

    const EXPORT: &str = r#"<html><head><title>memos</title></head><body>
<select id="tag"><option>All tags</option><option>work</option><option>life</option><option>work</option></select>
<div class="memos">
<div class="memo"><div class="time">2024-03-02 09:15:00</div><div class="content"><p>Plan #work <mark>key</mark> item</p></div><div class="files"><img src="file/2024-03-02/a b.png" alt="shot"></div></div>
<div class="memo"><div class="time">2024-03-01 22:10:05</div><div class="content"><p>First</p></div><div class="files"></div></div>
</div></body></html>"#;

    #[test]
    fn test_memo_title() {
        assert_eq!(memo_title("2024-03-31 10:20:30"), "2024_03_31_10_20_30");
    }

    #[test]
    fn test_replace_highlight_tags() {
        let replaced = replace_highlight_tags("<mark>a</mark> <MARK class=\"x\">b");
        let p = HIGHLIGHT_PLACEHOLDER;
        assert_eq!(replaced, format!("{p}a{p} {p}b"));
    }

    #[test]
    fn test_parse_export() {
        let export = parse_memo_export(&sanitize_html(EXPORT)).unwrap();

        assert_eq!(export.tags, vec!["work", "life", "work"]);
        assert_eq!(export.memos.len(), 2);

        let first = &export.memos[0];
        assert_eq!(first.timestamp, "2024-03-02 09:15:00");
        assert_eq!(first.title, "2024_03_02_09_15_00");
        assert_eq!(first.date, "2024-03-02");
        assert_eq!(first.time, "09:15:00");
        assert_eq!(first.tags, vec!["work"]);
        assert!(first.has_attachments());
        assert!(first.created_at().is_some());

        let p = HIGHLIGHT_PLACEHOLDER;
        assert_eq!(
            first.content,
            format!(
                "📅 [[2024-03-02]] 09:15:00\n\nPlan #work {p}key{p} item\n![shot](<{}2024-03-02/a b.png>)",
                ATTACHMENT_PLACEHOLDER
            )
        );
        assert!(!first.content.contains("<mark>"));
        assert!(!first.content.contains("file/"));

        let second = &export.memos[1];
        assert_eq!(second.content, "📅 [[2024-03-01]] 22:10:05\n\nFirst\n");
        assert!(!second.has_attachments());
    }

    #[test]
    fn test_memo_tags_need_whole_tag() {
        let html = r#"<select id="tag"><option>All</option><option>work</option><option>life</option><option>idea</option></select>
<div class="memo"><div class="time">2024-01-02 10:00:00</div><div class="content"><p>#workshop notes, see #work/sub and #life.</p></div><div class="files"></div></div>
<div class="memo"><div class="time">2024-01-01 10:00:00</div><div class="content"><p>plain #work</p><p>#idea</p></div><div class="files"></div></div>"#;
        let export = parse_memo_export(&sanitize_html(html)).unwrap();

        assert_eq!(export.memos[0].tags, vec!["life"]);
        assert_eq!(export.memos[1].tags, vec!["work", "idea"]);
    }

    #[test]
    fn test_missing_content_marker_is_fatal() {
        let html = r#"<div class="memo"><div class="time">2024-01-01 10:00:00</div><div class="files"></div></div>"#;
        let result = parse_memo_export(&sanitize_html(html));
        assert!(matches!(
            result,
            Err(ImportError::MissingMarker { index: 0, marker: "content" })
        ));
    }

    #[test]
    fn test_missing_marker_in_later_memo_is_fatal() {
        let html = r#"
<div class="memo"><div class="time">2024-01-02 10:00:00</div><div class="content">ok</div><div class="files"></div></div>
<div class="memo"><div class="content">no time</div><div class="files"></div></div>"#;
        let result = parse_memo_export(&sanitize_html(html));
        assert!(matches!(
            result,
            Err(ImportError::MissingMarker { index: 1, marker: "time" })
        ));
    }

    #[test]
    fn test_page_without_memos() {
        let result = parse_memo_export(&sanitize_html("<p>nothing here</p>"));
        assert!(matches!(result, Err(ImportError::NoMemos)));
    }
}
