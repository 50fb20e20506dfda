//! HTML to Markdown conversion for memo bodies.
//!
//! Walks the parsed fragment once, bottom-up, producing Markdown per node and
//! joining siblings with at most one blank line between blocks. List items
//! and images have custom rules; attachment paths are replaced by
//! [`ATTACHMENT_PLACEHOLDER`] so they can be resolved at write time.

use std::sync::OnceLock;

use regex::{NoExpand, Regex};
use scraper::{ElementRef, Html, Node};

use super::placeholder::{ATTACHMENT_PLACEHOLDER, RAW_ATTACHMENT_PREFIX};

/// Elements rendered as blocks (separated from their siblings by a blank line)
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "audio", "blockquote", "body", "canvas", "center", "dd",
    "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "frameset",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "li", "main", "menu",
    "nav", "noframes", "noscript", "ol", "output", "p", "pre", "section", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "ul",
];

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn is_html_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c')
}

/// Conversion options
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Marker used for unordered list items
    pub bullet_marker: String,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            bullet_marker: "-".to_string(),
        }
    }
}

/// Convert an HTML fragment to Markdown with the default options
pub fn html_to_markdown(html: &str) -> String {
    convert_html(html, &MarkdownOptions::default())
}

/// Convert an HTML fragment to Markdown
pub fn convert_html(html: &str, options: &MarkdownOptions) -> String {
    let fragment = Html::parse_fragment(html);
    let converter = Converter { options };

    let raw = converter.children(fragment.root_element(), false);
    let trimmed = raw
        .trim_start_matches(|c| c == '\t' || c == '\r' || c == '\n')
        .trim_end();

    post_process(trimmed)
}

/// String fixes applied to the converter output.
///
/// Literal brackets are unescaped, and any `](file/` link target that the
/// image rule did not cover (anchors, mostly) is pointed at the attachment
/// placeholder.
fn post_process(markdown: &str) -> String {
    static FILE_LINK: OnceLock<Regex> = OnceLock::new();
    let file_link =
        FILE_LINK.get_or_init(|| Regex::new(r"(?i)\]\(file/").expect("static regex"));

    let unescaped = markdown.replace("\\[", "[").replace("\\]", "]");
    let replacement = format!("]({}", ATTACHMENT_PLACEHOLDER);
    file_link
        .replace_all(&unescaped, NoExpand(&replacement))
        .into_owned()
}

/// Join two converted pieces, keeping at most one blank line between them
fn join(output: &mut String, addition: &str) {
    let kept = output.trim_end_matches('\n').len();
    let trailing = output.len() - kept;
    let rest = addition.trim_start_matches('\n');
    let leading = addition.len() - rest.len();

    output.truncate(kept);
    output.push_str(&"\n".repeat(trailing.max(leading).min(2)));
    output.push_str(rest);
}

/// Backslash-escape Markdown syntax in a text node
fn escape_markdown(text: &str) -> String {
    static ESCAPES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    let escapes = ESCAPES.get_or_init(|| {
        [
            (r"\\", r"\\"),
            (r"\*", r"\*"),
            (r"^-", r"\-"),
            (r"^\+ ", r"\+ "),
            (r"^(=+)", r"\$1"),
            (r"^(#{1,6}) ", r"\$1 "),
            (r"`", r"\`"),
            (r"^~~~", r"\~~~"),
            (r"\[", r"\["),
            (r"\]", r"\]"),
            (r"^>", r"\>"),
            (r"_", r"\_"),
            (r"^(\d+)\. ", r"$1\. "),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("static regex"), replacement))
        .collect()
    });

    escapes
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

fn collapse_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let whitespace =
        WHITESPACE.get_or_init(|| Regex::new(r"[ \t\r\n\x0c]+").expect("static regex"));
    whitespace.replace_all(text, " ").into_owned()
}

struct Converter<'o> {
    options: &'o MarkdownOptions,
}

impl Converter<'_> {
    fn children(&self, parent: ElementRef<'_>, in_pre: bool) -> String {
        let parent_is_block = is_block(parent.value().name());
        let mut output = String::new();

        for child in parent.children() {
            let piece = match child.value() {
                Node::Text(text) => {
                    let raw: &str = text;
                    if in_pre {
                        raw.to_string()
                    } else {
                        let at_start = match child.prev_sibling() {
                            None => parent_is_block,
                            Some(prev) => ElementRef::wrap(prev)
                                .map_or(false, |el| is_block(el.value().name())),
                        };
                        let at_end = match child.next_sibling() {
                            None => parent_is_block,
                            Some(next) => ElementRef::wrap(next)
                                .map_or(false, |el| is_block(el.value().name())),
                        };
                        self.text(raw, at_start, at_end)
                    }
                }
                Node::Element(_) => match ElementRef::wrap(child) {
                    Some(el) => self.element(el, in_pre),
                    None => String::new(),
                },
                _ => String::new(),
            };

            join(&mut output, &piece);
        }

        output
    }

    fn text(&self, raw: &str, at_start: bool, at_end: bool) -> String {
        if raw.chars().all(is_html_whitespace) {
            return if at_start || at_end {
                String::new()
            } else {
                " ".to_string()
            };
        }

        let collapsed = collapse_whitespace(raw);
        let mut text = collapsed.as_str();
        if at_start {
            text = text.trim_start_matches(' ');
        }
        if at_end {
            text = text.trim_end_matches(' ');
        }
        escape_markdown(text)
    }

    fn element(&self, el: ElementRef<'_>, in_pre: bool) -> String {
        let name = el.value().name();
        match name {
            "script" | "style" | "noscript" | "template" | "head" => String::new(),
            "br" => {
                if in_pre {
                    "\n".to_string()
                } else {
                    "  \n".to_string()
                }
            }
            "hr" => "\n\n* * *\n\n".to_string(),
            "img" => self.image(el),
            "pre" => self.code_block(el),
            "code" => self.inline_code(el, in_pre),
            "ul" | "ol" => self.list(el, in_pre),
            "li" => self.list_item(el, in_pre),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = usize::from(name.as_bytes()[1] - b'0');
                self.heading(el, level, in_pre)
            }
            "blockquote" => {
                let content = self.children(el, in_pre);
                let quoted = content
                    .trim_matches('\n')
                    .lines()
                    .map(|line| format!("> {}", line))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("\n\n{}\n\n", quoted)
            }
            "strong" | "b" => self.wrap(el, in_pre, "**"),
            "em" | "i" => self.wrap(el, in_pre, "_"),
            "del" | "s" | "strike" => self.wrap(el, in_pre, "~~"),
            "a" => self.link(el, in_pre),
            _ => {
                let content = self.children(el, in_pre);
                if is_block(name) {
                    format!("\n\n{}\n\n", content)
                } else {
                    content
                }
            }
        }
    }

    fn wrap(&self, el: ElementRef<'_>, in_pre: bool, delimiter: &str) -> String {
        let content = self.children(el, in_pre);
        if content.trim().is_empty() {
            return String::new();
        }
        format!("{delimiter}{content}{delimiter}")
    }

    fn list(&self, el: ElementRef<'_>, in_pre: bool) -> String {
        let content = self.children(el, in_pre);

        let is_last_in_item = el
            .parent()
            .and_then(ElementRef::wrap)
            .filter(|parent| parent.value().name() == "li")
            .and_then(|parent| {
                parent
                    .children()
                    .filter(|n| n.value().is_element())
                    .last()
            })
            .map_or(false, |last| last.id() == el.id());

        if is_last_in_item {
            format!("\n{}", content)
        } else {
            format!("\n\n{}\n\n", content)
        }
    }

    /// List item rule.
    ///
    /// Leading newlines are dropped, trailing ones collapse to one, and every
    /// remaining newline is followed by a four-space indent. Items made of
    /// paragraphs therefore come out as a loose list. Ordered items are
    /// numbered `start + position among element siblings`.
    fn list_item(&self, el: ElementRef<'_>, in_pre: bool) -> String {
        let content = self.children(el, in_pre);
        let content = content.trim_start_matches('\n');

        // Trailing newlines collapse to one, which is indented like the rest
        let collapsed = match content.strip_suffix('\n') {
            Some(_) => format!("{}\n", content.trim_end_matches('\n')),
            None => content.to_string(),
        };
        let mut body = collapsed.replace('\n', "\n    ");

        let ordered_parent = el
            .parent()
            .and_then(ElementRef::wrap)
            .filter(|parent| parent.value().name() == "ol");

        let prefix = match ordered_parent {
            Some(parent) => {
                let start = parent
                    .value()
                    .attr("start")
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .unwrap_or(1);
                let index = el
                    .prev_siblings()
                    .filter(|n| n.value().is_element())
                    .count() as i64;
                format!("{}.  ", start + index)
            }
            None => format!("{} ", self.options.bullet_marker),
        };

        let has_next = el.next_siblings().any(|n| match n.value() {
            Node::Element(_) => true,
            Node::Text(text) => !text.chars().all(is_html_whitespace),
            _ => false,
        });

        if has_next && !body.ends_with('\n') {
            body.push('\n');
        }

        format!("{}{}", prefix, body)
    }

    /// Image rule.
    ///
    /// Attachment sources are rewritten to the placeholder and wrapped in
    /// angle brackets so paths with spaces stay valid link targets.
    fn image(&self, el: ElementRef<'_>) -> String {
        let alt = el.value().attr("alt").unwrap_or("");
        let src = el.value().attr("src").unwrap_or("");
        if src.is_empty() {
            return String::new();
        }

        let src = match src.strip_prefix(RAW_ATTACHMENT_PREFIX) {
            Some(rest) => format!("{}{}", ATTACHMENT_PLACEHOLDER, rest),
            None => src.to_string(),
        };

        let url = if src.starts_with(ATTACHMENT_PLACEHOLDER) {
            format!("<{}>", src)
        } else {
            src
        };

        format!("![{}]({})", alt, url)
    }

    fn link(&self, el: ElementRef<'_>, in_pre: bool) -> String {
        let content = self.children(el, in_pre);
        let href = el.value().attr("href").unwrap_or("");
        if href.is_empty() {
            return content;
        }

        let title = el
            .value()
            .attr("title")
            .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
            .unwrap_or_default();

        format!("[{}]({}{})", content, href, title)
    }

    fn inline_code(&self, el: ElementRef<'_>, in_pre: bool) -> String {
        let code: String = el.text().collect();
        if in_pre {
            return code;
        }
        if code.is_empty() {
            return String::new();
        }

        let fence = if code.contains('`') { "``" } else { "`" };
        let pad = if code.starts_with('`') || code.ends_with('`') {
            " "
        } else {
            ""
        };
        format!("{fence}{pad}{code}{pad}{fence}")
    }

    /// Setext underline for levels 1 and 2, `#` prefix below that
    fn heading(&self, el: ElementRef<'_>, level: usize, in_pre: bool) -> String {
        let content = self.children(el, in_pre);
        if level <= 2 {
            let underline = if level == 1 { "=" } else { "-" };
            format!(
                "\n\n{}\n{}\n\n",
                content,
                underline.repeat(content.chars().count())
            )
        } else {
            format!("\n\n{} {}\n\n", "#".repeat(level), content)
        }
    }

    /// `<pre><code>` becomes an indented code block; any other `<pre>` keeps
    /// its text verbatim as a plain block.
    fn code_block(&self, el: ElementRef<'_>) -> String {
        let code = el
            .first_child()
            .and_then(ElementRef::wrap)
            .filter(|child| child.value().name() == "code");

        match code {
            Some(code) => {
                let text: String = code.text().collect();
                format!("\n\n    {}\n\n", text.replace('\n', "\n    "))
            }
            None => format!("\n\n{}\n\n", self.children(el, true)),
        }
    }
}
