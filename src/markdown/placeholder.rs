//! Placeholder tokens that stand in for constructs the converter must not
//! touch, resolved once the destination layout is known.
//!
//! Tokens are plain alphanumerics so Markdown escaping leaves them intact.

/// Stands in for both `<mark>` and `</mark>`
pub const HIGHLIGHT_PLACEHOLDER: &str = "MEMOPORTHIGHLIGHTMARKPLACEHOLDER";

/// Stands in for the attachment base directory (with trailing slash)
pub const ATTACHMENT_PLACEHOLDER: &str = "MEMOPORTATTACHMENTDIRPLACEHOLDER";

/// Prefix the export uses for attachment paths
pub const RAW_ATTACHMENT_PREFIX: &str = "file/";

/// Markdown highlight delimiter
pub const HIGHLIGHT_DELIMITER: &str = "==";

/// Attachment directory inside the vault for a given target root
pub fn attachment_base(target_root: &str) -> String {
    let root = target_root.trim_matches('/');
    if root.is_empty() {
        "files/".to_string()
    } else {
        format!("{}/files/", root)
    }
}

/// Resolve every placeholder in a converted memo.
///
/// With `allow_bi_link`, the first escaped `\[\[` and the first escaped
/// `\]\]` are unescaped. Later occurrences in the same memo are left alone.
pub fn resolve_placeholders(content: &str, target_root: &str, allow_bi_link: bool) -> String {
    let resolved = content
        .replace(HIGHLIGHT_PLACEHOLDER, HIGHLIGHT_DELIMITER)
        .replace(ATTACHMENT_PLACEHOLDER, &attachment_base(target_root));

    if allow_bi_link {
        resolved
            .replacen("\\[\\[", "[[", 1)
            .replacen("\\]\\]", "]]", 1)
    } else {
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_base() {
        assert_eq!(attachment_base("flomo"), "flomo/files/");
        assert_eq!(attachment_base("flomo/"), "flomo/files/");
        assert_eq!(attachment_base(""), "files/");
    }

    #[test]
    fn test_resolve_highlight_and_attachments() {
        let content = format!(
            "{h}key{h} ![x](<{a}a.png>)",
            h = HIGHLIGHT_PLACEHOLDER,
            a = ATTACHMENT_PLACEHOLDER
        );
        assert_eq!(
            resolve_placeholders(&content, "vault", false),
            "==key== ![x](<vault/files/a.png>)"
        );
        assert_eq!(
            resolve_placeholders(&content, "", false),
            "==key== ![x](<files/a.png>)"
        );
    }

    #[test]
    fn test_bi_link_unescape_only_first_occurrence() {
        let content = r"\[\[one\]\] and \[\[two\]\]";
        assert_eq!(
            resolve_placeholders(content, "", true),
            r"[[one]] and \[\[two\]\]"
        );
        assert_eq!(resolve_placeholders(content, "", false), content);
    }
}
