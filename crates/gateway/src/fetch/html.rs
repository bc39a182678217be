//! Hand-rolled HTML-to-text extraction — no external HTML parser crate.
//!
//! Strips tags character-by-character, skips script/style bodies, maps
//! block-level close-tags to newlines, decodes the common named
//! entities, and collapses whitespace.

/// Extract readable text from `html`, capped at `max_chars`.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag_buf = String::new();

    for ch in html.chars() {
        if out.chars().count() >= max_chars {
            break;
        }

        match ch {
            '<' => {
                in_tag = true;
                tag_buf.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let tag_lower = tag_buf.to_lowercase();

                if tag_lower.starts_with("script") {
                    in_script = true;
                } else if tag_lower.starts_with("/script") {
                    in_script = false;
                } else if tag_lower.starts_with("style") {
                    in_style = true;
                } else if tag_lower.starts_with("/style") {
                    in_style = false;
                }

                if tag_lower.starts_with('/')
                    && matches!(
                        tag_lower.trim_start_matches('/'),
                        "p" | "div"
                            | "h1"
                            | "h2"
                            | "h3"
                            | "h4"
                            | "h5"
                            | "h6"
                            | "li"
                            | "tr"
                            | "br"
                            | "article"
                            | "section"
                            | "header"
                            | "footer"
                            | "blockquote"
                    )
                {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                } else if tag_lower == "br" || tag_lower == "br/" {
                    out.push('\n');
                }

                tag_buf.clear();
            }
            _ if in_tag => {
                tag_buf.push(ch);
            }
            _ if in_script || in_style => {}
            _ => out.push(ch),
        }
    }

    let out = out
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    let mut result = String::new();
    let mut prev_newline = false;
    for line in out.lines() {
        let trimmed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if trimmed.is_empty() {
            if !prev_newline {
                result.push('\n');
                prev_newline = true;
            }
        } else {
            result.push_str(&trimmed);
            result.push('\n');
            prev_newline = false;
        }
    }

    result.trim().to_string()
}

/// Derive a filesystem-safe stem from a URL, for the page-dump side
/// effect.
pub fn safe_dump_name(url: &str) -> String {
    let mut stem = String::new();
    for c in url.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c);
        } else {
            stem.push('_');
        }
    }
    stem.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_keeps_text() {
        let html = "<html><body><p>Hello <b>World</b></p></body></html>";
        assert_eq!(html_to_text(html, 10_000), "Hello World");
    }

    #[test]
    fn skips_script_and_style_bodies() {
        let html = "<p>before</p><script>alert(1)</script><style>.a{color:red}</style><p>after</p>";
        let text = html_to_text(html, 10_000);
        assert!(text.contains("before"));
        assert!(text.contains("after"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn block_tags_become_newlines() {
        let html = "<div>one</div><div>two</div>";
        let text = html_to_text(html, 10_000);
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn decodes_entities() {
        let html = "<p>Tom &amp; Jerry &lt;3&gt;</p>";
        assert_eq!(html_to_text(html, 10_000), "Tom & Jerry <3>");
    }

    #[test]
    fn truncates_at_max_chars() {
        let html = "<p>abcdefghij</p>";
        assert_eq!(html_to_text(html, 5), "abcde");
    }

    #[test]
    fn dump_name_is_filesystem_safe() {
        let name = safe_dump_name("https://example.com/a?b=c&d=e");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
