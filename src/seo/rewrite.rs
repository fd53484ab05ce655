//! Regex-based substitution of SEO fields into rendered HTML.
//!
//! This is a best-effort text rewrite against well-known tag shapes, not an
//! HTML parser. Only the first occurrence of each tag is touched and markup
//! that does not match is left exactly as it was.

use std::borrow::Cow;
use std::ops::Range;

use regex::{Captures, Regex};

use super::record::SeoOverride;

const H1_PATTERN: &str = r"(?is)<h1([^>]*)>(.*?)</h1>";
const TITLE_PATTERN: &str = r"(?is)<title>(.*?)</title>";
const DESCRIPTION_PATTERN: &str = r#"(?is)<meta\s+name="description"\s+content="[^"]*"\s*/>"#;

/// Applies [`SeoOverride`] records to HTML documents.
#[derive(Debug, Clone)]
pub struct SeoRewriter {
    h1: Regex,
    title: Regex,
    description: Regex,
}

impl SeoRewriter {
    /// Compile the tag patterns.
    pub fn new() -> Self {
        Self {
            h1: Regex::new(H1_PATTERN).expect("valid h1 regex"),
            title: Regex::new(TITLE_PATTERN).expect("valid title regex"),
            description: Regex::new(DESCRIPTION_PATTERN).expect("valid meta description regex"),
        }
    }

    /// Rewrite `html` with the non-blank fields of `record`.
    ///
    /// All tags are located in the original text before anything is
    /// replaced, so override text is never matched again. Returns the input
    /// unchanged (borrowed) when there is no record or nothing matched.
    pub fn rewrite<'a>(&self, html: &'a str, record: Option<&SeoOverride>) -> Cow<'a, str> {
        let Some(record) = record else {
            return Cow::Borrowed(html);
        };

        let mut edits = Vec::with_capacity(3);
        if let Some(h1) = record.h1() {
            edits.extend(first_match(html, &self.h1, |caps| {
                format!("<h1{}>{}</h1>", &caps[1], h1)
            }));
        }
        if let Some(title) = record.title() {
            edits.extend(first_match(html, &self.title, |_| {
                format!("<title>{}</title>", title)
            }));
        }
        if let Some(description) = record.description() {
            edits.extend(first_match(html, &self.description, |_| {
                format!(
                    r#"<meta name="description" content="{}"/>"#,
                    description.replace('"', "&quot;")
                )
            }));
        }

        splice(html, edits)
    }
}

impl Default for SeoRewriter {
    fn default() -> Self {
        Self::new()
    }
}

fn first_match<F>(html: &str, re: &Regex, replacement: F) -> Option<(Range<usize>, String)>
where
    F: Fn(&Captures<'_>) -> String,
{
    re.captures(html).and_then(|caps| {
        let whole = caps.get(0)?;
        Some((whole.range(), replacement(&caps)))
    })
}

/// Apply non-overlapping edits in document order. An edit that overlaps an
/// earlier one is dropped.
fn splice(html: &str, mut edits: Vec<(Range<usize>, String)>) -> Cow<'_, str> {
    if edits.is_empty() {
        return Cow::Borrowed(html);
    }
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    for (range, new) in edits {
        if range.start < pos {
            continue;
        }
        out.push_str(&html[pos..range.start]);
        out.push_str(&new);
        pos = range.end;
    }
    out.push_str(&html[pos..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(html: &str, record: &SeoOverride) -> String {
        SeoRewriter::new().rewrite(html, Some(record)).into_owned()
    }

    #[test]
    fn test_no_record_is_byte_identical() {
        let html = "<html><title>Old</title><h1>Hi</h1></html>";
        let out = SeoRewriter::new().rewrite(html, None);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, html);
    }

    #[test]
    fn test_h1_keeps_attributes() {
        let record = SeoOverride::new("/").with_h1("Hello");
        assert_eq!(
            rewrite(r#"<h1 class="x">Bye</h1>"#, &record),
            r#"<h1 class="x">Hello</h1>"#
        );
    }

    #[test]
    fn test_title_first_occurrence_only() {
        let record = SeoOverride::new("/").with_title("New");
        let out = rewrite(
            "<head><title>Old</title></head><body><title>Other</title></body>",
            &record,
        );
        assert_eq!(
            out,
            "<head><title>New</title></head><body><title>Other</title></body>"
        );
        assert_eq!(out.matches("<title>New</title>").count(), 1);
    }

    #[test]
    fn test_meta_description_replaced() {
        let record = SeoOverride::new("/").with_description("Fresh \"quoted\" text");
        let out = rewrite(
            r#"<meta charset="utf-8"/><meta name="description" content="stale"/>"#,
            &record,
        );
        assert_eq!(
            out,
            r#"<meta charset="utf-8"/><meta name="description" content="Fresh &quot;quoted&quot; text"/>"#
        );
    }

    #[test]
    fn test_case_insensitive_and_multiline() {
        let record = SeoOverride::new("/").with_h1("Tools").with_title("Toolset");
        let html = "<TITLE>\n  Old\n</TITLE>\n<H1 id=\"top\">\nline one\nline two\n</H1>";
        assert_eq!(
            rewrite(html, &record),
            "<title>Toolset</title>\n<h1 id=\"top\">Tools</h1>"
        );
    }

    #[test]
    fn test_blank_fields_leave_content() {
        let record = SeoOverride::new("/").with_title("").with_h1("   ");
        let html = "<title>Keep</title><h1>Keep</h1>";
        assert_eq!(rewrite(html, &record), html);
    }

    #[test]
    fn test_malformed_markup_is_left_alone() {
        let record = SeoOverride::new("/")
            .with_title("T")
            .with_h1("H")
            .with_description("D");
        let html = "<title>unterminated <h1 class='a' <meta name=\"description\">";
        assert_eq!(rewrite(html, &record), html);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let record = SeoOverride::new("/")
            .with_title("T")
            .with_h1("H")
            .with_description("D");
        let html = r#"<title>a</title><meta name="description" content="b"/><h1>c</h1><p>rest</p>"#;

        let once = rewrite(html, &record);
        let twice = rewrite(&once, &record);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replacement_text_is_literal() {
        let record = SeoOverride::new("/").with_h1("Costs $1 and ${2}");
        assert_eq!(rewrite("<h1>x</h1>", &record), "<h1>Costs $1 and ${2}</h1>");
    }

    #[test]
    fn test_override_text_is_not_rewritten_again() {
        let record = SeoOverride::new("/")
            .with_h1("<title>Inner</title>")
            .with_title("Outer");
        let html = "<h1>x</h1><title>Old</title>";
        assert_eq!(
            rewrite(html, &record),
            "<h1><title>Inner</title></h1><title>Outer</title>"
        );
    }

    #[test]
    fn test_overlapping_matches_keep_first() {
        let record = SeoOverride::new("/").with_h1("H").with_title("T");
        let html = "<h1><title>t</title></h1>";
        assert_eq!(rewrite(html, &record), "<h1>H</h1>");
    }
}
