//! Frontmatter parsing (title, tags, language hint) and outbound wiki/markdown
//! link extraction (spec §4.3 step 7, glossary `DocTag`/`DocLink`).
//!
//! Links are parsed against canonical markdown, which for native markdown
//! files differs from the original bytes only by whitespace-level
//! canonicalization (BOM strip, line-ending normalization, trailing-blank
//! collapse) — close enough that reported ranges stay useful for
//! "open at this line" workflows. Recorded as an Open Question decision.

use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;

use crate::models::{DocLink, LinkSource, LinkType};

#[derive(Debug, Clone, Default)]
pub struct ParsedFrontmatter {
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub language_hint: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFrontmatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, rename = "language")]
    language_hint: Option<String>,
}

/// Split a leading `---\n ... \n---` YAML block off `markdown`, returning the
/// parsed frontmatter (best-effort; malformed YAML yields an empty result
/// rather than failing ingestion) and the remaining body.
pub fn parse_frontmatter(markdown: &str) -> (ParsedFrontmatter, &str) {
    let Some(rest) = markdown.strip_prefix("---\n") else {
        return (ParsedFrontmatter::default(), markdown);
    };
    let Some(end) = rest.find("\n---\n") else {
        return (ParsedFrontmatter::default(), markdown);
    };

    let yaml = &rest[..end];
    let body = &rest[end + 5..];
    let raw: RawFrontmatter = serde_yaml::from_str(yaml).unwrap_or_default();

    (
        ParsedFrontmatter {
            title: raw.title,
            tags: raw.tags,
            language_hint: raw.language_hint,
        },
        body,
    )
}

/// Extract `[[wiki links]]` and `[markdown](links)` from the body, with
/// 1-based, end-exclusive line/column ranges.
pub fn extract_links(source_doc_id: i64, body: &str) -> Vec<DocLink> {
    let mut links = Vec::new();
    for (line_idx, line) in body.split('\n').enumerate() {
        let line_no = (line_idx + 1) as i64;
        extract_wiki_links(source_doc_id, line, line_no, &mut links);
        extract_markdown_links(source_doc_id, line, line_no, &mut links);
    }
    links
}

fn extract_wiki_links(source_doc_id: i64, line: &str, line_no: i64, out: &mut Vec<DocLink>) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'[' && bytes[i + 1] == b'[' {
            if let Some(end) = line[i + 2..].find("]]") {
                let inner = &line[i + 2..i + 2 + end];
                let (target, text) = match inner.split_once('|') {
                    Some((t, d)) => (t.trim(), Some(d.trim().to_string())),
                    None => (inner.trim(), None),
                };
                let (target_ref, anchor) = split_anchor(target);
                out.push(DocLink {
                    source_doc_id,
                    target_ref: target_ref.to_string(),
                    target_ref_norm: normalize_wiki_target(target_ref),
                    target_anchor: anchor,
                    target_collection: None,
                    link_type: LinkType::Wiki,
                    link_text: text,
                    start_line: line_no,
                    start_col: (i + 1) as i64,
                    end_line: line_no,
                    end_col: (i + 2 + end + 2 + 1) as i64,
                    source: LinkSource::Parsed,
                });
                i += 2 + end + 2;
                continue;
            }
        }
        i += 1;
    }
}

fn extract_markdown_links(source_doc_id: i64, line: &str, line_no: i64, out: &mut Vec<DocLink>) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(text_end) = line[i + 1..].find(']') {
                let text_end_abs = i + 1 + text_end;
                if line.as_bytes().get(text_end_abs + 1) == Some(&b'(') {
                    if let Some(paren_end) = line[text_end_abs + 2..].find(')') {
                        let paren_end_abs = text_end_abs + 2 + paren_end;
                        let link_text = line[i + 1..text_end_abs].to_string();
                        let target = &line[text_end_abs + 2..paren_end_abs];
                        let (target_ref, anchor) = split_anchor(target);
                        if !target_ref.is_empty() && !target_ref.starts_with("http://") && !target_ref.starts_with("https://") {
                            out.push(DocLink {
                                source_doc_id,
                                target_ref: target_ref.to_string(),
                                target_ref_norm: normalize_markdown_target(target_ref),
                                target_anchor: anchor,
                                target_collection: None,
                                link_type: LinkType::Markdown,
                                link_text: Some(link_text),
                                start_line: line_no,
                                start_col: (i + 1) as i64,
                                end_line: line_no,
                                end_col: (paren_end_abs + 1 + 1) as i64,
                                source: LinkSource::Parsed,
                            });
                        }
                        i = paren_end_abs + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
}

fn split_anchor(target: &str) -> (&str, Option<String>) {
    match target.split_once('#') {
        Some((t, a)) => (t, Some(a.to_string())),
        None => (target, None),
    }
}

fn normalize_wiki_target(target: &str) -> String {
    target.trim().to_lowercase().nfc().collect()
}

fn normalize_markdown_target(target: &str) -> String {
    target.trim().trim_start_matches("./").to_lowercase().nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontmatter_fields() {
        let md = "---\ntitle: Hello\ntags: [alpha, Beta]\nlanguage: rust\n---\nbody text\n";
        let (fm, body) = parse_frontmatter(md);
        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.tags, vec!["alpha".to_string(), "Beta".to_string()]);
        assert_eq!(fm.language_hint.as_deref(), Some("rust"));
        assert_eq!(body, "body text\n");
    }

    #[test]
    fn no_frontmatter_returns_whole_body() {
        let md = "# Title\nbody\n";
        let (fm, body) = parse_frontmatter(md);
        assert!(fm.title.is_none());
        assert_eq!(body, md);
    }

    #[test]
    fn extracts_wiki_link_with_alias() {
        let links = extract_links(1, "see [[Other Page|here]] for more\n");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_ref, "Other Page");
        assert_eq!(links[0].target_ref_norm, "other page");
        assert_eq!(links[0].link_text.as_deref(), Some("here"));
    }

    #[test]
    fn extracts_markdown_link_with_anchor() {
        let links = extract_links(1, "[docs](./guide.md#setup)\n");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Markdown);
        assert_eq!(links[0].target_anchor.as_deref(), Some("setup"));
        assert_eq!(links[0].target_ref_norm, "guide.md");
    }

    #[test]
    fn skips_http_links() {
        let links = extract_links(1, "[site](https://example.com)\n");
        assert!(links.is_empty());
    }
}
