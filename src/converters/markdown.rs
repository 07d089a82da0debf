//! Native markdown converter. Always wins over adapters (spec §4.2).

use super::{ConvertError, Converter, RawConversion};

pub struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn id(&self) -> &'static str {
        "native.markdown"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool {
        mime == "text/markdown" || matches!(ext, Some("md") | Some("markdown") | Some("mdx"))
    }

    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError> {
        let text = std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());

        // A parse pass surfaces malformed input without changing the output:
        // markdown is forgiving by design, so we don't reject on parser
        // events, only on genuinely non-text bytes above.
        let _events: Vec<_> = pulldown_cmark::Parser::new(&text).collect();

        let title = first_heading(&text);
        Ok(RawConversion {
            markdown: text,
            title,
            language_hint: None,
        })
    }
}

fn first_heading(text: &str) -> Option<String> {
    use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

    let parser = Parser::new(text);
    let mut in_h1 = false;
    let mut buf = String::new();
    for event in parser {
        match event {
            Event::Start(Tag::Heading { level: HeadingLevel::H1, .. }) => in_h1 = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_h1 => {
                return Some(buf.trim().to_string());
            }
            Event::Text(t) if in_h1 => buf.push_str(&t),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_h1_title() {
        let c = MarkdownConverter;
        let result = c.convert(b"# Hello World\n\nbody text\n").unwrap();
        assert_eq!(result.title.as_deref(), Some("Hello World"));
        assert!(result.markdown.contains("body text"));
    }

    #[test]
    fn can_handle_by_extension() {
        let c = MarkdownConverter;
        assert!(c.can_handle("text/plain", Some("md")));
        assert!(!c.can_handle("text/plain", Some("txt")));
    }
}
