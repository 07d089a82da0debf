//! Native plain-text converter. Always wins over adapters (spec §4.2).

use super::{ConvertError, Converter, RawConversion};

pub struct PlaintextConverter;

impl Converter for PlaintextConverter {
    fn id(&self) -> &'static str {
        "native.plaintext"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool {
        mime == "text/plain" || matches!(ext, Some("txt") | Some("text") | Some("log"))
    }

    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError> {
        let text = std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
        Ok(RawConversion {
            markdown: text,
            title: None,
            language_hint: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_text_through() {
        let c = PlaintextConverter;
        let result = c.convert(b"hello\nworld\n").unwrap();
        assert_eq!(result.markdown, "hello\nworld\n");
        assert!(result.title.is_none());
    }
}
