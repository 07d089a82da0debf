//! DOCX converter, grounded on the teacher's `extract_docx` (`extract.rs`).

use super::ooxml::{open_archive, read_entry_bounded, collect_element_text, MAX_XML_ENTRY_BYTES};
use super::{ConvertError, ConvertErrorKind, Converter, RawConversion};

pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub struct DocxConverter;

impl Converter for DocxConverter {
    fn id(&self) -> &'static str {
        "adapter.docx"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool {
        mime == MIME_DOCX || ext == Some("docx")
    }

    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError> {
        let mut archive = open_archive(bytes)?;
        if archive.by_name("word/document.xml").is_err() {
            return Err(ConvertError::new(
                ConvertErrorKind::Corrupt,
                "word/document.xml not found",
            ));
        }
        let xml = read_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
        let text = collect_element_text(&xml, b"t")?;
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
    fn invalid_zip_is_corrupt() {
        let c = DocxConverter;
        let err = c.convert(b"not a zip").unwrap_err();
        assert_eq!(err.kind, ConvertErrorKind::Corrupt);
    }
}
