//! PPTX converter, grounded on the teacher's `extract_pptx` (`extract.rs`).

use super::ooxml::{collect_element_text, open_archive, read_entry_bounded, sort_numbered, MAX_XML_ENTRY_BYTES};
use super::{ConvertError, Converter, RawConversion};

pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

pub struct PptxConverter;

impl Converter for PptxConverter {
    fn id(&self) -> &'static str {
        "adapter.pptx"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool {
        mime == MIME_PPTX || ext == Some("pptx")
    }

    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError> {
        let mut archive = open_archive(bytes)?;
        let slide_names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
            .map(|s| s.to_string())
            .collect();
        let slide_names = sort_numbered(slide_names, "ppt/slides/slide", ".xml");

        let mut out = String::new();
        for name in slide_names {
            let xml = read_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
            let text = collect_element_text(&xml, b"t")?;
            if !text.trim().is_empty() {
                out.push_str(text.trim());
                out.push_str("\n\n");
            }
        }
        Ok(RawConversion {
            markdown: out,
            title: None,
            language_hint: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_handle_pptx() {
        let c = PptxConverter;
        assert!(c.can_handle(MIME_PPTX, None));
        assert!(c.can_handle("application/octet-stream", Some("pptx")));
    }
}
