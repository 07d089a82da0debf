//! XLSX converter, grounded on the teacher's `extract_xlsx` (`extract.rs`).

use super::ooxml::{open_archive, read_entry_bounded, sort_numbered, MAX_XML_ENTRY_BYTES};
use super::{ConvertError, ConvertErrorKind, Converter, RawConversion};

pub const MIME_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Bounds per spec §5.2 ("implementation MAY limit").
const MAX_SHEETS: usize = 100;
const MAX_CELLS_PER_SHEET: usize = 100_000;

pub struct XlsxConverter;

impl Converter for XlsxConverter {
    fn id(&self) -> &'static str {
        "adapter.xlsx"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn can_handle(&self, mime: &str, ext: Option<&str>) -> bool {
        mime == MIME_XLSX || ext == Some("xlsx")
    }

    fn convert(&self, bytes: &[u8]) -> Result<RawConversion, ConvertError> {
        let mut archive = open_archive(bytes)?;
        let shared_strings = read_shared_strings(&mut archive)?;

        let sheet_names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
            .map(|s| s.to_string())
            .collect();
        let sheet_names = sort_numbered(sheet_names, "xl/worksheets/sheet", ".xml");

        let mut out = String::new();
        for name in sheet_names.into_iter().take(MAX_SHEETS) {
            let xml = read_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
            let rows = extract_sheet_rows(&xml, &shared_strings)?;
            for row in rows {
                out.push_str("| ");
                out.push_str(&row.join(" | "));
                out.push_str(" |\n");
            }
            out.push('\n');
        }
        Ok(RawConversion {
            markdown: out,
            title: None,
            language_hint: None,
        })
    }
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ConvertError> {
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                } else if in_si && e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf) {
                        strings.push(te.unescape().unwrap_or_default().into_owned());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ConvertError::new(ConvertErrorKind::Corrupt, e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Returns each row as a vec of cell text, shared-string cells resolved,
/// numeric/inline cells read verbatim.
fn extract_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared_str = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"row" {
                    current_row = Vec::new();
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_v = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_v => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if !s.is_empty() {
                    let resolved = if cell_is_shared_str {
                        s.parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                            .unwrap_or_default()
                    } else {
                        s.to_string()
                    };
                    current_row.push(resolved);
                    cell_count += 1;
                }
                in_v = false;
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_v = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = false;
                } else if e.local_name().as_ref() == b"row" && !current_row.is_empty() {
                    rows.push(std::mem::take(&mut current_row));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ConvertError::new(ConvertErrorKind::Corrupt, e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_zip_is_corrupt() {
        let c = XlsxConverter;
        let err = c.convert(b"not a zip").unwrap_err();
        assert_eq!(err.kind, ConvertErrorKind::Corrupt);
    }
}
