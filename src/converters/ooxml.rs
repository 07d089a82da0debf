//! Shared ZIP/XML helpers for the OOXML adapters (docx, pptx, xlsx).
//! Grounded on the teacher's `extract.rs`.

use std::io::Read;

use super::{ConvertError, ConvertErrorKind};

/// Zip-bomb guard: max decompressed bytes read from a single entry.
pub const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ConvertError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ConvertError::new(ConvertErrorKind::Corrupt, format!("invalid zip: {e}")))
}

pub fn read_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ConvertError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ConvertError::new(ConvertErrorKind::Corrupt, format!("{name}: {e}")))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ConvertError::new(ConvertErrorKind::Io, e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ConvertError::too_large(format!(
            "zip entry {name} exceeds size limit ({max_bytes} bytes)"
        )));
    }
    Ok(out)
}

/// Collect the unescaped text inside every `<local_name>` element (local
/// name match, namespace-agnostic — OOXML namespace prefixes vary by
/// producer).
pub fn collect_element_text(xml: &[u8], local_name: &[u8]) -> Result<String, ConvertError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == local_name {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf) {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ConvertError::new(ConvertErrorKind::Corrupt, e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Sort zip entry names like `prefix<N>suffix` by their numeric `N`.
pub fn sort_numbered(mut names: Vec<String>, prefix: &str, suffix: &str) -> Vec<String> {
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(suffix)
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}
