//! PDF document properties

use std::path::Path;

use encoding_rs::{UTF_16BE, WINDOWS_1252};
use lopdf::{Dictionary, Document, Object};

use super::MetadataError;
use crate::MetadataMap;

/// Indirect references followed when rendering a value
const MAX_REFERENCE_DEPTH: usize = 4;

/// Read the trailer's `/Info` dictionary plus version and page count
///
/// Keys keep their PDF name form (`/Author`, `/CreationDate`).
pub fn read_document_info(path: &Path) -> Result<MetadataMap, MetadataError> {
    let doc = Document::load(path)?;

    let mut map = MetadataMap::new();
    map.insert("PDF Version".to_string(), doc.version.clone());
    map.insert("Pages".to_string(), doc.get_pages().len().to_string());
    if doc.trailer.has(b"Encrypt") {
        map.insert("Encrypted".to_string(), "yes".to_string());
    }

    if let Some(info) = info_dictionary(&doc) {
        for (key, value) in info.iter() {
            let name = format!("/{}", String::from_utf8_lossy(key));
            map.insert(name, render_value(&doc, value, 0));
        }
    }

    tracing::debug!("Read {} PDF properties from {}", map.len(), path.display());
    Ok(map)
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn render_value(doc: &Document, value: &Object, depth: usize) -> String {
    match value {
        Object::String(bytes, _) => decode_text_string(bytes),
        Object::Name(name) => format!("/{}", String::from_utf8_lossy(name)),
        Object::Integer(i) => i.to_string(),
        Object::Real(r) => r.to_string(),
        Object::Boolean(b) => b.to_string(),
        Object::Null => String::new(),
        Object::Reference(id) if depth < MAX_REFERENCE_DEPTH => doc
            .get_object(*id)
            .map(|obj| render_value(doc, obj, depth + 1))
            .unwrap_or_default(),
        Object::Reference((num, generation)) => format!("{} {} R", num, generation),
        Object::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| render_value(doc, item, depth + 1))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        other => format!("{:?}", other),
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, else PDFDocEncoding
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let (text, _) = UTF_16BE.decode_without_bom_handling(utf16);
        return text.into_owned();
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }

    // PDFDocEncoding agrees with Windows-1252 on every printable Latin-1 byte
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}
