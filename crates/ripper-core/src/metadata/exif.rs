//! EXIF tags from JPEG, TIFF and PNG images

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ::exif::{Context, Exif, Field, In, Reader, Tag, Value};

use super::MetadataError;
use crate::MetadataMap;

/// Read every EXIF field, keyed as `"<group> <tag>"` (e.g. `Image Make`)
///
/// An image without an EXIF segment yields an empty map.
pub fn read_exif(path: &Path) -> Result<MetadataMap, MetadataError> {
    let mut reader = BufReader::new(File::open(path)?);

    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(::exif::Error::NotFound(_)) => return Ok(MetadataMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut map = MetadataMap::new();
    for field in exif.fields() {
        // Vendor blob, meaningless without a maker-specific decoder
        if field.tag == Tag::MakerNote {
            continue;
        }

        let key = format!("{} {}", group_name(field), field.tag);
        map.insert(key, render_value(field, &exif));
    }

    tracing::debug!("Read {} EXIF fields from {}", map.len(), path.display());
    Ok(map)
}

fn group_name(field: &Field) -> &'static str {
    if field.ifd_num == In::THUMBNAIL {
        return "Thumbnail";
    }

    #[allow(unreachable_patterns)]
    match field.tag.context() {
        Context::Tiff => "Image",
        Context::Exif => "EXIF",
        Context::Gps => "GPS",
        Context::Interop => "Interoperability",
        _ => "Image",
    }
}

/// Display form of a field, without quotes around a lone ASCII string
fn render_value(field: &Field, exif: &Exif) -> String {
    let value = field.display_value().with_unit(exif).to_string();
    match &field.value {
        Value::Ascii(strings) if strings.len() == 1 => unquote(&value).to_string(),
        _ => value,
    }
}

/// ASCII fields are displayed quoted
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
