/// File signature analysis used to classify extracted files
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;

use crate::FileKind;

/// Number of leading bytes inspected when classifying a file
pub const SNIFF_LEN: usize = 1024;

/// Extra validation for magic numbers that also occur in ordinary text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    None,
    Bmp,
}

impl HeaderCheck {
    fn accepts(self, head: &[u8]) -> bool {
        match self {
            HeaderCheck::None => true,
            HeaderCheck::Bmp => is_bmp_header(head),
        }
    }
}

/// A magic-number pattern identifying one content type
#[derive(Debug, Clone)]
pub struct FileSignature {
    pub signature: Vec<u8>,
    pub offset: usize,
    /// Also match after leading whitespace or a UTF-8 BOM
    pub allow_leading_whitespace: bool,
    /// Structural check on the head beyond the magic bytes
    pub check: HeaderCheck,
    pub kind: FileKind,
    pub mime_type: String,
    pub extensions: Vec<String>,
    pub description: String,
}

impl FileSignature {
    fn matches(&self, head: &[u8]) -> bool {
        let head = if self.allow_leading_whitespace {
            skip_leading_whitespace(head)
        } else {
            head
        };

        let len = self.signature.len();
        if head.get(self.offset..self.offset + len) != Some(self.signature.as_slice()) {
            return false;
        }
        self.check.accepts(head)
    }
}

fn skip_leading_whitespace(head: &[u8]) -> &[u8] {
    let head = head.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    &head[start..]
}

/// DIB header sizes of the BMP variants (OS/2 core through BITMAPV5HEADER)
const BMP_DIB_HEADER_SIZES: [u32; 7] = [12, 40, 52, 56, 64, 108, 124];

/// File header plus the smallest (core) DIB header
const BMP_MIN_FILE_SIZE: u32 = 26;

fn read_u32_le(head: &[u8], offset: usize) -> Option<u32> {
    let bytes = head.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// `BM` alone is too common in text; check the declared sizes too
fn is_bmp_header(head: &[u8]) -> bool {
    match (read_u32_le(head, 2), read_u32_le(head, 14)) {
        (Some(file_size), Some(dib_size)) => {
            file_size >= BMP_MIN_FILE_SIZE && BMP_DIB_HEADER_SIZES.contains(&dib_size)
        }
        _ => false,
    }
}

/// Build the signature table: images first, then documents
pub fn init_signature_database() -> Vec<FileSignature> {
    let image = |signature: &[u8], mime: &str, exts: &[&str], description: &str| FileSignature {
        signature: signature.to_vec(),
        offset: 0,
        allow_leading_whitespace: false,
        check: HeaderCheck::None,
        kind: FileKind::Image,
        mime_type: mime.to_string(),
        extensions: exts.iter().map(|e| e.to_string()).collect(),
        description: description.to_string(),
    };

    vec![
        image(&[0xFF, 0xD8, 0xFF], "image/jpeg", &["jpg", "jpeg"], "JPEG Image"),
        image(
            &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            "image/png",
            &["png"],
            "PNG Image",
        ),
        image(b"GIF87a", "image/gif", &["gif"], "GIF Image (87a)"),
        image(b"GIF89a", "image/gif", &["gif"], "GIF Image (89a)"),
        image(
            &[0x49, 0x49, 0x2A, 0x00], // II*\0
            "image/tiff",
            &["tif", "tiff"],
            "TIFF Image (little-endian)",
        ),
        image(
            &[0x4D, 0x4D, 0x00, 0x2A], // MM\0*
            "image/tiff",
            &["tif", "tiff"],
            "TIFF Image (big-endian)",
        ),
        FileSignature {
            check: HeaderCheck::Bmp,
            ..image(b"BM", "image/bmp", &["bmp"], "Windows Bitmap")
        },
        FileSignature {
            signature: b"%PDF-".to_vec(),
            offset: 0,
            allow_leading_whitespace: true,
            check: HeaderCheck::None,
            kind: FileKind::Pdf,
            mime_type: "application/pdf".to_string(),
            extensions: vec!["pdf".to_string()],
            description: "PDF Document".to_string(),
        },
    ]
}

fn signatures() -> &'static [FileSignature] {
    static DATABASE: OnceLock<Vec<FileSignature>> = OnceLock::new();
    DATABASE.get_or_init(init_signature_database)
}

/// Find the first signature matching the start of `data`
pub fn identify(data: &[u8]) -> Option<&'static FileSignature> {
    let head = &data[..data.len().min(SNIFF_LEN)];
    signatures().iter().find(|sig| sig.matches(head))
}

/// Classify a buffer as image, PDF or other
pub fn classify(data: &[u8]) -> FileKind {
    identify(data).map(|sig| sig.kind).unwrap_or(FileKind::Other)
}

/// Identify a file on disk by reading only its head
pub fn identify_file(path: &Path) -> io::Result<Option<&'static FileSignature>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(identify(&head))
}
