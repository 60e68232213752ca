use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod forensics;
pub mod metadata;
pub mod recovery;
pub mod report;
pub mod session;
pub mod tsk;

pub use config::RipConfig;
pub use error::RipperError;
pub use recovery::{RipEngine, RipProgress, RipStage};
pub use session::{ImageSummary, RipDatabase};
pub use tsk::{SleuthKit, SystemRunner, ToolRunner};

/// Flat, ordered metadata of one file (EXIF tags or PDF properties)
pub type MetadataMap = BTreeMap<String, String>;

/// Whether the live file system still references a file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Allocation {
    Overt,
    Deleted,
}

impl Allocation {
    /// Name of the output tree for this status
    pub fn dir_name(&self) -> &'static str {
        match self {
            Allocation::Overt => "overt",
            Allocation::Deleted => "deleted",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Allocation::Deleted)
    }
}

impl std::fmt::Display for Allocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Content class decided from the file's signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Pdf,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
            FileKind::Other => "other",
        }
    }

    /// Images and PDFs are what the rip is after
    pub fn is_useful(&self) -> bool {
        !matches!(self, FileKind::Other)
    }
}

impl std::str::FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(FileKind::Image),
            "pdf" => Ok(FileKind::Pdf),
            "other" => Ok(FileKind::Other),
            _ => anyhow::bail!("Unknown file type: {}", s),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One regular file listed by `fls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEntry {
    /// TSK type pair, e.g. `r/r`
    pub entry_type: String,
    /// Metadata address (`inode[-type-id]`) accepted by `icat`
    pub location: String,
    /// Path inside the image
    pub path: String,
    pub allocation: Allocation,
    /// TSK reports the metadata structure as reused by another file
    pub reallocated: bool,
}

impl FsEntry {
    /// Address 0 means TSK lost the metadata structure; `icat` cannot read it
    pub fn is_readable(&self) -> bool {
        self.location.split('-').next() != Some("0")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSystemInfo {
    /// Short type name from `fsstat -t` (ntfs, fat16, ext4, ...)
    pub fs_type: String,
    /// Full `fsstat` output
    pub details: String,
}

/// Outcome of pulling one file out of the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionStatus {
    Success,
    Failed(String),
}

impl ExtractionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionStatus::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub original_path: String,
    pub location: String,
    pub allocation: Allocation,
    /// Where the file now lives; `None` once removed or when extraction failed
    pub final_destination: Option<PathBuf>,
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    pub file_type: FileKind,
    /// Description of the matched signature, e.g. `JPEG Image`
    pub signature: Option<String>,
    pub metadata: MetadataMap,
    pub metadata_error: Option<String>,
    pub status: ExtractionStatus,
}

impl ExtractedFile {
    /// Record for an entry whose content could not be read
    pub fn failed(entry: &FsEntry, reason: impl Into<String>) -> Self {
        Self {
            original_path: entry.path.clone(),
            location: entry.location.clone(),
            allocation: entry.allocation,
            final_destination: None,
            size: 0,
            md5: String::new(),
            sha256: String::new(),
            file_type: FileKind::Other,
            signature: None,
            metadata: MetadataMap::new(),
            metadata_error: None,
            status: ExtractionStatus::Failed(reason.into()),
        }
    }
}

/// Everything learned from one disk image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRip {
    pub id: Uuid,
    pub image_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub tsk_version: String,
    pub filesystem: FileSystemInfo,
    pub overt: Vec<ExtractedFile>,
    pub deleted: Vec<ExtractedFile>,
    /// Listed entries without a readable metadata address
    pub skipped_entries: usize,
    pub duration_ms: u64,
}

impl ImageRip {
    /// Overt files followed by deleted files
    pub fn files(&self) -> impl Iterator<Item = &ExtractedFile> {
        self.overt.iter().chain(self.deleted.iter())
    }

    /// Bytes extracted across both trees, whatever their type
    pub fn total_recovered_size(&self) -> u64 {
        self.files().map(|f| f.size).sum()
    }

    /// Bytes belonging to images and PDFs
    pub fn total_useful_size(&self) -> u64 {
        self.files()
            .filter(|f| f.file_type.is_useful())
            .map(|f| f.size)
            .sum()
    }

    pub fn count(&self, allocation: Allocation, kind: FileKind) -> usize {
        let files = match allocation {
            Allocation::Overt => &self.overt,
            Allocation::Deleted => &self.deleted,
        };
        files.iter().filter(|f| f.file_type == kind).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files().filter(|f| !f.status.is_success()).count()
    }
}

/// Rip an image with the real Sleuth Kit binaries
pub fn rip_image(config: RipConfig) -> Result<ImageRip> {
    let engine = RipEngine::new(config, SystemRunner);
    engine.run()
}

/// File-system type and details without extracting anything
pub fn describe_filesystem(config: &RipConfig) -> Result<FileSystemInfo> {
    let tsk = SleuthKit::new(SystemRunner, config.image_path.clone())
        .with_bin_dir(config.tsk_bin_dir.clone())
        .with_sector_offset(config.sector_offset)
        .with_fs_type(config.fs_type.clone());

    Ok(FileSystemInfo {
        fs_type: tsk.fs_type()?,
        details: tsk.fs_details()?,
    })
}
