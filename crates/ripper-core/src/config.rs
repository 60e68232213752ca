//! Run configuration

use std::path::PathBuf;

pub const DEFAULT_OUTPUT: &str = "output";
pub const DEFAULT_DB_NAME: &str = "ripper.sqlite";
pub const DEFAULT_REPORT_NAME: &str = "report.txt";

/// Everything a single rip needs to know
#[derive(Debug, Clone)]
pub struct RipConfig {
    /// Disk image to examine
    pub image_path: PathBuf,
    /// Directory receiving `overt/`, `deleted/`, the report and the database
    pub output_dir: PathBuf,
    /// Database file name, relative to `output_dir`
    pub db_name: String,
    /// Report file name, relative to `output_dir`
    pub report_name: String,
    /// Keep extracted files that are neither images nor PDFs
    pub keep_other: bool,
    /// Sector offset of the file system inside the image
    pub sector_offset: Option<u64>,
    /// File-system type handed to TSK instead of autodetection
    pub fs_type: Option<String>,
    /// Directory containing the TSK binaries, `PATH` lookup otherwise
    pub tsk_bin_dir: Option<PathBuf>,
    pub parallel_processing: bool,
}

impl Default for RipConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT),
            db_name: DEFAULT_DB_NAME.to_string(),
            report_name: DEFAULT_REPORT_NAME.to_string(),
            keep_other: false,
            sector_offset: None,
            fs_type: None,
            tsk_bin_dir: None,
            parallel_processing: true,
        }
    }
}

impl RipConfig {
    /// Default configuration for one image
    pub fn for_image(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            ..Default::default()
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.output_dir.join(&self.db_name)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_name)
    }

    /// Directory for files of the given allocation status
    pub fn tree_dir(&self, allocation: crate::Allocation) -> PathBuf {
        self.output_dir.join(allocation.dir_name())
    }
}
