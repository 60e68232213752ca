/// Orchestration of a full rip: analyse, list, extract, report, persist
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::recovery::extract::{extract_tree, ExtractOptions};
use crate::session::RipDatabase;
use crate::tsk::{SleuthKit, ToolRunner};
use crate::{report, Allocation, FileSystemInfo, ImageRip, RipConfig};

#[derive(Debug, Clone)]
pub struct RipProgress {
    pub stage: RipStage,
    /// Files finished in the current stage
    pub completed: usize,
    /// Files expected in the current stage, 0 when not applicable
    pub total: usize,
    pub current_operation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RipStage {
    Initialization,
    FileSystemAnalysis,
    Listing,
    ExtractingOvert,
    ExtractingDeleted,
    Reporting,
    Persisting,
    Complete,
}

impl RipStage {
    fn extracting(allocation: Allocation) -> Self {
        match allocation {
            Allocation::Overt => RipStage::ExtractingOvert,
            Allocation::Deleted => RipStage::ExtractingDeleted,
        }
    }
}

/// Drives The Sleuth Kit over one image and collects the results
pub struct RipEngine<R: ToolRunner> {
    config: RipConfig,
    tsk: SleuthKit<R>,
    progress_callback: Option<Box<dyn Fn(RipProgress) + Send + Sync>>,
}

impl<R: ToolRunner> RipEngine<R> {
    pub fn new(config: RipConfig, runner: R) -> Self {
        let tsk = SleuthKit::new(runner, config.image_path.clone())
            .with_bin_dir(config.tsk_bin_dir.clone())
            .with_sector_offset(config.sector_offset)
            .with_fs_type(config.fs_type.clone());

        Self {
            config,
            tsk,
            progress_callback: None,
        }
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: Fn(RipProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn config(&self) -> &RipConfig {
        &self.config
    }

    fn emit_progress(&self, stage: RipStage, completed: usize, total: usize, operation: &str) {
        if let Some(callback) = &self.progress_callback {
            callback(RipProgress {
                stage,
                completed,
                total,
                current_operation: operation.to_string(),
            });
        }
    }

    /// Run every stage and return the collected results
    ///
    /// The report and database are written before returning.
    pub fn run(&self) -> Result<ImageRip> {
        let started = Instant::now();
        let image = &self.config.image_path;

        self.emit_progress(RipStage::Initialization, 0, 0, "Checking Sleuth Kit tools...");
        anyhow::ensure!(image.exists(), "Image not found: {}", image.display());
        let tsk_version = self
            .tsk
            .verify_tools()
            .context("The Sleuth Kit must be installed to rip images")?;

        tracing::info!("Ripping {} with {}", image.display(), tsk_version);

        self.emit_progress(
            RipStage::FileSystemAnalysis,
            0,
            0,
            "Reading file system information...",
        );
        let filesystem = FileSystemInfo {
            fs_type: self.tsk.fs_type().context("fsstat could not identify the file system")?,
            details: self.tsk.fs_details().context("fsstat failed")?,
        };
        tracing::info!("File system: {}", filesystem.fs_type);

        self.emit_progress(RipStage::Listing, 0, 0, "Listing allocated and deleted files...");
        let overt_entries = self
            .tsk
            .list_files(Allocation::Overt)
            .context("Failed to list allocated files")?;
        let deleted_entries = self
            .tsk
            .list_files(Allocation::Deleted)
            .context("Failed to list deleted files")?;
        tracing::info!(
            "Listed {} allocated and {} deleted files",
            overt_entries.len(),
            deleted_entries.len()
        );

        let options = ExtractOptions {
            keep_other: self.config.keep_other,
            parallel: self.config.parallel_processing,
        };

        let mut skipped_entries = 0;
        let mut trees = Vec::with_capacity(2);
        for (allocation, entries) in [
            (Allocation::Overt, &overt_entries),
            (Allocation::Deleted, &deleted_entries),
        ] {
            let stage = RipStage::extracting(allocation);
            let total = entries.len();
            let operation = format!("Extracting {} files...", allocation);
            self.emit_progress(stage, 0, total, &operation);

            let tree = extract_tree(
                &self.tsk,
                entries,
                &self.config.tree_dir(allocation),
                options,
                |done| self.emit_progress(stage, done, total, &operation),
            )?;

            skipped_entries += tree.skipped;
            trees.push(tree.files);
        }
        let deleted = trees.pop().unwrap_or_default();
        let overt = trees.pop().unwrap_or_default();

        let rip = ImageRip {
            id: Uuid::new_v4(),
            image_path: image.clone(),
            created_at: Utc::now(),
            tsk_version,
            filesystem,
            overt,
            deleted,
            skipped_entries,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        self.emit_progress(RipStage::Reporting, 0, 0, "Writing report...");
        report::write_report(&rip, &self.config.report_path())?;

        self.emit_progress(RipStage::Persisting, 0, 0, "Saving to database...");
        RipDatabase::open(self.config.db_path())?.save_rip(&rip)?;

        self.emit_progress(RipStage::Complete, 0, 0, "Rip complete");
        tracing::info!(
            "Rip complete: {} overt, {} deleted, {} useful of {} recovered bytes",
            rip.overt.len(),
            rip.deleted.len(),
            rip.total_useful_size(),
            rip.total_recovered_size()
        );

        Ok(rip)
    }
}
