//! Human-readable text report of a rip

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::{Allocation, ExtractedFile, ExtractionStatus, FileKind, ImageRip};

const RULE_WIDTH: usize = 80;

fn rule<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", "*".repeat(RULE_WIDTH))
}

/// Render the full report
pub fn render_report<W: Write>(rip: &ImageRip, out: &mut W) -> io::Result<()> {
    rule(out)?;
    writeln!(out, "Here is the information for {}:", rip.image_path.display())?;
    writeln!(out, "Rip ID: {}", rip.id)?;
    writeln!(out, "Created: {}", rip.created_at.to_rfc3339())?;
    writeln!(out, "Sleuth Kit version: {}", rip.tsk_version)?;
    writeln!(out, "Filesystem type: {}", rip.filesystem.fs_type)?;
    writeln!(out, "Total recovered size: {}", rip.total_recovered_size())?;
    writeln!(out, "Total useful size: {}", rip.total_useful_size())?;
    for allocation in [Allocation::Overt, Allocation::Deleted] {
        write_counts(rip, allocation, out)?;
    }
    if rip.skipped_entries > 0 {
        writeln!(out, "Unreadable entries skipped: {}", rip.skipped_entries)?;
    }
    if rip.failed_count() > 0 {
        writeln!(out, "Failed extractions: {}", rip.failed_count())?;
    }

    rule(out)?;
    writeln!(out, "Filesystem info:")?;
    writeln!(out, "{}", rip.filesystem.details)?;

    rule(out)?;
    writeln!(out, "File info:")?;
    for file in &rip.overt {
        write_file(file, out)?;
    }

    rule(out)?;
    writeln!(out, "Deleted file info:")?;
    for file in &rip.deleted {
        write_file(file, out)?;
    }

    Ok(())
}

fn write_counts<W: Write>(rip: &ImageRip, allocation: Allocation, out: &mut W) -> io::Result<()> {
    let files = match allocation {
        Allocation::Overt => rip.overt.len(),
        Allocation::Deleted => rip.deleted.len(),
    };
    let label = match allocation {
        Allocation::Overt => "Overt files",
        Allocation::Deleted => "Deleted files",
    };

    writeln!(
        out,
        "{}: {} (images: {}, pdfs: {}, other: {})",
        label,
        files,
        rip.count(allocation, FileKind::Image),
        rip.count(allocation, FileKind::Pdf),
        rip.count(allocation, FileKind::Other)
    )
}

fn write_file<W: Write>(file: &ExtractedFile, out: &mut W) -> io::Result<()> {
    writeln!(out, "original_path: {}", file.original_path)?;
    writeln!(out, "location: {}", file.location)?;
    match &file.final_destination {
        Some(path) => writeln!(out, "final_destination: {}", path.display())?,
        None => writeln!(out, "final_destination: None")?,
    }
    writeln!(out, "size: {}", file.size)?;
    writeln!(out, "md5: {}", file.md5)?;
    writeln!(out, "sha256: {}", file.sha256)?;
    writeln!(out, "file_type: {}", file.file_type)?;
    if let Some(signature) = &file.signature {
        writeln!(out, "signature: {}", signature)?;
    }
    if let ExtractionStatus::Failed(reason) = &file.status {
        writeln!(out, "status: failed ({})", reason)?;
    }

    if file.metadata.is_empty() {
        writeln!(out, "file_metadata: None")?;
    } else {
        writeln!(out, "file_metadata:")?;
        for (key, value) in &file.metadata {
            writeln!(out, "    {}: {}", key, value)?;
        }
    }
    if let Some(error) = &file.metadata_error {
        writeln!(out, "metadata_error: {}", error)?;
    }

    writeln!(out)
}

/// Render the report into a string
pub fn report_to_string(rip: &ImageRip) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = render_report(rip, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Write the report to `path`, creating its directory if needed
pub fn write_report(rip: &ImageRip, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create report directory")?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create report at {}", path.display()))?;
    let mut out = BufWriter::new(file);
    render_report(rip, &mut out).context("Failed to write report")?;
    out.flush().context("Failed to write report")?;

    tracing::info!("Wrote report to {}", path.display());
    Ok(())
}
