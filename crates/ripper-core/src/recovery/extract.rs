/// Extraction of listed files into the overt/deleted trees
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::forensics::calculate_file_digests;
use crate::metadata::extract_metadata;
use crate::recovery::signatures::identify_file;
use crate::tsk::{SleuthKit, ToolRunner};
use crate::{ExtractedFile, ExtractionStatus, FileKind, FsEntry, MetadataMap};

/// A listed entry paired with the path it will be written to
#[derive(Debug, Clone)]
pub struct PlannedExtraction {
    pub entry: FsEntry,
    pub destination: PathBuf,
}

/// Options shared by every file of one tree
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub keep_other: bool,
    pub parallel: bool,
}

/// Result of extracting one tree
#[derive(Debug, Default)]
pub struct TreeExtraction {
    pub files: Vec<ExtractedFile>,
    pub skipped: usize,
}

/// Flatten in-image paths to unique file names inside `dir`
///
/// Only the base name is kept. A name already taken gets the entry's
/// location inserted before the extension, so nothing is overwritten.
pub fn plan_destinations(entries: &[FsEntry], dir: &Path) -> Vec<PlannedExtraction> {
    let mut used: HashSet<String> = HashSet::new();

    entries
        .iter()
        .map(|entry| {
            let base = flat_name(entry);
            let mut name = base.clone();

            if used.contains(&name) {
                let (stem, ext) = split_extension(&base);
                let tag = entry.location.replace(['/', ':'], "_");
                name = format!("{}_{}{}", stem, tag, ext);

                let mut n = 1;
                while used.contains(&name) {
                    name = format!("{}_{}_{}{}", stem, tag, n, ext);
                    n += 1;
                }
            }

            used.insert(name.clone());
            PlannedExtraction {
                entry: entry.clone(),
                destination: dir.join(name),
            }
        })
        .collect()
}

fn flat_name(entry: &FsEntry) -> String {
    let base = entry.path.rsplit('/').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => format!("entry_{}", entry.location),
        _ => cleaned,
    }
}

/// `photo.jpg` -> (`photo`, `.jpg`); dot-files have no extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Extract every readable entry of one allocation status into `dir`
///
/// `on_progress` receives the number of files finished so far and may be
/// called from several threads.
pub fn extract_tree<R, F>(
    tsk: &SleuthKit<R>,
    entries: &[FsEntry],
    dir: &Path,
    options: ExtractOptions,
    on_progress: F,
) -> Result<TreeExtraction>
where
    R: ToolRunner,
    F: Fn(usize) + Sync,
{
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let (readable, unreadable): (Vec<FsEntry>, Vec<FsEntry>) =
        entries.iter().cloned().partition(FsEntry::is_readable);
    for entry in &unreadable {
        tracing::debug!(
            "Skipping {} (location {} is not readable)",
            entry.path,
            entry.location
        );
    }

    let plan = plan_destinations(&readable, dir);
    let done = AtomicUsize::new(0);
    let work = |planned: &PlannedExtraction| {
        let file = extract_one(tsk, planned, options.keep_other);
        on_progress(done.fetch_add(1, Ordering::Relaxed) + 1);
        file
    };

    let files: Vec<ExtractedFile> = if options.parallel {
        plan.par_iter().map(work).collect()
    } else {
        plan.iter().map(work).collect()
    };

    Ok(TreeExtraction {
        files,
        skipped: unreadable.len(),
    })
}

/// Remove a partial or unusable extraction; a failed file has no destination
fn discard(dest: &Path) {
    match fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", dest.display(), e),
    }
}

/// icat -> hash -> classify -> metadata -> optional removal
pub fn extract_one<R: ToolRunner>(
    tsk: &SleuthKit<R>,
    planned: &PlannedExtraction,
    keep_other: bool,
) -> ExtractedFile {
    let entry = &planned.entry;
    let dest = &planned.destination;

    if let Err(e) = tsk.extract_to(&entry.location, dest) {
        tracing::warn!("Failed to extract {} ({}): {}", entry.path, entry.location, e);
        discard(dest);
        return ExtractedFile::failed(entry, e.to_string());
    }

    let digests = match calculate_file_digests(dest) {
        Ok(digests) => digests,
        Err(e) => {
            tracing::warn!("Failed to hash {}: {}", dest.display(), e);
            discard(dest);
            return ExtractedFile::failed(entry, format!("hashing failed: {}", e));
        }
    };

    let signature = match identify_file(dest) {
        Ok(signature) => signature,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", dest.display(), e);
            discard(dest);
            return ExtractedFile::failed(entry, format!("classification failed: {}", e));
        }
    };
    let file_type = signature.map(|sig| sig.kind).unwrap_or(FileKind::Other);

    let (metadata, metadata_error) = match extract_metadata(dest, signature) {
        Ok(map) => (map, None),
        Err(e) => {
            tracing::warn!("No metadata for {}: {}", entry.path, e);
            (MetadataMap::new(), Some(e.to_string()))
        }
    };

    let final_destination = if file_type == FileKind::Other && !keep_other {
        match fs::remove_file(dest) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to remove {}: {}", dest.display(), e);
                Some(dest.clone())
            }
        }
    } else {
        Some(dest.clone())
    };

    tracing::debug!(
        "Extracted {} -> {} ({}, {} bytes)",
        entry.path,
        dest.display(),
        file_type,
        digests.file_size
    );

    ExtractedFile {
        original_path: entry.path.clone(),
        location: entry.location.clone(),
        allocation: entry.allocation,
        final_destination,
        size: digests.file_size,
        md5: digests.md5,
        sha256: digests.sha256,
        file_type,
        signature: signature.map(|sig| sig.description.clone()),
        metadata,
        metadata_error,
        status: ExtractionStatus::Success,
    }
}
