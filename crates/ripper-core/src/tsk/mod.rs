//! The Sleuth Kit command-line front end
//!
//! Every file-system operation in this crate is delegated to the TSK tools
//! (`fsstat`, `fls`, `icat`). This module owns building their argument lists
//! and launching them through a [`ToolRunner`], which is the only place the
//! crate touches the host process table.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub mod fls;

use crate::error::{RipperError, TskResult};
use crate::{Allocation, FsEntry};

/// Tools that must be present for a rip to succeed
pub const REQUIRED_TOOLS: [&str; 3] = ["fls", "icat", "fsstat"];

/// Launches external programs on behalf of [`SleuthKit`]
pub trait ToolRunner: Send + Sync {
    /// Run `program` to completion and return its stdout
    fn run(&self, program: &Path, args: &[OsString]) -> TskResult<Vec<u8>>;

    /// Run `program` with its stdout written to `dest`
    fn run_to_file(&self, program: &Path, args: &[OsString], dest: &Path) -> TskResult<()> {
        let data = self.run(program, args)?;
        std::fs::write(dest, data)?;
        Ok(())
    }
}

/// Runs the real binaries found on `PATH` (or at an explicit location)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn_error(program: &Path, err: std::io::Error) -> RipperError {
        if err.kind() == std::io::ErrorKind::NotFound {
            RipperError::ToolNotFound {
                tool: tool_name(program),
                source: err,
            }
        } else {
            RipperError::Io(err)
        }
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> TskResult<Vec<u8>> {
        tracing::debug!("Running {} {:?}", program.display(), args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Self::spawn_error(program, e))?;

        if !output.status.success() {
            return Err(RipperError::tool_failed(
                &tool_name(program),
                output.status,
                &output.stderr,
            ));
        }

        Ok(output.stdout)
    }

    fn run_to_file(&self, program: &Path, args: &[OsString], dest: &Path) -> TskResult<()> {
        tracing::debug!(
            "Running {} {:?} > {}",
            program.display(),
            args,
            dest.display()
        );

        // Stream straight to disk; recovered files can be far larger than memory
        let file = File::create(dest)?;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Self::spawn_error(program, e))?;

        if !output.status.success() {
            return Err(RipperError::tool_failed(
                &tool_name(program),
                output.status,
                &output.stderr,
            ));
        }

        Ok(())
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// One disk image as seen through the TSK tools
#[derive(Debug, Clone)]
pub struct SleuthKit<R: ToolRunner> {
    runner: R,
    image: PathBuf,
    bin_dir: Option<PathBuf>,
    sector_offset: Option<u64>,
    fs_type: Option<String>,
}

impl<R: ToolRunner> SleuthKit<R> {
    pub fn new(runner: R, image: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            image: image.into(),
            bin_dir: None,
            sector_offset: None,
            fs_type: None,
        }
    }

    /// Look for the TSK binaries in `dir` instead of on `PATH`
    pub fn with_bin_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bin_dir = dir;
        self
    }

    /// Sector offset of the file system inside the image (`-o`)
    pub fn with_sector_offset(mut self, offset: Option<u64>) -> Self {
        self.sector_offset = offset;
        self
    }

    /// File-system type passed to TSK instead of autodetection (`-f`)
    pub fn with_fs_type(mut self, fs_type: Option<String>) -> Self {
        self.fs_type = fs_type;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn program(&self, tool: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    /// Build `<flags> [-o offset] [-f type] <image> <trailing>`
    fn args<I, S>(&self, flags: &[&str], trailing: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut args: Vec<OsString> = flags.iter().map(OsString::from).collect();

        if let Some(offset) = self.sector_offset {
            args.push("-o".into());
            args.push(offset.to_string().into());
        }
        if let Some(fs_type) = &self.fs_type {
            args.push("-f".into());
            args.push(fs_type.into());
        }

        args.push(self.image.as_os_str().to_os_string());
        args.extend(trailing.into_iter().map(|s| s.as_ref().to_os_string()));
        args
    }

    /// Check that every required tool launches, returning the TSK version line
    pub fn verify_tools(&self) -> TskResult<String> {
        let mut version = String::new();

        for tool in REQUIRED_TOOLS {
            let out = self.runner.run(&self.program(tool), &["-V".into()])?;
            if version.is_empty() {
                version = String::from_utf8_lossy(&out).trim().to_string();
            }
        }

        tracing::debug!("Sleuth Kit version: {}", version);
        Ok(version)
    }

    /// File-system type name as reported by `fsstat -t`
    pub fn fs_type(&self) -> TskResult<String> {
        let out = self
            .runner
            .run(&self.program("fsstat"), &self.args(&["-t"], None::<&str>))?;

        Ok(String::from_utf8_lossy(&out)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    /// Full `fsstat` report for the file system
    pub fn fs_details(&self) -> TskResult<String> {
        let out = self
            .runner
            .run(&self.program("fsstat"), &self.args(&[], None::<&str>))?;

        Ok(String::from_utf8_lossy(&out).trim_end().to_string())
    }

    /// Recursively list regular files with the given allocation status
    pub fn list_files(&self, allocation: Allocation) -> TskResult<Vec<FsEntry>> {
        let status_flag = match allocation {
            Allocation::Overt => "-u",
            Allocation::Deleted => "-d",
        };

        let out = self.runner.run(
            &self.program("fls"),
            &self.args(&["-F", "-p", "-r", status_flag], None::<&str>),
        )?;

        fls::parse_listing(&String::from_utf8_lossy(&out), allocation)
    }

    /// Write the content of the file at metadata address `location` to `dest`
    pub fn extract_to(&self, location: &str, dest: &Path) -> TskResult<()> {
        self.runner
            .run_to_file(&self.program("icat"), &self.args(&[], [location]), dest)
    }
}
