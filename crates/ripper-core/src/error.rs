//! Errors raised while driving The Sleuth Kit

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RipperError {
    /// The binary could not be launched at all
    #[error("{tool} not found (is The Sleuth Kit installed?): {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The binary ran but exited unsuccessfully
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// A line of `fls` output did not have the expected shape
    #[error("unexpected fls output line: {line:?}")]
    FlsParse { line: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RipperError {
    pub fn tool_failed(tool: &str, status: impl ToString, stderr: &[u8]) -> Self {
        Self::ToolFailed {
            tool: tool.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

pub type TskResult<T> = std::result::Result<T, RipperError>;
