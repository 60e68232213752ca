//! Parsing of `fls -F -p -r` listings
//!
//! Each line has the shape `<type> [*] <addr>[(realloc)]:\t<path>`, e.g.
//! `r/r * 65-128-2:\tDocuments/old.jpg`.

use crate::error::{RipperError, TskResult};
use crate::{Allocation, FsEntry};

const REALLOC_MARKER: &str = "(realloc)";

/// Parse a whole listing; blank lines are ignored
pub fn parse_listing(output: &str, allocation: Allocation) -> TskResult<Vec<FsEntry>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_line(line, allocation))
        .collect()
}

/// Parse a single listing line
pub fn parse_line(line: &str, allocation: Allocation) -> TskResult<FsEntry> {
    let parse_error = || RipperError::FlsParse {
        line: line.to_string(),
    };

    let (head, name) = line.split_once('\t').ok_or_else(parse_error)?;
    let head = head.trim_end().strip_suffix(':').ok_or_else(parse_error)?;

    let mut tokens = head.split_whitespace();
    let entry_type = tokens.next().ok_or_else(parse_error)?;
    let address = tokens.last().ok_or_else(parse_error)?;

    let (location, reallocated) = match address.strip_suffix(REALLOC_MARKER) {
        Some(location) => (location, true),
        None => (address, false),
    };

    if location.is_empty() {
        return Err(parse_error());
    }

    Ok(FsEntry {
        entry_type: entry_type.to_string(),
        location: location.to_string(),
        path: name.trim_end_matches(['\r', '\n']).to_string(),
        allocation,
        reallocated,
    })
}
