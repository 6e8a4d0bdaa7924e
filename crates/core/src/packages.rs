//! Dependency list files.
//!
//! One identifier per line. Blank lines and lines starting with `#` are
//! ignored, as is surrounding whitespace.

use crate::error::{Error, Result};
use crate::identity::DependencyId;
use std::path::Path;

/// Parse the contents of a dependency list.
///
/// # Errors
///
/// Returns [`Error::ContractViolation`] for an invalid identifier, naming its
/// line.
pub fn parse_packages(contents: &str) -> Result<Vec<DependencyId>> {
    contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            DependencyId::parse(line)
                .map_err(|e| Error::contract(format!("line {number}: {e}")))
        })
        .collect()
}

/// Read a dependency list file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or the parse error.
pub fn read_packages(path: &Path) -> Result<Vec<DependencyId>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::io(e, path, "read package list"))?;
    parse_packages(&contents)
}
