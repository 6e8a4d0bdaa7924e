//! Writes dependency variants into the scratch workspace.
//!
//! A variant is either *linked through*, with every top-level file of the
//! real source symlinked into place, or *generated* by the package generator.
//! Subdirectories are separate units and are never descended into.

use crate::config::PackageMockConfig;
use crate::error::{Error, Result};
use crate::identity::{DependencyId, ScratchId};
use crate::imports::Imports;
use crate::policy::SourceOrigin;
use crate::traits::{GenerateMode, GenerateRequest, Host, Toolchain};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[cfg(unix)]
use std::os::unix::fs::symlink;
#[cfg(windows)]
use std::os::windows::fs::symlink_file as symlink;

/// Directory under a dependency root that holds unit sources.
pub const SOURCE_DIR: &str = "src";

/// The directory of `scratch` under a dependency root.
#[must_use]
pub fn unit_dir(root: &Path, scratch: &ScratchId) -> PathBuf {
    root.join(SOURCE_DIR).join(scratch.as_str())
}

/// The first root that holds source for `id`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] naming `id` and every root searched.
pub fn find_source(roots: &[PathBuf], id: &DependencyId) -> Result<PathBuf> {
    roots
        .iter()
        .map(|root| root.join(SOURCE_DIR).join(id.as_str()))
        .find(|candidate| candidate.is_dir())
        .ok_or_else(|| Error::NotFound {
            id: id.to_string(),
            roots: roots.to_vec(),
        })
}

/// The top-level entries of `dir`, sorted by file name.
///
/// # Errors
///
/// Returns [`Error::Io`] if `dir` cannot be listed.
pub fn top_level(dir: &Path) -> Result<Vec<DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop"));
                Error::io(source, path, "list source directory")
            })
        })
        .collect()
}

/// Whether `dir` holds any top-level file the generator cannot rewrite.
///
/// # Errors
///
/// Returns [`Error::Io`] if `dir` cannot be listed.
pub fn has_foreign_source<T: Toolchain + ?Sized>(toolchain: &T, dir: &Path) -> Result<bool> {
    Ok(top_level(dir)?
        .iter()
        .any(|entry| !entry.file_type().is_dir() && toolchain.is_foreign_source(entry.path())))
}

/// Symlink `source` to `link`. An existing link to the same source is kept.
///
/// # Errors
///
/// Returns [`Error::Io`] if the link cannot be created.
pub fn link_file(source: &Path, link: &Path) -> Result<()> {
    if let Ok(existing) = std::fs::read_link(link) {
        if existing == source {
            return Ok(());
        }
        std::fs::remove_file(link).map_err(|e| Error::io(e, link, "remove stale link"))?;
    }
    symlink(source, link).map_err(|e| Error::io(e, link, "link source file"))
}

/// Materializes variants for one workspace.
pub struct Materializer<'a> {
    host: &'a dyn Host,
    scratch_root: &'a Path,
    roots: &'a [PathBuf],
    builtin_root: &'a Path,
}

impl<'a> Materializer<'a> {
    /// Create a materializer writing under `scratch_root`.
    #[must_use]
    pub fn new(
        host: &'a dyn Host,
        scratch_root: &'a Path,
        roots: &'a [PathBuf],
        builtin_root: &'a Path,
    ) -> Self {
        Self {
            host,
            scratch_root,
            roots,
            builtin_root,
        }
    }

    /// Where the real source of `id` lives for the given origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the source does not exist.
    pub fn source_for(&self, id: &DependencyId, origin: SourceOrigin) -> Result<PathBuf> {
        match origin {
            SourceOrigin::Roots => find_source(self.roots, id),
            SourceOrigin::Builtin => {
                let source = self.host.builtin_source(self.builtin_root, id);
                if source.is_dir() {
                    Ok(source)
                } else {
                    Err(Error::NotFound {
                        id: id.to_string(),
                        roots: vec![self.builtin_root.to_path_buf()],
                    })
                }
            }
        }
    }

    /// Whether the real source of `id` holds foreign source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be found or listed.
    pub fn is_foreign(&self, id: &DependencyId) -> Result<bool> {
        let source = find_source(self.roots, id)?;
        has_foreign_source(self.host, &source)
    }

    /// Link `source` in as `scratch` and report its non-test dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if linking fails, or the extractor's error.
    pub fn link_through(&self, scratch: &ScratchId, source: &Path) -> Result<Imports> {
        let destination = unit_dir(self.scratch_root, scratch);
        std::fs::create_dir_all(&destination)
            .map_err(|e| Error::io(e, &destination, "create link directory"))?;

        let mut linked = 0usize;
        for entry in top_level(source)? {
            if entry.file_type().is_dir() {
                continue;
            }
            link_file(entry.path(), &destination.join(entry.file_name()))?;
            linked += 1;
        }
        tracing::debug!(scratch = %scratch, source = %source.display(), linked, "Linked through");

        self.host.imports(source, false)
    }

    /// Generate `scratch` from the real source of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no source, [`Error::Io`] if
    /// the destination cannot be created, and [`Error::Generation`] wrapping
    /// any generator failure.
    pub fn generate(
        &self,
        id: &DependencyId,
        scratch: &ScratchId,
        origin: SourceOrigin,
        mode: GenerateMode,
        config: &PackageMockConfig,
    ) -> Result<Imports> {
        let source = self.source_for(id, origin)?;
        let destination = unit_dir(self.scratch_root, scratch);
        std::fs::create_dir_all(&destination)
            .map_err(|e| Error::io(e, &destination, "create generated directory"))?;

        tracing::debug!(
            dependency = %id,
            scratch = %scratch,
            %mode,
            source = %source.display(),
            "Generating"
        );

        self.host
            .generate(&GenerateRequest {
                id,
                source: &source,
                destination: &destination,
                mode,
                config,
            })
            .map_err(|e| Error::generation(id.as_str(), e))
    }
}
