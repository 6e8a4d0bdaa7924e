//! Test-root copies and the identity rewrite map.

use crate::config::PackageMockConfig;
use crate::error::{Error, Result};
use crate::identity::{DependencyId, ScratchId, Variant};
use crate::imports::NameMap;
use crate::materializer::{link_file, top_level, unit_dir};
use crate::traits::Host;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Bidirectional map between scratch identities and the real identifiers
/// they stand for.
///
/// Only identities that differ from their real identifier are recorded; the
/// map is used to translate output, never to resolve.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityRewriteMap {
    to_real: BTreeMap<ScratchId, DependencyId>,
    to_scratch: BTreeMap<DependencyId, BTreeSet<ScratchId>>,
}

impl IdentityRewriteMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `scratch` stands for `real`. Identity entries are dropped.
    /// Returns whether anything was recorded.
    pub fn record(&mut self, scratch: ScratchId, real: DependencyId) -> bool {
        if scratch.as_str() == real.as_str() {
            return false;
        }
        self.to_scratch
            .entry(real.clone())
            .or_default()
            .insert(scratch.clone());
        self.to_real.insert(scratch, real);
        true
    }

    /// Record every entry of a name map.
    pub fn record_names(&mut self, names: &NameMap) {
        for (real, scratch) in names {
            self.record(scratch.clone(), real.clone());
        }
    }

    /// The real identifier behind `scratch`.
    #[must_use]
    pub fn real(&self, scratch: &ScratchId) -> Option<&DependencyId> {
        self.to_real.get(scratch)
    }

    /// Every recorded scratch identity for `real`.
    pub fn scratch(&self, real: &DependencyId) -> impl Iterator<Item = &ScratchId> {
        self.to_scratch.get(real).into_iter().flatten()
    }

    /// Number of recorded scratch identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_real.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_real.is_empty()
    }

    /// Iterate over `(scratch, real)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ScratchId, &DependencyId)> {
        self.to_real.iter()
    }

    /// `(needle, replacement)` pairs for output translation, longest needle
    /// first so a longer identity is never clipped by a shorter one.
    #[must_use]
    pub fn translation_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .to_real
            .iter()
            .map(|(scratch, real)| (scratch.to_string(), real.to_string()))
            .collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        pairs
    }
}

/// Write the test-root copy of `id` from `source` and record its renames.
///
/// `names` maps the unit's declared dependencies to the identities it must
/// use. A reference to the unit itself is retargeted to its test-root
/// identity. Non-source files are symlinked, source files are rewritten by
/// the generator and subdirectories are skipped. Returns the copy's
/// directory.
///
/// # Errors
///
/// Returns [`Error::Io`] for filesystem failures and [`Error::Generation`]
/// if the generator cannot rewrite a file or mock the unit's interfaces.
pub fn rewrite_test_root(
    host: &dyn Host,
    scratch_root: &Path,
    id: &DependencyId,
    source: &Path,
    names: &NameMap,
    config: &PackageMockConfig,
    map: &mut IdentityRewriteMap,
) -> Result<PathBuf> {
    let scratch = id.scratch(Variant::TestRoot);
    let destination = unit_dir(scratch_root, &scratch);
    std::fs::create_dir_all(&destination)
        .map_err(|e| Error::io(e, &destination, "create test root directory"))?;

    let mut names = names.clone();
    names.insert(id.clone(), scratch.clone());

    for entry in top_level(source)? {
        if entry.file_type().is_dir() {
            continue;
        }
        let target = destination.join(entry.file_name());
        if host.is_source_file(entry.path()) {
            host.rewrite_file(entry.path(), &target, &names, config)
                .map_err(|e| Error::generation(id.as_str(), e))?;
        } else {
            link_file(entry.path(), &target)?;
        }
    }

    map.record_names(&names);

    let source_root = scratch_root.join(crate::materializer::SOURCE_DIR);
    host.mock_interfaces(&source_root, id, config)
        .map_err(|e| Error::generation(id.as_str(), e))?;

    tracing::debug!(
        dependency = %id,
        scratch = %scratch,
        renamed = names.len(),
        "Wrote test root"
    );
    Ok(destination)
}
