//! Declared dependency sets and name maps.

use crate::error::Result;
use crate::identity::{DependencyId, ScratchId};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Maps a consumer's declared dependency to the scratch identity it must
/// reference instead. Only entries that actually change are kept.
pub type NameMap = BTreeMap<DependencyId, ScratchId>;

/// Marker word that flags an import as a mock request in line output.
pub const MOCK_MARKER: &str = "mock";

/// Leaf of the interface-mock unit the generator writes next to a test root.
/// It only exists inside the scratch workspace, so it is never resolved.
pub const INTERFACE_MOCKS_LEAF: &str = "_mocks_";

/// The dependencies a unit declares, each flagged with whether the unit asked
/// for it to be mocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Imports {
    entries: BTreeMap<DependencyId, bool>,
}

impl Imports {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declared dependency. A mock request from any declaration
    /// sticks.
    pub fn insert(&mut self, id: DependencyId, mock: bool) {
        let requested = self.entries.entry(id).or_insert(false);
        *requested = *requested || mock;
    }

    /// Whether `id` is declared.
    #[must_use]
    pub fn contains(&self, id: &DependencyId) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether `id` is declared and flagged as a mock.
    #[must_use]
    pub fn is_mock(&self, id: &DependencyId) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    /// Number of declared dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(id, mock_requested)` in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&DependencyId, bool)> {
        self.entries.iter().map(|(id, mock)| (id, *mock))
    }

    /// The same set with every mock request dropped.
    #[must_use]
    pub fn without_mocks(&self) -> Self {
        Self {
            entries: self.entries.keys().map(|id| (id.clone(), false)).collect(),
        }
    }

    /// Parse line-oriented import output: one identifier per line, optionally
    /// followed by the word `mock`. Blank lines and generated interface-mock
    /// units are skipped.
    ///
    /// # Errors
    ///
    /// Returns a contract violation for malformed identifiers or trailing
    /// words other than `mock`.
    pub fn parse_lines(text: &str) -> Result<Self> {
        let mut imports = Self::new();
        for line in text.lines() {
            let mut words = line.split_whitespace();
            let Some(raw) = words.next() else {
                continue;
            };
            if raw.rsplit('/').next() == Some(INTERFACE_MOCKS_LEAF) {
                continue;
            }
            let mock = match words.next() {
                None => false,
                Some(word) if word.eq_ignore_ascii_case(MOCK_MARKER) => true,
                Some(word) => {
                    return Err(crate::Error::contract(format!(
                        "unexpected '{word}' after import '{raw}'"
                    )));
                }
            };
            imports.insert(DependencyId::parse(raw)?, mock);
        }
        Ok(imports)
    }
}

impl FromIterator<(DependencyId, bool)> for Imports {
    fn from_iter<I: IntoIterator<Item = (DependencyId, bool)>>(iter: I) -> Self {
        let mut imports = Self::new();
        for (id, mock) in iter {
            imports.insert(id, mock);
        }
        imports
    }
}

impl IntoIterator for Imports {
    type Item = (DependencyId, bool);
    type IntoIter = btree_map::IntoIter<DependencyId, bool>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
