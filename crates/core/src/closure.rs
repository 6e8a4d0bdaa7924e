//! The dependency closure worklist.
//!
//! Every scratch identity that some consumer references gets exactly one
//! entry. Entries are never removed during a run and are flipped to processed
//! exactly once, which is what bounds the resolver's fixed point.

use crate::identity::{DependencyId, ScratchId, Variant};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How an entry ended up in the scratch workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Realization {
    /// Symlinked to the real source.
    Linked,
    /// Written by the package generator.
    Generated,
    /// Left to the toolchain.
    Ignored,
}

impl Realization {
    /// Whether the entry exists on disk and needs installing.
    #[must_use]
    pub const fn is_materialized(self) -> bool {
        matches!(self, Self::Linked | Self::Generated)
    }
}

/// State of a single scratch identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosureEntry {
    /// The resolver has dispatched this entry.
    pub processed: bool,
    /// A consumer asked for a mock.
    pub mock_requested: bool,
    /// Set once the entry has been dispatched successfully.
    pub realization: Option<Realization>,
}

/// Worklist of scratch identities, keyed in identifier order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Closure {
    entries: BTreeMap<ScratchId, ClosureEntry>,
}

impl Closure {
    /// Create an empty closure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `id`, returning the scratch identity consumers must use.
    ///
    /// The request becomes a `Mocked` identity only if a mock was asked for,
    /// mocks are allowed for this consumer and `id` is not excluded.
    /// Repeated requests for the same identity are no-ops.
    pub fn want(
        &mut self,
        id: &DependencyId,
        mock: bool,
        allow_mock: bool,
        excluded: &BTreeSet<DependencyId>,
    ) -> ScratchId {
        let mocked = mock && allow_mock && !excluded.contains(id);
        let variant = if mocked { Variant::Mocked } else { Variant::Plain };
        let scratch = id.scratch(variant);
        self.entries.entry(scratch.clone()).or_insert(ClosureEntry {
            processed: false,
            mock_requested: mocked,
            realization: None,
        });
        scratch
    }

    /// Snapshot of the entries still waiting to be dispatched.
    #[must_use]
    pub fn unprocessed(&self) -> Vec<ScratchId> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.processed)
            .map(|(scratch, _)| scratch.clone())
            .collect()
    }

    /// Whether any entry still waits to be dispatched.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.entries.values().any(|entry| !entry.processed)
    }

    /// Flip `scratch` to processed. Returns false if it already was.
    pub fn mark_processed(&mut self, scratch: &ScratchId) -> bool {
        match self.entries.get_mut(scratch) {
            Some(entry) if !entry.processed => {
                entry.processed = true;
                true
            }
            _ => false,
        }
    }

    /// Record how `scratch` was realized.
    pub fn record(&mut self, scratch: &ScratchId, realization: Realization) {
        if let Some(entry) = self.entries.get_mut(scratch) {
            entry.realization = Some(realization);
        }
    }

    /// Insert an entry that was materialized outside the resolver.
    ///
    /// An existing entry is marked processed with the new realization, so a
    /// pre-seeded link is never dispatched again.
    pub fn insert_processed(&mut self, scratch: ScratchId, realization: Realization) {
        let entry = self.entries.entry(scratch).or_insert(ClosureEntry {
            processed: true,
            mock_requested: false,
            realization: None,
        });
        entry.processed = true;
        entry.realization = Some(realization);
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, scratch: &ScratchId) -> Option<&ClosureEntry> {
        self.entries.get(scratch)
    }

    /// Iterate over all entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ScratchId, &ClosureEntry)> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the closure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any form of `id` already exists on disk.
    #[must_use]
    pub fn is_materialized(&self, id: &DependencyId) -> bool {
        Variant::ALL.into_iter().any(|variant| {
            self.entries
                .get(&id.scratch(variant))
                .and_then(|entry| entry.realization)
                .is_some_and(Realization::is_materialized)
        })
    }

    /// Scratch identities that need installing, in identifier order.
    #[must_use]
    pub fn installable(&self) -> Vec<ScratchId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.realization.is_some_and(Realization::is_materialized))
            .map(|(scratch, _)| scratch.clone())
            .collect()
    }
}
