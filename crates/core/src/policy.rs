//! How the resolver treats a single dependency.

use serde::Serialize;

/// What the resolver knows about a dependency when it is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Facts {
    /// The dependency is on the exclusion list.
    pub excluded: bool,
    /// The dependency is served by the toolchain.
    pub builtin: bool,
    /// The dependency contains source the generator cannot rewrite.
    pub foreign_source: bool,
    /// Some consumer asked for a mock.
    pub mock_requested: bool,
}

/// Where a generated copy reads its real source from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    /// The dependency roots.
    Roots,
    /// The toolchain's builtin root.
    Builtin,
}

/// The resolver's response to a set of [`Facts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// Symlink the real source and scan it for onward dependencies.
    LinkThrough,
    /// Generate a mock.
    GenerateMock {
        /// Where the real source lives.
        origin: SourceOrigin,
    },
    /// Generate a copy that preserves behaviour.
    GeneratePassthrough,
    /// Nothing to do; the toolchain provides it.
    Ignore,
    /// A mock was requested that cannot be produced.
    Reject,
}

/// Decide what to do with a dependency.
///
/// Exclusion wins over everything else, then builtins, then foreign source.
#[must_use]
pub const fn decide(facts: Facts) -> Action {
    let Facts {
        excluded,
        builtin,
        foreign_source,
        mock_requested,
    } = facts;

    match (excluded, builtin, foreign_source, mock_requested) {
        (true, true, _, _) | (false, true, _, false) => Action::Ignore,
        (true, false, _, _) | (false, false, true, false) => Action::LinkThrough,
        (false, true, _, true) => Action::GenerateMock {
            origin: SourceOrigin::Builtin,
        },
        (false, false, true, true) => Action::Reject,
        (false, false, false, true) => Action::GenerateMock {
            origin: SourceOrigin::Roots,
        },
        (false, false, false, false) => Action::GeneratePassthrough,
    }
}
