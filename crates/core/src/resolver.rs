//! Fixed-point dependency closure resolution.
//!
//! Starting from a unit's declared dependencies, the resolver repeatedly
//! takes every unprocessed closure entry, decides how to realize it and
//! materializes it. Materializing reports onward dependencies, which join the
//! closure as plain requests. The loop ends once a round finds nothing left
//! to do; since entries are never removed and each is processed once, this
//! happens after at most `|reachable identifiers| * |variants|` dispatches.

use crate::closure::{Closure, Realization};
use crate::config::MockConfig;
use crate::error::{Error, Result};
use crate::identity::{DependencyId, ScratchId, Variant};
use crate::imports::{Imports, NameMap};
use crate::materializer::Materializer;
use crate::policy::{Action, Facts, SourceOrigin, decide};
use crate::traits::GenerateMode;
use std::collections::BTreeSet;

/// Resolves dependency closures against one workspace.
pub struct Resolver<'a> {
    materializer: Materializer<'a>,
    excluded: &'a BTreeSet<DependencyId>,
    builtins: &'a BTreeSet<DependencyId>,
    config: &'a MockConfig,
}

impl<'a> Resolver<'a> {
    /// Create a resolver.
    #[must_use]
    pub fn new(
        materializer: Materializer<'a>,
        excluded: &'a BTreeSet<DependencyId>,
        builtins: &'a BTreeSet<DependencyId>,
        config: &'a MockConfig,
    ) -> Self {
        Self {
            materializer,
            excluded,
            builtins,
            config,
        }
    }

    /// Seed `closure` with `imports` and run it to a fixed point.
    ///
    /// Mock requests are honoured only when `allow_mock` is set. Returns the
    /// identities the seeding unit must use instead of its declared ones,
    /// leaving out every dependency whose identity does not change.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while materializing; the closure keeps
    /// whatever was processed before it.
    pub fn resolve(
        &self,
        closure: &mut Closure,
        imports: &Imports,
        allow_mock: bool,
    ) -> Result<NameMap> {
        let mut names = NameMap::new();
        for (id, mock) in imports.iter() {
            let scratch = closure.want(id, mock, allow_mock, self.excluded);
            if scratch.as_str() != id.as_str() {
                names.insert(id.clone(), scratch);
            }
        }

        self.drain(closure)?;
        Ok(names)
    }

    /// Process entries until none are pending.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while materializing.
    pub fn drain(&self, closure: &mut Closure) -> Result<()> {
        let mut round = 0usize;
        loop {
            let pending = closure.unprocessed();
            if pending.is_empty() {
                tracing::debug!(rounds = round, entries = closure.len(), "Closure complete");
                return Ok(());
            }
            round += 1;
            tracing::trace!(round, pending = pending.len(), "Resolving round");

            for scratch in pending {
                if !closure.mark_processed(&scratch) {
                    continue;
                }
                let realization = self.dispatch(closure, &scratch)?;
                closure.record(&scratch, realization);
            }
        }
    }

    fn dispatch(&self, closure: &mut Closure, scratch: &ScratchId) -> Result<Realization> {
        let (id, variant) = scratch.decode();
        let excluded = self.excluded.contains(&id);
        let builtin = self.builtins.contains(&id);
        let facts = Facts {
            excluded,
            builtin,
            foreign_source: !excluded && !builtin && self.materializer.is_foreign(&id)?,
            mock_requested: variant == Variant::Mocked,
        };
        let action = decide(facts);
        tracing::debug!(dependency = %id, %scratch, ?action, "Dispatching");

        let onward = match action {
            Action::Ignore => return Ok(Realization::Ignored),
            Action::Reject => {
                return Err(Error::UnsupportedMock { id: id.to_string() });
            }
            Action::LinkThrough => {
                let source = self.materializer.source_for(&id, SourceOrigin::Roots)?;
                let onward = self.materializer.link_through(scratch, &source)?;
                self.enqueue(closure, onward);
                return Ok(Realization::Linked);
            }
            Action::GenerateMock { origin } => self.materializer.generate(
                &id,
                scratch,
                origin,
                GenerateMode::Mock,
                &self.config.for_dependency(&id),
            )?,
            Action::GeneratePassthrough => self.materializer.generate(
                &id,
                scratch,
                SourceOrigin::Roots,
                GenerateMode::Passthrough,
                &self.config.for_dependency(&id),
            )?,
        };

        self.enqueue(closure, onward);
        Ok(Realization::Generated)
    }

    /// Onward dependencies are always plain requests.
    fn enqueue(&self, closure: &mut Closure, onward: Imports) {
        for (id, _) in onward {
            closure.want(&id, false, false, self.excluded);
        }
    }
}
