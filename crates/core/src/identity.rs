//! Variant identity scheme.
//!
//! A dependency may need to exist in the scratch workspace in more than one
//! form at the same time. Each form gets its own *scratch identity*, derived
//! by prefixing the identifier's last path segment with a single mark
//! character:
//!
//! | Variant    | Mark | `example.com/lib` becomes |
//! |------------|------|---------------------------|
//! | `Plain`    | none | `example.com/lib`         |
//! | `Mocked`   | `_`  | `example.com/_lib`        |
//! | `TestRoot` | `@`  | `example.com/@lib`        |
//!
//! Only the leaf is marked, so a marked unit still nests under the same
//! parent directories as the real one. `Plain` is the identity mapping,
//! which link-through relies on.
//!
//! [`DependencyId`] rejects identifiers whose leaf already begins with a
//! mark, which is what makes decoding total and the scheme collision free.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which form of a dependency lives in the scratch workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Unmodified; linked through or a passthrough copy.
    Plain,
    /// Replaced by a generated mock.
    Mocked,
    /// The unit under test, always a rewritten copy.
    TestRoot,
}

impl Variant {
    /// All variants, in declaration order.
    pub const ALL: [Self; 3] = [Self::Plain, Self::Mocked, Self::TestRoot];

    /// The mark character applied to the leaf segment, if any.
    #[must_use]
    pub const fn mark(self) -> Option<char> {
        match self {
            Self::Plain => None,
            Self::Mocked => Some('_'),
            Self::TestRoot => Some('@'),
        }
    }

    /// Parse a mark character.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContractViolation`] if `mark` is not a known mark.
    pub fn from_mark(mark: char) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.mark() == Some(mark))
            .ok_or_else(|| Error::contract(format!("unknown variant mark '{mark}'")))
    }

    fn from_leading(leaf: &str) -> Option<Self> {
        let first = leaf.chars().next()?;
        Self::from_mark(first).ok()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Mocked => write!(f, "mocked"),
            Self::TestRoot => write!(f, "test-root"),
        }
    }
}

/// A dependency identifier in the host namespace, e.g. `example.com/lib`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DependencyId(String);

impl DependencyId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContractViolation`] for empty identifiers, empty,
    /// `.` or `..` path segments, backslashes, or a leaf segment that starts
    /// with a variant mark.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::contract("dependency identifier is empty"));
        }
        if raw.split('/').any(str::is_empty) {
            return Err(Error::contract(format!(
                "dependency identifier '{raw}' has an empty path segment"
            )));
        }
        // Identifiers become paths under the scratch root and must stay there.
        if raw.contains('\\') || raw.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(Error::contract(format!(
                "dependency identifier '{raw}' has a relative or backslash path segment"
            )));
        }
        let (_, leaf) = split_leaf(&raw);
        if let Some(variant) = Variant::from_leading(leaf) {
            return Err(Error::contract(format!(
                "dependency identifier '{raw}' starts its last segment with the {variant} mark"
            )));
        }
        Ok(Self(raw))
    }

    /// The identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scratch identity for `variant`.
    #[must_use]
    pub fn scratch(&self, variant: Variant) -> ScratchId {
        encode(self, variant)
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DependencyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for DependencyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for DependencyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An identifier as it appears inside the scratch workspace.
///
/// Only constructed through [`encode`], so it always decodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ScratchId(String);

impl ScratchId {
    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the real identifier and variant.
    #[must_use]
    pub fn decode(&self) -> (DependencyId, Variant) {
        decode(self)
    }

    /// The variant this identity stands for.
    #[must_use]
    pub fn variant(&self) -> Variant {
        let (_, leaf) = split_leaf(&self.0);
        Variant::from_leading(leaf).unwrap_or(Variant::Plain)
    }
}

impl fmt::Display for ScratchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScratchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the scratch identity for `(id, variant)`.
#[must_use]
pub fn encode(id: &DependencyId, variant: Variant) -> ScratchId {
    match variant.mark() {
        None => ScratchId(id.0.clone()),
        Some(mark) => {
            let (parent, leaf) = split_leaf(&id.0);
            let mut out = String::with_capacity(id.0.len() + mark.len_utf8());
            out.push_str(parent);
            out.push(mark);
            out.push_str(leaf);
            ScratchId(out)
        }
    }
}

/// Recover `(id, variant)` from a scratch identity.
#[must_use]
pub fn decode(scratch: &ScratchId) -> (DependencyId, Variant) {
    let (parent, leaf) = split_leaf(&scratch.0);
    match Variant::from_leading(leaf) {
        Some(variant) => {
            let mark_len = leaf.chars().next().map_or(0, char::len_utf8);
            let mut raw = String::with_capacity(scratch.0.len() - mark_len);
            raw.push_str(parent);
            raw.push_str(&leaf[mark_len..]);
            (DependencyId(raw), variant)
        }
        None => (DependencyId(scratch.0.clone()), Variant::Plain),
    }
}

/// Split `raw` into the parent prefix (including the trailing `/`) and leaf.
fn split_leaf(raw: &str) -> (&str, &str) {
    raw.rfind('/')
        .map_or(("", raw), |idx| (&raw[..=idx], &raw[idx + 1..]))
}
