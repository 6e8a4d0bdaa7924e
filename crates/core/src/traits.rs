//! Collaborator traits for locating, scanning, generating and installing
//! dependencies.
//!
//! mockroot never parses or rewrites source itself. Everything that depends on
//! the host language goes through these traits, which the workspace consumes
//! as a single [`Host`].

use crate::config::PackageMockConfig;
use crate::error::Result;
use crate::identity::{DependencyId, ScratchId};
use crate::imports::{Imports, NameMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Finds the real source directory of a dependency.
pub trait DependencyLocator {
    /// Returns the directory holding the real source for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the dependency
    /// does not exist in any dependency root.
    fn locate(&self, id: &DependencyId) -> Result<PathBuf>;
}

/// Scans a source directory for the dependencies it declares.
pub trait ImportExtractor {
    /// Lists the dependencies declared by the unit in `source`.
    ///
    /// When `include_tests` is false, references made only from test files
    /// are left out. Each entry is flagged if the unit asked for it to be
    /// mocked.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be scanned.
    fn imports(&self, source: &Path, include_tests: bool) -> Result<Imports>;
}

/// Whether a generated copy replaces the dependency or reproduces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    /// Content replaced by a mock.
    Mock,
    /// Behaviour preserved; only identities are retargeted.
    Passthrough,
}

impl fmt::Display for GenerateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// One request to the package generator.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// The real dependency being generated.
    pub id: &'a DependencyId,
    /// The real source directory.
    pub source: &'a Path,
    /// The scratch directory to write into; already exists.
    pub destination: &'a Path,
    /// Mock or passthrough.
    pub mode: GenerateMode,
    /// The dependency's effective mock configuration.
    pub config: &'a PackageMockConfig,
}

/// Produces generated copies of dependencies.
///
/// This is the source rewrite pass: it knows how to turn a dependency into a
/// mock, how to retarget a single file's references, and how to mock a
/// unit's own exported interfaces.
pub trait PackageGenerator {
    /// Writes a generated copy of `request.source` into
    /// `request.destination`.
    ///
    /// Returns the dependencies the generated copy declares, which the
    /// resolver enqueues as plain requests.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<Imports>;

    /// Writes `source` to `target` with every reference in `names` replaced
    /// by its scratch identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    fn rewrite_file(
        &self,
        source: &Path,
        target: &Path,
        names: &NameMap,
        config: &PackageMockConfig,
    ) -> Result<()>;

    /// Generates interface mocks for the unit `id` inside the scratch source
    /// root.
    ///
    /// # Errors
    ///
    /// Returns an error if interface mocking fails.
    fn mock_interfaces(
        &self,
        scratch_root: &Path,
        id: &DependencyId,
        config: &PackageMockConfig,
    ) -> Result<()>;
}

/// A command line to run inside the scratch workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command from a program and its arguments.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Facts about the host toolchain.
pub trait Toolchain {
    /// Name of the environment variable that selects the dependency root,
    /// e.g. `GOPATH`.
    fn root_variable(&self) -> &str;

    /// The real dependency roots, in search order.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolchain cannot be queried.
    fn dependency_roots(&self) -> Result<Vec<PathBuf>>;

    /// Directory that holds the toolchain's own libraries.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolchain cannot be queried.
    fn builtin_root(&self) -> Result<PathBuf>;

    /// Identifiers served by the toolchain itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolchain cannot be queried.
    fn builtins(&self) -> Result<BTreeSet<DependencyId>>;

    /// Where the source of builtin `id` lives under `builtin_root`.
    fn builtin_source(&self, builtin_root: &Path, id: &DependencyId) -> PathBuf;

    /// Identifiers of the mocking runtime, which must never be mocked.
    fn runtime_support(&self) -> Vec<DependencyId>;

    /// Whether `path` is source the generator can rewrite.
    fn is_source_file(&self, path: &Path) -> bool;

    /// Whether `path` is source the generator cannot rewrite.
    fn is_foreign_source(&self, path: &Path) -> bool;

    /// The command that installs `scratch` inside the workspace, if the
    /// toolchain needs one.
    fn install_command(&self, scratch: &ScratchId) -> Option<CommandSpec>;
}

/// Everything the workspace needs from the host.
pub trait Host: DependencyLocator + ImportExtractor + PackageGenerator + Toolchain + Send + Sync {}

impl<T> Host for T where
    T: DependencyLocator + ImportExtractor + PackageGenerator + Toolchain + Send + Sync
{
}
