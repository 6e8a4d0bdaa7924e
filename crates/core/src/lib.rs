//! Mock dependency workspaces.
//!
//! Given a unit of source under test, this crate builds an isolated
//! dependency root in which the dependencies the unit asked to mock are
//! replaced by generated stand-ins, everything else is linked through or
//! reproduced unchanged, and the unit itself is rewritten to reference the
//! right form of each dependency. A command then runs inside that root with
//! scratch paths translated back to real ones in its output.
//!
//! # Architecture
//!
//! - [`identity`] - how several forms of one dependency coexist under
//!   distinct [`ScratchId`]s
//! - [`closure`] and [`resolver`] - the fixed-point worklist deciding which
//!   forms must exist, using the decision table in [`policy`]
//! - [`materializer`] - links or generates a single form on disk
//! - [`rewriter`] - writes the test-root copy and records renames in the
//!   [`IdentityRewriteMap`]
//! - [`workspace`] - [`MockWorkspace`], which owns the scratch directory and
//!   runs commands
//!
//! Everything that depends on the host language goes through the
//! collaborator traits in [`traits`], bundled as [`Host`]. [`CommandHost`]
//! implements them by running commands from a [`HostConfig`].
//!
//! # Variant Marks
//!
//! | Form       | `example.com/lib` in the scratch root |
//! |------------|---------------------------------------|
//! | plain      | `example.com/lib`                     |
//! | mocked     | `example.com/_lib`                    |
//! | test root  | `example.com/@lib`                    |

pub mod closure;
pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod imports;
pub mod materializer;
pub mod packages;
pub mod policy;
pub mod resolver;
pub mod rewriter;
pub mod traits;
pub mod workspace;

pub use closure::{Closure, ClosureEntry, Realization};
pub use config::{MockConfig, PackageMockConfig};
pub use error::{Error, Result};
pub use host::{CommandHost, HostCommands, HostConfig};
pub use identity::{DependencyId, ScratchId, Variant, decode, encode};
pub use imports::{Imports, NameMap};
pub use packages::read_packages;
pub use policy::{Action, Facts, SourceOrigin, decide};
pub use resolver::Resolver;
pub use rewriter::IdentityRewriteMap;
pub use traits::{
    CommandSpec, DependencyLocator, GenerateMode, GenerateRequest, Host, ImportExtractor,
    PackageGenerator, Toolchain,
};
pub use workspace::{CapturedRun, CodeLocation, MockWorkspace};

/// Version of the core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
