//! Error types for mock workspace operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for mock workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running a mock workspace.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A dependency could not be found in any real dependency root.
    #[error("Dependency '{id}' not found in any of: {}", display_roots(roots))]
    #[diagnostic(
        code(mockroot::core::not_found),
        help("Check the identifier and that the dependency is present under one of the listed roots")
    )]
    NotFound {
        /// The identifier that was looked up.
        id: String,
        /// Roots that were searched.
        roots: Vec<PathBuf>,
    },

    /// Mocking was requested for a dependency that cannot be rewritten.
    #[error("Unable to mock '{id}': dependencies containing non-rewritable source are not supported")]
    #[diagnostic(
        code(mockroot::core::unsupported_mock),
        help("Remove the mock marker for this dependency or add it to the exclusion list")
    )]
    UnsupportedMock {
        /// The dependency that was requested as a mock.
        id: String,
    },

    /// The package generator failed for a dependency.
    #[error("Failed to generate '{id}'")]
    #[diagnostic(
        code(mockroot::core::generation_failed),
        help("Run with --level debug to see the generator invocation")
    )]
    Generation {
        /// The dependency being generated.
        id: String,
        /// The generator's error.
        #[source]
        source: Box<Error>,
    },

    /// An external toolchain command exited unsuccessfully.
    #[error("External command '{command}' failed ({status}), with output:\n{output}")]
    #[diagnostic(
        code(mockroot::core::toolchain_failed),
        help("The host configuration decides which commands are run; check it matches your toolchain")
    )]
    ToolchainFailure {
        /// The command line that was run.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured output of the command.
        output: String,
    },

    /// I/O error occurred.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(mockroot::core::io_error),
        help("Check that the referenced paths exist and that you have permission to read or write them")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },

    /// Input violated a naming or marking contract.
    #[error("Contract violation: {message}")]
    #[diagnostic(code(mockroot::core::contract_violation))]
    ContractViolation {
        /// What was wrong.
        message: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("Invalid configuration in {path}: {message}")]
    #[diagnostic(
        code(mockroot::core::invalid_config),
        help("Check the file for syntax errors; the format is chosen by extension (.toml, .json, .yaml)")
    )]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },
}

impl Error {
    /// Create an I/O error with context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
            operation: operation.into(),
        }
    }

    /// Create a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap a generator failure for `id`.
    #[must_use]
    pub fn generation(id: impl Into<String>, source: Self) -> Self {
        Self::Generation {
            id: id.into(),
            source: Box::new(source),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "file operation".to_string(),
        }
    }
}

fn display_roots(roots: &[PathBuf]) -> String {
    if roots.is_empty() {
        return "(no roots configured)".to_string();
    }
    roots
        .iter()
        .map(|r| format!("'{}'", r.display()))
        .collect::<Vec<_>>()
        .join(", ")
}
