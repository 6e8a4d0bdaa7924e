//! A [`Host`](crate::Host) driven by external commands.
//!
//! Every collaborator call is an argv template from [`HostConfig`]. Known
//! placeholders such as `{id}` or `{source}` are substituted per call; any
//! other braces are passed through untouched, so templates like
//! `go list -f {{.Dir}} {id}` work as written.
//!
//! ```toml
//! root_variable = "GOPATH"
//! foreign_extensions = ["c", "s"]
//!
//! [commands]
//! roots = ["go", "env", "GOPATH"]
//! builtin_root = ["go", "env", "GOROOT"]
//! builtins = ["go", "list", "std"]
//! locate = ["go", "list", "-e", "-f", "{{.Dir}}", "{id}"]
//! imports = ["mockgen-go", "imports", "--tests={tests}", "{source}"]
//! generate = ["mockgen-go", "generate", "--mode={mode}", "--config={config}", "{source}", "{dest}"]
//! rewrite = ["mockgen-go", "rewrite", "--names={names}", "--config={config}", "{source}", "{target}"]
//! install = ["go", "install", "{id}"]
//! ```

use crate::config::{PackageMockConfig, load_file};
use crate::error::{Error, Result};
use crate::identity::{DependencyId, ScratchId};
use crate::imports::{Imports, NameMap};
use crate::traits::{
    CommandSpec, DependencyLocator, GenerateRequest, ImportExtractor, PackageGenerator, Toolchain,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// An argv template.
pub type Argv = Vec<String>;

/// Configuration for [`CommandHost`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Environment variable naming the dependency root.
    #[serde(default = "default_root_variable")]
    pub root_variable: String,

    /// Extensions of files the generator rewrites.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    /// Extensions of files the generator cannot rewrite.
    #[serde(default = "default_foreign_extensions")]
    pub foreign_extensions: Vec<String>,

    /// Where builtin sources live, relative to the builtin root.
    #[serde(default = "default_builtin_source_dir")]
    pub builtin_source_dir: PathBuf,

    /// Identifiers treated as builtins on top of what `builtins` reports.
    #[serde(default = "default_extra_builtins")]
    pub extra_builtins: Vec<DependencyId>,

    /// Mocking runtime identifiers; always excluded.
    #[serde(default = "default_runtime_support")]
    pub runtime_support: Vec<DependencyId>,

    /// The command templates.
    pub commands: HostCommands,
}

/// Command templates for each collaborator call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HostCommands {
    /// Prints the dependency roots joined by the platform path separator.
    pub roots: Argv,
    /// Prints the builtin root.
    pub builtin_root: Argv,
    /// Prints one builtin identifier per line.
    pub builtins: Argv,
    /// `{id}`; prints the unit's source directory, or nothing.
    pub locate: Argv,
    /// `{source}`, `{tests}`; prints import lines.
    pub imports: Argv,
    /// `{source}`, `{dest}`, `{mode}`, `{config}`; prints import lines.
    pub generate: Argv,
    /// `{source}`, `{target}`, `{names}`, `{config}`.
    pub rewrite: Argv,
    /// `{root}`, `{id}`, `{config}`.
    #[serde(default)]
    pub interfaces: Option<Argv>,
    /// `{id}`; run inside the workspace for every materialized unit.
    #[serde(default)]
    pub install: Option<Argv>,
}

fn default_root_variable() -> String {
    "GOPATH".to_string()
}

fn default_source_extensions() -> Vec<String> {
    vec!["go".to_string()]
}

fn default_foreign_extensions() -> Vec<String> {
    vec!["c".to_string(), "s".to_string()]
}

fn default_builtin_source_dir() -> PathBuf {
    PathBuf::from("src/pkg")
}

fn default_extra_builtins() -> Vec<DependencyId> {
    DependencyId::parse("C").into_iter().collect()
}

fn default_runtime_support() -> Vec<DependencyId> {
    DependencyId::parse("code.google.com/p/gomock/gomock")
        .into_iter()
        .collect()
}

impl HostConfig {
    /// Load and validate a host configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is malformed or a required
    /// command template is empty.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = load_file(path)?;
        config
            .validate()
            .map_err(|message| Error::config(path, message))?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let c = &self.commands;
        let required = [
            ("roots", &c.roots),
            ("builtin_root", &c.builtin_root),
            ("builtins", &c.builtins),
            ("locate", &c.locate),
            ("imports", &c.imports),
            ("generate", &c.generate),
            ("rewrite", &c.rewrite),
        ];
        let optional = [("interfaces", &c.interfaces), ("install", &c.install)];

        let empty = required
            .into_iter()
            .chain(optional.into_iter().filter_map(|(n, a)| a.as_ref().map(|a| (n, a))))
            .find(|(_, argv)| argv.is_empty());
        match empty {
            Some((name, _)) => Err(format!("command '{name}' must name a program")),
            None => Ok(()),
        }
    }
}

/// Implements every collaborator trait by running commands.
///
/// The dependency roots are queried once and reused afterwards.
#[derive(Debug, Clone)]
pub struct CommandHost {
    config: HostConfig,
    roots: OnceLock<Vec<PathBuf>>,
}

impl CommandHost {
    /// Create a host from its configuration.
    #[must_use]
    pub const fn new(config: HostConfig) -> Self {
        Self {
            config,
            roots: OnceLock::new(),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    fn has_extension(path: &Path, extensions: &[String]) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|known| known == ext))
    }
}

/// Substitute `{name}` placeholders in every argument of `template`.
fn expand(template: &[String], vars: &[(&str, &str)]) -> CommandSpec {
    let substitute = |arg: &String| {
        vars.iter().fold(arg.clone(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
    };
    let mut argv = template.iter().map(substitute);
    let program = argv.next().unwrap_or_default();
    CommandSpec {
        program,
        args: argv.collect(),
    }
}

/// Run `command` and return its trimmed stdout.
fn capture(command: &CommandSpec) -> Result<String> {
    tracing::trace!(command = %command, "Running host command");
    let output = Command::new(&command.program)
        .args(&command.args)
        .output()
        .map_err(|e| Error::io(e, &command.program, "run host command"))?;

    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stderr).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stdout));
        return Err(Error::ToolchainFailure {
            command: command.to_string(),
            status: output.status.to_string(),
            output: combined,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::contract(format!("cannot encode {what}: {e}")))
}

impl DependencyLocator for CommandHost {
    fn locate(&self, id: &DependencyId) -> Result<PathBuf> {
        // Units outside every root are named by their absolute path.
        if let Some(absolute) = id.as_str().strip_prefix('_')
            && absolute.starts_with('/')
        {
            return Ok(PathBuf::from(absolute));
        }

        let found = capture(&expand(&self.config.commands.locate, &[("id", id.as_str())]))?;
        if found.is_empty() {
            return Err(Error::NotFound {
                id: id.to_string(),
                roots: self.roots.get().cloned().unwrap_or_default(),
            });
        }
        Ok(PathBuf::from(found))
    }
}

impl ImportExtractor for CommandHost {
    fn imports(&self, source: &Path, include_tests: bool) -> Result<Imports> {
        let source = source.to_string_lossy();
        let tests = if include_tests { "true" } else { "false" };
        let command = expand(
            &self.config.commands.imports,
            &[("source", source.as_ref()), ("tests", tests)],
        );
        Imports::parse_lines(&capture(&command)?)
    }
}

impl PackageGenerator for CommandHost {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<Imports> {
        let config = to_json(request.config, "mock configuration")?;
        let mode = request.mode.to_string();
        let source = request.source.to_string_lossy();
        let dest = request.destination.to_string_lossy();
        let command = expand(
            &self.config.commands.generate,
            &[
                ("source", source.as_ref()),
                ("dest", dest.as_ref()),
                ("mode", mode.as_str()),
                ("config", config.as_str()),
            ],
        );
        Imports::parse_lines(&capture(&command)?)
    }

    fn rewrite_file(
        &self,
        source: &Path,
        target: &Path,
        names: &NameMap,
        config: &PackageMockConfig,
    ) -> Result<()> {
        let names = to_json(names, "name map")?;
        let config = to_json(config, "mock configuration")?;
        let source = source.to_string_lossy();
        let target = target.to_string_lossy();
        let command = expand(
            &self.config.commands.rewrite,
            &[
                ("source", source.as_ref()),
                ("target", target.as_ref()),
                ("names", names.as_str()),
                ("config", config.as_str()),
            ],
        );
        capture(&command).map(drop)
    }

    fn mock_interfaces(
        &self,
        scratch_root: &Path,
        id: &DependencyId,
        config: &PackageMockConfig,
    ) -> Result<()> {
        let Some(template) = &self.config.commands.interfaces else {
            return Ok(());
        };
        let config = to_json(config, "mock configuration")?;
        let root = scratch_root.to_string_lossy();
        let command = expand(
            template,
            &[
                ("root", root.as_ref()),
                ("id", id.as_str()),
                ("config", config.as_str()),
            ],
        );
        capture(&command).map(drop)
    }
}

impl Toolchain for CommandHost {
    fn root_variable(&self) -> &str {
        &self.config.root_variable
    }

    fn dependency_roots(&self) -> Result<Vec<PathBuf>> {
        if let Some(roots) = self.roots.get() {
            return Ok(roots.clone());
        }
        let joined = capture(&expand(&self.config.commands.roots, &[]))?;
        let roots: Vec<PathBuf> = std::env::split_paths(&joined)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        Ok(self.roots.get_or_init(|| roots).clone())
    }

    fn builtin_root(&self) -> Result<PathBuf> {
        let root = capture(&expand(&self.config.commands.builtin_root, &[]))?;
        if root.is_empty() {
            return Err(Error::contract("builtin root command printed nothing"));
        }
        Ok(PathBuf::from(root))
    }

    fn builtins(&self) -> Result<BTreeSet<DependencyId>> {
        let listed = capture(&expand(&self.config.commands.builtins, &[]))?;
        let mut builtins = listed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(DependencyId::parse)
            .collect::<Result<BTreeSet<_>>>()?;
        builtins.extend(self.config.extra_builtins.iter().cloned());
        Ok(builtins)
    }

    fn builtin_source(&self, builtin_root: &Path, id: &DependencyId) -> PathBuf {
        builtin_root
            .join(&self.config.builtin_source_dir)
            .join(id.as_str())
    }

    fn runtime_support(&self) -> Vec<DependencyId> {
        self.config.runtime_support.clone()
    }

    fn is_source_file(&self, path: &Path) -> bool {
        Self::has_extension(path, &self.config.source_extensions)
    }

    fn is_foreign_source(&self, path: &Path) -> bool {
        Self::has_extension(path, &self.config.foreign_extensions)
    }

    fn install_command(&self, scratch: &ScratchId) -> Option<CommandSpec> {
        self.config
            .commands
            .install
            .as_ref()
            .map(|template| expand(template, &[("id", scratch.as_str())]))
    }
}
