//! Scratch workspace lifecycle and command execution.

use crate::closure::{Closure, Realization};
use crate::config::MockConfig;
use crate::error::{Error, Result};
use crate::identity::{DependencyId, ScratchId, Variant};
use crate::materializer::{Materializer, SOURCE_DIR};
use crate::packages::read_packages;
use crate::policy::SourceOrigin;
use crate::resolver::Resolver;
use crate::rewriter::{IdentityRewriteMap, rewrite_test_root};
use crate::traits::{CommandSpec, Host};
use mockroot_translate::{Rules, pump};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncWrite;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Prefix of the private work directory.
pub const WORK_DIR_PREFIX: &str = "mockroot";

/// Directory under the work directory that acts as the dependency root.
pub const SCRATCH_ROOT_DIR: &str = "path";

/// Prefix of the variable that carries the root variable's original value.
pub const ORIGINAL_VALUE_PREFIX: &str = "ORIG_";

/// Where a test root's real source lives and where its copy was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLocation {
    /// The real source directory.
    pub source: PathBuf,
    /// The test-root copy inside the scratch root.
    pub scratch: PathBuf,
}

/// Output of [`MockWorkspace::run_captured`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRun {
    /// The command's exit code.
    pub code: i32,
    /// Translated standard output.
    pub stdout: Vec<u8>,
    /// Translated standard error.
    pub stderr: Vec<u8>,
}

/// Read-only inputs shared by every resolution.
struct Context {
    host: Box<dyn Host>,
    scratch_root: PathBuf,
    roots: Vec<PathBuf>,
    builtin_root: PathBuf,
    builtins: BTreeSet<DependencyId>,
    excluded: BTreeSet<DependencyId>,
    config: MockConfig,
}

impl Context {
    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(
            &*self.host,
            &self.scratch_root,
            &self.roots,
            &self.builtin_root,
        )
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            self.materializer(),
            &self.excluded,
            &self.builtins,
            &self.config,
        )
    }
}

/// An isolated dependency root with selected dependencies replaced by mocks.
///
/// ```no_run
/// # async fn example(host: Box<dyn mockroot_core::Host>) -> mockroot_core::Result<()> {
/// use mockroot_core::{DependencyId, MockWorkspace};
///
/// let mut workspace = MockWorkspace::new(host)?;
/// workspace.add_unit(&DependencyId::parse("example.com/app")?)?;
/// let code = workspace.run("go", &["test".to_string()]).await?;
/// workspace.close()?;
/// # let _ = code;
/// # Ok(())
/// # }
/// ```
pub struct MockWorkspace {
    ctx: Context,
    closure: Closure,
    rewrites: IdentityRewriteMap,
    code: Vec<CodeLocation>,
    work_dir: Option<TempDir>,
    work_path: PathBuf,
    translate: bool,
}

impl std::fmt::Debug for MockWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWorkspace")
            .field("work_path", &self.work_path)
            .field("roots", &self.ctx.roots)
            .field("entries", &self.closure.len())
            .field("test_roots", &self.code.len())
            .field("retained", &self.work_dir.is_none())
            .finish_non_exhaustive()
    }
}

impl MockWorkspace {
    /// Query the host and allocate a private scratch directory.
    ///
    /// The host's mocking runtime is excluded from mocking from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be queried or the scratch
    /// directory cannot be created.
    pub fn new(host: Box<dyn Host>) -> Result<Self> {
        let roots = host.dependency_roots()?;
        let builtin_root = host.builtin_root()?;
        let builtins = host.builtins()?;
        let excluded: BTreeSet<_> = host.runtime_support().into_iter().collect();

        let work_dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir()
            .map_err(|e| Error::io(e, std::env::temp_dir(), "create work directory"))?;
        let work_path = work_dir.path().to_path_buf();
        let scratch_root = work_path.join(SCRATCH_ROOT_DIR);
        let source_dir = scratch_root.join(SOURCE_DIR);
        std::fs::create_dir_all(&source_dir)
            .map_err(|e| Error::io(e, &source_dir, "create scratch root"))?;

        tracing::info!(
            work = %work_path.display(),
            roots = roots.len(),
            builtins = builtins.len(),
            "Created mock workspace"
        );

        Ok(Self {
            ctx: Context {
                host,
                scratch_root,
                roots,
                builtin_root,
                builtins,
                excluded,
                config: MockConfig::default(),
            },
            closure: Closure::new(),
            rewrites: IdentityRewriteMap::new(),
            code: Vec::new(),
            work_dir: Some(work_dir),
            work_path,
            translate: true,
        })
    }

    /// Load the mock configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_config(&mut self, path: &Path) -> Result<()> {
        self.ctx.config = MockConfig::load(path)?;
        tracing::debug!(path = %path.display(), entries = self.ctx.config.mocks.len(), "Loaded mock configuration");
        Ok(())
    }

    /// Replace the mock configuration.
    pub fn set_config(&mut self, config: MockConfig) {
        self.ctx.config = config;
    }

    /// Add a unit under test.
    ///
    /// Resolves the unit's full closure, including test-only dependencies,
    /// then writes its test-root copy with every reference retargeted and
    /// asks the generator to mock its interfaces. Returns the test-root
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while resolving or rewriting.
    #[instrument(skip_all, fields(unit = %id))]
    pub fn add_unit(&mut self, id: &DependencyId) -> Result<ScratchId> {
        let source = self.ctx.host.locate(id)?;
        let imports = self.ctx.host.imports(&source, true)?;
        tracing::debug!(imports = imports.len(), source = %source.display(), "Adding unit");

        let names = self.ctx.resolver().resolve(&mut self.closure, &imports, true)?;
        let config = self.ctx.config.for_dependency(id);
        let scratch = rewrite_test_root(
            &*self.ctx.host,
            &self.ctx.scratch_root,
            id,
            &source,
            &names,
            &config,
            &mut self.rewrites,
        )?;

        self.code.push(CodeLocation { source, scratch });
        tracing::info!(entries = self.closure.len(), mocked = names.len(), "Added unit");
        Ok(id.scratch(Variant::TestRoot))
    }

    /// Link a whole dependency through unchanged.
    ///
    /// The link is recorded as processed so the resolver never regenerates
    /// it; its onward dependencies join the closure.
    ///
    /// # Errors
    ///
    /// Returns an error if the dependency cannot be found or linked.
    #[instrument(skip_all, fields(dependency = %id))]
    pub fn link_dependency(&mut self, id: &DependencyId) -> Result<()> {
        let materializer = self.ctx.materializer();
        let source = materializer.source_for(id, SourceOrigin::Roots)?;
        let scratch = id.scratch(Variant::Plain);
        let onward = materializer.link_through(&scratch, &source)?;

        self.closure.insert_processed(scratch, Realization::Linked);
        for (dependency, _) in onward {
            self.closure
                .want(&dependency, false, false, &self.ctx.excluded);
        }
        Ok(())
    }

    /// Link every dependency listed in a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a dependency cannot be
    /// linked.
    pub fn link_from_file(&mut self, path: &Path) -> Result<()> {
        for id in read_packages(path)? {
            self.link_dependency(&id)?;
        }
        Ok(())
    }

    /// Never mock `id`.
    ///
    /// Exclusions only affect dependencies resolved afterwards.
    pub fn exclude(&mut self, id: DependencyId) {
        if self.closure.is_materialized(&id) {
            tracing::warn!(dependency = %id, "Excluded after it was already materialized");
        }
        self.ctx.excluded.insert(id);
    }

    /// Exclude every dependency listed in a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn exclude_from_file(&mut self, path: &Path) -> Result<()> {
        for id in read_packages(path)? {
            self.exclude(id);
        }
        Ok(())
    }

    /// Keep the work directory after the workspace is closed. Returns its
    /// path.
    pub fn retain(&mut self) -> &Path {
        if let Some(dir) = self.work_dir.take() {
            let _ = dir.keep();
        }
        &self.work_path
    }

    /// Pass command output through untouched.
    pub fn disable_translation(&mut self) {
        self.translate = false;
    }

    /// The private work directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_path
    }

    /// The dependency root inside the work directory.
    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        &self.ctx.scratch_root
    }

    /// The closure built so far.
    #[must_use]
    pub const fn closure(&self) -> &Closure {
        &self.closure
    }

    /// Every rename recorded so far.
    #[must_use]
    pub const fn rewrites(&self) -> &IdentityRewriteMap {
        &self.rewrites
    }

    /// Dependencies that are never mocked.
    #[must_use]
    pub const fn excluded(&self) -> &BTreeSet<DependencyId> {
        &self.ctx.excluded
    }

    /// Test roots added so far, in order.
    #[must_use]
    pub fn code_locations(&self) -> &[CodeLocation] {
        &self.code
    }

    /// Resolve anything still pending, such as onward dependencies of
    /// linked units.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while resolving.
    pub fn drain(&mut self) -> Result<()> {
        self.ctx.resolver().drain(&mut self.closure)
    }

    /// The variables every command inside the workspace runs with.
    #[must_use]
    pub fn environment(&self) -> Vec<(OsString, OsString)> {
        let variable = self.ctx.host.root_variable();
        let original = std::env::var_os(variable).unwrap_or_default();
        vec![
            (OsString::from(variable), self.ctx.scratch_root.clone().into_os_string()),
            (OsString::from(format!("{ORIGINAL_VALUE_PREFIX}{variable}")), original),
        ]
    }

    /// Output translation rules: code locations first, then renamed
    /// identities.
    #[must_use]
    pub fn translation_rules(&self) -> Rules {
        let mut rules = Rules::new();
        for location in &self.code {
            rules.push(
                location.scratch.to_string_lossy().into_owned(),
                location.source.to_string_lossy().into_owned(),
            );
        }
        for (needle, replacement) in self.rewrites.translation_pairs() {
            rules.push(needle, replacement);
        }
        rules
    }

    /// Run a command in the first test root with output translated to real
    /// paths and identifiers. Returns the command's exit code; a failing
    /// command is not an error.
    ///
    /// Pending resolution is drained first, calling the host synchronously.
    /// Callers whose host blocks should [`drain`](Self::drain) off the async
    /// runtime beforehand.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution or installation fails, no unit was
    /// added, or the command cannot be started.
    #[instrument(skip_all, fields(program = %program))]
    pub async fn run(&mut self, program: &str, args: &[String]) -> Result<i32> {
        let (code, _, _) = self
            .execute(program, args, tokio::io::stdout(), tokio::io::stderr())
            .await?;
        Ok(code)
    }

    /// Like [`run`](Self::run), but collects the translated output.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_captured(&mut self, program: &str, args: &[String]) -> Result<CapturedRun> {
        let (code, stdout, stderr) = self.execute(program, args, Vec::new(), Vec::new()).await?;
        Ok(CapturedRun {
            code,
            stdout,
            stderr,
        })
    }

    async fn execute<O, E>(
        &mut self,
        program: &str,
        args: &[String],
        stdout: O,
        stderr: E,
    ) -> Result<(i32, O, E)>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        self.drain()?;

        let working_dir = self
            .code
            .first()
            .map(|location| location.scratch.clone())
            .ok_or_else(|| Error::contract("no unit under test has been added"))?;
        let environment = self.environment();
        let rules = Arc::new(if self.translate {
            self.translation_rules()
        } else {
            Rules::new()
        });

        self.install(&environment, &rules).await?;

        tracing::info!(cwd = %working_dir.display(), "Running command");
        let mut child = Command::new(program)
            .args(args)
            .envs(environment)
            .current_dir(&working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(e, program, "start command"))?;

        let child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::contract("command stdout was not captured"))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::contract("command stderr was not captured"))?;

        let stdout_task = tokio::spawn(pump(child_stdout, stdout, Arc::clone(&rules)));
        let stderr_task = tokio::spawn(pump(child_stderr, stderr, rules));

        let status = child
            .wait()
            .await
            .map_err(|e| Error::io(e, program, "wait for command"))?;
        let stdout = finish_stream(stdout_task, "stdout").await?;
        let stderr = finish_stream(stderr_task, "stderr").await?;

        let code = status.code().unwrap_or(1);
        if status.success() {
            tracing::debug!(code, "Command succeeded");
        } else {
            tracing::warn!(code, "Command failed");
        }
        Ok((code, stdout, stderr))
    }

    /// Install every linked or generated unit, one at a time.
    async fn install(&self, environment: &[(OsString, OsString)], rules: &Arc<Rules>) -> Result<()> {
        for scratch in self.closure.installable() {
            let Some(command) = self.ctx.host.install_command(&scratch) else {
                continue;
            };
            tracing::debug!(%scratch, command = %command, "Installing");
            run_install(&command, environment, &self.ctx.scratch_root, rules).await?;
        }
        Ok(())
    }

    /// Remove the work directory unless it was retained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be removed.
    pub fn close(mut self) -> Result<()> {
        match self.work_dir.take() {
            Some(dir) => dir
                .close()
                .map_err(|e| Error::io(e, &self.work_path, "remove work directory")),
            None => {
                tracing::debug!(work = %self.work_path.display(), "Keeping work directory");
                Ok(())
            }
        }
    }
}

async fn run_install(
    command: &CommandSpec,
    environment: &[(OsString, OsString)],
    working_dir: &Path,
    rules: &Arc<Rules>,
) -> Result<()> {
    let output = Command::new(&command.program)
        .args(&command.args)
        .envs(environment.iter().cloned())
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::io(e, &command.program, "run install command"))?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    Err(Error::ToolchainFailure {
        command: command.to_string(),
        status: output.status.to_string(),
        output: String::from_utf8_lossy(&rules.apply(&combined)).into_owned(),
    })
}

async fn finish_stream<W>(task: JoinHandle<std::io::Result<W>>, stream: &str) -> Result<W> {
    let written = task
        .await
        .map_err(|e| Error::Io {
            source: std::io::Error::other(e),
            path: None,
            operation: format!("forward command {stream}"),
        })?;
    written.map_err(|source| Error::Io {
        source,
        path: None,
        operation: format!("forward command {stream}"),
    })
}
