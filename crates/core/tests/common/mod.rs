//! Filesystem-backed fake host shared by the integration tests.
//!
//! A unit is a directory under `<root>/src/<id>` holding:
//! - `unit.src`, its only rewritable source file
//! - `imports.txt`, one `<id>` or `<id> mock` per line
//! - `tests.txt`, imports used only by tests
//!
//! Generated copies get a `GENERATED` file naming the mode and source.

#![allow(dead_code)]

use mockroot_core::{
    CommandSpec, DependencyId, DependencyLocator, Error, GenerateMode, GenerateRequest,
    ImportExtractor, Imports, NameMap, PackageGenerator, PackageMockConfig, Result, ScratchId,
    Toolchain,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const ROOT_VARIABLE: &str = "MOCKROOT_FAKE_ROOT";
pub const RUNTIME: &str = "mock/runtime";

pub fn id(raw: &str) -> DependencyId {
    DependencyId::parse(raw).unwrap()
}

/// Real dependency root and builtin root on disk.
pub struct Fixture {
    _temp: TempDir,
    pub root: PathBuf,
    pub builtin_root: PathBuf,
    builtins: BTreeSet<DependencyId>,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("deps");
        let builtin_root = temp.path().join("toolchain");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(builtin_root.join("src/pkg")).unwrap();

        let fixture = Self {
            _temp: temp,
            root,
            builtin_root,
            builtins: BTreeSet::new(),
        };
        fixture.unit(RUNTIME, &[]);
        fixture
    }

    /// Write a unit into the dependency root.
    pub fn unit(&self, raw: &str, imports: &[&str]) -> PathBuf {
        let dir = self.root.join("src").join(raw);
        write_unit(&dir, raw, imports);
        dir
    }

    /// Add test-only imports to an existing unit.
    pub fn test_imports(&self, raw: &str, imports: &[&str]) {
        let dir = self.root.join("src").join(raw);
        fs::write(dir.join("tests.txt"), lines(imports)).unwrap();
    }

    /// Add a file the generator cannot rewrite.
    pub fn foreign(&self, raw: &str) {
        let dir = self.root.join("src").join(raw);
        fs::write(dir.join("asm.s"), "TEXT ·f(SB)").unwrap();
    }

    /// Add a nested directory that must never be copied.
    pub fn nested(&self, raw: &str) {
        let dir = self.root.join("src").join(raw).join("internal");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("deep.src"), "deep").unwrap();
    }

    /// Register a builtin with source under the builtin root.
    pub fn builtin(&mut self, raw: &str) {
        let dir = self.builtin_root.join("src/pkg").join(raw);
        write_unit(&dir, raw, &[]);
        self.builtins.insert(id(raw));
    }

    pub fn host(&self) -> FakeHost {
        FakeHost {
            root: self.root.clone(),
            builtin_root: self.builtin_root.clone(),
            builtins: self.builtins.clone(),
            install: None,
            calls: Arc::default(),
        }
    }
}

fn lines(imports: &[&str]) -> String {
    imports.iter().map(|line| format!("{line}\n")).collect()
}

fn write_unit(dir: &Path, raw: &str, imports: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("unit.src"), format!("unit {raw}\n")).unwrap();
    fs::write(dir.join("imports.txt"), lines(imports)).unwrap();
}

fn read_imports(path: &Path) -> Result<Imports> {
    match fs::read_to_string(path) {
        Ok(text) => Imports::parse_lines(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Imports::new()),
        Err(e) => Err(Error::io(e, path, "read imports")),
    }
}

/// A host that records every generator call.
#[derive(Clone)]
pub struct FakeHost {
    root: PathBuf,
    builtin_root: PathBuf,
    builtins: BTreeSet<DependencyId>,
    install: Option<Vec<String>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeHost {
    /// Install every unit with `argv`, where `{id}` is replaced by the
    /// scratch identity.
    pub fn with_install(mut self, argv: &[&str]) -> Self {
        self.install = Some(argv.iter().map(ToString::to_string).collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DependencyLocator for FakeHost {
    fn locate(&self, id: &DependencyId) -> Result<PathBuf> {
        let dir = self.root.join("src").join(id.as_str());
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::NotFound {
                id: id.to_string(),
                roots: vec![self.root.clone()],
            })
        }
    }
}

impl ImportExtractor for FakeHost {
    fn imports(&self, source: &Path, include_tests: bool) -> Result<Imports> {
        let mut imports = read_imports(&source.join("imports.txt"))?;
        if include_tests {
            for (id, mock) in read_imports(&source.join("tests.txt"))? {
                imports.insert(id, mock);
            }
        }
        Ok(imports)
    }
}

impl PackageGenerator for FakeHost {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<Imports> {
        if request.source.join("FAIL").exists() {
            return Err(Error::contract("generator refused"));
        }
        self.record(format!("generate {} {}", request.mode, request.id));
        fs::write(
            request.destination.join("GENERATED"),
            format!(
                "mode={}\nsource={}\npassthrough={}\n",
                request.mode,
                request.source.display(),
                request.config.passthrough.join(",")
            ),
        )
        .map_err(|e| Error::io(e, request.destination, "write generated marker"))?;

        let mut imports = self.imports(request.source, false)?.without_mocks();
        if request.mode == GenerateMode::Mock {
            imports.insert(id(RUNTIME), false);
        }
        Ok(imports)
    }

    fn rewrite_file(
        &self,
        source: &Path,
        target: &Path,
        names: &NameMap,
        _config: &PackageMockConfig,
    ) -> Result<()> {
        let mut text = fs::read_to_string(source).map_err(|e| Error::io(e, source, "read"))?;
        for (real, scratch) in names {
            text.push_str(&format!("uses {real} as {scratch}\n"));
        }
        fs::write(target, text).map_err(|e| Error::io(e, target, "write"))
    }

    fn mock_interfaces(
        &self,
        scratch_root: &Path,
        id: &DependencyId,
        _config: &PackageMockConfig,
    ) -> Result<()> {
        assert!(scratch_root.ends_with("src"));
        self.record(format!("interfaces {id}"));
        Ok(())
    }
}

impl Toolchain for FakeHost {
    fn root_variable(&self) -> &str {
        ROOT_VARIABLE
    }

    fn dependency_roots(&self) -> Result<Vec<PathBuf>> {
        Ok(vec![self.root.clone()])
    }

    fn builtin_root(&self) -> Result<PathBuf> {
        Ok(self.builtin_root.clone())
    }

    fn builtins(&self) -> Result<BTreeSet<DependencyId>> {
        Ok(self.builtins.clone())
    }

    fn builtin_source(&self, builtin_root: &Path, id: &DependencyId) -> PathBuf {
        builtin_root.join("src/pkg").join(id.as_str())
    }

    fn runtime_support(&self) -> Vec<DependencyId> {
        vec![id(RUNTIME)]
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "src")
    }

    fn is_foreign_source(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "s")
    }

    fn install_command(&self, scratch: &ScratchId) -> Option<CommandSpec> {
        let argv = self.install.as_ref()?;
        let mut args = argv.iter().map(|arg| arg.replace("{id}", scratch.as_str()));
        let program = args.next()?;
        Some(CommandSpec::new(program, args))
    }
}
