//! Closure resolution through a whole workspace.

mod common;

use common::{Fixture, RUNTIME, id};
use mockroot_core::{
    Error, MockConfig, MockWorkspace, PackageMockConfig, Realization, ScratchId, Variant,
};
use std::fs;
use std::path::{Path, PathBuf};

const APP: &str = "example.com/app";
const LIB_A: &str = "example.com/liba";
const LIB_B: &str = "example.com/libb";
const LIB_C: &str = "fmt";

fn scratch(raw: &str, variant: Variant) -> ScratchId {
    id(raw).scratch(variant)
}

fn realization(workspace: &MockWorkspace, scratch: &ScratchId) -> Option<Realization> {
    workspace.closure().get(scratch).and_then(|entry| entry.realization)
}

fn unit_dir(workspace: &MockWorkspace, scratch: &ScratchId) -> PathBuf {
    workspace.scratch_root().join("src").join(scratch.as_str())
}

fn generated_mode(dir: &Path) -> String {
    let marker = fs::read_to_string(dir.join("GENERATED")).unwrap();
    marker.lines().next().unwrap().to_string()
}

/// `app` uses `liba` as is, mocks `libb` and uses builtin `fmt`; `liba` uses
/// `fmt` as well.
fn standard_fixture() -> Fixture {
    let mut fixture = Fixture::new();
    fixture.builtin(LIB_C);
    fixture.unit(APP, &[LIB_A, "example.com/libb mock", LIB_C]);
    fixture.unit(LIB_A, &[LIB_C]);
    fixture.unit(LIB_B, &[]);
    fixture
}

#[test]
fn test_end_to_end_closure() {
    let fixture = standard_fixture();
    let host = fixture.host();
    let mut workspace = MockWorkspace::new(Box::new(host.clone())).unwrap();

    let root = workspace.add_unit(&id(APP)).unwrap();
    assert_eq!(root.as_str(), "example.com/@app");

    // liba: plain passthrough copy
    let lib_a = scratch(LIB_A, Variant::Plain);
    assert_eq!(realization(&workspace, &lib_a), Some(Realization::Generated));
    assert_eq!(generated_mode(&unit_dir(&workspace, &lib_a)), "mode=passthrough");

    // libb: mocked
    let lib_b = scratch(LIB_B, Variant::Mocked);
    assert_eq!(realization(&workspace, &lib_b), Some(Realization::Generated));
    assert_eq!(generated_mode(&unit_dir(&workspace, &lib_b)), "mode=mock");
    assert!(workspace.closure().get(&scratch(LIB_B, Variant::Plain)).is_none());

    // fmt: builtin, left to the toolchain
    let lib_c = scratch(LIB_C, Variant::Plain);
    assert_eq!(realization(&workspace, &lib_c), Some(Realization::Ignored));
    assert!(!unit_dir(&workspace, &lib_c).exists());

    // The mock's runtime is linked, never generated.
    assert_eq!(
        realization(&workspace, &scratch(RUNTIME, Variant::Plain)),
        Some(Realization::Linked)
    );

    assert!(workspace.closure().iter().all(|(_, entry)| entry.processed));
    assert!(host.calls().contains(&format!("interfaces {APP}")));
}

#[test]
fn test_test_root_references_are_retargeted() {
    let fixture = standard_fixture();
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    let root_dir = unit_dir(&workspace, &scratch(APP, Variant::TestRoot));
    let rewritten = fs::read_to_string(root_dir.join("unit.src")).unwrap();
    assert!(rewritten.contains("uses example.com/libb as example.com/_libb"));
    assert!(rewritten.contains("uses example.com/app as example.com/@app"));
    assert!(!rewritten.contains("uses example.com/liba"));

    // Non-source files are linked to the real ones.
    let imports = root_dir.join("imports.txt");
    assert!(fs::symlink_metadata(&imports).unwrap().file_type().is_symlink());
    assert_eq!(
        fs::read_link(&imports).unwrap(),
        fixture.root.join("src").join(APP).join("imports.txt")
    );
}

#[test]
fn test_rewrite_map_is_minimal() {
    let fixture = standard_fixture();
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    let rewrites = workspace.rewrites();
    assert_eq!(rewrites.len(), 2);
    assert_eq!(rewrites.real(&scratch(LIB_B, Variant::Mocked)), Some(&id(LIB_B)));
    assert_eq!(rewrites.real(&scratch(APP, Variant::TestRoot)), Some(&id(APP)));
    assert!(rewrites.iter().all(|(s, r)| s.as_str() != r.as_str()));
}

#[test]
fn test_builtin_mock_reads_builtin_source() {
    let mut fixture = Fixture::new();
    fixture.builtin(LIB_C);
    fixture.unit(APP, &["fmt mock"]);

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    let mocked = scratch(LIB_C, Variant::Mocked);
    assert_eq!(mocked.as_str(), "_fmt");
    assert_eq!(realization(&workspace, &mocked), Some(Realization::Generated));

    let marker = fs::read_to_string(unit_dir(&workspace, &mocked).join("GENERATED")).unwrap();
    assert!(marker.contains(&fixture.builtin_root.display().to_string()));
}

#[test]
fn test_exclusion_wins_over_mock_request() {
    let fixture = standard_fixture();
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.exclude(id(LIB_B));
    workspace.add_unit(&id(APP)).unwrap();

    assert!(workspace.closure().get(&scratch(LIB_B, Variant::Mocked)).is_none());
    assert_eq!(
        realization(&workspace, &scratch(LIB_B, Variant::Plain)),
        Some(Realization::Linked)
    );
    assert!(workspace.rewrites().real(&scratch(LIB_B, Variant::Mocked)).is_none());

    let linked = unit_dir(&workspace, &scratch(LIB_B, Variant::Plain)).join("unit.src");
    assert!(fs::symlink_metadata(linked).unwrap().file_type().is_symlink());
}

#[test]
fn test_exclusions_from_file() {
    let fixture = standard_fixture();
    let list = fixture.root.join("excludes.txt");
    fs::write(&list, "# never mock\nexample.com/libb\n").unwrap();

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.exclude_from_file(&list).unwrap();

    assert!(workspace.excluded().contains(&id(LIB_B)));
    assert!(workspace.excluded().contains(&id(RUNTIME)));
}

#[test]
fn test_mocking_foreign_source_is_rejected() {
    let fixture = standard_fixture();
    fixture.foreign(LIB_B);
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();

    let err = workspace.add_unit(&id(APP)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMock { ref id } if id == LIB_B));
    assert!(!unit_dir(&workspace, &scratch(LIB_B, Variant::Mocked)).exists());
}

#[cfg(unix)]
#[test]
fn test_mocking_symlinked_foreign_source_is_rejected() {
    let fixture = standard_fixture();
    let lib_b = fixture.root.join("src").join(LIB_B);
    let shared = lib_b.parent().unwrap().join("shared_asm.s");
    fs::write(&shared, "TEXT ·f(SB)").unwrap();
    std::os::unix::fs::symlink("../shared_asm.s", lib_b.join("asm.s")).unwrap();
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();

    let err = workspace.add_unit(&id(APP)).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMock { ref id } if id == LIB_B));
    assert!(!unit_dir(&workspace, &scratch(LIB_B, Variant::Mocked)).exists());
}

#[test]
fn test_relative_import_cannot_leave_scratch_root() {
    let fixture = Fixture::new();
    fixture.unit(APP, &["../../../escaped"]);
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();

    let err = workspace.add_unit(&id(APP)).unwrap_err();
    assert!(matches!(err, Error::ContractViolation { .. }), "{err:?}");
    assert!(workspace.closure().is_empty());
}

#[test]
fn test_foreign_source_without_mock_is_linked() {
    let fixture = standard_fixture();
    fixture.foreign(LIB_A);
    fixture.nested(LIB_A);
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    let lib_a = scratch(LIB_A, Variant::Plain);
    assert_eq!(realization(&workspace, &lib_a), Some(Realization::Linked));

    let dir = unit_dir(&workspace, &lib_a);
    assert!(dir.join("asm.s").exists());
    assert!(dir.join("unit.src").exists());
    assert!(!dir.join("internal").exists());
}

#[test]
fn test_plain_and_mocked_forms_coexist() {
    let fixture = Fixture::new();
    fixture.unit(APP, &[LIB_A, "example.com/libb mock"]);
    fixture.unit(LIB_A, &[LIB_B]);
    fixture.unit(LIB_B, &[]);

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    assert_eq!(
        realization(&workspace, &scratch(LIB_B, Variant::Mocked)),
        Some(Realization::Generated)
    );
    assert_eq!(
        realization(&workspace, &scratch(LIB_B, Variant::Plain)),
        Some(Realization::Generated)
    );
    assert_eq!(
        generated_mode(&unit_dir(&workspace, &scratch(LIB_B, Variant::Plain))),
        "mode=passthrough"
    );
}

#[test]
fn test_onward_mock_requests_are_not_honoured() {
    let fixture = Fixture::new();
    fixture.unit(APP, &[LIB_A]);
    fixture.unit(LIB_A, &["example.com/libb mock"]);
    fixture.unit(LIB_B, &[]);

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    assert!(workspace.closure().get(&scratch(LIB_B, Variant::Mocked)).is_none());
    assert_eq!(
        realization(&workspace, &scratch(LIB_B, Variant::Plain)),
        Some(Realization::Generated)
    );
}

#[test]
fn test_test_only_imports_are_resolved_for_the_root() {
    let fixture = Fixture::new();
    fixture.unit(APP, &[]);
    fixture.test_imports(APP, &["example.com/libb mock"]);
    fixture.unit(LIB_B, &[]);

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    assert_eq!(
        realization(&workspace, &scratch(LIB_B, Variant::Mocked)),
        Some(Realization::Generated)
    );
}

#[test]
fn test_linked_dependency_is_not_regenerated() {
    let fixture = standard_fixture();
    let host = fixture.host();
    let mut workspace = MockWorkspace::new(Box::new(host.clone())).unwrap();

    workspace.link_dependency(&id(LIB_A)).unwrap();
    workspace.link_dependency(&id(LIB_A)).unwrap();
    workspace.add_unit(&id(APP)).unwrap();

    assert_eq!(
        realization(&workspace, &scratch(LIB_A, Variant::Plain)),
        Some(Realization::Linked)
    );
    assert!(!host.calls().iter().any(|call| call.ends_with(LIB_A)));
}

#[test]
fn test_link_from_file_enqueues_onward_dependencies() {
    let fixture = Fixture::new();
    fixture.unit(LIB_A, &[LIB_B]);
    fixture.unit(LIB_B, &[]);
    let list = fixture.root.join("links.txt");
    fs::write(&list, "example.com/liba\n").unwrap();

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.link_from_file(&list).unwrap();

    let lib_b = scratch(LIB_B, Variant::Plain);
    assert!(!workspace.closure().get(&lib_b).unwrap().processed);

    workspace.drain().unwrap();
    assert_eq!(realization(&workspace, &lib_b), Some(Realization::Generated));
}

#[test]
fn test_missing_dependency_names_roots() {
    let fixture = Fixture::new();
    fixture.unit(APP, &["example.com/missing"]);

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    match workspace.add_unit(&id(APP)).unwrap_err() {
        Error::NotFound { id, roots } => {
            assert_eq!(id, "example.com/missing");
            assert_eq!(roots, vec![fixture.root.clone()]);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_generator_failure_names_dependency() {
    let fixture = standard_fixture();
    fs::write(fixture.root.join("src").join(LIB_B).join("FAIL"), "").unwrap();

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    match workspace.add_unit(&id(APP)).unwrap_err() {
        Error::Generation { id, source } => {
            assert_eq!(id, LIB_B);
            assert!(matches!(*source, Error::ContractViolation { .. }));
        }
        other => panic!("expected Generation, got {other:?}"),
    }
}

#[test]
fn test_mock_config_reaches_generator() {
    let fixture = standard_fixture();
    let mut config = MockConfig::default();
    config.mocks.insert(
        id(LIB_B),
        PackageMockConfig {
            passthrough: vec!["Open".to_string()],
            ..Default::default()
        },
    );

    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    workspace.set_config(config);
    workspace.add_unit(&id(APP)).unwrap();

    let marker = fs::read_to_string(
        unit_dir(&workspace, &scratch(LIB_B, Variant::Mocked)).join("GENERATED"),
    )
    .unwrap();
    assert!(marker.contains("passthrough=Open"));
}

#[test]
fn test_close_removes_work_directory() {
    let fixture = standard_fixture();
    let workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    let work = workspace.work_dir().to_path_buf();
    assert!(work.join("path/src").is_dir());

    workspace.close().unwrap();
    assert!(!work.exists());
}

#[test]
fn test_retain_keeps_work_directory() {
    let fixture = standard_fixture();
    let mut workspace = MockWorkspace::new(Box::new(fixture.host())).unwrap();
    let work = workspace.retain().to_path_buf();

    workspace.close().unwrap();
    assert!(work.exists());
    fs::remove_dir_all(work).unwrap();
}
