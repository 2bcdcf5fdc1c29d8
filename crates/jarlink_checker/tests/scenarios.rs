use jarlink_checker::{
    Cause, CheckerConfig, ClassRepository, LinkageChecker, LinkageProblem, ProblemKind,
};
use jarlink_classfile::{
    ClassFileAssembler, Symbol, ACC_ABSTRACT, ACC_INTERFACE, ACC_PROTECTED, ACC_PUBLIC,
};
use jarlink_graph::{
    ClassPathBuilder, ClassPathResult, DeclaredDependency, DependencyGraphResolver,
    DependencySource, GraphError,
};
use jarlink_model::{Artifact, DependencyScope, ExclusionFilter};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

const ACC_SUPER: u16 = 0x0020;

fn write_jar(dir: &Path, file_name: &str, classes: &[(&str, Vec<u8>)]) -> PathBuf {
    let path = dir.join(file_name);
    let mut writer = ZipWriter::new(File::create(&path).expect("create jar"));
    for (binary_name, bytes) in classes {
        writer
            .start_file(format!("{binary_name}.class"), FileOptions::default())
            .expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar");
    path
}

#[derive(Default)]
struct StubSource {
    dependencies: HashMap<Artifact, Vec<DeclaredDependency>>,
    archives: HashMap<Artifact, PathBuf>,
}

impl StubSource {
    fn add(&mut self, artifact: &Artifact, archive: PathBuf, deps: Vec<DeclaredDependency>) {
        self.dependencies.insert(artifact.clone(), deps);
        self.archives.insert(artifact.clone(), archive);
    }
}

impl DependencySource for StubSource {
    fn direct_dependencies(
        &self,
        artifact: &Artifact,
    ) -> Result<Vec<DeclaredDependency>, GraphError> {
        self.dependencies
            .get(artifact)
            .cloned()
            .ok_or_else(|| GraphError::UnknownArtifact {
                artifact: artifact.clone(),
            })
    }

    fn locate(&self, artifact: &Artifact) -> Option<PathBuf> {
        self.archives.get(artifact).cloned()
    }
}

fn jars_only_classpath(paths: &[PathBuf]) -> ClassPathResult {
    let source = StubSource::default();
    let graph = DependencyGraphResolver::new(&source).resolve(&[]).unwrap();
    ClassPathBuilder::build(&graph, &source, paths)
}

fn check(classpath: ClassPathResult) -> Vec<LinkageProblem> {
    LinkageChecker::new(classpath, CheckerConfig::default())
        .unwrap()
        .find_linkage_problems()
        .unwrap()
}

fn method_symbol(problem: &LinkageProblem) -> &jarlink_classfile::MethodSymbol {
    match problem.symbol() {
        Symbol::Method(method) => method,
        other => panic!("expected method symbol, got {other:?}"),
    }
}

#[test]
fn missing_method_is_symbol_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let a_jar = write_jar(
        dir.path(),
        "A.jar",
        &[(
            "p/A",
            ClassFileAssembler::new("p/A")
                .reference_method("q/B", "foo", "(I)V")
                .assemble(),
        )],
    );
    let b_jar = write_jar(
        dir.path(),
        "B.jar",
        &[(
            "q/B",
            ClassFileAssembler::new("q/B")
                .method("foo", "()V", ACC_PUBLIC)
                .assemble(),
        )],
    );

    let problems = check(jars_only_classpath(&[a_jar, b_jar]));
    assert_eq!(problems.len(), 1);

    let problem = &problems[0];
    assert_eq!(problem.kind(), ProblemKind::SymbolNotFound);
    let symbol = method_symbol(problem);
    assert_eq!(
        (symbol.owner.as_str(), symbol.name.as_str(), symbol.descriptor.as_str()),
        ("q/B", "foo", "(I)V")
    );
    assert_eq!(problem.source().binary_name, "p/A");
    assert_eq!(problem.target().unwrap().binary_name, "q/B");
    assert_eq!(problem.cause(), Some(&Cause::Unknown));
}

#[test]
fn missing_class_has_null_target() {
    let dir = tempfile::tempdir().unwrap();
    let a_jar = write_jar(
        dir.path(),
        "A.jar",
        &[(
            "p/A",
            ClassFileAssembler::new("p/A")
                .reference_class("q/B")
                .assemble(),
        )],
    );

    let problems = check(jars_only_classpath(&[a_jar]));
    assert_eq!(problems.len(), 1);

    let problem = &problems[0];
    assert_eq!(problem.kind(), ProblemKind::ClassNotFound);
    assert!(problem.target().is_none());
    assert_eq!(problem.symbol().owner(), "q/B");
}

#[test]
fn nearest_wins_conflict_is_attributed() {
    let dir = tempfile::tempdir().unwrap();

    let root = Artifact::new("g", "root", "1.0");
    let lib = Artifact::new("g", "lib", "1.0");
    let x1 = Artifact::new("g", "x", "1.0");
    let x2 = Artifact::new("g", "x", "2.0");

    let root_jar = write_jar(
        dir.path(),
        "root.jar",
        &[(
            "root/Main",
            ClassFileAssembler::new("root/Main")
                .reference_method("xw/X", "m", "()V")
                .assemble(),
        )],
    );
    let lib_jar = write_jar(
        dir.path(),
        "lib.jar",
        &[("lib/Lib", ClassFileAssembler::new("lib/Lib").assemble())],
    );
    let x1_jar = write_jar(
        dir.path(),
        "x-1.0.jar",
        &[("xw/X", ClassFileAssembler::new("xw/X").assemble())],
    );
    let x2_jar = write_jar(
        dir.path(),
        "x-2.0.jar",
        &[(
            "xw/X",
            ClassFileAssembler::new("xw/X")
                .method("m", "()V", ACC_PUBLIC)
                .assemble(),
        )],
    );

    let mut source = StubSource::default();
    source.add(
        &root,
        root_jar,
        vec![
            DeclaredDependency::new(x1.clone(), DependencyScope::Compile),
            DeclaredDependency::new(lib.clone(), DependencyScope::Compile),
        ],
    );
    source.add(
        &lib,
        lib_jar,
        vec![DeclaredDependency::new(x2.clone(), DependencyScope::Compile)],
    );
    source.add(&x1, x1_jar, vec![]);
    source.add(&x2, x2_jar, vec![]);

    let graph = DependencyGraphResolver::new(&source)
        .resolve(&[root.clone()])
        .unwrap();
    let problems = check(ClassPathBuilder::build(&graph, &source, &[]));

    assert_eq!(problems.len(), 1);
    let problem = &problems[0];
    assert_eq!(problem.kind(), ProblemKind::SymbolNotFound);

    match problem.cause().unwrap() {
        Cause::DependencyConflict {
            selected,
            selected_path,
            unselected,
            unselected_path,
        } => {
            assert_eq!(selected, &x1);
            assert_eq!(unselected, &x2);
            assert_eq!(selected_path.len(), 2);
            assert_eq!(unselected_path.len(), 3);
            assert_eq!(unselected_path.segments()[1].artifact, lib);
        }
        other => panic!("expected dependency conflict, got {other:?}"),
    }
}

#[test]
fn excluded_artifact_is_blamed_for_missing_class() {
    let dir = tempfile::tempdir().unwrap();

    let root = Artifact::new("g", "root", "1.0");
    let lib = Artifact::new("g", "lib", "1.0");
    let excluded = Artifact::new("q", "qdep", "1.0");

    let root_jar = write_jar(
        dir.path(),
        "root.jar",
        &[(
            "root/Main",
            ClassFileAssembler::new("root/Main")
                .reference_class("q/B")
                .assemble(),
        )],
    );
    let lib_jar = write_jar(
        dir.path(),
        "lib.jar",
        &[("lib/Lib", ClassFileAssembler::new("lib/Lib").assemble())],
    );
    let excluded_jar = write_jar(
        dir.path(),
        "qdep.jar",
        &[("q/B", ClassFileAssembler::new("q/B").assemble())],
    );

    let mut source = StubSource::default();
    source.add(
        &root,
        root_jar,
        vec![DeclaredDependency::new(lib.clone(), DependencyScope::Compile)
            .excluding(ExclusionFilter::new("q", "*"))],
    );
    source.add(
        &lib,
        lib_jar,
        vec![DeclaredDependency::new(
            excluded.clone(),
            DependencyScope::Compile,
        )],
    );
    source.add(&excluded, excluded_jar, vec![]);

    let graph = DependencyGraphResolver::new(&source)
        .resolve(&[root.clone()])
        .unwrap();
    let problems = check(ClassPathBuilder::build(&graph, &source, &[]));

    assert_eq!(problems.len(), 1);
    let problem = &problems[0];
    assert_eq!(problem.kind(), ProblemKind::ClassNotFound);

    match problem.cause().unwrap() {
        Cause::ExcludedArtifact { filter, path } => {
            assert_eq!(filter, &ExclusionFilter::new("q", "*"));
            assert_eq!(path.leaf(), &excluded);
        }
        other => panic!("expected excluded artifact, got {other:?}"),
    }
}

#[test]
fn unimplemented_abstract_method_is_reported_on_the_concrete_class() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[
            (
                "p/Base",
                ClassFileAssembler::new("p/Base")
                    .access_flags(ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT)
                    .method("foo", "()V", ACC_PUBLIC | ACC_ABSTRACT)
                    .assemble(),
            ),
            (
                "p/Concrete",
                ClassFileAssembler::new("p/Concrete")
                    .super_class("p/Base")
                    .assemble(),
            ),
            (
                "p/Caller",
                ClassFileAssembler::new("p/Caller")
                    .reference_method("p/Concrete", "foo", "()V")
                    .assemble(),
            ),
        ],
    );

    let problems = check(jars_only_classpath(&[jar]));
    assert_eq!(problems.len(), 1);

    let problem = &problems[0];
    assert_eq!(problem.kind(), ProblemKind::AbstractMethodUnimplemented);
    assert_eq!(problem.target().unwrap().binary_name, "p/Concrete");
    assert_eq!(problem.source().binary_name, "p/Caller");
}

#[test]
fn interface_reference_against_class_is_incompatible_change() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[
            (
                "q/NotIface",
                ClassFileAssembler::new("q/NotIface")
                    .method("apply", "()V", ACC_PUBLIC)
                    .assemble(),
            ),
            (
                "p/Caller",
                ClassFileAssembler::new("p/Caller")
                    .reference_interface_method("q/NotIface", "apply", "()V")
                    .assemble(),
            ),
        ],
    );

    let problems = check(jars_only_classpath(&[jar]));
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].kind(), ProblemKind::IncompatibleClassChange);
    assert_eq!(problems[0].target().unwrap().binary_name, "q/NotIface");
}

#[test]
fn protected_field_is_inaccessible_from_unrelated_package() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[
            (
                "q/Holder",
                ClassFileAssembler::new("q/Holder")
                    .field("secret", "I", ACC_PROTECTED)
                    .assemble(),
            ),
            (
                "p/Reader",
                ClassFileAssembler::new("p/Reader")
                    .reference_field("q/Holder", "secret", "I")
                    .assemble(),
            ),
        ],
    );

    let problems = check(jars_only_classpath(&[jar]));
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].kind(), ProblemKind::Inaccessible);
    assert_eq!(problems[0].target().unwrap().binary_name, "q/Holder");
}

#[test]
fn protected_field_is_accessible_to_subclasses_in_other_packages() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[
            (
                "q/Holder",
                ClassFileAssembler::new("q/Holder")
                    .field("secret", "I", ACC_PROTECTED)
                    .assemble(),
            ),
            (
                "p/Sub",
                ClassFileAssembler::new("p/Sub")
                    .super_class("q/Holder")
                    .reference_field("q/Holder", "secret", "I")
                    .assemble(),
            ),
        ],
    );

    let problems = check(jars_only_classpath(&[jar]));
    assert!(problems.is_empty(), "unexpected problems: {problems:?}");
}

#[test]
fn interface_method_lookup_walks_superinterfaces() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[
            (
                "q/Top",
                ClassFileAssembler::new("q/Top")
                    .access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
                    .no_super_class()
                    .method("apply", "()V", ACC_PUBLIC | ACC_ABSTRACT)
                    .assemble(),
            ),
            (
                "q/Sub",
                ClassFileAssembler::new("q/Sub")
                    .access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
                    .no_super_class()
                    .implements("q/Top")
                    .assemble(),
            ),
            (
                "p/Caller",
                ClassFileAssembler::new("p/Caller")
                    .reference_interface_method("q/Sub", "apply", "()V")
                    .assemble(),
            ),
        ],
    );

    let problems = check(jars_only_classpath(&[jar]));
    assert!(problems.is_empty(), "unexpected problems: {problems:?}");
}

#[test]
fn removing_an_entry_never_reduces_class_not_found_problems() {
    let dir = tempfile::tempdir().unwrap();
    let a_jar = write_jar(
        dir.path(),
        "A.jar",
        &[(
            "p/A",
            ClassFileAssembler::new("p/A")
                .reference_method("q/B", "foo", "(I)V")
                .reference_class("q/Gone")
                .assemble(),
        )],
    );
    let b_jar = write_jar(
        dir.path(),
        "B.jar",
        &[("q/B", ClassFileAssembler::new("q/B").assemble())],
    );

    let count_class_not_found = |problems: &[LinkageProblem]| {
        problems
            .iter()
            .filter(|problem| problem.kind() == ProblemKind::ClassNotFound)
            .count()
    };

    let full = check(jars_only_classpath(&[a_jar.clone(), b_jar]));
    let reduced = check(jars_only_classpath(&[a_jar]));

    assert!(count_class_not_found(&reduced) >= count_class_not_found(&full));
}

#[test]
fn accessibility_is_invariant_under_consistent_package_renaming() {
    let build = |holder_pkg: &str, reader_pkg: &str| {
        let dir = tempfile::tempdir().unwrap();
        let holder = format!("{holder_pkg}/Holder");
        let reader = format!("{reader_pkg}/Reader");
        let jar = write_jar(
            dir.path(),
            "app.jar",
            &[
                (
                    holder.as_str(),
                    ClassFileAssembler::new(holder.clone())
                        .field("counter", "I", 0)
                        .assemble(),
                ),
                (
                    reader.as_str(),
                    ClassFileAssembler::new(reader.clone())
                        .reference_field(holder.clone(), "counter", "I")
                        .assemble(),
                ),
            ],
        );
        let problems = check(jars_only_classpath(&[jar]));
        problems
            .iter()
            .map(|problem| problem.kind())
            .collect::<Vec<_>>()
    };

    // Same package: package-private access allowed either way.
    assert_eq!(build("alpha", "alpha"), build("omega", "omega"));
    // Different packages: inaccessible either way.
    assert_eq!(build("alpha", "beta"), build("gamma", "delta"));
    assert_eq!(build("alpha", "alpha").len(), 0);
    assert_eq!(build("alpha", "beta").len(), 1);
}

#[test]
fn problem_sets_are_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let a_jar = write_jar(
        dir.path(),
        "A.jar",
        &[(
            "p/A",
            ClassFileAssembler::new("p/A")
                .reference_class("q/Gone")
                .reference_method("q/B", "foo", "(I)V")
                .reference_field("q/B", "flag", "Z")
                .assemble(),
        )],
    );
    let b_jar = write_jar(
        dir.path(),
        "B.jar",
        &[("q/B", ClassFileAssembler::new("q/B").assemble())],
    );

    let first = check(jars_only_classpath(&[a_jar.clone(), b_jar.clone()]));
    let second = check(jars_only_classpath(&[a_jar, b_jar]));

    assert_eq!(first.len(), second.len());
    for problem in &first {
        assert!(second.contains(problem));
    }
}

#[test]
fn source_classes_always_come_from_selected_entries() {
    let dir = tempfile::tempdir().unwrap();
    // Both jars define p/Dup; only the first definition may act as a
    // reference source.
    let first = write_jar(
        dir.path(),
        "first.jar",
        &[(
            "p/Dup",
            ClassFileAssembler::new("p/Dup")
                .reference_class("q/OnlyInFirst")
                .assemble(),
        )],
    );
    let second = write_jar(
        dir.path(),
        "second.jar",
        &[(
            "p/Dup",
            ClassFileAssembler::new("p/Dup")
                .reference_class("q/OnlyInSecond")
                .assemble(),
        )],
    );

    let classpath = jars_only_classpath(&[first.clone(), second]);
    let repository = ClassRepository::new(classpath.entries(), 64, 4096).unwrap();
    assert_eq!(repository.find_shadows("p/Dup").len(), 2);

    let problems = check(classpath);
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].symbol().owner(), "q/OnlyInFirst");
    assert!(problems[0].source().entry.path.ends_with("first.jar"));
}
