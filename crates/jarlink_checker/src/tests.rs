use super::*;
use crate::report;
use jarlink_classfile::{ClassFileAssembler, ClassSymbol, Symbol, ACC_PUBLIC};
use jarlink_graph::{ClassPathBuilder, DeclaredDependency, DependencyGraphResolver, DependencySource, GraphError};
use jarlink_model::Artifact;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

pub(crate) fn write_jar(dir: &Path, file_name: &str, classes: &[(&str, Vec<u8>)]) -> PathBuf {
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

struct NoSource;

impl DependencySource for NoSource {
    fn direct_dependencies(
        &self,
        artifact: &Artifact,
    ) -> Result<Vec<DeclaredDependency>, GraphError> {
        Err(GraphError::UnknownArtifact {
            artifact: artifact.clone(),
        })
    }

    fn locate(&self, _artifact: &Artifact) -> Option<PathBuf> {
        None
    }
}

/// Classpath of bare jar files, as the `--jar` CLI mode produces.
pub(crate) fn jars_only_classpath(paths: &[PathBuf]) -> jarlink_graph::ClassPathResult {
    let graph = DependencyGraphResolver::new(&NoSource).resolve(&[]).unwrap();
    ClassPathBuilder::build(&graph, &NoSource, paths)
}

#[test]
fn repository_is_first_match_and_keeps_shadows() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_jar(
        dir.path(),
        "first.jar",
        &[(
            "q/B",
            ClassFileAssembler::new("q/B")
                .method("one", "()V", ACC_PUBLIC)
                .assemble(),
        )],
    );
    let second = write_jar(
        dir.path(),
        "second.jar",
        &[(
            "q/B",
            ClassFileAssembler::new("q/B")
                .method("two", "()V", ACC_PUBLIC)
                .assemble(),
        )],
    );

    let classpath = jars_only_classpath(&[first, second]);
    let repository = ClassRepository::new(classpath.entries(), 64, 4096).unwrap();

    let (class_file, entry) = repository.find_class("q/B").unwrap();
    assert!(class_file.find_method("one", "()V").is_some());
    assert!(entry.path.ends_with("first.jar"));

    let shadows = repository.find_shadows("q/B");
    assert_eq!(shadows.len(), 2);
    assert!(shadows[1].0.find_method("two", "()V").is_some());

    assert!(repository.find_class("q/Absent").is_none());
}

#[test]
fn malformed_authoritative_definition_is_absent_not_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let broken = write_jar(dir.path(), "broken.jar", &[("q/B", vec![0xCA, 0xFE, 0x00])]);
    let valid = write_jar(
        dir.path(),
        "valid.jar",
        &[("q/B", ClassFileAssembler::new("q/B").assemble())],
    );

    let classpath = jars_only_classpath(&[broken, valid]);
    let repository = ClassRepository::new(classpath.entries(), 64, 4096).unwrap();

    // First-match is authoritative: a shadow never stands in for it.
    assert!(repository.find_class("q/B").is_none());

    let shadows = repository.find_shadows("q/B");
    assert_eq!(shadows.len(), 1);
    assert!(shadows[0].1.path.ends_with("valid.jar"));
}

#[test]
fn tight_cache_and_pool_bounds_still_serve_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let one = write_jar(
        dir.path(),
        "one.jar",
        &[("p/One", ClassFileAssembler::new("p/One").assemble())],
    );
    let two = write_jar(
        dir.path(),
        "two.jar",
        &[("p/Two", ClassFileAssembler::new("p/Two").assemble())],
    );

    let classpath = jars_only_classpath(&[one, two]);
    // One cached class and one open archive force eviction and reopening.
    let repository = ClassRepository::new(classpath.entries(), 1, 1).unwrap();

    for _ in 0..3 {
        assert!(repository.find_class("p/One").is_some());
        assert!(repository.find_class("p/Two").is_some());
    }
}

#[test]
fn module_info_entries_are_not_classes() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "mod.jar",
        &[
            ("module-info", vec![1, 2, 3]),
            ("p/Real", ClassFileAssembler::new("p/Real").assemble()),
        ],
    );

    let classpath = jars_only_classpath(&[jar]);
    let repository = ClassRepository::new(classpath.entries(), 64, 4096).unwrap();
    let names: Vec<String> = repository
        .class_names()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["p/Real"]);
}

#[test]
fn problem_equality_ignores_kind_and_cause_and_demotes_super_symbols() {
    let entry = jarlink_graph::ClassPathEntry::from_file(PathBuf::from("/tmp/a.jar"));
    let source = ClassRef::new("p/A", entry.clone());
    let target = None;

    let via_super = Symbol::Class(ClassSymbol::via_super("p/Base"));
    let plain = Symbol::Class(ClassSymbol::new("p/Base"));

    let first = LinkageProblem::new(&via_super, source.clone(), target.clone(), ProblemKind::ClassNotFound);
    let second = LinkageProblem::new(&plain, source.clone(), target, ProblemKind::SymbolNotFound);

    assert_eq!(first, second);
    assert_eq!(first.symbol(), &plain);

    let mut set = IndexSet::new();
    set.insert(first);
    set.insert(second);
    assert_eq!(set.len(), 1);
}

#[test]
fn cancelled_token_aborts_before_work() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "a.jar",
        &[("p/A", ClassFileAssembler::new("p/A").assemble())],
    );
    let classpath = jars_only_classpath(&[jar]);

    let token = CancellationToken::new();
    token.cancel();
    let checker = LinkageChecker::new(classpath, CheckerConfig::default())
        .unwrap()
        .with_cancellation(token);

    assert!(matches!(
        checker.find_linkage_problems(),
        Err(CheckError::Cancelled)
    ));
}

#[test]
fn reports_render_all_three_formats() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "a.jar",
        &[(
            "p/A",
            ClassFileAssembler::new("p/A")
                .reference_class("q/Gone")
                .assemble(),
        )],
    );
    let classpath = jars_only_classpath(&[jar]);
    let checker = LinkageChecker::new(classpath, CheckerConfig::default()).unwrap();
    let problems = checker.find_linkage_problems().unwrap();
    assert_eq!(problems.len(), 1);

    let text = report::format_problems(&problems, Some(checker.classpath()));
    assert!(text.contains("q.Gone is not found"));
    assert!(text.contains("referenced by 1 class file"));
    assert!(text.contains("p.A"));

    let dot = report::format_graphviz(&problems);
    assert!(dot.starts_with("digraph G {"));
    assert!(dot.contains("rankdir=LR"));
    assert!(dot.contains("style=dotted,color=black"));

    let json = report::format_json(&problems).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
}
