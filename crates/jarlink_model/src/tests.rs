use super::*;

#[test]
fn coordinates_round_trip_without_classifier() {
    let artifact: Artifact = "com.google.guava:guava:28.0-android".parse().unwrap();
    assert_eq!(artifact.group, "com.google.guava");
    assert_eq!(artifact.name, "guava");
    assert_eq!(artifact.version, "28.0-android");
    assert_eq!(artifact.classifier(), None);
    assert_eq!(artifact.to_string(), "com.google.guava:guava:28.0-android");
}

#[test]
fn coordinates_round_trip_with_classifier() {
    let artifact: Artifact = "io.grpc:grpc-core:tests:1.24.0".parse().unwrap();
    assert_eq!(artifact.classifier(), Some("tests"));
    assert_eq!(artifact.to_string(), "io.grpc:grpc-core:tests:1.24.0");
}

#[test]
fn coordinates_reject_bad_shapes() {
    assert!(matches!(
        "guava".parse::<Artifact>(),
        Err(CoordinateError::InvalidFormat { .. })
    ));
    assert!(matches!(
        "com.google::1.0".parse::<Artifact>(),
        Err(CoordinateError::EmptyField { field: "name", .. })
    ));
}

#[test]
fn module_key_ignores_version() {
    let one = Artifact::new("g", "a", "1.0");
    let two = Artifact::new("g", "a", "2.0");
    assert_eq!(one.module_key(), two.module_key());
    assert_ne!(
        one.module_key(),
        one.clone().with_classifier("tests").module_key()
    );
}

#[test]
fn artifact_ordering_is_module_key_then_version() {
    let mut artifacts = vec![
        Artifact::new("g", "b", "1.0"),
        Artifact::new("g", "a", "2.0"),
        Artifact::new("g", "a", "1.0"),
    ];
    artifacts.sort();
    let rendered: Vec<String> = artifacts.iter().map(Artifact::to_string).collect();
    assert_eq!(rendered, vec!["g:a:1.0", "g:a:2.0", "g:b:1.0"]);
}

#[test]
fn archive_file_name_uses_classifier_and_extension() {
    let plain = Artifact::new("g", "lib", "1.2");
    assert_eq!(plain.archive_file_name(), "lib-1.2.jar");
    let classified = Artifact::new("g", "lib", "1.2").with_classifier("sources");
    assert_eq!(classified.archive_file_name(), "lib-1.2-sources.jar");
}

#[test]
fn scope_parsing_accepts_empty_as_compile() {
    assert_eq!("".parse::<DependencyScope>(), Ok(DependencyScope::Compile));
    assert_eq!(
        "Provided".parse::<DependencyScope>(),
        Ok(DependencyScope::Provided)
    );
    assert!("sandbox".parse::<DependencyScope>().is_err());
}

#[test]
fn dependency_path_extend_leaves_parent_untouched() {
    let root = DependencyPath::root(Artifact::new("g", "root", "1.0"));
    let child = root.extend(PathSegment::new(
        Artifact::new("g", "child", "2.0"),
        DependencyScope::Runtime,
        true,
    ));

    assert_eq!(root.len(), 1);
    assert_eq!(child.len(), 2);
    assert_eq!(child.root_artifact(), root.leaf());
    assert_eq!(child.leaf().name, "child");
    assert_eq!(
        child.to_string(),
        "g:root:1.0 > g:child:2.0 (runtime, optional)"
    );
}

#[test]
fn exclusion_filter_wildcards_match_whole_segments() {
    let artifact = Artifact::new("com.example", "widget", "1.0");
    assert!(ExclusionFilter::new("*", "widget").matches(&artifact));
    assert!(ExclusionFilter::new("com.example", "*").matches(&artifact));
    assert!(!ExclusionFilter::new("com.*", "widget").matches(&artifact));
    assert!(!ExclusionFilter::new("com.example", "gadget").matches(&artifact));
}

#[test]
fn exclusion_rule_scoping() {
    let parent = Artifact::new("g", "lib", "1.0");
    let rule = ExclusionRule::below(parent.module_key(), ExclusionFilter::new("q", "*"));
    assert!(rule.applies_below(&parent));
    assert!(!rule.applies_below(&Artifact::new("g", "other", "1.0")));
    assert!(ExclusionRule::anywhere(ExclusionFilter::new("q", "*"))
        .applies_below(&Artifact::new("any", "thing", "0")));
}
