use super::*;

fn parse(assembler: &ClassFileAssembler) -> ClassFile {
    parse_class(&assembler.assemble()).expect("assembled class should parse")
}

#[test]
fn parses_assembled_class_shape() {
    let class_file = parse(
        &ClassFileAssembler::new("com/example/Widget")
            .super_class("com/example/Base")
            .implements("java/io/Serializable")
            .implements("com/example/Part")
            .field("count", "I", ACC_PRIVATE)
            .method("<init>", "()V", ACC_PUBLIC)
            .method("run", "(Ljava/lang/String;)I", ACC_PUBLIC),
    );

    assert_eq!(class_file.binary_name, "com/example/Widget");
    assert_eq!(class_file.package(), "com/example");
    assert_eq!(class_file.super_name.as_deref(), Some("com/example/Base"));
    assert_eq!(
        class_file.interfaces,
        vec!["java/io/Serializable", "com/example/Part"]
    );
    assert!(class_file.is_public());
    assert!(!class_file.is_interface());

    let field = &class_file.fields[0];
    assert_eq!((field.name.as_str(), field.descriptor.as_str()), ("count", "I"));
    assert!(field.is_private());

    assert!(class_file.find_method("run", "(Ljava/lang/String;)I").is_some());
    assert!(class_file.find_method("run", "()V").is_none());
}

#[test]
fn default_package_class_has_empty_package() {
    let class_file = parse(&ClassFileAssembler::new("Standalone"));
    assert_eq!(class_file.package(), "");
}

#[test]
fn rejects_bad_magic_and_truncation() {
    assert!(matches!(
        parse_class(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0]),
        Err(ClassFileError::InvalidMagic)
    ));

    let bytes = ClassFileAssembler::new("p/A").assemble();
    assert!(matches!(
        parse_class(&bytes[..bytes.len() - 3]),
        Err(ClassFileError::UnexpectedEof)
    ));
}

#[test]
fn rejects_future_major_version_distinctly() {
    let bytes = ClassFileAssembler::new("p/A")
        .major_version(SUPPORTED_MAJOR_VERSION + 1)
        .assemble();
    let error = parse_class(&bytes).unwrap_err();
    assert!(error.is_unsupported_version());
    assert!(matches!(
        error,
        ClassFileError::UnsupportedVersion { supported, .. } if supported == SUPPORTED_MAJOR_VERSION
    ));
}

#[test]
fn long_and_double_constants_occupy_two_slots() {
    // Hand-built pool: [1-2]=Long, [3]=Utf8 "A", [4]=Class(3).
    let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52];
    bytes.extend_from_slice(&5u16.to_be_bytes()); // constant_pool_count
    bytes.push(5); // Long tag
    bytes.extend_from_slice(&0x0123_4567_89AB_CDEFu64.to_be_bytes());
    bytes.push(1); // Utf8 tag
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.push(b'A');
    bytes.push(7); // Class tag
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes.extend_from_slice(&0x0021u16.to_be_bytes()); // access_flags
    bytes.extend_from_slice(&4u16.to_be_bytes()); // this_class
    bytes.extend_from_slice(&0u16.to_be_bytes()); // super_class
    bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]); // interfaces/fields/methods/attrs

    let class_file = parse_class(&bytes).expect("two-slot constants should parse");
    assert_eq!(class_file.binary_name, "A");
    assert_eq!(class_file.super_name, None);
}

#[test]
fn extracts_class_method_and_field_references() {
    let class_file = parse(
        &ClassFileAssembler::new("p/A")
            .reference_class("q/Used")
            .reference_method("q/B", "foo", "(I)V")
            .reference_interface_method("q/Iface", "apply", "()Ljava/lang/Object;")
            .reference_field("q/B", "COUNT", "J"),
    );
    let references = extract_references(&class_file).unwrap();

    assert!(references.classes.contains(&ClassSymbol::new("q/Used")));
    assert!(references
        .methods
        .contains(&MethodSymbol::new("q/B", "foo", "(I)V", false)));
    assert!(references.methods.contains(&MethodSymbol::new(
        "q/Iface",
        "apply",
        "()Ljava/lang/Object;",
        true
    )));
    assert!(references
        .fields
        .contains(&FieldSymbol::new("q/B", "COUNT", "J")));
}

#[test]
fn super_class_reference_carries_marker() {
    let class_file = parse(&ClassFileAssembler::new("p/A").super_class("p/Base"));
    let references = extract_references(&class_file).unwrap();

    assert!(references.classes.contains(&ClassSymbol::via_super("p/Base")));
    assert!(!references.classes.contains(&ClassSymbol::new("p/Base")));
    assert_eq!(
        Symbol::Class(ClassSymbol::via_super("p/Base")).demoted(),
        Symbol::Class(ClassSymbol::new("p/Base"))
    );
}

#[test]
fn self_references_are_dropped() {
    let class_file = parse(
        &ClassFileAssembler::new("p/A")
            .reference_class("p/A")
            .reference_method("p/A", "helper", "()V"),
    );
    let references = extract_references(&class_file).unwrap();
    assert!(references.classes.is_empty());
    // Method references against the class itself are still resolved against
    // the hierarchy; only bare class constants are self-filtered.
    assert_eq!(references.methods.len(), 1);
}

#[test]
fn array_owners_unwrap_to_element_classes() {
    let class_file = parse(
        &ClassFileAssembler::new("p/A")
            .reference_class("[[Lq/Element;")
            .reference_class("[I")
            .reference_method("[Lq/Element;", "clone", "()Ljava/lang/Object;"),
    );
    let references = extract_references(&class_file).unwrap();

    assert!(references.classes.contains(&ClassSymbol::new("q/Element")));
    assert_eq!(references.classes.len(), 1, "primitive arrays are discarded");
    assert!(references.methods.is_empty(), "array methods bind to the runtime");
}

#[test]
fn inner_class_attribute_yields_outer_reference() {
    let class_file = parse(&ClassFileAssembler::new("p/Outer$Inner").inner_class_of("p/Outer"));
    let references = extract_references(&class_file).unwrap();
    assert!(references.classes.contains(&ClassSymbol::new("p/Outer")));
}

#[test]
fn extraction_is_idempotent() {
    let class_file = parse(
        &ClassFileAssembler::new("p/A")
            .super_class("p/Base")
            .reference_method("q/B", "foo", "(I)V")
            .reference_field("q/B", "flag", "Z")
            .reference_class("q/C"),
    );
    let first = extract_references(&class_file).unwrap();
    let second = extract_references(&class_file).unwrap();
    assert_eq!(first, second);
}

#[test]
fn malformed_member_descriptor_is_an_error() {
    let class_file = parse(&ClassFileAssembler::new("p/A").reference_method("q/B", "foo", "(I"));
    assert!(matches!(
        extract_references(&class_file),
        Err(ClassFileError::InvalidDescriptor(_))
    ));
}

#[test]
fn descriptor_grammar_accepts_and_rejects() {
    assert!(validate_field_descriptor("Ljava/util/List;").is_ok());
    assert!(validate_field_descriptor("[[J").is_ok());
    assert!(validate_field_descriptor("Q").is_err());
    assert!(validate_field_descriptor("Ljava/util/List").is_err());

    let (params, ret) = validate_method_descriptor("(I[Ljava/lang/String;)V").unwrap();
    assert_eq!(params.len(), 2);
    assert!(ret.is_none());
    assert!(validate_method_descriptor("()Lq/R;").is_ok());
    assert!(validate_method_descriptor("I)V").is_err());
    assert!(validate_method_descriptor("(V)V").is_err());
}

#[test]
fn element_class_name_unwraps() {
    assert_eq!(element_class_name("q/B"), Some("q/B".to_string()));
    assert_eq!(element_class_name("[Lq/B;"), Some("q/B".to_string()));
    assert_eq!(element_class_name("[[I"), None);
}

#[test]
fn constant_pool_round_trips_names_through_reassembly() {
    let original = parse(
        &ClassFileAssembler::new("p/A")
            .super_class("p/Base")
            .reference_method("q/B", "foo", "(I)V")
            .reference_field("q/B", "flag", "Z"),
    );

    // Rebuild an equivalent class from the parsed structure and compare the
    // extracted name/descriptor sets.
    let mut rebuilt = ClassFileAssembler::new(original.binary_name.clone());
    if let Some(super_name) = &original.super_name {
        rebuilt = rebuilt.super_class(super_name.clone());
    }
    let references = extract_references(&original).unwrap();
    for class in &references.classes {
        if !class.via_super {
            rebuilt = rebuilt.reference_class(class.binary_name.clone());
        }
    }
    for method in &references.methods {
        rebuilt = rebuilt.reference_method(
            method.owner.clone(),
            method.name.clone(),
            method.descriptor.clone(),
        );
    }
    for field in &references.fields {
        rebuilt = rebuilt.reference_field(
            field.owner.clone(),
            field.name.clone(),
            field.descriptor.clone(),
        );
    }

    let reparsed = extract_references(&parse(&rebuilt)).unwrap();
    assert_eq!(references, reparsed);
}
