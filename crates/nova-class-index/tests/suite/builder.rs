use std::fs::File;

use nova_class_index::{
    ConstantValue, DuplicateClassPolicy, IndexBuilder, IndexError, IndexView, IndexerConfig,
    NestingKind, ParameterKind, PrimitiveType, Type,
};
use nova_test_utils::classfile::{
    ClassFileBuilder, MemberBuilder, Value, ACC_FINAL, ACC_MANDATED, ACC_PUBLIC, ACC_STATIC,
};
use nova_test_utils::ClassDir;
use pretty_assertions::assert_eq;

use super::support::{build, fixture_classes, name};

fn versioned(version: i32) -> Vec<u8> {
    ClassFileBuilder::new("p/A")
        .field(
            MemberBuilder::new("VERSION", "I")
                .access_flags(ACC_PUBLIC | ACC_STATIC | ACC_FINAL)
                .constant_int(version),
        )
        .build()
}

fn version_of(builder: IndexBuilder) -> Option<ConstantValue> {
    let index = builder.build();
    index
        .class_by_name(&name("p.A"))?
        .field("VERSION")?
        .constant_value()
        .cloned()
}

#[test]
fn duplicates_are_rejected_by_default() {
    let mut builder = IndexBuilder::new();
    builder.index_class(&versioned(1)).unwrap();
    let err = builder.index_class(&versioned(2)).unwrap_err();
    match err {
        IndexError::DuplicateClass(class) => assert_eq!(class, name("p.A")),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(builder.len(), 1);
    assert_eq!(version_of(builder), Some(ConstantValue::Int(1)));
}

#[test]
fn replace_class_overrides_the_policy() {
    let mut builder = IndexBuilder::new();
    builder.index_class(&versioned(1)).unwrap();
    builder.replace_class(&versioned(2)).unwrap();
    assert_eq!(version_of(builder), Some(ConstantValue::Int(2)));
}

#[test]
fn replace_policy_keeps_the_last_class() {
    let mut builder = IndexBuilder::with_config(IndexerConfig {
        duplicate_classes: DuplicateClassPolicy::Replace,
        ..IndexerConfig::default()
    });
    builder.index_class(&versioned(1)).unwrap();
    builder.index_class(&versioned(2)).unwrap();
    assert_eq!(builder.len(), 1);
    assert_eq!(version_of(builder), Some(ConstantValue::Int(2)));
}

#[test]
fn failed_classes_leave_the_builder_untouched() {
    let mut builder = IndexBuilder::new();
    builder.index_class(&versioned(1)).unwrap();

    let mut truncated = versioned(2);
    truncated.truncate(truncated.len() / 2);
    let err = builder.index_class(&truncated).unwrap_err();
    assert!(matches!(err, IndexError::MalformedInput(_)), "{err:?}");

    assert!(builder.index_class(b"not a class file").is_err());
    assert_eq!(builder.len(), 1);
    assert!(builder.contains(&name("p.A")));
    assert_eq!(version_of(builder), Some(ConstantValue::Int(1)));
}

#[test]
fn class_files_stream_from_disk() {
    let mut dir = ClassDir::new().unwrap();
    let classes = fixture_classes();
    let internal = [
        "com/example/Shape",
        "com/example/Container",
        "com/example/Container$Entry",
        "com/example/Color",
        "com/example/Point",
        "com/example/Api",
    ];
    for (internal, bytes) in internal.iter().zip(&classes) {
        dir.write_class(internal, bytes).unwrap();
    }

    let mut builder = IndexBuilder::new();
    for path in dir.files() {
        builder.index_stream(File::open(path).unwrap()).unwrap();
    }
    let index = builder.build();
    assert_eq!(index.len(), 6);
    assert!(index.class_by_name(&name("com.example.Point")).is_some());
}

#[test]
fn enums_number_their_constants() {
    let index = build(&fixture_classes());
    let color = index.class_by_name(&name("com.example.Color")).unwrap();
    assert!(color.is_enum());

    let constants: Vec<(&str, Option<u32>)> = color
        .enum_constants()
        .iter()
        .map(|f| (f.name(), f.enum_constant_ordinal()))
        .collect();
    assert_eq!(constants, vec![("RED", Some(0)), ("GREEN", Some(1))]);
    assert!(color.field("$VALUES").unwrap().is_synthetic());
    assert_eq!(color.field("$VALUES").unwrap().enum_constant_ordinal(), None);

    let ctor = color.constructors().next().unwrap();
    assert_eq!(ctor.descriptor_parameters_count(), 2);
    assert_eq!(ctor.parameters_count(), 0);
    assert!(ctor
        .descriptor_parameters()
        .iter()
        .all(|p| p.kind() == ParameterKind::Synthetic));
}

#[test]
fn inner_constructors_mark_the_outer_instance() {
    let index = build(&fixture_classes());
    let entry = index
        .class_by_name(&name("com.example.Container$Entry"))
        .unwrap();
    assert_eq!(entry.nesting_kind(), NestingKind::Inner);
    assert_eq!(entry.simple_name(), Some("Entry"));

    let ctor = entry.constructors().next().unwrap();
    assert_eq!(ctor.descriptor_parameters()[0].kind(), ParameterKind::Mandated);
    assert_eq!(ctor.parameters_count(), 0);
    let receiver = ctor.receiver_type().unwrap();
    assert!(receiver.annotation(&name("com.example.NonNull")).is_some());
}

#[test]
fn method_parameters_attribute_names_parameters() {
    let bytes = ClassFileBuilder::new("p/Outer$Inner")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .method(
            MemberBuilder::new("<init>", "(Lp/Outer;I)V")
                .method_parameter(Some("this$0"), ACC_FINAL | ACC_MANDATED)
                .method_parameter(Some("size"), 0),
        )
        .build();
    let index = build(&[bytes]);
    let ctor = &index.class_by_name(&name("p.Outer$Inner")).unwrap().methods()[0];

    let declared: Vec<Option<&str>> = ctor.parameters().map(|p| p.name()).collect();
    assert_eq!(declared, vec![Some("size")]);
    assert_eq!(ctor.descriptor_parameters()[0].name(), Some("this$0"));
    assert_eq!(
        ctor.descriptor_parameters()[0].flags(),
        ACC_FINAL | ACC_MANDATED
    );
}

#[test]
fn records_and_constants_are_indexed() {
    let index = build(&fixture_classes());

    let point = index.class_by_name(&name("com.example.Point")).unwrap();
    assert!(point.is_record());
    let components: Vec<&str> = point.record_components().iter().map(|c| c.name()).collect();
    assert_eq!(components, vec!["x", "tags"]);
    let tags = point.record_component("tags").unwrap();
    assert_eq!(
        tags.component_type(),
        &Type::parameterized(name("java.util.List"))
            .argument(Type::class(name("java.lang.String")))
            .build()
            .unwrap()
    );

    let container = index.class_by_name(&name("com.example.Container")).unwrap();
    let limit = container.field("LIMIT").unwrap();
    assert!(limit.is_static() && limit.is_final());
    assert_eq!(limit.constant_value(), Some(&ConstantValue::Int(64)));
    assert!(container.field("items").unwrap().constant_value().is_none());

    let strings = ClassFileBuilder::new("p/S")
        .field(
            MemberBuilder::new("GREETING", "Ljava/lang/String;")
                .access_flags(ACC_STATIC | ACC_FINAL)
                .constant_string("hi"),
        )
        .field(
            MemberBuilder::new("RATIO", "D")
                .access_flags(ACC_STATIC | ACC_FINAL)
                .constant(Value::Double(1.5)),
        )
        .build();
    let index = build(&[strings]);
    let class = index.class_by_name(&name("p.S")).unwrap();
    assert_eq!(
        class.field("GREETING").unwrap().constant_value(),
        Some(&ConstantValue::String("hi".to_string()))
    );
    assert_eq!(
        class.field("RATIO").unwrap().constant_value(),
        Some(&ConstantValue::Double(1.5))
    );
}

#[test]
fn class_kinds_and_members_are_exposed() {
    let index = build(&fixture_classes());

    let api = index.class_by_name(&name("com.example.Api")).unwrap();
    assert!(api.is_annotation() && api.is_interface());
    assert_eq!(
        api.methods()[0].default_value(),
        Some(&nova_class_index::AnnotationValue::Int(1))
    );

    let shape = index.class_by_name(&name("com.example.Shape")).unwrap();
    assert!(shape.is_interface() && shape.is_abstract());
    assert_eq!(shape.nesting_kind(), NestingKind::TopLevel);

    let container = index.class_by_name(&name("com.example.Container")).unwrap();
    let put = container.methods_named("put").next().unwrap();
    assert_eq!(put.exceptions(), &[Type::class(name("java.io.IOException"))][..]);
    assert_eq!(
        put.annotation(&name("com.example.Api"))
            .and_then(|a| a.value("since"))
            .and_then(|v| v.as_i64()),
        Some(2)
    );
    assert!(put.parameter(0).unwrap().annotation(&name("com.example.NonNull")).is_some());
    assert!(container
        .method("area", &[])
        .is_some_and(|m| m.return_type().kind() == nova_class_index::TypeKind::Primitive));
    assert_eq!(
        container.interface_names().cloned().collect::<Vec<_>>(),
        vec![name("com.example.Shape")]
    );
}

#[test]
fn flags_and_declared_annotations() {
    let bytes = ClassFileBuilder::new("p/Sealed")
        .access_flags(ACC_PUBLIC | nova_test_utils::classfile::ACC_ABSTRACT)
        .annotation(super::support::ann("p/Marker"))
        .permitted_subclass("p/Sealed$Leaf")
        .method(MemberBuilder::new("<clinit>", "()V").access_flags(ACC_STATIC))
        .method(
            MemberBuilder::new("bridge", "([Ljava/lang/Object;)V")
                .access_flags(ACC_PUBLIC | 0x0040 | 0x0080),
        )
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Sealed")).unwrap();

    assert!(class.is_public() && class.is_abstract() && class.is_sealed());
    assert_eq!(class.permitted_subclasses(), &[name("p.Sealed$Leaf")][..]);
    assert_eq!(class.name().to_internal(), "p/Sealed");
    assert_eq!(
        nova_class_index::DotName::from_internal("p/Sealed$Leaf"),
        name("p.Sealed$Leaf")
    );

    let names: Vec<String> = class
        .declared_annotations()
        .iter()
        .map(|a| a.name().to_string())
        .collect();
    assert_eq!(names, vec!["p.Marker"]);
    assert!(class.declared_annotation(&name("p.Marker")).unwrap().target().is_none());

    let clinit = &class.methods()[0];
    assert!(clinit.is_static_initializer() && clinit.is_static());
    let bridge = &class.methods()[1];
    assert!(bridge.is_bridge() && bridge.is_varargs());
    assert_eq!(
        bridge.descriptor_parameter_types().collect::<Vec<_>>(),
        vec![&Type::array(Type::object(), 1).unwrap()]
    );
}

#[test]
fn methods_are_found_by_parameter_types() {
    let bytes = ClassFileBuilder::new("p/Overloads")
        .method(MemberBuilder::new("m", "()V"))
        .method(MemberBuilder::new("m", "(Ljava/lang/String;I)V"))
        .method(MemberBuilder::new("m", "(I)V"))
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Overloads")).unwrap();

    let string_int = [
        Type::class(name("java.lang.String")),
        Type::primitive(PrimitiveType::Int),
    ];
    let found = class.method("m", &string_int).unwrap();
    assert_eq!(found.parameters_count(), 2);
    assert!(std::ptr::eq(found, &class.methods()[1]));

    assert!(std::ptr::eq(class.method("m", &[]).unwrap(), &class.methods()[0]));
    assert!(class.method("m", &string_int[..1]).is_none());
    assert!(class
        .method("m", &[Type::primitive(PrimitiveType::Long)])
        .is_none());
    assert!(class.method("n", &string_int).is_none());
}
