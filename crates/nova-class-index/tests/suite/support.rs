use nova_class_index::{DotName, Index, IndexBuilder};
use nova_test_utils::classfile::{
    AnnotationBuilder, ClassFileBuilder, MemberBuilder, RecordComponentBuilder, TargetInfo,
    TypeAnnotationBuilder, TypePathStep, Value, ACC_ABSTRACT, ACC_ANNOTATION, ACC_ENUM, ACC_FINAL,
    ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC,
};

pub fn name(s: &str) -> DotName {
    DotName::simple(s)
}

/// An annotation use of the class `internal`.
pub fn ann(internal: &str) -> AnnotationBuilder {
    AnnotationBuilder::new(&format!("L{internal};"))
}

pub fn build(classes: &[Vec<u8>]) -> Index {
    let mut builder = IndexBuilder::new();
    for bytes in classes {
        builder.index_class(bytes).unwrap();
    }
    builder.build()
}

pub fn names(list: &[DotName]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

/// A small project touching every kind of declaration the index records.
pub fn fixture_classes() -> Vec<Vec<u8>> {
    let shape = ClassFileBuilder::new("com/example/Shape")
        .access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
        .annotation(ann("com/example/Api"))
        .method(
            MemberBuilder::new("area", "()D").access_flags(ACC_PUBLIC | ACC_ABSTRACT),
        );

    let container = ClassFileBuilder::new("com/example/Container")
        .signature("<T::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;Lcom/example/Shape;")
        .interface("com/example/Shape")
        .type_annotation(TypeAnnotationBuilder::new(
            TargetInfo::ClassTypeParameter(0),
            ann("com/example/NonNull"),
        ))
        .inner_class(
            "com/example/Container$Entry",
            Some("com/example/Container"),
            Some("Entry"),
            ACC_PUBLIC,
        )
        .field(
            MemberBuilder::new("items", "Ljava/util/Map;")
                .signature("Ljava/util/Map<Ljava/lang/String;Ljava/util/List<TT;>;>;")
                .type_annotation(
                    TypeAnnotationBuilder::new(TargetInfo::Field, ann("com/example/NonNull"))
                        .path(&[TypePathStep::TypeArgument(1)]),
                ),
        )
        .field(
            MemberBuilder::new("LIMIT", "I")
                .access_flags(ACC_PUBLIC | ACC_STATIC | ACC_FINAL)
                .constant_int(64),
        )
        .method(
            MemberBuilder::new("put", "(Ljava/lang/String;Ljava/lang/Comparable;)V")
                .signature("(Ljava/lang/String;TT;)V")
                .annotation(ann("com/example/Api").value("since", Value::Int(2)))
                .parameter_annotations(vec![vec![ann("com/example/NonNull")], vec![]])
                .exception("java/io/IOException"),
        )
        .method(MemberBuilder::new("area", "()D"));

    let entry = ClassFileBuilder::new("com/example/Container$Entry")
        .inner_class(
            "com/example/Container$Entry",
            Some("com/example/Container"),
            Some("Entry"),
            ACC_PUBLIC,
        )
        .field(MemberBuilder::new("value", "Ljava/lang/Comparable;").signature("TT;"))
        .method(
            MemberBuilder::new("<init>", "(Lcom/example/Container;)V")
                .type_annotation(TypeAnnotationBuilder::new(
                    TargetInfo::MethodReceiver,
                    ann("com/example/NonNull"),
                )),
        );

    let color = ClassFileBuilder::new("com/example/Color")
        .access_flags(ACC_PUBLIC | ACC_FINAL | ACC_ENUM)
        .super_class("java/lang/Enum")
        .signature("Ljava/lang/Enum<Lcom/example/Color;>;")
        .field(
            MemberBuilder::new("RED", "Lcom/example/Color;")
                .access_flags(ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM),
        )
        .field(
            MemberBuilder::new("GREEN", "Lcom/example/Color;")
                .access_flags(ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM),
        )
        .field(
            MemberBuilder::new("$VALUES", "[Lcom/example/Color;")
                .access_flags(ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC),
        )
        .method(MemberBuilder::new("<init>", "(Ljava/lang/String;I)V"));

    let point = ClassFileBuilder::new("com/example/Point")
        .access_flags(ACC_PUBLIC | ACC_FINAL)
        .super_class("java/lang/Record")
        .record_component(
            RecordComponentBuilder::new("x", "I").annotation(ann("com/example/Positive")),
        )
        .record_component(
            RecordComponentBuilder::new("tags", "Ljava/util/List;")
                .signature("Ljava/util/List<Ljava/lang/String;>;"),
        )
        .field(MemberBuilder::new("x", "I").access_flags(ACC_FINAL))
        .field(MemberBuilder::new("tags", "Ljava/util/List;").access_flags(ACC_FINAL))
        .references_class("com/example/Color");

    let api = ClassFileBuilder::new("com/example/Api")
        .access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION)
        .interface("java/lang/annotation/Annotation")
        .method(
            MemberBuilder::new("since", "()I")
                .access_flags(ACC_PUBLIC | ACC_ABSTRACT)
                .annotation_default(Value::Int(1)),
        );

    vec![
        shape.build(),
        container.build(),
        entry.build(),
        color.build(),
        point.build(),
        api.build(),
    ]
}
