use nova_class_index::{
    AnnotationInstance, AnnotationTarget, Index, IndexView, Type, TypeKind, TypePathStep,
    TypeShape, TypeTarget, TypeTargetUsage,
};
use nova_test_utils::classfile::{
    ClassFileBuilder, MemberBuilder, TargetInfo, TypeAnnotationBuilder,
    TypePathStep as RawStep, ACC_PUBLIC, ACC_STATIC,
};
use pretty_assertions::assert_eq;

use super::support::{ann, build, name};

fn type_ann(target: TargetInfo, annotation: &str, path: &[RawStep]) -> TypeAnnotationBuilder {
    TypeAnnotationBuilder::new(target, ann(annotation)).path(path)
}

fn only(index: &Index, annotation: &str) -> AnnotationInstance {
    let found = index.annotations(&name(annotation));
    assert_eq!(found.len(), 1, "expected exactly one @{annotation}");
    found[0].clone()
}

fn type_target(instance: &AnnotationInstance) -> &TypeTarget {
    instance
        .target()
        .and_then(AnnotationTarget::as_type)
        .expect("type annotation target")
}

fn annotation_names(ty: &Type) -> Vec<String> {
    ty.annotations().iter().map(|a| a.name().to_string()).collect()
}

#[test]
fn type_argument_paths_reach_nested_arguments() {
    let bytes = ClassFileBuilder::new("p/A")
        .field(
            MemberBuilder::new("m", "Ljava/util/Map;")
                .signature(
                    "Ljava/util/Map<Ljava/lang/String;Ljava/util/List<Ljava/lang/Integer;>;>;",
                )
                .type_annotation(type_ann(TargetInfo::Field, "p/Whole", &[]))
                .type_annotation(type_ann(
                    TargetInfo::Field,
                    "p/Element",
                    &[RawStep::TypeArgument(1), RawStep::TypeArgument(0)],
                )),
        )
        .build();
    let index = build(&[bytes]);

    let field = &index.class_by_name(&name("p.A")).unwrap().fields()[0];
    let TypeShape::Parameterized { arguments, .. } = field.field_type().shape() else {
        panic!("expected a parameterized field type");
    };
    assert_eq!(annotation_names(field.field_type()), vec!["p.Whole"]);
    let TypeShape::Parameterized { arguments: inner, .. } = arguments[1].shape() else {
        panic!("expected List<Integer>");
    };
    assert_eq!(annotation_names(&inner[0]), vec!["p.Element"]);
    assert!(arguments[0].annotations().is_empty());

    let element = only(&index, "p.Element");
    let target = type_target(&element);
    assert_eq!(
        target.enclosing_target(),
        &AnnotationTarget::Field {
            class: name("p.A"),
            position: 0,
        }
    );
    assert_eq!(target.usage(), TypeTargetUsage::Empty { receiver: false });
    assert_eq!(
        target.path(),
        &[TypePathStep::TypeArgument(1), TypePathStep::TypeArgument(0)]
    );
    assert_eq!(target.target().name(), Some(&name("java.lang.Integer")));

    let whole = only(&index, "p.Whole");
    assert!(type_target(&whole).path().is_empty());
    assert_eq!(type_target(&whole).target().kind(), TypeKind::Parameterized);
}

#[test]
fn annotated_array_levels_split_the_array() {
    let bytes = ClassFileBuilder::new("p/A")
        .field(
            MemberBuilder::new("grid", "[[Ljava/lang/String;")
                .type_annotation(type_ann(TargetInfo::Field, "p/Outer", &[]))
                .type_annotation(type_ann(TargetInfo::Field, "p/Middle", &[RawStep::Array]))
                .type_annotation(type_ann(
                    TargetInfo::Field,
                    "p/Element",
                    &[RawStep::Array, RawStep::Array],
                )),
        )
        .build();
    let index = build(&[bytes]);
    let field = &index.class_by_name(&name("p.A")).unwrap().fields()[0];

    let TypeShape::Array {
        component,
        dimensions,
    } = field.field_type().shape()
    else {
        panic!("expected an array");
    };
    assert_eq!(*dimensions, 1);
    assert_eq!(annotation_names(field.field_type()), vec!["p.Outer"]);
    let TypeShape::Array {
        component: element,
        dimensions: inner_dimensions,
    } = component.shape()
    else {
        panic!("expected the annotated inner array");
    };
    assert_eq!(*inner_dimensions, 1);
    assert_eq!(annotation_names(component), vec!["p.Middle"]);
    assert_eq!(annotation_names(element), vec!["p.Element"]);

    assert!(type_target(&only(&index, "p.Outer")).path().is_empty());
    assert_eq!(
        type_target(&only(&index, "p.Middle")).path(),
        &[TypePathStep::Array]
    );
    assert_eq!(
        type_target(&only(&index, "p.Element")).path(),
        &[TypePathStep::Array, TypePathStep::Array]
    );
}

#[test]
fn element_annotation_keeps_dimensions_together() {
    let bytes = ClassFileBuilder::new("p/A")
        .field(MemberBuilder::new("matrix", "[[I").type_annotation(type_ann(
            TargetInfo::Field,
            "p/Element",
            &[RawStep::Array, RawStep::Array],
        )))
        .build();
    let index = build(&[bytes]);
    let field = &index.class_by_name(&name("p.A")).unwrap().fields()[0];

    let TypeShape::Array {
        component,
        dimensions,
    } = field.field_type().shape()
    else {
        panic!("expected an array");
    };
    assert_eq!(*dimensions, 2);
    assert!(field.field_type().annotations().is_empty());
    assert_eq!(component.kind(), TypeKind::Primitive);
    assert_eq!(
        type_target(&only(&index, "p.Element")).path(),
        &[TypePathStep::Array, TypePathStep::Array]
    );
}

#[test]
fn method_type_annotations_know_their_usage() {
    let bytes = ClassFileBuilder::new("p/A")
        .method(
            MemberBuilder::new("run", "(Ljava/lang/String;)Ljava/util/List;")
                .exception("java/io/IOException")
                .type_annotation(type_ann(TargetInfo::MethodReturn, "p/Result", &[]))
                .type_annotation(type_ann(TargetInfo::MethodReceiver, "p/Receiver", &[]))
                .type_annotation(type_ann(TargetInfo::FormalParameter(0), "p/Param", &[]))
                .type_annotation(type_ann(TargetInfo::Throws(0), "p/Thrown", &[])),
        )
        .build();
    let index = build(&[bytes]);
    let method = &index.class_by_name(&name("p.A")).unwrap().methods()[0];

    assert_eq!(annotation_names(method.return_type()), vec!["p.Result"]);
    let receiver = method.receiver_type().expect("annotated receiver");
    assert_eq!(receiver.name(), Some(&name("p.A")));
    assert_eq!(annotation_names(receiver), vec!["p.Receiver"]);
    assert_eq!(
        annotation_names(method.parameter(0).unwrap().parameter_type()),
        vec!["p.Param"]
    );
    assert_eq!(annotation_names(&method.exceptions()[0]), vec!["p.Thrown"]);

    let method_target = AnnotationTarget::Method {
        class: name("p.A"),
        position: 0,
    };
    for (annotation, usage) in [
        ("p.Result", TypeTargetUsage::Empty { receiver: false }),
        ("p.Receiver", TypeTargetUsage::Empty { receiver: true }),
        ("p.Param", TypeTargetUsage::MethodParameter { position: 0 }),
        ("p.Thrown", TypeTargetUsage::Throws { position: 0 }),
    ] {
        let instance = only(&index, annotation);
        let target = type_target(&instance);
        assert_eq!(target.usage(), usage, "{annotation}");
        assert_eq!(target.enclosing_target(), &method_target, "{annotation}");
    }
}

#[test]
fn unannotated_receivers_are_absent() {
    let bytes = ClassFileBuilder::new("p/A")
        .method(MemberBuilder::new("run", "()V"))
        .build();
    let index = build(&[bytes]);
    let method = &index.class_by_name(&name("p.A")).unwrap().methods()[0];
    assert!(method.receiver_type().is_none());
}

#[test]
fn formal_parameter_indexes_skip_the_outer_instance() {
    let bytes = ClassFileBuilder::new("p/Outer$Inner")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .method(
            MemberBuilder::new("<init>", "(Lp/Outer;Ljava/lang/String;)V")
                .type_annotation(type_ann(TargetInfo::FormalParameter(0), "p/Name", &[])),
        )
        .build();
    let index = build(&[bytes]);
    let ctor = &index.class_by_name(&name("p.Outer$Inner")).unwrap().methods()[0];

    assert!(ctor.descriptor_parameters()[0].annotations().is_empty());
    assert!(ctor.descriptor_parameters()[0].parameter_type().annotations().is_empty());
    assert_eq!(
        annotation_names(ctor.descriptor_parameters()[1].parameter_type()),
        vec!["p.Name"]
    );
    assert_eq!(
        type_target(&only(&index, "p.Name")).usage(),
        TypeTargetUsage::MethodParameter { position: 1 }
    );
}

#[test]
fn type_parameters_and_bounds_are_targets() {
    let bytes = ClassFileBuilder::new("p/Box")
        .signature("<T::Ljava/lang/Comparable<TT;>;U:Ljava/lang/Number;>Ljava/lang/Object;")
        .type_annotation(type_ann(TargetInfo::ClassTypeParameter(1), "p/Second", &[]))
        .type_annotation(type_ann(
            TargetInfo::ClassTypeParameterBound(0, 1),
            "p/Bound",
            &[],
        ))
        .type_annotation(type_ann(
            TargetInfo::ClassTypeParameterBound(1, 0),
            "p/ClassBound",
            &[],
        ))
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Box")).unwrap();

    assert_eq!(annotation_names(&class.type_parameters()[1]), vec!["p.Second"]);
    let TypeShape::TypeVariable { bounds, .. } = class.type_parameters()[0].shape() else {
        panic!("expected a type variable");
    };
    assert_eq!(annotation_names(&bounds[0]), vec!["p.Bound"]);

    assert_eq!(
        type_target(&only(&index, "p.Second")).usage(),
        TypeTargetUsage::TypeParameter { position: 1 }
    );
    assert_eq!(
        type_target(&only(&index, "p.Bound")).usage(),
        TypeTargetUsage::TypeParameterBound {
            position: 0,
            bound: 0,
        }
    );
    assert_eq!(
        type_target(&only(&index, "p.ClassBound")).usage(),
        TypeTargetUsage::TypeParameterBound {
            position: 1,
            bound: 0,
        }
    );
}

#[test]
fn extends_clauses_are_targets() {
    let bytes = ClassFileBuilder::new("p/A")
        .super_class("p/Base")
        .interface("java/lang/Runnable")
        .type_annotation(type_ann(TargetInfo::ClassExtends(0xFFFF), "p/Super", &[]))
        .type_annotation(type_ann(TargetInfo::ClassExtends(0), "p/Iface", &[]))
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.A")).unwrap();

    assert_eq!(
        annotation_names(class.super_class_type().unwrap()),
        vec!["p.Super"]
    );
    assert_eq!(annotation_names(&class.interface_types()[0]), vec!["p.Iface"]);
    assert_eq!(
        type_target(&only(&index, "p.Super")).usage(),
        TypeTargetUsage::ClassExtends { position: 0xFFFF }
    );
    assert_eq!(
        type_target(&only(&index, "p.Iface")).usage(),
        TypeTargetUsage::ClassExtends { position: 0 }
    );
}

#[test]
fn nested_steps_select_the_inner_type() {
    let bytes = ClassFileBuilder::new("p/A")
        .field(
            MemberBuilder::new("inner", "Lp/Outer$Inner;")
                .signature("Lp/Outer<Ljava/lang/String;>.Inner<Ljava/lang/Integer;>;")
                .type_annotation(type_ann(TargetInfo::Field, "p/OnOuter", &[]))
                .type_annotation(type_ann(TargetInfo::Field, "p/OnInner", &[RawStep::Nested]))
                .type_annotation(type_ann(
                    TargetInfo::Field,
                    "p/OnArgument",
                    &[RawStep::Nested, RawStep::TypeArgument(0)],
                )),
        )
        .build();
    let index = build(&[bytes]);
    let field = &index.class_by_name(&name("p.A")).unwrap().fields()[0];

    let TypeShape::Parameterized {
        arguments, owner, ..
    } = field.field_type().shape()
    else {
        panic!("expected Outer<String>.Inner<Integer>");
    };
    assert_eq!(annotation_names(field.field_type()), vec!["p.OnInner"]);
    assert_eq!(annotation_names(&arguments[0]), vec!["p.OnArgument"]);
    let owner = owner.as_ref().expect("generic owner");
    assert_eq!(annotation_names(owner), vec!["p.OnOuter"]);

    assert!(type_target(&only(&index, "p.OnOuter")).path().is_empty());
    assert_eq!(
        type_target(&only(&index, "p.OnInner")).path(),
        &[TypePathStep::Nested]
    );
    assert_eq!(
        type_target(&only(&index, "p.OnArgument")).path(),
        &[TypePathStep::Nested, TypePathStep::TypeArgument(0)]
    );
}

#[test]
fn non_generic_enclosing_instances_are_owners() {
    let bytes = ClassFileBuilder::new("p/A")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .inner_class("p/Outer$Nested", Some("p/Outer"), Some("Nested"), ACC_PUBLIC | ACC_STATIC)
        .field(
            MemberBuilder::new("inner", "Lp/Outer$Inner;")
                .type_annotation(type_ann(TargetInfo::Field, "p/OnOuter", &[]))
                .type_annotation(type_ann(TargetInfo::Field, "p/OnInner", &[RawStep::Nested])),
        )
        .field(
            MemberBuilder::new("nested", "Lp/Outer$Nested;")
                .type_annotation(type_ann(TargetInfo::Field, "p/OnNested", &[])),
        )
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.A")).unwrap();

    let inner = class.field("inner").unwrap().field_type();
    assert_eq!(annotation_names(inner), vec!["p.OnInner"]);
    let TypeShape::Parameterized {
        name: inner_name,
        arguments,
        owner: Some(owner),
    } = inner.shape()
    else {
        panic!("expected Outer.Inner with an owner, got {inner:?}");
    };
    assert_eq!(inner_name, &name("p.Outer$Inner"));
    assert!(arguments.is_empty());
    assert_eq!(owner.shape(), &TypeShape::Class(name("p.Outer")));
    assert_eq!(annotation_names(owner), vec!["p.OnOuter"]);

    let on_outer = only(&index, "p.OnOuter");
    assert!(type_target(&on_outer).path().is_empty());
    assert_eq!(type_target(&on_outer).target().name(), Some(&name("p.Outer")));
    assert_eq!(
        type_target(&only(&index, "p.OnInner")).path(),
        &[TypePathStep::Nested]
    );

    let nested = class.field("nested").unwrap().field_type();
    assert_eq!(nested.shape(), &TypeShape::Class(name("p.Outer$Nested")));
    assert_eq!(annotation_names(nested), vec!["p.OnNested"]);
}

#[test]
fn unannotated_enclosing_instances_leave_the_type_alone() {
    let bytes = ClassFileBuilder::new("p/A")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .field(
            MemberBuilder::new("inner", "Lp/Outer$Inner;")
                .type_annotation(type_ann(TargetInfo::Field, "p/OnInner", &[RawStep::Nested])),
        )
        .build();
    let index = build(&[bytes]);
    let inner = index.class_by_name(&name("p.A")).unwrap().fields()[0].field_type();
    assert_eq!(inner.shape(), &TypeShape::Class(name("p.Outer$Inner")));
    assert_eq!(annotation_names(inner), vec!["p.OnInner"]);
}

#[test]
fn wildcard_bounds_are_walked() {
    let bytes = ClassFileBuilder::new("p/A")
        .field(
            MemberBuilder::new("numbers", "Ljava/util/List;")
                .signature("Ljava/util/List<+Ljava/lang/Number;>;")
                .type_annotation(type_ann(
                    TargetInfo::Field,
                    "p/Bound",
                    &[RawStep::TypeArgument(0), RawStep::WildcardBound],
                )),
        )
        .build();
    let index = build(&[bytes]);
    let bound = only(&index, "p.Bound");
    let target = type_target(&bound);
    assert_eq!(
        target.path(),
        &[TypePathStep::TypeArgument(0), TypePathStep::WildcardBound]
    );
    assert_eq!(target.target().name(), Some(&name("java.lang.Number")));
}

#[test]
fn type_targets_resolve_to_their_declaration() {
    let bytes = ClassFileBuilder::new("p/A")
        .field(
            MemberBuilder::new("tags", "Ljava/util/List;")
                .signature("Ljava/util/List<Ljava/lang/String;>;")
                .type_annotation(type_ann(
                    TargetInfo::Field,
                    "p/Tag",
                    &[RawStep::TypeArgument(0)],
                )),
        )
        .build();
    let index = build(&[bytes]);
    let tag = only(&index, "p.Tag");
    match tag.target().and_then(|t| index.resolve_target(t)) {
        Some(nova_class_index::Declaration::Field(_, field)) => assert_eq!(field.name(), "tags"),
        other => panic!("unexpected declaration {other:?}"),
    }
}
