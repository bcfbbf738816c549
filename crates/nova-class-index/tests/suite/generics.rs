use nova_class_index::{
    write_index, FormatVersion, IndexBuilder, IndexError, IndexView, NestingKind, ParameterKind, PrimitiveType, Type,
    TypeKind, TypeParameterOwner, TypeShape, TypeVariableDeclaration,
};
use nova_test_utils::classfile::{ClassFileBuilder, MemberBuilder, ACC_PUBLIC};
use pretty_assertions::assert_eq;

use super::support::{build, name};

fn first_argument(ty: &Type) -> &Type {
    match ty.shape() {
        TypeShape::Parameterized { arguments, .. } => &arguments[0],
        other => panic!("expected a parameterized type, got {other:?}"),
    }
}

fn bounds(ty: &Type) -> &[Type] {
    match ty.shape() {
        TypeShape::TypeVariable { bounds, .. } => bounds,
        other => panic!("expected a type variable, got {other:?}"),
    }
}

#[test]
fn self_referential_bounds_point_back_at_the_declaration() {
    let bytes = ClassFileBuilder::new("p/Sorted")
        .signature("<T::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;")
        .field(MemberBuilder::new("first", "Ljava/lang/Comparable;").signature("TT;"))
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Sorted")).unwrap();

    let declared = &class.type_parameters()[0];
    assert_eq!(declared.identifier(), Some("T"));
    let TypeShape::TypeVariable {
        implicit_object_bound,
        ..
    } = declared.shape()
    else {
        unreachable!()
    };
    assert!(*implicit_object_bound);

    let comparable = &bounds(declared)[0];
    assert_eq!(comparable.name(), Some(&name("java.lang.Comparable")));
    let reference = first_argument(comparable);
    assert_eq!(reference.kind(), TypeKind::TypeVariableReference);
    assert_eq!(
        reference.shape(),
        &TypeShape::TypeVariableReference {
            identifier: "T".into(),
            declaration: Some(TypeVariableDeclaration {
                owner: TypeParameterOwner::Class(name("p.Sorted")),
                position: 0,
            }),
        }
    );
    let resolved = index.resolve_type_variable(reference).unwrap();
    assert!(std::ptr::eq(resolved, declared));

    // Uses after the parameter list carry a full copy.
    assert_eq!(class.fields()[0].field_type(), declared);
}

#[test]
fn later_siblings_are_references() {
    let bytes = ClassFileBuilder::new("p/Pair")
        .signature("<A:TB;B:Ljava/lang/Number;>Ljava/lang/Object;")
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Pair")).unwrap();

    let a_bound = &bounds(&class.type_parameters()[0])[0];
    let resolved = index.resolve_type_variable(a_bound).unwrap();
    assert!(std::ptr::eq(resolved, &class.type_parameters()[1]));
    assert_eq!(
        bounds(resolved),
        &[Type::class(name("java.lang.Number"))][..]
    );
}

#[test]
fn method_type_parameters_shadow_class_ones() {
    let bytes = ClassFileBuilder::new("p/Util")
        .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
        .method(
            MemberBuilder::new("max", "(Ljava/util/List;)Ljava/lang/Comparable;")
                .signature("<T::Ljava/lang/Comparable<-TT;>;>(Ljava/util/List<+TT;>;)TT;"),
        )
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Util")).unwrap();
    let method = &class.methods()[0];

    let declared = &method.type_parameters()[0];
    assert_eq!(method.return_type(), declared);
    assert_ne!(method.return_type(), &class.type_parameters()[0]);

    let wildcard = first_argument(&bounds(declared)[0]);
    let TypeShape::Wildcard(nova_class_index::WildcardBound::Super(reference)) = wildcard.shape()
    else {
        panic!("expected ? super T");
    };
    let resolved = index.resolve_type_variable(reference).unwrap();
    assert!(std::ptr::eq(resolved, declared));
    assert!(matches!(
        reference.shape(),
        TypeShape::TypeVariableReference {
            declaration: Some(TypeVariableDeclaration {
                owner: TypeParameterOwner::Method { method: 0, .. },
                position: 0,
            }),
            ..
        }
    ));
}

#[test]
fn unknown_type_variables_fail_top_level_classes() {
    let mut builder = IndexBuilder::new();
    let bytes = ClassFileBuilder::new("p/Broken")
        .field(MemberBuilder::new("x", "Ljava/lang/Object;").signature("TMissing;"))
        .build();
    let err = builder.index_class(&bytes).unwrap_err();
    assert!(matches!(err, IndexError::MalformedSignature(_)), "{err:?}");
    assert!(builder.is_empty());
}

#[test]
fn malformed_signatures_are_rejected() {
    let mut builder = IndexBuilder::new();
    let bytes = ClassFileBuilder::new("p/Broken")
        .signature("<T:Ljava/lang/Object;Ljava/lang/Object;")
        .build();
    assert!(builder.index_class(&bytes).is_err());
    assert!(builder.is_empty());
}

#[test]
fn deeply_nested_signatures_are_rejected() {
    let nested = |depth: usize| {
        format!(
            "{}Ljava/lang/String;{}",
            "Ljava/util/List<".repeat(depth),
            ">;".repeat(depth)
        )
    };
    let class = |signature: &str| {
        ClassFileBuilder::new("p/Deep")
            .field(MemberBuilder::new("xs", "Ljava/util/List;").signature(signature))
            .build()
    };

    let mut builder = IndexBuilder::new();
    builder
        .index_class(&class(&nested(nova_classfile::MAX_SIGNATURE_NESTING)))
        .unwrap();
    assert_eq!(builder.len(), 1);

    for depth in [nova_classfile::MAX_SIGNATURE_NESTING + 1, 3000] {
        let mut builder = IndexBuilder::new();
        let err = builder.index_class(&class(&nested(depth))).unwrap_err();
        assert!(matches!(err, IndexError::MalformedSignature(_)), "{err:?}");
        assert!(builder.is_empty());
    }
}

fn outer() -> Vec<u8> {
    ClassFileBuilder::new("p/Outer")
        .signature("<T:Ljava/lang/Number;>Ljava/lang/Object;")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .build()
}

fn inner() -> Vec<u8> {
    ClassFileBuilder::new("p/Outer$Inner")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .field(MemberBuilder::new("value", "Ljava/lang/Number;").signature("TT;"))
        .build()
}

#[test]
fn enclosing_class_variables_resolve_at_build() {
    let mut builder = IndexBuilder::new();
    let pending = builder.index_class(&inner()).unwrap();
    assert_eq!(
        pending.fields()[0].field_type().shape(),
        &TypeShape::TypeVariableReference {
            identifier: "T".into(),
            declaration: None,
        }
    );
    builder.index_class(&outer()).unwrap();
    let index = builder.build();

    let outer = index.class_by_name(&name("p.Outer")).unwrap();
    let inner = index.class_by_name(&name("p.Outer$Inner")).unwrap();
    assert_eq!(inner.nesting_kind(), NestingKind::Inner);
    assert_eq!(inner.enclosing_class(), Some(&name("p.Outer")));
    assert_eq!(inner.fields()[0].field_type(), &outer.type_parameters()[0]);
    assert_eq!(
        bounds(inner.fields()[0].field_type()),
        &[Type::class(name("java.lang.Number"))][..]
    );
}

#[test]
fn missing_enclosing_classes_leave_references_pending() {
    let index = build(&[inner()]);
    let inner = index.class_by_name(&name("p.Outer$Inner")).unwrap();
    let field_type = inner.fields()[0].field_type();
    assert_eq!(field_type.kind(), TypeKind::TypeVariableReference);
    assert!(index.resolve_type_variable(field_type).is_none());
}

#[test]
fn local_classes_see_their_enclosing_method() {
    let host = ClassFileBuilder::new("p/Host")
        .method(MemberBuilder::new("make", "()V").signature("<E:Ljava/lang/CharSequence;>()V"))
        .build();
    let local = ClassFileBuilder::new("p/Host$1Local")
        .inner_class("p/Host$1Local", None, Some("Local"), 0)
        .enclosing_method("p/Host", Some(("make", "()V")))
        .field(MemberBuilder::new("e", "Ljava/lang/CharSequence;").signature("TE;"))
        .build();
    let index = build(&[local, host]);

    let host = index.class_by_name(&name("p.Host")).unwrap();
    let local = index.class_by_name(&name("p.Host$1Local")).unwrap();
    assert_eq!(local.nesting_kind(), NestingKind::Local);
    assert_eq!(local.simple_name(), Some("Local"));
    let enclosing = local.enclosing_method().unwrap();
    assert_eq!(enclosing.enclosing_class(), &name("p.Host"));
    assert_eq!(enclosing.name(), "make");
    assert_eq!(enclosing.return_type(), &Type::void());

    assert_eq!(
        local.fields()[0].field_type(),
        &host.methods()[0].type_parameters()[0]
    );
}

#[test]
fn anonymous_classes_have_no_simple_name() {
    let anonymous = ClassFileBuilder::new("p/Host$1")
        .inner_class("p/Host$1", None, None, 0)
        .enclosing_method("p/Host", None)
        .build();
    let index = build(&[anonymous]);
    let class = index.class_by_name(&name("p.Host$1")).unwrap();
    assert_eq!(class.nesting_kind(), NestingKind::Anonymous);
    assert_eq!(class.simple_name(), None);
    assert!(class.enclosing_method().is_none());
    assert_eq!(class.enclosing_class(), Some(&name("p.Host")));
}

#[test]
fn long_parameter_lists_are_indexed() {
    let descriptor = format!("({})V", "I".repeat(300));
    let bytes = ClassFileBuilder::new("p/Wide")
        .method(MemberBuilder::new("wide", &descriptor))
        .build();
    let index = build(&[bytes]);
    let method = &index.class_by_name(&name("p.Wide")).unwrap().methods()[0];

    assert_eq!(method.parameters_count(), 300);
    let last = method.parameter(299).unwrap();
    assert_eq!(last.position(), 299);
    assert_eq!(last.kind(), ParameterKind::Declared);
    assert_eq!(last.parameter_type(), &Type::primitive(PrimitiveType::Int));
}

#[test]
fn primitive_field_signatures_are_accepted() {
    let bytes = ClassFileBuilder::new("p/Odd")
        .field(MemberBuilder::new("count", "I").signature("I"))
        .build();
    let index = build(&[bytes]);
    let field = &index.class_by_name(&name("p.Odd")).unwrap().fields()[0];
    assert_eq!(field.field_type(), &Type::primitive(PrimitiveType::Int));
}

#[test]
fn pending_references_in_the_fixture_resolve() {
    let index = build(&super::support::fixture_classes());
    let container = index.class_by_name(&name("com.example.Container")).unwrap();
    let entry = index
        .class_by_name(&name("com.example.Container$Entry"))
        .unwrap();

    let value = entry.field("value").unwrap();
    assert_eq!(value.field_type().kind(), TypeKind::TypeVariable);
    assert_eq!(value.field_type().identifier(), Some("T"));
    assert_eq!(
        value.field_type().without_annotations(),
        container.type_parameters()[0].without_annotations()
    );
}

fn chained_bounds(count: usize) -> String {
    let mut signature = String::from("<T0:Ljava/lang/Object;");
    for i in 1..count {
        signature.push_str(&format!("T{i}:Ljava/util/Map<TT{p};TT{p};>;", p = i - 1));
    }
    signature.push_str(">Ljava/lang/Object;");
    signature
}

#[test]
fn chained_bounds_refer_back_instead_of_copying() {
    let bytes = ClassFileBuilder::new("p/Chain")
        .signature(&chained_bounds(64))
        .field(MemberBuilder::new("last", "Ljava/util/Map;").signature("TT63;"))
        .build();
    let index = build(&[bytes]);
    let class = index.class_by_name(&name("p.Chain")).unwrap();
    assert_eq!(class.type_parameters().len(), 64);

    let map = &bounds(&class.type_parameters()[63])[0];
    let previous = first_argument(map);
    assert_eq!(previous.kind(), TypeKind::TypeVariableReference);
    let resolved = index.resolve_type_variable(previous).unwrap();
    assert!(std::ptr::eq(resolved, &class.type_parameters()[62]));

    assert_eq!(class.fields()[0].field_type(), &class.type_parameters()[63]);

    let bytes = write_index(&index, FormatVersion::CURRENT).unwrap();
    assert!(bytes.len() < 64 * 1024, "{} bytes", bytes.len());
}

#[test]
fn enclosing_variables_in_bounds_resolve_to_references() {
    let inner = ClassFileBuilder::new("p/Outer$Inner")
        .inner_class("p/Outer$Inner", Some("p/Outer"), Some("Inner"), ACC_PUBLIC)
        .signature("<U:TT;>Ljava/lang/Object;")
        .build();
    let index = build(&[inner, outer()]);
    let outer = index.class_by_name(&name("p.Outer")).unwrap();
    let inner = index.class_by_name(&name("p.Outer$Inner")).unwrap();

    let bound = &bounds(&inner.type_parameters()[0])[0];
    assert_eq!(
        bound.shape(),
        &TypeShape::TypeVariableReference {
            identifier: "T".into(),
            declaration: Some(TypeVariableDeclaration {
                owner: TypeParameterOwner::Class(name("p.Outer")),
                position: 0,
            }),
        }
    );
    let resolved = index.resolve_type_variable(bound).unwrap();
    assert!(std::ptr::eq(resolved, &outer.type_parameters()[0]));
}
