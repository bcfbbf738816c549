use nova_class_index::{IndexBuilder, IndexView, IndexerConfig};
use nova_test_utils::classfile::{ClassFileBuilder, ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC};
use pretty_assertions::assert_eq;

use super::support::{build, fixture_classes, name, names};

fn interface(internal: &str, supers: &[&str]) -> Vec<u8> {
    let mut builder =
        ClassFileBuilder::new(internal).access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    for s in supers {
        builder = builder.interface(s);
    }
    builder.build()
}

fn class(internal: &str, super_class: &str, interfaces: &[&str]) -> Vec<u8> {
    let mut builder = ClassFileBuilder::new(internal).super_class(super_class);
    for iface in interfaces {
        builder = builder.interface(iface);
    }
    builder.build()
}

/// `C extends B extends A`, with `B implements q.J` and `q.J extends q.I`.
fn chain() -> Vec<Vec<u8>> {
    vec![
        class("p/A", "java/lang/Object", &[]),
        class("p/B", "p/A", &["q/J"]),
        class("p/C", "p/B", &[]),
        interface("q/I", &[]),
        interface("q/J", &["q/I"]),
    ]
}

#[test]
fn hierarchy_queries_do_not_depend_on_indexing_order() {
    let forward = chain();
    let mut backward = chain();
    backward.reverse();
    let mut shuffled = chain();
    shuffled.swap(0, 2);
    shuffled.swap(1, 4);

    for classes in [forward, backward, shuffled] {
        let index = build(&classes);

        assert_eq!(names(index.known_direct_subclasses(&name("p.A"))), vec!["p.B"]);
        assert_eq!(
            names(index.all_known_subclasses(&name("p.A"))),
            vec!["p.B", "p.C"]
        );
        assert_eq!(
            names(index.known_direct_subclasses(&name("java.lang.Object"))),
            vec!["p.A"]
        );
        assert_eq!(
            names(index.all_known_subclasses(&name("java.lang.Object"))),
            vec!["p.A", "p.B", "p.C"]
        );

        assert_eq!(
            names(index.known_direct_subinterfaces(&name("q.I"))),
            vec!["q.J"]
        );
        assert_eq!(
            names(index.all_known_subinterfaces(&name("q.I"))),
            vec!["q.J"]
        );
        assert!(index.known_direct_implementors(&name("q.I")).is_empty());
        assert_eq!(
            names(index.known_direct_implementors(&name("q.J"))),
            vec!["p.B"]
        );
        assert_eq!(
            names(index.all_known_implementors(&name("q.I"))),
            vec!["p.B", "p.C"]
        );
    }
}

#[test]
fn interfaces_are_not_subclasses_of_object() {
    let index = build(&chain());
    let subclasses = names(index.all_known_subclasses(&name("java.lang.Object")));
    assert!(!subclasses.contains(&"q.I".to_string()));
    assert!(index.known_direct_subclasses(&name("q.J")).is_empty());
}

#[test]
fn unknown_types_have_empty_hierarchies() {
    let index = build(&chain());
    let missing = name("p.Missing");
    assert!(index.class_by_name(&missing).is_none());
    assert!(index.known_direct_subclasses(&missing).is_empty());
    assert!(index.all_known_subclasses(&missing).is_empty());
    assert!(index.all_known_implementors(&missing).is_empty());
}

#[test]
fn packages_list_their_classes_and_subpackages() {
    let index = build(&[
        class("a/b/X", "java/lang/Object", &[]),
        class("a/b/c/Y", "java/lang/Object", &[]),
        class("a/d/Z", "java/lang/Object", &[]),
        class("Top", "java/lang/Object", &[]),
    ]);

    assert_eq!(
        names(index.classes_in_package(Some(&name("a.b")))),
        vec!["a.b.X"]
    );
    assert_eq!(names(index.classes_in_package(None)), vec!["Top"]);
    assert!(index.classes_in_package(Some(&name("a"))).is_empty());

    assert_eq!(names(index.subpackages(None)), vec!["a"]);
    assert_eq!(names(index.subpackages(Some(&name("a")))), vec!["a.b", "a.d"]);
    assert_eq!(names(index.subpackages(Some(&name("a.b")))), vec!["a.b.c"]);
    assert!(index.subpackages(Some(&name("a.b.c"))).is_empty());

    let known: Vec<String> = index
        .known_classes()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(known, vec!["Top", "a.b.X", "a.b.c.Y", "a.d.Z"]);
}

#[test]
fn known_users_cover_signatures_and_constant_pool() {
    let index = build(&fixture_classes());

    let users = names(index.known_users(&name("com.example.Color")));
    assert_eq!(users, vec!["com.example.Point"]);

    let string_users = names(index.known_users(&name("java.lang.String")));
    assert!(string_users.contains(&"com.example.Container".to_string()));
    assert!(string_users.contains(&"com.example.Point".to_string()));

    let io_users = names(index.known_users(&name("java.io.IOException")));
    assert_eq!(io_users, vec!["com.example.Container"]);

    assert!(!index
        .uses_of(&name("com.example.Container"))
        .contains(&name("com.example.Container")));
}

#[test]
fn known_users_can_be_disabled() {
    let config: IndexerConfig = serde_json::from_str(r#"{ "known_users": false }"#).unwrap();
    let mut builder = IndexBuilder::with_config(config);
    for bytes in fixture_classes() {
        builder.index_class(&bytes).unwrap();
    }
    let index = builder.build();
    assert!(index.known_users(&name("com.example.Color")).is_empty());
    assert!(index.uses_of(&name("com.example.Point")).is_empty());
}
