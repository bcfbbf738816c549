use std::sync::Arc;

use nova_class_index::{CompositeIndex, ConstantValue, IndexView};
use nova_test_utils::classfile::{ClassFileBuilder, MemberBuilder, ACC_FINAL, ACC_STATIC};
use pretty_assertions::assert_eq;

use super::support::{ann, build, name, names};

fn library() -> Vec<Vec<u8>> {
    vec![
        ClassFileBuilder::new("lib/Base")
            .annotation(ann("lib/Marker"))
            .field(
                MemberBuilder::new("LEVEL", "I")
                    .access_flags(ACC_STATIC | ACC_FINAL)
                    .constant_int(1),
            )
            .build(),
        ClassFileBuilder::new("lib/Helper").build(),
    ]
}

fn application() -> Vec<Vec<u8>> {
    vec![
        ClassFileBuilder::new("app/Main")
            .super_class("lib/Base")
            .annotation(ann("lib/Marker"))
            .references_class("lib/Helper")
            .build(),
        // Shadows the library's copy.
        ClassFileBuilder::new("lib/Base")
            .field(
                MemberBuilder::new("LEVEL", "I")
                    .access_flags(ACC_STATIC | ACC_FINAL)
                    .constant_int(2),
            )
            .build(),
    ]
}

fn composite() -> CompositeIndex {
    CompositeIndex::new(vec![
        Arc::new(build(&library())),
        Arc::new(build(&application())),
    ])
}

#[test]
fn later_layers_shadow_earlier_ones() {
    let index = composite();
    assert_eq!(index.layers().len(), 2);
    assert_eq!(index.len(), 3);

    assert_eq!(index.layer_of(&name("lib.Base")), Some(1));
    assert_eq!(index.layer_of(&name("lib.Helper")), Some(0));
    assert_eq!(index.layer_of(&name("app.Main")), Some(1));
    assert_eq!(index.layer_of(&name("lib.Missing")), None);

    let base = index.class_by_name(&name("lib.Base")).unwrap();
    assert_eq!(
        base.field("LEVEL").unwrap().constant_value(),
        Some(&ConstantValue::Int(2))
    );
}

#[test]
fn annotations_come_from_visible_classes_only() {
    let index = composite();
    let marked: Vec<String> = index
        .annotations(&name("lib.Marker"))
        .iter()
        .filter_map(|a| a.target())
        .map(|t| t.declaring_class().to_string())
        .collect();
    assert_eq!(marked, vec!["app.Main"]);
}

#[test]
fn relations_span_layers() {
    let index = composite();
    assert_eq!(
        names(index.known_direct_subclasses(&name("lib.Base"))),
        vec!["app.Main"]
    );
    assert_eq!(names(index.known_users(&name("lib.Helper"))), vec!["app.Main"]);
    assert_eq!(names(index.classes_in_package(Some(&name("lib")))), vec!["lib.Base", "lib.Helper"]);

    let known: Vec<String> = index
        .known_classes()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(known, vec!["app.Main", "lib.Base", "lib.Helper"]);
}

#[test]
fn empty_composites_answer_nothing() {
    let index = CompositeIndex::new(Vec::new());
    assert!(index.is_empty());
    assert!(index.known_classes().is_empty());
    assert!(index.annotations(&name("lib.Marker")).is_empty());
}
