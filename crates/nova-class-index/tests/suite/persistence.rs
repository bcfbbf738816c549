use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use nova_class_index::{
    read_index, read_index_from, write_index, write_index_to, DotName, FormatVersion, Index,
    IndexError, IndexView, HEADER_LEN, MAGIC,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::support::{build, fixture_classes, name};

fn annotation_types(index: &Index) -> BTreeSet<DotName> {
    index
        .class_names()
        .iter()
        .flat_map(|class| index.class_annotations(class))
        .map(|a| a.name().clone())
        .collect()
}

fn assert_same_index(left: &Index, right: &Index) {
    assert_eq!(left.class_names(), right.class_names());
    for class in left.class_names() {
        assert_eq!(left.class_by_name(class), right.class_by_name(class), "{class}");
        assert_eq!(left.class_annotations(class), right.class_annotations(class), "{class}");
        assert_eq!(left.known_users(class), right.known_users(class), "{class}");
        assert_eq!(left.uses_of(class), right.uses_of(class), "{class}");
        assert_eq!(
            left.all_known_subclasses(class),
            right.all_known_subclasses(class),
            "{class}"
        );
    }
    let types = annotation_types(left);
    assert_eq!(types, annotation_types(right));
    for annotation in &types {
        assert_eq!(left.annotations(annotation), right.annotations(annotation));
    }
}

#[test]
fn current_format_round_trips() {
    let index = build(&fixture_classes());
    let bytes = write_index(&index, FormatVersion::CURRENT).unwrap();
    assert_eq!(bytes[4], FormatVersion::CURRENT.as_u8());

    let restored = read_index(&bytes).unwrap();
    assert_same_index(&index, &restored);

    // Bound references resolve against the restored classes.
    let container = restored.class_by_name(&name("com.example.Container")).unwrap();
    let declared = &container.type_parameters()[0];
    let nova_class_index::TypeShape::TypeVariable { bounds, .. } = declared.shape() else {
        panic!("expected a type variable");
    };
    let nova_class_index::TypeShape::Parameterized { arguments, .. } = bounds[0].shape() else {
        panic!("expected Comparable<T>");
    };
    let resolved = restored.resolve_type_variable(&arguments[0]).unwrap();
    assert!(std::ptr::eq(resolved, declared));

    assert_eq!(write_index(&restored, FormatVersion::CURRENT).unwrap(), bytes);
}

#[test]
fn version_one_drops_records_and_users() {
    let index = build(&fixture_classes());
    let bytes = write_index(&index, FormatVersion::V1).unwrap();
    assert_eq!(bytes[4], 1);

    let restored = read_index(&bytes).unwrap();
    assert_eq!(restored.class_names(), index.class_names());
    let point = restored.class_by_name(&name("com.example.Point")).unwrap();
    assert!(point.record_components().is_empty());
    assert!(restored.known_users(&name("com.example.Color")).is_empty());

    let container = name("com.example.Container");
    assert_eq!(
        restored.class_by_name(&container),
        index.class_by_name(&container)
    );
    assert_eq!(
        restored.annotations(&name("com.example.NonNull")),
        index.annotations(&name("com.example.NonNull"))
    );
}

#[test]
fn damaged_payloads_are_corrupt() {
    let bytes = write_index(&build(&fixture_classes()), FormatVersion::CURRENT).unwrap();
    for offset in [HEADER_LEN, HEADER_LEN + 17, bytes.len() - 1] {
        let mut damaged = bytes.clone();
        damaged[offset] ^= 0x55;
        match read_index(&damaged) {
            Err(IndexError::CorruptIndex(_)) => {}
            other => panic!("byte {offset}: expected a corrupt index, got {other:?}"),
        }
    }
}

/// A version 1 payload whose node `k` is `p.A<node k-1, node k-1>`, written
/// out by hand in the fixed-width little-endian layout.
fn doubling_payload(levels: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    // strings: ["p.A"]
    payload.write_u64::<LittleEndian>(1).unwrap();
    payload.write_u64::<LittleEndian>(3).unwrap();
    payload.extend_from_slice(b"p.A");
    // names: [{ prefix: None, local: 0, inner: false }]
    payload.write_u64::<LittleEndian>(1).unwrap();
    payload.write_u8(0).unwrap();
    payload.write_u32::<LittleEndian>(0).unwrap();
    payload.write_u8(0).unwrap();
    // nodes
    payload.write_u64::<LittleEndian>(levels as u64 + 1).unwrap();
    for k in 0..=levels {
        payload.write_u32::<LittleEndian>(0).unwrap(); // type node
        if k == 0 {
            payload.write_u32::<LittleEndian>(2).unwrap(); // class
            payload.write_u32::<LittleEndian>(0).unwrap();
        } else {
            payload.write_u32::<LittleEndian>(4).unwrap(); // parameterized
            payload.write_u32::<LittleEndian>(0).unwrap();
            payload.write_u64::<LittleEndian>(2).unwrap();
            payload.write_u32::<LittleEndian>(k - 1).unwrap();
            payload.write_u32::<LittleEndian>(k - 1).unwrap();
            payload.write_u8(0).unwrap();
        }
        payload.write_u64::<LittleEndian>(0).unwrap(); // annotations
    }
    // classes
    payload.write_u64::<LittleEndian>(0).unwrap();
    payload
}

fn framed(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.write_u32::<BigEndian>(MAGIC).unwrap();
    bytes.write_u8(1).unwrap();
    bytes.write_u64::<BigEndian>(payload.len() as u64).unwrap();
    let mut hash = [0u8; 8];
    hash.copy_from_slice(&blake3::hash(payload).as_bytes()[..8]);
    bytes.write_u64::<BigEndian>(u64::from_le_bytes(hash)).unwrap();
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn exponential_back_references_are_corrupt() {
    // A handful of levels decodes.
    assert!(read_index(&framed(&doubling_payload(4))).unwrap().is_empty());

    // 64 levels would rebuild 2^65 nodes from a payload of a few kilobytes.
    let payload = doubling_payload(64);
    assert!(payload.len() < 4096);
    match read_index(&framed(&payload)) {
        Err(IndexError::CorruptIndex(reason)) => {
            assert!(reason.contains("expands past"), "{reason}")
        }
        other => panic!("expected a corrupt index, got {other:?}"),
    }
}

#[test]
fn unknown_versions_are_reported() {
    let mut bytes = write_index(&build(&fixture_classes()), FormatVersion::CURRENT).unwrap();
    bytes[4] = 9;
    match read_index(&bytes) {
        Err(IndexError::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, 9);
            assert_eq!(supported, FormatVersion::CURRENT.as_u8());
        }
        other => panic!("expected an unsupported version, got {other:?}"),
    }
}

#[test]
fn indexes_round_trip_through_files() {
    let index = build(&fixture_classes());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classes.idx");

    write_index_to(&index, FormatVersion::CURRENT, File::create(&path).unwrap()).unwrap();
    let restored = read_index_from(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_same_index(&index, &restored);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn output_does_not_depend_on_indexing_order(
        classes in Just(fixture_classes()).prop_shuffle()
    ) {
        let expected = write_index(&build(&fixture_classes()), FormatVersion::CURRENT).unwrap();
        let actual = write_index(&build(&classes), FormatVersion::CURRENT).unwrap();
        prop_assert_eq!(actual, expected);
    }
}
