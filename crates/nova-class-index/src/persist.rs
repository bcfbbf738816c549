//! Versioned binary form of an [`Index`].
//!
//! A file is a fixed big-endian header followed by a bincode payload:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic `NVCI`                            |
//! | 4      | 1    | format version                          |
//! | 5      | 8    | payload length                          |
//! | 13     | 8    | content hash (blake3, first 8 bytes LE) |
//!
//! The payload is a handful of tables. Strings and names are referenced by
//! position. Types and annotations share one node table in which children
//! always precede their parents, so identical subtrees are stored once.
//! Everything is emitted in class-name order, which makes the output a pure
//! function of the indexed classes.
//!
//! Version 2 appends, per class, the record components and the names the
//! class uses. Version 1 files read back without them.
//!
//! A shared subtree is rebuilt for every use, so a small payload can describe
//! an enormous graph. Decoding stops with [`IndexError::CorruptIndex`] once
//! the rebuilt nodes outgrow the payload (see [`DECODED_NODES_PER_BYTE`]) or
//! a tree gets deeper than [`DECODED_DEPTH_LIMIT`].

use std::cell::Cell;
use std::collections::HashMap;
use std::io::{Read, Write};

use bincode::Options;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::annotations::{AnnotationInstance, AnnotationMember, AnnotationValue};
use crate::error::{IndexError, Result};
use crate::index::Index;
use crate::info::{
    ClassInfo, ConstantValue, EnclosingMethodInfo, FieldInfo, MethodInfo, MethodParameterInfo,
    NestingInfo, NestingKind, ParameterKind, RecordComponentInfo,
};
use crate::name::DotName;
use crate::types::{
    PrimitiveType, Type, TypeParameterOwner, TypeShape, TypeVariableDeclaration, WildcardBound,
};

pub const MAGIC: u32 = 0x4E56_4349;
pub const HEADER_LEN: usize = 21;

/// Upper bound on what the decoder will allocate for a payload.
const PAYLOAD_LIMIT_BYTES: u64 = 256 * 1024 * 1024;

/// Type, annotation and value-array nodes a payload may rebuild per byte,
/// counting every copy of a shared subtree.
pub const DECODED_NODES_PER_BYTE: u64 = 32;

/// Rebuilt nodes any payload may use, however small.
pub const DECODED_NODES_MIN: u64 = 1 << 20;

/// Deepest type or annotation tree a payload may describe.
pub const DECODED_DEPTH_LIMIT: u32 = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// No record components and no known-users table.
    V1 = 1,
    #[default]
    V2 = 2,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion::V2;

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(version: u8) -> Result<Self> {
        match version {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            0 => Err(corrupt("format version 0")),
            found => Err(IndexError::UnsupportedVersion {
                found,
                supported: FormatVersion::CURRENT.as_u8(),
            }),
        }
    }
}

fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

fn bincode_options_limited() -> impl bincode::Options + Copy {
    bincode_options()
        .with_limit(PAYLOAD_LIMIT_BYTES)
        .reject_trailing_bytes()
}

fn content_hash(payload: &[u8]) -> u64 {
    let hash = blake3::hash(payload);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

fn corrupt(reason: impl Into<String>) -> IndexError {
    IndexError::CorruptIndex(reason.into())
}

/// Serializes `index` in the given format version.
pub fn write_index(index: &Index, version: FormatVersion) -> Result<Vec<u8>> {
    let mut encoder = Encoder::default();
    let (classes, extensions) = encoder.classes(index);
    let tables = Tables {
        strings: encoder.strings,
        names: encoder.names,
        nodes: encoder.nodes,
        classes,
    };
    let payload = match version {
        FormatVersion::V1 => bincode_options().serialize(&tables)?,
        FormatVersion::V2 => bincode_options().serialize(&(&tables, &extensions))?,
    };

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.write_u32::<BigEndian>(MAGIC)?;
    out.write_u8(version.as_u8())?;
    out.write_u64::<BigEndian>(payload.len() as u64)?;
    out.write_u64::<BigEndian>(content_hash(&payload))?;
    out.extend_from_slice(&payload);

    tracing::debug!(
        target: "nova.class_index",
        version = version.as_u8(),
        classes = tables.classes.len(),
        nodes = tables.nodes.len(),
        bytes = out.len(),
        "serialized class index"
    );
    Ok(out)
}

pub fn write_index_to(index: &Index, version: FormatVersion, mut out: impl Write) -> Result<()> {
    let bytes = write_index(index, version)?;
    out.write_all(&bytes)?;
    Ok(())
}

/// Reads any supported format version.
pub fn read_index(bytes: &[u8]) -> Result<Index> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt("truncated header"));
    }
    let mut header = &bytes[..HEADER_LEN];
    if header.read_u32::<BigEndian>()? != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = FormatVersion::from_u8(header.read_u8()?)?;
    let payload_len = header.read_u64::<BigEndian>()?;
    let expected_hash = header.read_u64::<BigEndian>()?;

    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != payload_len {
        return Err(corrupt(format!(
            "payload is {} bytes, header says {payload_len}",
            payload.len()
        )));
    }
    if content_hash(payload) != expected_hash {
        return Err(corrupt("content hash mismatch"));
    }

    let (tables, extensions) = match version {
        FormatVersion::V1 => (bincode_options_limited().deserialize::<Tables>(payload)?, None),
        FormatVersion::V2 => {
            let (tables, extensions): (Tables, Vec<ClassExtension>) =
                bincode_options_limited().deserialize(payload)?;
            (tables, Some(extensions))
        }
    };
    let node_limit = payload_len
        .saturating_mul(DECODED_NODES_PER_BYTE)
        .max(DECODED_NODES_MIN);
    let index = Decoder::new(&tables, node_limit)?.index(&tables.classes, extensions)?;

    tracing::debug!(
        target: "nova.class_index",
        version = version.as_u8(),
        classes = index.len(),
        "read class index"
    );
    Ok(index)
}

pub fn read_index_from(mut input: impl Read) -> Result<Index> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    read_index(&bytes)
}

#[derive(Debug, Serialize, Deserialize)]
struct Tables {
    strings: Vec<String>,
    names: Vec<NameRecord>,
    nodes: Vec<NodeRecord>,
    classes: Vec<ClassRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassExtension {
    record: bool,
    record_components: Vec<RecordComponentRecord>,
    uses: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NameRecord {
    prefix: Option<u32>,
    local: u32,
    inner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum NodeRecord {
    Type(TypeRecord),
    Annotation(AnnotationRecord),
    /// Elements of an annotation array value.
    Values(Vec<ValueRecord>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct TypeRecord {
    shape: ShapeRecord,
    annotations: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum ShapeRecord {
    Void,
    /// Descriptor character.
    Primitive(u8),
    Class(u32),
    Array {
        component: u32,
        dimensions: u32,
    },
    Parameterized {
        name: u32,
        arguments: Vec<u32>,
        owner: Option<u32>,
    },
    UnboundedWildcard,
    ExtendsWildcard(u32),
    SuperWildcard(u32),
    TypeVariable {
        identifier: u32,
        bounds: Vec<u32>,
        implicit_object_bound: bool,
    },
    TypeVariableReference {
        identifier: u32,
        declaration: Option<DeclarationRecord>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct DeclarationRecord {
    class: u32,
    method: Option<u32>,
    position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct AnnotationRecord {
    name: u32,
    values: Vec<(u32, ValueRecord)>,
    runtime_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum ValueRecord {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    Boolean(bool),
    String(u32),
    Class(u32),
    Enum { type_name: u32, constant: u32 },
    Nested(u32),
    /// A [`NodeRecord::Values`] node, so values never nest inline.
    Array(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassRecord {
    name: u32,
    flags: u16,
    major_version: u16,
    minor_version: u16,
    super_name: Option<u32>,
    super_class_type: Option<u32>,
    interface_types: Vec<u32>,
    type_parameters: Vec<u32>,
    fields: Vec<FieldRecord>,
    methods: Vec<MethodRecord>,
    annotations: Vec<u32>,
    nesting: NestingRecord,
    permitted_subclasses: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldRecord {
    name: u32,
    flags: u16,
    ty: u32,
    annotations: Vec<u32>,
    constant_value: Option<ConstantRecord>,
    enum_ordinal: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
enum ConstantRecord {
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct MethodRecord {
    name: u32,
    flags: u16,
    descriptor: u32,
    type_parameters: Vec<u32>,
    parameters: Vec<ParameterRecord>,
    return_type: u32,
    receiver_type: Option<u32>,
    exceptions: Vec<u32>,
    annotations: Vec<u32>,
    default_value: Option<ValueRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParameterRecord {
    position: u16,
    name: Option<u32>,
    flags: u16,
    kind: u8,
    ty: u32,
    annotations: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordComponentRecord {
    name: u32,
    ty: u32,
    annotations: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NestingRecord {
    kind: u8,
    simple_name: Option<u32>,
    enclosing_class: Option<u32>,
    enclosing_method: Option<EnclosingMethodRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EnclosingMethodRecord {
    class: u32,
    name: u32,
    descriptor: u32,
    parameters: Vec<u32>,
    return_type: u32,
}

fn parameter_kind_tag(kind: ParameterKind) -> u8 {
    match kind {
        ParameterKind::Declared => 0,
        ParameterKind::Synthetic => 1,
        ParameterKind::Mandated => 2,
    }
}

fn nesting_kind_tag(kind: NestingKind) -> u8 {
    match kind {
        NestingKind::TopLevel => 0,
        NestingKind::Inner => 1,
        NestingKind::Local => 2,
        NestingKind::Anonymous => 3,
    }
}

#[derive(Default)]
struct Encoder {
    strings: Vec<String>,
    string_ids: HashMap<String, u32>,
    names: Vec<NameRecord>,
    name_ids: HashMap<DotName, u32>,
    nodes: Vec<NodeRecord>,
    node_ids: HashMap<NodeRecord, u32>,
    member_classes: HashMap<DotName, (DotName, SmolStr)>,
}

impl Encoder {
    fn string(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.string_ids.insert(s.to_string(), id);
        id
    }

    /// Names are stored in a canonical shape: indexed member classes as
    /// `outer` + `$simple`, everything else split at the last `.`. The shape
    /// of an in-memory name depends on the order classes were indexed in.
    fn name(&mut self, name: &DotName) -> u32 {
        if let Some(&id) = self.name_ids.get(name) {
            return id;
        }
        let record = match self.member_classes.get(name).cloned() {
            Some((outer, simple)) => NameRecord {
                prefix: Some(self.name(&outer)),
                local: self.string(&simple),
                inner: true,
            },
            None => {
                let rendered = name.to_string();
                match rendered.rsplit_once('.') {
                    Some((package, local)) => NameRecord {
                        prefix: Some(self.name(&DotName::simple(package))),
                        local: self.string(local),
                        inner: false,
                    },
                    None => NameRecord {
                        prefix: None,
                        local: self.string(&rendered),
                        inner: false,
                    },
                }
            }
        };
        let id = self.names.len() as u32;
        self.names.push(record);
        self.name_ids.insert(name.clone(), id);
        id
    }

    fn node(&mut self, record: NodeRecord) -> u32 {
        if let Some(&id) = self.node_ids.get(&record) {
            return id;
        }
        let id = self.nodes.len() as u32;
        self.nodes.push(record.clone());
        self.node_ids.insert(record, id);
        id
    }

    fn ty(&mut self, ty: &Type) -> u32 {
        let annotations = self.annotations(&ty.annotations);
        let shape = match &ty.shape {
            TypeShape::Void => ShapeRecord::Void,
            TypeShape::Primitive(primitive) => {
                ShapeRecord::Primitive(primitive.descriptor_char() as u8)
            }
            TypeShape::Class(name) => ShapeRecord::Class(self.name(name)),
            TypeShape::Array {
                component,
                dimensions,
            } => ShapeRecord::Array {
                component: self.ty(component),
                dimensions: *dimensions,
            },
            TypeShape::Parameterized {
                name,
                arguments,
                owner,
            } => ShapeRecord::Parameterized {
                name: self.name(name),
                arguments: self.types(arguments),
                owner: owner.as_deref().map(|owner| self.ty(owner)),
            },
            TypeShape::Wildcard(WildcardBound::Unbounded) => ShapeRecord::UnboundedWildcard,
            TypeShape::Wildcard(WildcardBound::Extends(bound)) => {
                ShapeRecord::ExtendsWildcard(self.ty(bound))
            }
            TypeShape::Wildcard(WildcardBound::Super(bound)) => {
                ShapeRecord::SuperWildcard(self.ty(bound))
            }
            TypeShape::TypeVariable {
                identifier,
                bounds,
                implicit_object_bound,
            } => ShapeRecord::TypeVariable {
                identifier: self.string(identifier),
                bounds: self.types(bounds),
                implicit_object_bound: *implicit_object_bound,
            },
            TypeShape::TypeVariableReference {
                identifier,
                declaration,
            } => ShapeRecord::TypeVariableReference {
                identifier: self.string(identifier),
                declaration: declaration.as_ref().map(|declaration| {
                    let (class, method) = match &declaration.owner {
                        TypeParameterOwner::Class(class) => (class, None),
                        TypeParameterOwner::Method { class, method } => (class, Some(*method)),
                    };
                    DeclarationRecord {
                        class: self.name(class),
                        method,
                        position: declaration.position,
                    }
                }),
            },
        };
        self.node(NodeRecord::Type(TypeRecord { shape, annotations }))
    }

    fn types(&mut self, types: &[Type]) -> Vec<u32> {
        types.iter().map(|ty| self.ty(ty)).collect()
    }

    fn annotation(&mut self, annotation: &AnnotationInstance) -> u32 {
        let name = self.name(annotation.name());
        let values = annotation
            .values()
            .iter()
            .map(|member| (self.string(&member.name), self.value(&member.value)))
            .collect();
        self.node(NodeRecord::Annotation(AnnotationRecord {
            name,
            values,
            runtime_visible: annotation.runtime_visible(),
        }))
    }

    fn annotations(&mut self, annotations: &[AnnotationInstance]) -> Vec<u32> {
        annotations.iter().map(|a| self.annotation(a)).collect()
    }

    fn value(&mut self, value: &AnnotationValue) -> ValueRecord {
        match value {
            AnnotationValue::Byte(v) => ValueRecord::Byte(*v),
            AnnotationValue::Char(v) => ValueRecord::Char(*v),
            AnnotationValue::Short(v) => ValueRecord::Short(*v),
            AnnotationValue::Int(v) => ValueRecord::Int(*v),
            AnnotationValue::Long(v) => ValueRecord::Long(*v),
            AnnotationValue::Float(v) => ValueRecord::Float(v.to_bits()),
            AnnotationValue::Double(v) => ValueRecord::Double(v.to_bits()),
            AnnotationValue::Boolean(v) => ValueRecord::Boolean(*v),
            AnnotationValue::String(v) => ValueRecord::String(self.string(v)),
            AnnotationValue::Class(ty) => ValueRecord::Class(self.ty(ty)),
            AnnotationValue::Enum {
                type_name,
                constant,
            } => ValueRecord::Enum {
                type_name: self.name(type_name),
                constant: self.string(constant),
            },
            AnnotationValue::Nested(nested) => ValueRecord::Nested(self.annotation(nested)),
            AnnotationValue::Array(values) => {
                let values = values.iter().map(|v| self.value(v)).collect();
                ValueRecord::Array(self.node(NodeRecord::Values(values)))
            }
        }
    }

    fn classes(&mut self, index: &Index) -> (Vec<ClassRecord>, Vec<ClassExtension>) {
        for class in index.classes.values() {
            let nesting = &class.nesting;
            if let (NestingKind::Inner, Some(outer), Some(simple)) =
                (nesting.kind, &nesting.enclosing_class, &nesting.simple_name)
            {
                if format!("{outer}${simple}") == class.name.to_string() {
                    self.member_classes
                        .insert(class.name.clone(), (outer.clone(), simple.clone()));
                }
            }
        }

        let mut classes = Vec::with_capacity(index.len());
        let mut extensions = Vec::with_capacity(index.len());
        for name in index.class_names() {
            let Some(class) = index.classes.get(name) else {
                continue;
            };
            classes.push(self.class(class));
            let record_components = class
                .record_components
                .iter()
                .map(|component| RecordComponentRecord {
                    name: self.string(&component.name),
                    ty: self.ty(&component.ty),
                    annotations: self.annotations(&component.annotations),
                })
                .collect();
            let uses = index.uses_of(name).iter().map(|n| self.name(n)).collect();
            extensions.push(ClassExtension {
                record: class.record,
                record_components,
                uses,
            });
        }
        (classes, extensions)
    }

    fn class(&mut self, class: &ClassInfo) -> ClassRecord {
        ClassRecord {
            name: self.name(&class.name),
            flags: class.flags,
            major_version: class.major_version,
            minor_version: class.minor_version,
            super_name: class.super_name.as_ref().map(|n| self.name(n)),
            super_class_type: class.super_class_type.as_ref().map(|t| self.ty(t)),
            interface_types: self.types(&class.interface_types),
            type_parameters: self.types(&class.type_parameters),
            fields: class.fields.iter().map(|f| self.field(f)).collect(),
            methods: class.methods.iter().map(|m| self.method(m)).collect(),
            annotations: self.annotations(&class.annotations),
            nesting: self.nesting(&class.nesting),
            permitted_subclasses: class
                .permitted_subclasses
                .iter()
                .map(|n| self.name(n))
                .collect(),
        }
    }

    fn field(&mut self, field: &FieldInfo) -> FieldRecord {
        FieldRecord {
            name: self.string(&field.name),
            flags: field.flags,
            ty: self.ty(&field.ty),
            annotations: self.annotations(&field.annotations),
            constant_value: field.constant_value.as_ref().map(|value| match value {
                ConstantValue::Int(v) => ConstantRecord::Int(*v),
                ConstantValue::Long(v) => ConstantRecord::Long(*v),
                ConstantValue::Float(v) => ConstantRecord::Float(v.to_bits()),
                ConstantValue::Double(v) => ConstantRecord::Double(v.to_bits()),
                ConstantValue::String(v) => ConstantRecord::String(self.string(v)),
            }),
            enum_ordinal: field.enum_ordinal,
        }
    }

    fn method(&mut self, method: &MethodInfo) -> MethodRecord {
        MethodRecord {
            name: self.string(&method.name),
            flags: method.flags,
            descriptor: self.string(&method.descriptor),
            type_parameters: self.types(&method.type_parameters),
            parameters: method
                .parameters
                .iter()
                .map(|p| ParameterRecord {
                    position: p.position,
                    name: p.name.as_ref().map(|n| self.string(n)),
                    flags: p.flags,
                    kind: parameter_kind_tag(p.kind),
                    ty: self.ty(&p.ty),
                    annotations: self.annotations(&p.annotations),
                })
                .collect(),
            return_type: self.ty(&method.return_type),
            receiver_type: method.receiver_type.as_ref().map(|t| self.ty(t)),
            exceptions: self.types(&method.exceptions),
            annotations: self.annotations(&method.annotations),
            default_value: method.default_value.as_ref().map(|v| self.value(v)),
        }
    }

    fn nesting(&mut self, nesting: &NestingInfo) -> NestingRecord {
        NestingRecord {
            kind: nesting_kind_tag(nesting.kind),
            simple_name: nesting.simple_name.as_ref().map(|s| self.string(s)),
            enclosing_class: nesting.enclosing_class.as_ref().map(|n| self.name(n)),
            enclosing_method: nesting.enclosing_method.as_ref().map(|m| {
                EnclosingMethodRecord {
                    class: self.name(&m.class),
                    name: self.string(&m.name),
                    descriptor: self.string(&m.descriptor),
                    parameters: self.types(&m.parameters),
                    return_type: self.ty(&m.return_type),
                }
            }),
        }
    }
}

enum DecodedNode {
    Type(Type),
    Annotation(AnnotationInstance),
    Values(Vec<AnnotationValue>),
}

/// Size and depth of the tree a decoded node stands for.
#[derive(Debug, Clone, Copy, Default)]
struct Cost {
    nodes: u64,
    depth: u32,
}

impl Cost {
    fn include(&mut self, child: Cost) {
        self.nodes = self.nodes.saturating_add(child.nodes);
        self.depth = self.depth.max(child.depth);
    }

    /// The cost of a node whose children have all been included.
    fn close(mut self) -> Result<Cost> {
        self.nodes = self.nodes.saturating_add(1);
        self.depth += 1;
        if self.depth > DECODED_DEPTH_LIMIT {
            return Err(corrupt(format!(
                "node nesting exceeds {DECODED_DEPTH_LIMIT} levels"
            )));
        }
        Ok(self)
    }
}

/// Rebuilds the object graph. Every reference is bounds-checked, and node
/// and name references must point backwards.
struct Decoder {
    strings: Vec<SmolStr>,
    names: Vec<DotName>,
    nodes: Vec<(DecodedNode, Cost)>,
    /// Nodes rebuilt so far, counting every copy of a shared subtree.
    rebuilt: Cell<u64>,
    node_limit: u64,
}

impl Decoder {
    fn new(tables: &Tables, node_limit: u64) -> Result<Self> {
        let mut decoder = Decoder {
            strings: tables.strings.iter().map(SmolStr::new).collect(),
            names: Vec::with_capacity(tables.names.len()),
            nodes: Vec::with_capacity(tables.nodes.len()),
            rebuilt: Cell::new(0),
            node_limit,
        };
        for record in &tables.names {
            let prefix = record.prefix.map(|id| decoder.name(id)).transpose()?;
            let local = decoder.string(record.local)?;
            decoder
                .names
                .push(DotName::componentized(prefix, &local, record.inner));
        }
        for record in &tables.nodes {
            let mut cost = Cost::default();
            let node = match record {
                NodeRecord::Type(record) => {
                    DecodedNode::Type(decoder.decode_type(record, &mut cost)?)
                }
                NodeRecord::Annotation(record) => {
                    DecodedNode::Annotation(decoder.decode_annotation(record, &mut cost)?)
                }
                NodeRecord::Values(records) => DecodedNode::Values(
                    records
                        .iter()
                        .map(|v| decoder.value(v, &mut cost))
                        .collect::<Result<_>>()?,
                ),
            };
            decoder.nodes.push((node, cost.close()?));
        }
        Ok(decoder)
    }

    fn string(&self, id: u32) -> Result<SmolStr> {
        self.strings
            .get(id as usize)
            .cloned()
            .ok_or_else(|| corrupt(format!("string {id} out of range")))
    }

    fn name(&self, id: u32) -> Result<DotName> {
        self.names
            .get(id as usize)
            .cloned()
            .ok_or_else(|| corrupt(format!("name {id} out of range")))
    }

    fn names(&self, ids: &[u32]) -> Result<Vec<DotName>> {
        ids.iter().map(|&id| self.name(id)).collect()
    }

    /// Looks up node `id` for one more copy, charging its size against the
    /// node limit and its shape against `cost`.
    fn node(&self, id: u32, cost: &mut Cost) -> Result<&DecodedNode> {
        let (node, node_cost) = self
            .nodes
            .get(id as usize)
            .ok_or_else(|| corrupt(format!("node {id} out of range")))?;
        let rebuilt = self.rebuilt.get().saturating_add(node_cost.nodes);
        if rebuilt > self.node_limit {
            return Err(corrupt(format!(
                "payload expands past {} nodes",
                self.node_limit
            )));
        }
        self.rebuilt.set(rebuilt);
        cost.include(*node_cost);
        Ok(node)
    }

    fn ty_within(&self, id: u32, cost: &mut Cost) -> Result<Type> {
        match self.node(id, cost)? {
            DecodedNode::Type(ty) => Ok(ty.clone()),
            _ => Err(corrupt(format!("node {id} is not a type"))),
        }
    }

    fn types_within(&self, ids: &[u32], cost: &mut Cost) -> Result<Vec<Type>> {
        ids.iter().map(|&id| self.ty_within(id, cost)).collect()
    }

    fn annotation_within(&self, id: u32, cost: &mut Cost) -> Result<AnnotationInstance> {
        match self.node(id, cost)? {
            DecodedNode::Annotation(annotation) => Ok(annotation.clone()),
            _ => Err(corrupt(format!("node {id} is not an annotation"))),
        }
    }

    fn annotations_within(&self, ids: &[u32], cost: &mut Cost) -> Result<Vec<AnnotationInstance>> {
        ids.iter()
            .map(|&id| self.annotation_within(id, cost))
            .collect()
    }

    fn ty(&self, id: u32) -> Result<Type> {
        self.ty_within(id, &mut Cost::default())
    }

    fn types(&self, ids: &[u32]) -> Result<Vec<Type>> {
        self.types_within(ids, &mut Cost::default())
    }

    fn annotations(&self, ids: &[u32]) -> Result<Vec<AnnotationInstance>> {
        self.annotations_within(ids, &mut Cost::default())
    }

    fn decode_type(&self, record: &TypeRecord, cost: &mut Cost) -> Result<Type> {
        let shape = match &record.shape {
            ShapeRecord::Void => TypeShape::Void,
            ShapeRecord::Primitive(c) => TypeShape::Primitive(
                PrimitiveType::from_descriptor_char(*c as char)
                    .ok_or_else(|| corrupt(format!("bad primitive tag {c}")))?,
            ),
            ShapeRecord::Class(name) => TypeShape::Class(self.name(*name)?),
            ShapeRecord::Array {
                component,
                dimensions,
            } => {
                if *dimensions == 0 {
                    return Err(corrupt("array without dimensions"));
                }
                TypeShape::Array {
                    component: Box::new(self.ty_within(*component, cost)?),
                    dimensions: *dimensions,
                }
            }
            ShapeRecord::Parameterized {
                name,
                arguments,
                owner,
            } => TypeShape::Parameterized {
                name: self.name(*name)?,
                arguments: self.types_within(arguments, cost)?,
                owner: match owner {
                    Some(id) => Some(Box::new(self.ty_within(*id, cost)?)),
                    None => None,
                },
            },
            ShapeRecord::UnboundedWildcard => TypeShape::Wildcard(WildcardBound::Unbounded),
            ShapeRecord::ExtendsWildcard(bound) => TypeShape::Wildcard(WildcardBound::Extends(
                Box::new(self.ty_within(*bound, cost)?),
            )),
            ShapeRecord::SuperWildcard(bound) => TypeShape::Wildcard(WildcardBound::Super(
                Box::new(self.ty_within(*bound, cost)?),
            )),
            ShapeRecord::TypeVariable {
                identifier,
                bounds,
                implicit_object_bound,
            } => TypeShape::TypeVariable {
                identifier: self.string(*identifier)?,
                bounds: self.types_within(bounds, cost)?,
                implicit_object_bound: *implicit_object_bound,
            },
            ShapeRecord::TypeVariableReference {
                identifier,
                declaration,
            } => TypeShape::TypeVariableReference {
                identifier: self.string(*identifier)?,
                declaration: match declaration {
                    Some(declaration) => {
                        let class = self.name(declaration.class)?;
                        let owner = match declaration.method {
                            Some(method) => TypeParameterOwner::Method { class, method },
                            None => TypeParameterOwner::Class(class),
                        };
                        Some(TypeVariableDeclaration {
                            owner,
                            position: declaration.position,
                        })
                    }
                    None => None,
                },
            },
        };
        let mut ty = Type::from_shape(shape);
        ty.annotations = self.annotations_within(&record.annotations, cost)?;
        Ok(ty)
    }

    fn decode_annotation(
        &self,
        record: &AnnotationRecord,
        cost: &mut Cost,
    ) -> Result<AnnotationInstance> {
        let mut values = Vec::with_capacity(record.values.len());
        for (name, value) in &record.values {
            values.push(AnnotationMember {
                name: self.string(*name)?,
                value: self.value(value, cost)?,
            });
        }
        if values.windows(2).any(|pair| pair[0].name >= pair[1].name) {
            return Err(corrupt("annotation members out of order"));
        }
        Ok(AnnotationInstance::from_sorted_parts(
            self.name(record.name)?,
            values,
            record.runtime_visible,
        ))
    }

    fn value(&self, record: &ValueRecord, cost: &mut Cost) -> Result<AnnotationValue> {
        Ok(match record {
            ValueRecord::Byte(v) => AnnotationValue::Byte(*v),
            ValueRecord::Char(v) => AnnotationValue::Char(*v),
            ValueRecord::Short(v) => AnnotationValue::Short(*v),
            ValueRecord::Int(v) => AnnotationValue::Int(*v),
            ValueRecord::Long(v) => AnnotationValue::Long(*v),
            ValueRecord::Float(bits) => AnnotationValue::Float(f32::from_bits(*bits)),
            ValueRecord::Double(bits) => AnnotationValue::Double(f64::from_bits(*bits)),
            ValueRecord::Boolean(v) => AnnotationValue::Boolean(*v),
            ValueRecord::String(id) => AnnotationValue::String(self.string(*id)?.to_string()),
            ValueRecord::Class(id) => AnnotationValue::Class(self.ty_within(*id, cost)?),
            ValueRecord::Enum {
                type_name,
                constant,
            } => AnnotationValue::Enum {
                type_name: self.name(*type_name)?,
                constant: self.string(*constant)?,
            },
            ValueRecord::Nested(id) => {
                AnnotationValue::Nested(Box::new(self.annotation_within(*id, cost)?))
            }
            ValueRecord::Array(id) => match self.node(*id, cost)? {
                DecodedNode::Values(values) => AnnotationValue::Array(values.clone()),
                _ => return Err(corrupt(format!("node {id} is not a value array"))),
            },
        })
    }

    fn index(
        &self,
        records: &[ClassRecord],
        extensions: Option<Vec<ClassExtension>>,
    ) -> Result<Index> {
        if let Some(extensions) = &extensions {
            if extensions.len() != records.len() {
                return Err(corrupt("class extension table length mismatch"));
            }
        }
        let mut extensions = extensions.map(Vec::into_iter);

        let mut classes = HashMap::with_capacity(records.len());
        let mut uses = HashMap::new();
        for record in records {
            let mut class = self.class(record)?;
            if let Some(extension) = extensions.as_mut().and_then(Iterator::next) {
                class.record = extension.record;
                class.record_components = extension
                    .record_components
                    .iter()
                    .map(|component| {
                        Ok(RecordComponentInfo {
                            name: self.string(component.name)?,
                            ty: self.ty(component.ty)?,
                            annotations: self.annotations(&component.annotations)?,
                        })
                    })
                    .collect::<Result<_>>()?;
                uses.insert(class.name.clone(), self.names(&extension.uses)?);
            }
            let name = class.name.clone();
            if classes.insert(name.clone(), class).is_some() {
                return Err(corrupt(format!("class {name} stored twice")));
            }
        }
        Ok(Index::link(classes, uses))
    }

    fn class(&self, record: &ClassRecord) -> Result<ClassInfo> {
        Ok(ClassInfo {
            name: self.name(record.name)?,
            flags: record.flags,
            major_version: record.major_version,
            minor_version: record.minor_version,
            super_name: record.super_name.map(|id| self.name(id)).transpose()?,
            super_class_type: record.super_class_type.map(|id| self.ty(id)).transpose()?,
            interface_types: self.types(&record.interface_types)?,
            type_parameters: self.types(&record.type_parameters)?,
            fields: record
                .fields
                .iter()
                .map(|f| self.field(f))
                .collect::<Result<_>>()?,
            methods: record
                .methods
                .iter()
                .map(|m| self.method(m))
                .collect::<Result<_>>()?,
            record: false,
            record_components: Vec::new(),
            annotations: self.annotations(&record.annotations)?,
            nesting: self.nesting(&record.nesting)?,
            permitted_subclasses: self.names(&record.permitted_subclasses)?,
        })
    }

    fn field(&self, record: &FieldRecord) -> Result<FieldInfo> {
        let constant_value = match &record.constant_value {
            Some(ConstantRecord::Int(v)) => Some(ConstantValue::Int(*v)),
            Some(ConstantRecord::Long(v)) => Some(ConstantValue::Long(*v)),
            Some(ConstantRecord::Float(bits)) => Some(ConstantValue::Float(f32::from_bits(*bits))),
            Some(ConstantRecord::Double(bits)) => {
                Some(ConstantValue::Double(f64::from_bits(*bits)))
            }
            Some(ConstantRecord::String(id)) => {
                Some(ConstantValue::String(self.string(*id)?.to_string()))
            }
            None => None,
        };
        Ok(FieldInfo {
            name: self.string(record.name)?,
            flags: record.flags,
            ty: self.ty(record.ty)?,
            annotations: self.annotations(&record.annotations)?,
            constant_value,
            enum_ordinal: record.enum_ordinal,
        })
    }

    fn method(&self, record: &MethodRecord) -> Result<MethodInfo> {
        let parameters = record
            .parameters
            .iter()
            .map(|p| {
                let kind = match p.kind {
                    0 => ParameterKind::Declared,
                    1 => ParameterKind::Synthetic,
                    2 => ParameterKind::Mandated,
                    other => return Err(corrupt(format!("bad parameter kind {other}"))),
                };
                Ok(MethodParameterInfo {
                    position: p.position,
                    name: p.name.map(|id| self.string(id)).transpose()?,
                    flags: p.flags,
                    kind,
                    ty: self.ty(p.ty)?,
                    annotations: self.annotations(&p.annotations)?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(MethodInfo {
            name: self.string(record.name)?,
            flags: record.flags,
            descriptor: self.string(record.descriptor)?,
            type_parameters: self.types(&record.type_parameters)?,
            parameters,
            return_type: self.ty(record.return_type)?,
            receiver_type: record.receiver_type.map(|id| self.ty(id)).transpose()?,
            exceptions: self.types(&record.exceptions)?,
            annotations: self.annotations(&record.annotations)?,
            default_value: record
                .default_value
                .as_ref()
                .map(|v| self.value(v, &mut Cost::default()))
                .transpose()?,
        })
    }

    fn nesting(&self, record: &NestingRecord) -> Result<NestingInfo> {
        let kind = match record.kind {
            0 => NestingKind::TopLevel,
            1 => NestingKind::Inner,
            2 => NestingKind::Local,
            3 => NestingKind::Anonymous,
            other => return Err(corrupt(format!("bad nesting kind {other}"))),
        };
        let enclosing_method = match &record.enclosing_method {
            Some(m) => Some(EnclosingMethodInfo {
                class: self.name(m.class)?,
                name: self.string(m.name)?,
                descriptor: self.string(m.descriptor)?,
                parameters: self.types(&m.parameters)?,
                return_type: self.ty(m.return_type)?,
            }),
            None => None,
        };
        Ok(NestingInfo {
            kind,
            simple_name: record.simple_name.map(|id| self.string(id)).transpose()?,
            enclosing_class: record.enclosing_class.map(|id| self.name(id)).transpose()?,
            enclosing_method,
        })
    }
}
