//! A small assembler for `.class` files.
//!
//! Tests describe a class declaratively and get back the encoded bytes.
//! Constant-pool entries are deduplicated and laid out in first-use order,
//! so two builders that describe the same class produce identical bytes.

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;
pub const ACC_MANDATED: u16 = 0x8000;

/// Java 17.
pub const DEFAULT_MAJOR_VERSION: u16 = 61;

/// Encodes a string the way the JVM stores `CONSTANT_Utf8` payloads.
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(Vec<u8>),
    Class(u16),
    String(u16),
    Integer(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    NameAndType(u16, u16),
}

/// Deduplicating constant pool writer.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    bytes: Vec<u8>,
    next: u16,
    entries: HashMap<PoolKey, u16>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            entries: HashMap::new(),
        }
    }

    fn intern(&mut self, key: PoolKey, encode: impl FnOnce(&mut Vec<u8>)) -> u16 {
        if let Some(&index) = self.entries.get(&key) {
            return index;
        }
        let index = self.next;
        let wide = matches!(key, PoolKey::Long(_) | PoolKey::Double(_));
        self.next += if wide { 2 } else { 1 };
        encode(&mut self.bytes);
        self.entries.insert(key, index);
        index
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        self.utf8_bytes(&encode_modified_utf8(s))
    }

    /// Raw `CONSTANT_Utf8` payload, for exercising malformed or unusual encodings.
    pub fn utf8_bytes(&mut self, payload: &[u8]) -> u16 {
        self.intern(PoolKey::Utf8(payload.to_vec()), |out| {
            out.push(1);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            out.extend_from_slice(payload);
        })
    }

    pub fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.intern(PoolKey::Class(name), |out| {
            out.push(7);
            out.extend_from_slice(&name.to_be_bytes());
        })
    }

    pub fn string(&mut self, s: &str) -> u16 {
        let utf8 = self.utf8(s);
        self.intern(PoolKey::String(utf8), |out| {
            out.push(8);
            out.extend_from_slice(&utf8.to_be_bytes());
        })
    }

    pub fn integer(&mut self, v: i32) -> u16 {
        self.intern(PoolKey::Integer(v), |out| {
            out.push(3);
            out.extend_from_slice(&v.to_be_bytes());
        })
    }

    pub fn float(&mut self, v: f32) -> u16 {
        self.intern(PoolKey::Float(v.to_bits()), |out| {
            out.push(4);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        })
    }

    pub fn long(&mut self, v: i64) -> u16 {
        self.intern(PoolKey::Long(v), |out| {
            out.push(5);
            out.extend_from_slice(&v.to_be_bytes());
        })
    }

    pub fn double(&mut self, v: f64) -> u16 {
        self.intern(PoolKey::Double(v.to_bits()), |out| {
            out.push(6);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.intern(PoolKey::NameAndType(name, descriptor), |out| {
            out.push(12);
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
        })
    }

    /// `constant_pool_count` followed by the entries.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + 2);
        out.extend_from_slice(&self.next.to_be_bytes());
        out.extend_from_slice(&self.bytes);
        out
    }
}

/// An annotation `element_value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Enum { descriptor: String, constant: String },
    /// A class literal given as a return descriptor (`Ljava/lang/String;`, `I`, `V`).
    Class(String),
    Annotation(AnnotationBuilder),
    Array(Vec<Value>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(s.to_string())
    }

    pub fn enumeration(descriptor: &str, constant: &str) -> Self {
        Value::Enum {
            descriptor: descriptor.to_string(),
            constant: constant.to_string(),
        }
    }

    pub fn class(descriptor: &str) -> Self {
        Value::Class(descriptor.to_string())
    }

    fn encode(&self, cp: &mut ConstantPoolBuilder, out: &mut Vec<u8>) {
        let (tag, index) = match self {
            Value::Byte(v) => (b'B', cp.integer(*v as i32)),
            Value::Char(v) => (b'C', cp.integer(*v as i32)),
            Value::Short(v) => (b'S', cp.integer(*v as i32)),
            Value::Int(v) => (b'I', cp.integer(*v)),
            Value::Boolean(v) => (b'Z', cp.integer(*v as i32)),
            Value::Long(v) => (b'J', cp.long(*v)),
            Value::Float(v) => (b'F', cp.float(*v)),
            Value::Double(v) => (b'D', cp.double(*v)),
            Value::String(s) => (b's', cp.utf8(s)),
            Value::Class(desc) => (b'c', cp.utf8(desc)),
            Value::Enum {
                descriptor,
                constant,
            } => {
                out.push(b'e');
                put_u2(out, cp.utf8(descriptor));
                put_u2(out, cp.utf8(constant));
                return;
            }
            Value::Annotation(nested) => {
                out.push(b'@');
                nested.encode(cp, out);
                return;
            }
            Value::Array(values) => {
                out.push(b'[');
                put_u2(out, values.len() as u16);
                for value in values {
                    value.encode(cp, out);
                }
                return;
            }
        };
        out.push(tag);
        put_u2(out, index);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationBuilder {
    descriptor: String,
    elements: Vec<(String, Value)>,
}

impl AnnotationBuilder {
    /// `descriptor` is the annotation type descriptor, e.g. `Lcom/example/Ann;`.
    pub fn new(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.elements.push((name.to_string(), value));
        self
    }

    fn encode(&self, cp: &mut ConstantPoolBuilder, out: &mut Vec<u8>) {
        put_u2(out, cp.utf8(&self.descriptor));
        put_u2(out, self.elements.len() as u16);
        for (name, value) in &self.elements {
            put_u2(out, cp.utf8(name));
            value.encode(cp, out);
        }
    }
}

/// `target_type` plus `target_info` of a type annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetInfo {
    ClassTypeParameter(u8),
    MethodTypeParameter(u8),
    /// `0xFFFF` for the superclass.
    ClassExtends(u16),
    ClassTypeParameterBound(u8, u8),
    MethodTypeParameterBound(u8, u8),
    Field,
    MethodReturn,
    MethodReceiver,
    FormalParameter(u8),
    Throws(u16),
    /// A `localvar_target` with an empty table.
    LocalVariable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePathStep {
    Array,
    Nested,
    WildcardBound,
    TypeArgument(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotationBuilder {
    target: TargetInfo,
    path: Vec<TypePathStep>,
    annotation: AnnotationBuilder,
}

impl TypeAnnotationBuilder {
    pub fn new(target: TargetInfo, annotation: AnnotationBuilder) -> Self {
        Self {
            target,
            path: Vec::new(),
            annotation,
        }
    }

    pub fn path(mut self, steps: &[TypePathStep]) -> Self {
        self.path = steps.to_vec();
        self
    }

    fn encode(&self, cp: &mut ConstantPoolBuilder, out: &mut Vec<u8>) {
        match self.target {
            TargetInfo::ClassTypeParameter(i) => out.extend_from_slice(&[0x00, i]),
            TargetInfo::MethodTypeParameter(i) => out.extend_from_slice(&[0x01, i]),
            TargetInfo::ClassExtends(i) => {
                out.push(0x10);
                put_u2(out, i);
            }
            TargetInfo::ClassTypeParameterBound(p, b) => out.extend_from_slice(&[0x11, p, b]),
            TargetInfo::MethodTypeParameterBound(p, b) => out.extend_from_slice(&[0x12, p, b]),
            TargetInfo::Field => out.push(0x13),
            TargetInfo::MethodReturn => out.push(0x14),
            TargetInfo::MethodReceiver => out.push(0x15),
            TargetInfo::FormalParameter(i) => out.extend_from_slice(&[0x16, i]),
            TargetInfo::Throws(i) => {
                out.push(0x17);
                put_u2(out, i);
            }
            TargetInfo::LocalVariable => {
                out.push(0x40);
                put_u2(out, 0);
            }
        }
        out.push(self.path.len() as u8);
        for step in &self.path {
            let (kind, index) = match *step {
                TypePathStep::Array => (0, 0),
                TypePathStep::Nested => (1, 0),
                TypePathStep::WildcardBound => (2, 0),
                TypePathStep::TypeArgument(i) => (3, i),
            };
            out.extend_from_slice(&[kind, index]);
        }
        self.annotation.encode(cp, out);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct InnerClassEntry {
    inner: String,
    outer: Option<String>,
    simple_name: Option<String>,
    flags: u16,
}

/// Attributes shared by classes, members and record components. Each kind
/// of attribute is emitted at most once, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq)]
struct Attributes {
    signature: Option<String>,
    visible: Vec<AnnotationBuilder>,
    invisible: Vec<AnnotationBuilder>,
    visible_type: Vec<TypeAnnotationBuilder>,
    invisible_type: Vec<TypeAnnotationBuilder>,
    visible_parameters: Option<Vec<Vec<AnnotationBuilder>>>,
    invisible_parameters: Option<Vec<Vec<AnnotationBuilder>>>,
    inner_classes: Vec<InnerClassEntry>,
    enclosing_method: Option<(String, Option<(String, String)>)>,
    permitted_subclasses: Vec<String>,
    record: Option<Vec<RecordComponentBuilder>>,
    constant_value: Option<Value>,
    exceptions: Vec<String>,
    method_parameters: Option<Vec<(Option<String>, u16)>>,
    annotation_default: Option<Value>,
    raw: Vec<(String, Vec<u8>)>,
}

impl Attributes {
    fn encode(&self, cp: &mut ConstantPoolBuilder, out: &mut Vec<u8>) {
        let mut attrs: Vec<(&str, Vec<u8>)> = Vec::new();

        if let Some(sig) = &self.signature {
            attrs.push(("Signature", cp.utf8(sig).to_be_bytes().to_vec()));
        }
        for (name, list) in [
            ("RuntimeVisibleAnnotations", &self.visible),
            ("RuntimeInvisibleAnnotations", &self.invisible),
        ] {
            if !list.is_empty() {
                let mut body = Vec::new();
                put_u2(&mut body, list.len() as u16);
                for ann in list {
                    ann.encode(cp, &mut body);
                }
                attrs.push((name, body));
            }
        }
        for (name, list) in [
            ("RuntimeVisibleTypeAnnotations", &self.visible_type),
            ("RuntimeInvisibleTypeAnnotations", &self.invisible_type),
        ] {
            if !list.is_empty() {
                let mut body = Vec::new();
                put_u2(&mut body, list.len() as u16);
                for ann in list {
                    ann.encode(cp, &mut body);
                }
                attrs.push((name, body));
            }
        }
        for (name, params) in [
            ("RuntimeVisibleParameterAnnotations", &self.visible_parameters),
            ("RuntimeInvisibleParameterAnnotations", &self.invisible_parameters),
        ] {
            if let Some(params) = params {
                let mut body = vec![params.len() as u8];
                for list in params {
                    put_u2(&mut body, list.len() as u16);
                    for ann in list {
                        ann.encode(cp, &mut body);
                    }
                }
                attrs.push((name, body));
            }
        }
        if !self.inner_classes.is_empty() {
            let mut body = Vec::new();
            put_u2(&mut body, self.inner_classes.len() as u16);
            for entry in &self.inner_classes {
                put_u2(&mut body, cp.class(&entry.inner));
                put_u2(&mut body, entry.outer.as_deref().map_or(0, |o| cp.class(o)));
                put_u2(
                    &mut body,
                    entry.simple_name.as_deref().map_or(0, |n| cp.utf8(n)),
                );
                put_u2(&mut body, entry.flags);
            }
            attrs.push(("InnerClasses", body));
        }
        if let Some((class, method)) = &self.enclosing_method {
            let mut body = Vec::new();
            put_u2(&mut body, cp.class(class));
            put_u2(
                &mut body,
                method
                    .as_ref()
                    .map_or(0, |(name, desc)| cp.name_and_type(name, desc)),
            );
            attrs.push(("EnclosingMethod", body));
        }
        if !self.permitted_subclasses.is_empty() {
            let mut body = Vec::new();
            put_u2(&mut body, self.permitted_subclasses.len() as u16);
            for name in &self.permitted_subclasses {
                put_u2(&mut body, cp.class(name));
            }
            attrs.push(("PermittedSubclasses", body));
        }
        if let Some(components) = &self.record {
            let mut body = Vec::new();
            put_u2(&mut body, components.len() as u16);
            for component in components {
                put_u2(&mut body, cp.utf8(&component.name));
                put_u2(&mut body, cp.utf8(&component.descriptor));
                component.attributes.encode(cp, &mut body);
            }
            attrs.push(("Record", body));
        }
        if let Some(value) = &self.constant_value {
            let index = match value {
                Value::Int(v) => cp.integer(*v),
                Value::Long(v) => cp.long(*v),
                Value::Float(v) => cp.float(*v),
                Value::Double(v) => cp.double(*v),
                Value::String(s) => cp.string(s),
                other => panic!("unsupported ConstantValue {other:?}"),
            };
            attrs.push(("ConstantValue", index.to_be_bytes().to_vec()));
        }
        if !self.exceptions.is_empty() {
            let mut body = Vec::new();
            put_u2(&mut body, self.exceptions.len() as u16);
            for name in &self.exceptions {
                put_u2(&mut body, cp.class(name));
            }
            attrs.push(("Exceptions", body));
        }
        if let Some(params) = &self.method_parameters {
            let mut body = vec![params.len() as u8];
            for (name, flags) in params {
                put_u2(&mut body, name.as_deref().map_or(0, |n| cp.utf8(n)));
                put_u2(&mut body, *flags);
            }
            attrs.push(("MethodParameters", body));
        }
        if let Some(value) = &self.annotation_default {
            let mut body = Vec::new();
            value.encode(cp, &mut body);
            attrs.push(("AnnotationDefault", body));
        }
        for (name, bytes) in &self.raw {
            attrs.push((name, bytes.clone()));
        }

        put_u2(out, attrs.len() as u16);
        for (name, body) in attrs {
            put_u2(out, cp.utf8(name));
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }
    }
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberBuilder {
    access_flags: u16,
    name: String,
    descriptor: String,
    attributes: Attributes,
}

impl MemberBuilder {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            access_flags: ACC_PUBLIC,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            attributes: Attributes::default(),
        }
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.attributes.signature = Some(signature.to_string());
        self
    }

    pub fn annotation(mut self, annotation: AnnotationBuilder) -> Self {
        self.attributes.visible.push(annotation);
        self
    }

    pub fn invisible_annotation(mut self, annotation: AnnotationBuilder) -> Self {
        self.attributes.invisible.push(annotation);
        self
    }

    pub fn type_annotation(mut self, annotation: TypeAnnotationBuilder) -> Self {
        self.attributes.visible_type.push(annotation);
        self
    }

    pub fn invisible_type_annotation(mut self, annotation: TypeAnnotationBuilder) -> Self {
        self.attributes.invisible_type.push(annotation);
        self
    }

    /// One list per parameter slot of `RuntimeVisibleParameterAnnotations`.
    pub fn parameter_annotations(mut self, params: Vec<Vec<AnnotationBuilder>>) -> Self {
        self.attributes.visible_parameters = Some(params);
        self
    }

    pub fn invisible_parameter_annotations(mut self, params: Vec<Vec<AnnotationBuilder>>) -> Self {
        self.attributes.invisible_parameters = Some(params);
        self
    }

    pub fn constant_int(self, v: i32) -> Self {
        self.constant(Value::Int(v))
    }

    pub fn constant_string(self, s: &str) -> Self {
        self.constant(Value::string(s))
    }

    /// `Int`, `Long`, `Float`, `Double` or `String`.
    pub fn constant(mut self, value: Value) -> Self {
        self.attributes.constant_value = Some(value);
        self
    }

    pub fn exception(mut self, internal_name: &str) -> Self {
        self.attributes.exceptions.push(internal_name.to_string());
        self
    }

    pub fn method_parameter(mut self, name: Option<&str>, flags: u16) -> Self {
        self.attributes
            .method_parameters
            .get_or_insert_with(Vec::new)
            .push((name.map(str::to_string), flags));
        self
    }

    pub fn annotation_default(mut self, value: Value) -> Self {
        self.attributes.annotation_default = Some(value);
        self
    }

    pub fn raw_attribute(mut self, name: &str, bytes: &[u8]) -> Self {
        self.attributes.raw.push((name.to_string(), bytes.to_vec()));
        self
    }

    fn encode(&self, cp: &mut ConstantPoolBuilder, out: &mut Vec<u8>) {
        put_u2(out, self.access_flags);
        put_u2(out, cp.utf8(&self.name));
        put_u2(out, cp.utf8(&self.descriptor));
        self.attributes.encode(cp, out);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponentBuilder {
    name: String,
    descriptor: String,
    attributes: Attributes,
}

impl RecordComponentBuilder {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            attributes: Attributes::default(),
        }
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.attributes.signature = Some(signature.to_string());
        self
    }

    pub fn annotation(mut self, annotation: AnnotationBuilder) -> Self {
        self.attributes.visible.push(annotation);
        self
    }

    pub fn type_annotation(mut self, annotation: TypeAnnotationBuilder) -> Self {
        self.attributes.visible_type.push(annotation);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFileBuilder {
    major_version: u16,
    minor_version: u16,
    access_flags: u16,
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<MemberBuilder>,
    methods: Vec<MemberBuilder>,
    attributes: Attributes,
    extra_classes: Vec<String>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(internal_name: &str) -> Self {
        Self {
            major_version: DEFAULT_MAJOR_VERSION,
            minor_version: 0,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            name: internal_name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Attributes::default(),
            extra_classes: Vec::new(),
        }
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn minor_version(mut self, minor: u16) -> Self {
        self.minor_version = minor;
        self
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn super_class(mut self, internal_name: &str) -> Self {
        self.super_class = Some(internal_name.to_string());
        self
    }

    /// Only `java/lang/Object` legitimately has no superclass.
    pub fn no_super_class(mut self) -> Self {
        self.super_class = None;
        self
    }

    /// Adds a directly implemented (or, for interfaces, extended) interface.
    pub fn interface(mut self, internal_name: &str) -> Self {
        self.interfaces.push(internal_name.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.attributes.signature = Some(signature.to_string());
        self
    }

    pub fn annotation(mut self, annotation: AnnotationBuilder) -> Self {
        self.attributes.visible.push(annotation);
        self
    }

    pub fn invisible_annotation(mut self, annotation: AnnotationBuilder) -> Self {
        self.attributes.invisible.push(annotation);
        self
    }

    pub fn type_annotation(mut self, annotation: TypeAnnotationBuilder) -> Self {
        self.attributes.visible_type.push(annotation);
        self
    }

    pub fn invisible_type_annotation(mut self, annotation: TypeAnnotationBuilder) -> Self {
        self.attributes.invisible_type.push(annotation);
        self
    }

    pub fn inner_class(
        mut self,
        inner: &str,
        outer: Option<&str>,
        simple_name: Option<&str>,
        flags: u16,
    ) -> Self {
        self.attributes.inner_classes.push(InnerClassEntry {
            inner: inner.to_string(),
            outer: outer.map(str::to_string),
            simple_name: simple_name.map(str::to_string),
            flags,
        });
        self
    }

    /// `method` is `(name, descriptor)`; `None` for classes declared in an initializer.
    pub fn enclosing_method(mut self, class: &str, method: Option<(&str, &str)>) -> Self {
        self.attributes.enclosing_method = Some((
            class.to_string(),
            method.map(|(n, d)| (n.to_string(), d.to_string())),
        ));
        self
    }

    pub fn permitted_subclass(mut self, internal_name: &str) -> Self {
        self.attributes
            .permitted_subclasses
            .push(internal_name.to_string());
        self
    }

    pub fn record_component(mut self, component: RecordComponentBuilder) -> Self {
        self.attributes
            .record
            .get_or_insert_with(Vec::new)
            .push(component);
        self
    }

    pub fn field(mut self, field: MemberBuilder) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MemberBuilder) -> Self {
        self.methods.push(method);
        self
    }

    pub fn raw_attribute(mut self, name: &str, bytes: &[u8]) -> Self {
        self.attributes.raw.push((name.to_string(), bytes.to_vec()));
        self
    }

    /// Adds a `CONSTANT_Class` entry that nothing else refers to, the way a
    /// method body's instructions would.
    pub fn references_class(mut self, internal_name: &str) -> Self {
        self.extra_classes.push(internal_name.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut cp = ConstantPoolBuilder::new();
        let mut body = Vec::new();

        put_u2(&mut body, self.access_flags);
        put_u2(&mut body, cp.class(&self.name));
        put_u2(
            &mut body,
            self.super_class.as_deref().map_or(0, |s| cp.class(s)),
        );
        put_u2(&mut body, self.interfaces.len() as u16);
        for iface in &self.interfaces {
            put_u2(&mut body, cp.class(iface));
        }
        put_u2(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            field.encode(&mut cp, &mut body);
        }
        put_u2(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            method.encode(&mut cp, &mut body);
        }
        self.attributes.encode(&mut cp, &mut body);
        for name in &self.extra_classes {
            cp.class(name);
        }

        let mut out = Vec::with_capacity(body.len() + 64);
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        put_u2(&mut out, self.minor_version);
        put_u2(&mut out, self.major_version);
        out.extend_from_slice(&cp.finish());
        out.extend_from_slice(&body);
        out
    }
}

fn put_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}
