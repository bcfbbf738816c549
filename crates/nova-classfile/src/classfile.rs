use std::io::Read;

use crate::annotation::{Annotation, ElementValue, TypeAnnotation};
use crate::constant_pool::{ConstantPool, CpInfo};
use crate::error::{Error, Result};
use crate::reader::Reader;

pub const MIN_MAJOR_VERSION: u16 = 45;
/// Java 25.
pub const MAX_MAJOR_VERSION: u16 = 69;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;
pub const ACC_MANDATED: u16 = 0x8000;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub signature: Option<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
    pub runtime_visible_type_annotations: Vec<TypeAnnotation>,
    pub runtime_invisible_type_annotations: Vec<TypeAnnotation>,
    pub inner_classes: Vec<InnerClassInfo>,
    pub enclosing_method: Option<EnclosingMethod>,
    pub permitted_subclasses: Vec<String>,
    /// `None` unless the class carries a `Record` attribute.
    pub record_components: Option<Vec<RecordComponent>>,
    /// Internal names of every `Class` constant, in pool order. Array
    /// classes appear in descriptor form (`[Ljava/lang/String;`).
    pub constant_pool_classes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
    pub runtime_visible_type_annotations: Vec<TypeAnnotation>,
    pub runtime_invisible_type_annotations: Vec<TypeAnnotation>,
    pub runtime_visible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
    pub runtime_invisible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
    /// Fields only.
    pub constant_value: Option<ConstantValue>,
    /// Methods only; internal names from the `Exceptions` attribute.
    pub exceptions: Vec<String>,
    /// Methods only.
    pub method_parameters: Option<Vec<MethodParameter>>,
    /// Annotation interface members only.
    pub annotation_default: Option<ElementValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassInfo {
    pub inner_class: String,
    pub outer_class: Option<String>,
    pub inner_name: Option<String>,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingMethod {
    pub class: String,
    /// Absent when the class is enclosed by an initializer.
    pub method_name: Option<String>,
    pub method_descriptor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameter {
    pub name: Option<String>,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordComponent {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
    pub runtime_visible_type_annotations: Vec<TypeAnnotation>,
    pub runtime_invisible_type_annotations: Vec<TypeAnnotation>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
            return Err(Error::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_member(&mut reader, &cp, AttributeTarget::Field)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_member(&mut reader, &cp, AttributeTarget::Method)?);
        }

        let class_attrs = parse_attributes(&mut reader, &cp, AttributeTarget::Class)?;

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: class_attrs.signature,
            runtime_visible_annotations: class_attrs.runtime_visible_annotations,
            runtime_invisible_annotations: class_attrs.runtime_invisible_annotations,
            runtime_visible_type_annotations: class_attrs.runtime_visible_type_annotations,
            runtime_invisible_type_annotations: class_attrs.runtime_invisible_type_annotations,
            inner_classes: class_attrs.inner_classes,
            enclosing_method: class_attrs.enclosing_method,
            permitted_subclasses: class_attrs.permitted_subclasses,
            record_components: class_attrs.record_components,
            constant_pool_classes: cp.class_names()?,
        })
    }

    /// Reads the whole stream and parses it. The caller keeps ownership of
    /// the stream.
    pub fn read_from(mut input: impl Read) -> std::io::Result<Result<Self>> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        Ok(Self::parse(&bytes))
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    /// The `InnerClasses` entry describing this class itself, if it is nested.
    pub fn self_inner_class_entry(&self) -> Option<&InnerClassInfo> {
        self.inner_classes
            .iter()
            .find(|entry| entry.inner_class == self.this_class)
    }
}

fn parse_member(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: AttributeTarget,
) -> Result<ClassMember> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let attrs = parse_attributes(reader, cp, target)?;
    Ok(ClassMember {
        access_flags,
        name,
        descriptor,
        signature: attrs.signature,
        runtime_visible_annotations: attrs.runtime_visible_annotations,
        runtime_invisible_annotations: attrs.runtime_invisible_annotations,
        runtime_visible_type_annotations: attrs.runtime_visible_type_annotations,
        runtime_invisible_type_annotations: attrs.runtime_invisible_type_annotations,
        runtime_visible_parameter_annotations: attrs.runtime_visible_parameter_annotations,
        runtime_invisible_parameter_annotations: attrs.runtime_invisible_parameter_annotations,
        constant_value: attrs.constant_value,
        exceptions: attrs.exceptions,
        method_parameters: attrs.method_parameters,
        annotation_default: attrs.annotation_default,
    })
}

fn parse_record_component(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<RecordComponent> {
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
    let attrs = parse_attributes(reader, cp, AttributeTarget::RecordComponent)?;
    Ok(RecordComponent {
        name,
        descriptor,
        signature: attrs.signature,
        runtime_visible_annotations: attrs.runtime_visible_annotations,
        runtime_invisible_annotations: attrs.runtime_invisible_annotations,
        runtime_visible_type_annotations: attrs.runtime_visible_type_annotations,
        runtime_invisible_type_annotations: attrs.runtime_invisible_type_annotations,
    })
}

#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    runtime_visible_annotations: Vec<Annotation>,
    runtime_invisible_annotations: Vec<Annotation>,
    runtime_visible_type_annotations: Vec<TypeAnnotation>,
    runtime_invisible_type_annotations: Vec<TypeAnnotation>,
    runtime_visible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
    runtime_invisible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
    inner_classes: Vec<InnerClassInfo>,
    enclosing_method: Option<EnclosingMethod>,
    permitted_subclasses: Vec<String>,
    record_components: Option<Vec<RecordComponent>>,
    constant_value: Option<ConstantValue>,
    exceptions: Vec<String>,
    method_parameters: Option<Vec<MethodParameter>>,
    annotation_default: Option<ElementValue>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AttributeTarget {
    Class,
    Field,
    Method,
    RecordComponent,
}

fn parse_attributes(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: AttributeTarget,
) -> Result<ParsedAttributes> {
    use AttributeTarget::*;

    let attributes_count = reader.read_u2()? as usize;
    let mut parsed = ParsedAttributes::default();
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let name = cp.get_utf8(name_index)?;

        let mut sub = Reader::new(info);
        match (name, target) {
            ("Signature", _) => {
                let sig_index = sub.read_u2()?;
                parsed.signature = Some(cp.get_utf8(sig_index)?.to_string());
            }
            ("RuntimeVisibleAnnotations", _) => {
                parsed
                    .runtime_visible_annotations
                    .extend(Annotation::parse_list(&mut sub, cp)?);
            }
            ("RuntimeInvisibleAnnotations", _) => {
                parsed
                    .runtime_invisible_annotations
                    .extend(Annotation::parse_list(&mut sub, cp)?);
            }
            ("RuntimeVisibleTypeAnnotations", _) => {
                parsed
                    .runtime_visible_type_annotations
                    .extend(TypeAnnotation::parse_list(&mut sub, cp)?);
            }
            ("RuntimeInvisibleTypeAnnotations", _) => {
                parsed
                    .runtime_invisible_type_annotations
                    .extend(TypeAnnotation::parse_list(&mut sub, cp)?);
            }
            ("RuntimeVisibleParameterAnnotations", Method) => {
                parsed.runtime_visible_parameter_annotations =
                    Some(Annotation::parse_parameter_lists(&mut sub, cp)?);
            }
            ("RuntimeInvisibleParameterAnnotations", Method) => {
                parsed.runtime_invisible_parameter_annotations =
                    Some(Annotation::parse_parameter_lists(&mut sub, cp)?);
            }
            ("ConstantValue", Field) => {
                let index = sub.read_u2()?;
                parsed.constant_value = Some(match cp.get(index)? {
                    CpInfo::Integer(v) => ConstantValue::Int(*v),
                    CpInfo::Long(v) => ConstantValue::Long(*v),
                    CpInfo::Float(v) => ConstantValue::Float(*v),
                    CpInfo::Double(v) => ConstantValue::Double(*v),
                    CpInfo::String { .. } => ConstantValue::String(cp.get_string_constant(index)?),
                    _ => return Err(Error::MalformedAttribute("ConstantValue")),
                });
            }
            ("Exceptions", Method) => {
                let num = sub.read_u2()? as usize;
                for _ in 0..num {
                    parsed.exceptions.push(cp.get_class_name(sub.read_u2()?)?);
                }
            }
            ("MethodParameters", Method) => {
                let num = sub.read_u1()? as usize;
                let mut params = Vec::with_capacity(num);
                for _ in 0..num {
                    let name_index = sub.read_u2()?;
                    let access_flags = sub.read_u2()?;
                    let name = if name_index == 0 {
                        None
                    } else {
                        Some(cp.get_utf8(name_index)?.to_string())
                    };
                    params.push(MethodParameter { name, access_flags });
                }
                parsed.method_parameters = Some(params);
            }
            ("AnnotationDefault", Method) => {
                parsed.annotation_default = Some(ElementValue::parse(&mut sub, cp)?);
            }
            ("InnerClasses", Class) => {
                let num = sub.read_u2()? as usize;
                let mut inners = Vec::with_capacity(num);
                for _ in 0..num {
                    let inner_class_info_index = sub.read_u2()?;
                    let outer_class_info_index = sub.read_u2()?;
                    let inner_name_index = sub.read_u2()?;
                    let inner_access_flags = sub.read_u2()?;

                    let inner_class = cp.get_class_name(inner_class_info_index)?;
                    let outer_class = if outer_class_info_index == 0 {
                        None
                    } else {
                        Some(cp.get_class_name(outer_class_info_index)?)
                    };
                    let inner_name = if inner_name_index == 0 {
                        None
                    } else {
                        Some(cp.get_utf8(inner_name_index)?.to_string())
                    };

                    inners.push(InnerClassInfo {
                        inner_class,
                        outer_class,
                        inner_name,
                        access_flags: inner_access_flags,
                    });
                }
                parsed.inner_classes.extend(inners);
            }
            ("EnclosingMethod", Class) => {
                let class = cp.get_class_name(sub.read_u2()?)?;
                let method_index = sub.read_u2()?;
                let (method_name, method_descriptor) = if method_index == 0 {
                    (None, None)
                } else {
                    let (name, desc) = cp.get_name_and_type(method_index)?;
                    (Some(name.to_string()), Some(desc.to_string()))
                };
                parsed.enclosing_method = Some(EnclosingMethod {
                    class,
                    method_name,
                    method_descriptor,
                });
            }
            ("PermittedSubclasses", Class) => {
                let num = sub.read_u2()? as usize;
                for _ in 0..num {
                    parsed
                        .permitted_subclasses
                        .push(cp.get_class_name(sub.read_u2()?)?);
                }
            }
            ("Record", Class) => {
                let num = sub.read_u2()? as usize;
                let mut components = Vec::with_capacity(num);
                for _ in 0..num {
                    components.push(parse_record_component(&mut sub, cp)?);
                }
                parsed.record_components = Some(components);
            }
            _ => {
                tracing::trace!(
                    target: "nova.classfile",
                    attribute = name,
                    length,
                    "skipping attribute"
                );
                continue;
            }
        }
        sub.ensure_empty()?;
    }

    Ok(parsed)
}
