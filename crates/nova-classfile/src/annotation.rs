use crate::constant_pool::{ConstantPool, CpInfo};
use crate::error::{Error, Result};
use crate::reader::Reader;

/// Deepest accepted nesting of element values (arrays and annotations).
pub const MAX_ELEMENT_VALUE_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_descriptor: String,
    pub type_internal_name: Option<String>,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        Self::parse_nested(reader, cp, 0)
    }

    fn parse_nested(reader: &mut Reader<'_>, cp: &ConstantPool, depth: usize) -> Result<Self> {
        let type_index = reader.read_u2()?;
        let type_descriptor = cp.get_utf8(type_index)?.to_string();
        let type_internal_name = descriptor_to_internal_name(&type_descriptor);

        let num_element_value_pairs = reader.read_u2()? as usize;
        let mut elements = Vec::with_capacity(num_element_value_pairs);
        for _ in 0..num_element_value_pairs {
            let element_name_index = reader.read_u2()?;
            let name = cp.get_utf8(element_name_index)?.to_string();
            let value = ElementValue::parse_nested(reader, cp, depth)?;
            elements.push((name, value));
        }

        Ok(Self {
            type_descriptor,
            type_internal_name,
            elements,
        })
    }

    pub(crate) fn parse_list(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<Self>> {
        let num = reader.read_u2()? as usize;
        let mut anns = Vec::with_capacity(num);
        for _ in 0..num {
            anns.push(Annotation::parse(reader, cp)?);
        }
        Ok(anns)
    }

    /// `RuntimeVisibleParameterAnnotations` / `RuntimeInvisibleParameterAnnotations`.
    ///
    /// The outer vector has `num_parameters` entries, which javac may make
    /// shorter than the descriptor's parameter list.
    pub(crate) fn parse_parameter_lists(
        reader: &mut Reader<'_>,
        cp: &ConstantPool,
    ) -> Result<Vec<Vec<Self>>> {
        let num_parameters = reader.read_u1()? as usize;
        let mut params = Vec::with_capacity(num_parameters);
        for _ in 0..num_parameters {
            params.push(Annotation::parse_list(reader, cp)?);
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Const(ConstValue),
    Enum {
        type_descriptor: String,
        const_name: String,
    },
    /// Return descriptor of a class literal (`Ljava/lang/String;`, `I`, `V`).
    Class(String),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        Self::parse_nested(reader, cp, 0)
    }

    fn parse_nested(reader: &mut Reader<'_>, cp: &ConstantPool, depth: usize) -> Result<Self> {
        let tag = reader.read_u1()? as char;
        if matches!(tag, '@' | '[') && depth >= MAX_ELEMENT_VALUE_NESTING {
            return Err(Error::MalformedAttribute("annotation element_value nesting"));
        }
        match tag {
            'B' | 'C' | 'I' | 'S' | 'Z' => {
                let idx = reader.read_u2()?;
                let value = match cp.get(idx)? {
                    CpInfo::Integer(v) => *v,
                    other => {
                        return Err(Error::ConstantPoolTypeMismatch {
                            index: idx,
                            expected: "Integer",
                            found: other.kind(),
                        })
                    }
                };

                let cv = match tag {
                    'B' => ConstValue::Byte(value as i8),
                    'C' => ConstValue::Char(value as u16),
                    'I' => ConstValue::Int(value),
                    'S' => ConstValue::Short(value as i16),
                    _ => ConstValue::Boolean(value != 0),
                };
                Ok(ElementValue::Const(cv))
            }
            'D' => {
                let idx = reader.read_u2()?;
                let value = match cp.get(idx)? {
                    CpInfo::Double(v) => *v,
                    other => {
                        return Err(Error::ConstantPoolTypeMismatch {
                            index: idx,
                            expected: "Double",
                            found: other.kind(),
                        })
                    }
                };
                Ok(ElementValue::Const(ConstValue::Double(value)))
            }
            'F' => {
                let idx = reader.read_u2()?;
                let value = match cp.get(idx)? {
                    CpInfo::Float(v) => *v,
                    other => {
                        return Err(Error::ConstantPoolTypeMismatch {
                            index: idx,
                            expected: "Float",
                            found: other.kind(),
                        })
                    }
                };
                Ok(ElementValue::Const(ConstValue::Float(value)))
            }
            'J' => {
                let idx = reader.read_u2()?;
                let value = match cp.get(idx)? {
                    CpInfo::Long(v) => *v,
                    other => {
                        return Err(Error::ConstantPoolTypeMismatch {
                            index: idx,
                            expected: "Long",
                            found: other.kind(),
                        })
                    }
                };
                Ok(ElementValue::Const(ConstValue::Long(value)))
            }
            's' => {
                let idx = reader.read_u2()?;
                let value = cp.get_string_constant(idx)?;
                Ok(ElementValue::Const(ConstValue::String(value)))
            }
            'e' => {
                let type_name_index = reader.read_u2()?;
                let const_name_index = reader.read_u2()?;
                Ok(ElementValue::Enum {
                    type_descriptor: cp.get_utf8(type_name_index)?.to_string(),
                    const_name: cp.get_utf8(const_name_index)?.to_string(),
                })
            }
            'c' => {
                let class_info_index = reader.read_u2()?;
                Ok(ElementValue::Class(
                    cp.get_utf8(class_info_index)?.to_string(),
                ))
            }
            '@' => Ok(ElementValue::Annotation(Box::new(Annotation::parse_nested(
                reader,
                cp,
                depth + 1,
            )?))),
            '[' => {
                let num_values = reader.read_u2()? as usize;
                let mut values = Vec::with_capacity(num_values);
                for _ in 0..num_values {
                    values.push(ElementValue::parse_nested(reader, cp, depth + 1)?);
                }
                Ok(ElementValue::Array(values))
            }
            _ => Err(Error::MalformedAttribute("annotation element_value")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Byte(i8),
    /// A UTF-16 code unit; lone surrogates are legal here.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

/// Where a type annotation sits, decoded from `target_type` + `target_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAnnotationTarget {
    /// 0x00
    ClassTypeParameter { index: u8 },
    /// 0x01
    MethodTypeParameter { index: u8 },
    /// 0x10; `index == 0xFFFF` is the superclass, anything else an interface.
    ClassExtends { index: u16 },
    /// 0x11
    ClassTypeParameterBound { type_parameter: u8, bound: u8 },
    /// 0x12
    MethodTypeParameterBound { type_parameter: u8, bound: u8 },
    /// 0x13: field or record component type.
    Field,
    /// 0x14
    MethodReturn,
    /// 0x15
    MethodReceiver,
    /// 0x16; the index counts declared parameters only.
    MethodFormalParameter { index: u8 },
    /// 0x17
    Throws { index: u16 },
    /// 0x40..=0x4B; only meaningful inside a `Code` attribute.
    Code { target_type: u8 },
}

pub const SUPERCLASS_INDEX: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePathKind {
    /// Deeper in an array type.
    Array,
    /// Deeper in a nested type.
    Nested,
    /// On the bound of a wildcard type argument.
    WildcardBound,
    /// On a type argument of a parameterized type.
    TypeArgument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypePathEntry {
    pub kind: TypePathKind,
    pub type_argument_index: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub target: TypeAnnotationTarget,
    pub type_path: Vec<TypePathEntry>,
    pub annotation: Annotation,
}

impl TypeAnnotation {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        const ATTR: &str = "type annotation";

        let target_type = reader.read_u1()?;
        let target = match target_type {
            0x00 => TypeAnnotationTarget::ClassTypeParameter {
                index: reader.read_u1()?,
            },
            0x01 => TypeAnnotationTarget::MethodTypeParameter {
                index: reader.read_u1()?,
            },
            0x10 => TypeAnnotationTarget::ClassExtends {
                index: reader.read_u2()?,
            },
            0x11 => TypeAnnotationTarget::ClassTypeParameterBound {
                type_parameter: reader.read_u1()?,
                bound: reader.read_u1()?,
            },
            0x12 => TypeAnnotationTarget::MethodTypeParameterBound {
                type_parameter: reader.read_u1()?,
                bound: reader.read_u1()?,
            },
            0x13 => TypeAnnotationTarget::Field,
            0x14 => TypeAnnotationTarget::MethodReturn,
            0x15 => TypeAnnotationTarget::MethodReceiver,
            0x16 => TypeAnnotationTarget::MethodFormalParameter {
                index: reader.read_u1()?,
            },
            0x17 => TypeAnnotationTarget::Throws {
                index: reader.read_u2()?,
            },
            0x40 | 0x41 => {
                // localvar_target: table of (start_pc, length, index).
                let table_length = reader.read_u2()? as usize;
                reader.skip(table_length * 6)?;
                TypeAnnotationTarget::Code { target_type }
            }
            0x42..=0x46 => {
                reader.skip(2)?;
                TypeAnnotationTarget::Code { target_type }
            }
            0x47..=0x4B => {
                reader.skip(3)?;
                TypeAnnotationTarget::Code { target_type }
            }
            _ => return Err(Error::MalformedAttribute(ATTR)),
        };

        let path_length = reader.read_u1()? as usize;
        let mut type_path = Vec::with_capacity(path_length);
        for _ in 0..path_length {
            let kind = match reader.read_u1()? {
                0 => TypePathKind::Array,
                1 => TypePathKind::Nested,
                2 => TypePathKind::WildcardBound,
                3 => TypePathKind::TypeArgument,
                _ => return Err(Error::MalformedAttribute(ATTR)),
            };
            type_path.push(TypePathEntry {
                kind,
                type_argument_index: reader.read_u1()?,
            });
        }

        let annotation = Annotation::parse(reader, cp)?;
        Ok(Self {
            target,
            type_path,
            annotation,
        })
    }

    pub(crate) fn parse_list(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<Self>> {
        let num = reader.read_u2()? as usize;
        let mut anns = Vec::with_capacity(num);
        for _ in 0..num {
            anns.push(TypeAnnotation::parse(reader, cp)?);
        }
        Ok(anns)
    }
}

pub fn descriptor_to_internal_name(desc: &str) -> Option<String> {
    desc.strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .map(|name| name.to_string())
}
