use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use smol_str::SmolStr;

use crate::error::IndexError;
use crate::name::DotName;
use crate::types::Type;

/// One `name = value` pair of an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMember {
    pub name: SmolStr,
    pub value: AnnotationValue,
}

#[derive(Debug, Clone)]
pub enum AnnotationValue {
    Byte(i8),
    /// A UTF-16 code unit.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    /// A class literal; `void.class` and primitive literals included.
    Class(Type),
    Enum {
        type_name: DotName,
        constant: SmolStr,
    },
    Nested(Box<AnnotationInstance>),
    Array(Vec<AnnotationValue>),
}

// Floating point values compare by bit pattern so that equality is
// reflexive (NaN) and agrees with the hash.
impl PartialEq for AnnotationValue {
    fn eq(&self, other: &Self) -> bool {
        use AnnotationValue::*;
        match (self, other) {
            (Byte(a), Byte(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Boolean(a), Boolean(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Class(a), Class(b)) => a == b,
            (
                Enum {
                    type_name: ta,
                    constant: ca,
                },
                Enum {
                    type_name: tb,
                    constant: cb,
                },
            ) => ta == tb && ca == cb,
            (Nested(a), Nested(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AnnotationValue {}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral values of any width.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match self {
            AnnotationValue::Byte(v) => *v as i64,
            AnnotationValue::Char(v) => *v as i64,
            AnnotationValue::Short(v) => *v as i64,
            AnnotationValue::Int(v) => *v as i64,
            AnnotationValue::Long(v) => *v,
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AnnotationValue]> {
        match self {
            AnnotationValue::Array(values) => Some(values),
            _ => None,
        }
    }

    fn hash_equivalence<H: Hasher>(&self, state: &mut H) {
        use AnnotationValue::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Byte(v) => v.hash(state),
            Char(v) => v.hash(state),
            Short(v) => v.hash(state),
            Int(v) => v.hash(state),
            Long(v) => v.hash(state),
            Float(v) => v.to_bits().hash(state),
            Double(v) => v.to_bits().hash(state),
            Boolean(v) => v.hash(state),
            String(v) => v.hash(state),
            Class(t) => t.hash_equivalence(state),
            Enum {
                type_name,
                constant,
            } => {
                type_name.hash(state);
                constant.hash(state);
            }
            Nested(a) => a.hash_equivalence(state),
            Array(values) => {
                values.len().hash(state);
                for v in values {
                    v.hash_equivalence(state);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationTargetKind {
    Class,
    Field,
    Method,
    MethodParameter,
    RecordComponent,
    Type,
}

/// What an annotation is attached to. Declarations are identified by their
/// class and position, and resolved through an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationTarget {
    Class(DotName),
    Field {
        class: DotName,
        position: u32,
    },
    Method {
        class: DotName,
        position: u32,
    },
    /// `position` counts descriptor parameters, synthetic ones included.
    MethodParameter {
        class: DotName,
        method: u32,
        position: u16,
    },
    RecordComponent {
        class: DotName,
        position: u32,
    },
    Type(Box<TypeTarget>),
}

impl AnnotationTarget {
    pub fn kind(&self) -> AnnotationTargetKind {
        match self {
            AnnotationTarget::Class(_) => AnnotationTargetKind::Class,
            AnnotationTarget::Field { .. } => AnnotationTargetKind::Field,
            AnnotationTarget::Method { .. } => AnnotationTargetKind::Method,
            AnnotationTarget::MethodParameter { .. } => AnnotationTargetKind::MethodParameter,
            AnnotationTarget::RecordComponent { .. } => AnnotationTargetKind::RecordComponent,
            AnnotationTarget::Type(_) => AnnotationTargetKind::Type,
        }
    }

    pub fn declaring_class(&self) -> &DotName {
        match self {
            AnnotationTarget::Class(class)
            | AnnotationTarget::Field { class, .. }
            | AnnotationTarget::Method { class, .. }
            | AnnotationTarget::MethodParameter { class, .. }
            | AnnotationTarget::RecordComponent { class, .. } => class,
            AnnotationTarget::Type(t) => t.enclosing.declaring_class(),
        }
    }

    pub fn as_type(&self) -> Option<&TypeTarget> {
        match self {
            AnnotationTarget::Type(t) => Some(t),
            _ => None,
        }
    }
}

/// One navigation step from an enclosing type into a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypePathStep {
    Array,
    Nested,
    WildcardBound,
    TypeArgument(u8),
}

/// Where within its declaration an annotated type occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTargetUsage {
    /// Field, record component, method return or (with `receiver`) method
    /// receiver type.
    Empty { receiver: bool },
    TypeParameter { position: u32 },
    /// `bound` indexes the declared bound list.
    TypeParameterBound { position: u32, bound: u32 },
    /// [`nova_classfile::SUPERCLASS_INDEX`] for the superclass, else the
    /// interface position.
    ClassExtends { position: u16 },
    /// Descriptor position of the parameter.
    MethodParameter { position: u16 },
    Throws { position: u16 },
}

/// A type-use annotation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTarget {
    pub(crate) enclosing: AnnotationTarget,
    pub(crate) usage: TypeTargetUsage,
    pub(crate) path: Vec<TypePathStep>,
    pub(crate) node: Type,
}

impl TypeTarget {
    /// The declaration (class, field, method or record component) whose type
    /// contains the annotated node.
    pub fn enclosing_target(&self) -> &AnnotationTarget {
        &self.enclosing
    }

    pub fn usage(&self) -> TypeTargetUsage {
        self.usage
    }

    /// Path from the root type of `usage` to the annotated node.
    pub fn path(&self) -> &[TypePathStep] {
        &self.path
    }

    /// The exact annotated node.
    pub fn target(&self) -> &Type {
        &self.node
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationInstance {
    name: DotName,
    /// Sorted by member name.
    values: Vec<AnnotationMember>,
    target: Option<AnnotationTarget>,
    runtime_visible: bool,
}

impl AnnotationInstance {
    pub fn builder(name: DotName) -> AnnotationInstanceBuilder {
        AnnotationInstanceBuilder {
            name,
            members: Vec::new(),
            runtime_visible: true,
        }
    }

    pub fn name(&self) -> &DotName {
        &self.name
    }

    pub fn values(&self) -> &[AnnotationMember] {
        &self.values
    }

    pub fn value(&self, member: &str) -> Option<&AnnotationValue> {
        self.values
            .binary_search_by(|m| m.name.as_str().cmp(member))
            .ok()
            .map(|i| &self.values[i].value)
    }

    /// `None` for annotations stored on declarations and type nodes; the
    /// index hands out targeted copies.
    pub fn target(&self) -> Option<&AnnotationTarget> {
        self.target.as_ref()
    }

    pub fn runtime_visible(&self) -> bool {
        self.runtime_visible
    }

    /// Same annotation type and values, wherever either is attached.
    pub fn equivalent_to(&self, other: &AnnotationInstance) -> bool {
        self.name == other.name && self.values == other.values
    }

    /// A hash consistent with [`AnnotationInstance::equivalent_to`].
    pub fn equivalence_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_equivalence(&mut hasher);
        hasher.finish()
    }

    fn hash_equivalence<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        for member in &self.values {
            member.name.hash(state);
            member.value.hash_equivalence(state);
        }
    }

    pub(crate) fn with_target(&self, target: AnnotationTarget) -> AnnotationInstance {
        AnnotationInstance {
            name: self.name.clone(),
            values: self.values.clone(),
            target: Some(target),
            runtime_visible: self.runtime_visible,
        }
    }

    pub(crate) fn into_targetless(mut self) -> AnnotationInstance {
        self.target = None;
        self
    }

    /// Members must already be sorted and unique.
    pub(crate) fn from_sorted_parts(
        name: DotName,
        values: Vec<AnnotationMember>,
        runtime_visible: bool,
    ) -> AnnotationInstance {
        AnnotationInstance {
            name,
            values,
            target: None,
            runtime_visible,
        }
    }
}

/// Collects members in any order; [`AnnotationInstanceBuilder::build`] sorts
/// them and rejects duplicate member names.
#[derive(Debug, Clone)]
pub struct AnnotationInstanceBuilder {
    name: DotName,
    members: Vec<AnnotationMember>,
    runtime_visible: bool,
}

impl AnnotationInstanceBuilder {
    pub fn value(mut self, name: &str, value: AnnotationValue) -> Self {
        self.members.push(AnnotationMember {
            name: SmolStr::new(name),
            value,
        });
        self
    }

    pub fn runtime_visible(mut self, visible: bool) -> Self {
        self.runtime_visible = visible;
        self
    }

    pub fn build(mut self) -> Result<AnnotationInstance, IndexError> {
        self.members.sort_by(|a, b| a.name.cmp(&b.name));
        if self.members.windows(2).any(|w| w[0].name == w[1].name) {
            return Err(IndexError::InvalidModel("duplicate annotation member"));
        }
        Ok(AnnotationInstance::from_sorted_parts(
            self.name,
            self.members,
            self.runtime_visible,
        ))
    }
}
