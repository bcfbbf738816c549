//! The type model: an immutable, closed sum over every type the JVM
//! signature grammar can express, each node optionally carrying type-use
//! annotations.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use nova_classfile::BaseType;
use smol_str::SmolStr;

use crate::annotations::AnnotationInstance;
use crate::error::IndexError;
use crate::name::DotName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
}

impl PrimitiveType {
    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Char => 'C',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Char => "char",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    pub(crate) fn from_descriptor_char(c: char) -> Option<Self> {
        BaseType::from_descriptor_char(c as u8).map(Self::from)
    }
}

impl From<BaseType> for PrimitiveType {
    fn from(base: BaseType) -> Self {
        match base {
            BaseType::Boolean => PrimitiveType::Boolean,
            BaseType::Byte => PrimitiveType::Byte,
            BaseType::Short => PrimitiveType::Short,
            BaseType::Int => PrimitiveType::Int,
            BaseType::Long => PrimitiveType::Long,
            BaseType::Char => PrimitiveType::Char,
            BaseType::Float => PrimitiveType::Float,
            BaseType::Double => PrimitiveType::Double,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Primitive,
    Class,
    Array,
    Parameterized,
    Wildcard,
    TypeVariable,
    TypeVariableReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardBound {
    Unbounded,
    Extends(Box<Type>),
    Super(Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeParameterOwner {
    Class(DotName),
    /// `method` is the method's position in its class's method list.
    Method { class: DotName, method: u32 },
}

/// Where a referenced type variable is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeVariableDeclaration {
    pub owner: TypeParameterOwner,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Void,
    Primitive(PrimitiveType),
    Class(DotName),
    /// `component` is never itself an unannotated array; such arrays are
    /// folded into `dimensions`.
    Array {
        component: Box<Type>,
        dimensions: u32,
    },
    /// `owner` is set for inner types of a generic enclosing type
    /// (`Outer<A>.Inner<B>`), and for annotated non-generic enclosing
    /// instances (`@A Outer.Inner`), where `arguments` may be empty.
    Parameterized {
        name: DotName,
        arguments: Vec<Type>,
        owner: Option<Box<Type>>,
    },
    Wildcard(WildcardBound),
    /// A type variable together with its bounds. Uses of a variable outside
    /// a type parameter list carry a copy of the declaration's bounds.
    TypeVariable {
        identifier: SmolStr,
        bounds: Vec<Type>,
        /// The declaration has no class bound (`<T extends Runnable>` as
        /// opposed to `<T extends Object & Runnable>`).
        implicit_object_bound: bool,
    },
    /// A use of a type variable inside the bounds of a type parameter list.
    /// `declaration` is `None` while it refers to an enclosing class that
    /// has not been indexed.
    TypeVariableReference {
        identifier: SmolStr,
        declaration: Option<TypeVariableDeclaration>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub(crate) shape: TypeShape,
    /// Always targetless; the index derives targeted copies.
    pub(crate) annotations: Vec<AnnotationInstance>,
}

impl Type {
    pub(crate) fn from_shape(shape: TypeShape) -> Self {
        Type {
            shape,
            annotations: Vec::new(),
        }
    }

    pub fn void() -> Self {
        Self::from_shape(TypeShape::Void)
    }

    pub fn primitive(primitive: PrimitiveType) -> Self {
        Self::from_shape(TypeShape::Primitive(primitive))
    }

    pub fn class(name: DotName) -> Self {
        Self::from_shape(TypeShape::Class(name))
    }

    pub fn object() -> Self {
        Self::class(DotName::simple("java.lang.Object"))
    }

    /// An array of `dimensions` dimensions over `component`.
    pub fn array(component: Type, dimensions: u32) -> Result<Self, IndexError> {
        if dimensions == 0 {
            return Err(IndexError::InvalidModel("array with zero dimensions"));
        }
        if component.kind() == TypeKind::Void || component.kind() == TypeKind::Wildcard {
            return Err(IndexError::InvalidModel("array of void or wildcard"));
        }
        Ok(Self::array_unchecked(component, dimensions))
    }

    pub(crate) fn array_unchecked(component: Type, dimensions: u32) -> Self {
        match component {
            Type {
                shape:
                    TypeShape::Array {
                        component: inner,
                        dimensions: inner_dims,
                    },
                annotations,
            } if annotations.is_empty() => Self::from_shape(TypeShape::Array {
                component: inner,
                dimensions: dimensions + inner_dims,
            }),
            component => Self::from_shape(TypeShape::Array {
                component: Box::new(component),
                dimensions,
            }),
        }
    }

    pub fn parameterized(name: DotName) -> ParameterizedTypeBuilder {
        ParameterizedTypeBuilder {
            name,
            arguments: Vec::new(),
            owner: None,
        }
    }

    pub fn unbounded_wildcard() -> Self {
        Self::from_shape(TypeShape::Wildcard(WildcardBound::Unbounded))
    }

    pub fn wildcard_extends(bound: Type) -> Self {
        Self::from_shape(TypeShape::Wildcard(WildcardBound::Extends(Box::new(bound))))
    }

    pub fn wildcard_super(bound: Type) -> Self {
        Self::from_shape(TypeShape::Wildcard(WildcardBound::Super(Box::new(bound))))
    }

    pub fn type_variable(identifier: &str, bounds: Vec<Type>, implicit_object_bound: bool) -> Self {
        Self::from_shape(TypeShape::TypeVariable {
            identifier: SmolStr::new(identifier),
            bounds,
            implicit_object_bound,
        })
    }

    pub fn type_variable_reference(
        identifier: &str,
        declaration: Option<TypeVariableDeclaration>,
    ) -> Self {
        Self::from_shape(TypeShape::TypeVariableReference {
            identifier: SmolStr::new(identifier),
            declaration,
        })
    }

    /// Replaces this node's annotations. Targets are dropped.
    pub fn with_annotations(mut self, annotations: Vec<AnnotationInstance>) -> Self {
        self.annotations = annotations
            .into_iter()
            .map(AnnotationInstance::into_targetless)
            .collect();
        self
    }

    pub fn kind(&self) -> TypeKind {
        match &self.shape {
            TypeShape::Void => TypeKind::Void,
            TypeShape::Primitive(_) => TypeKind::Primitive,
            TypeShape::Class(_) => TypeKind::Class,
            TypeShape::Array { .. } => TypeKind::Array,
            TypeShape::Parameterized { .. } => TypeKind::Parameterized,
            TypeShape::Wildcard(_) => TypeKind::Wildcard,
            TypeShape::TypeVariable { .. } => TypeKind::TypeVariable,
            TypeShape::TypeVariableReference { .. } => TypeKind::TypeVariableReference,
        }
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.annotations.iter().find(|a| a.name() == name)
    }

    /// The class name of a class or parameterized type.
    pub fn name(&self) -> Option<&DotName> {
        match &self.shape {
            TypeShape::Class(name) | TypeShape::Parameterized { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The identifier of a type variable or type variable reference.
    pub fn identifier(&self) -> Option<&str> {
        match &self.shape {
            TypeShape::TypeVariable { identifier, .. }
            | TypeShape::TypeVariableReference { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// The class this type erases to, if it is known without an index.
    pub fn erased_name(&self) -> Option<DotName> {
        match &self.shape {
            TypeShape::Class(name) | TypeShape::Parameterized { name, .. } => Some(name.clone()),
            TypeShape::TypeVariable {
                bounds,
                implicit_object_bound,
                ..
            } => match bounds.first() {
                Some(first) if !implicit_object_bound => first.erased_name(),
                _ => Some(DotName::simple("java.lang.Object")),
            },
            TypeShape::Wildcard(WildcardBound::Extends(bound)) => bound.erased_name(),
            TypeShape::Wildcard(_) | TypeShape::TypeVariableReference { .. } => {
                Some(DotName::simple("java.lang.Object"))
            }
            TypeShape::Void | TypeShape::Primitive(_) | TypeShape::Array { .. } => None,
        }
    }

    /// Structural equality that ignores annotations at every level.
    pub fn equivalent(&self, other: &Type) -> bool {
        use TypeShape::*;
        match (&self.shape, &other.shape) {
            (Void, Void) => true,
            (Primitive(a), Primitive(b)) => a == b,
            (Class(a), Class(b)) => a == b,
            (
                Array {
                    component: a,
                    dimensions: da,
                },
                Array {
                    component: b,
                    dimensions: db,
                },
            ) => {
                let (ea, ta) = flatten_array(a, *da);
                let (eb, tb) = flatten_array(b, *db);
                ta == tb && ea.equivalent(eb)
            }
            (
                Parameterized {
                    name: na,
                    arguments: aa,
                    owner: oa,
                },
                Parameterized {
                    name: nb,
                    arguments: ab,
                    owner: ob,
                },
            ) => {
                na == nb
                    && all_equivalent(aa, ab)
                    && match (oa, ob) {
                        (Some(a), Some(b)) => a.equivalent(b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (Wildcard(a), Wildcard(b)) => match (a, b) {
                (WildcardBound::Unbounded, WildcardBound::Unbounded) => true,
                (WildcardBound::Extends(a), WildcardBound::Extends(b))
                | (WildcardBound::Super(a), WildcardBound::Super(b)) => a.equivalent(b),
                _ => false,
            },
            (
                TypeVariable {
                    identifier: ia,
                    bounds: ba,
                    implicit_object_bound: xa,
                },
                TypeVariable {
                    identifier: ib,
                    bounds: bb,
                    implicit_object_bound: xb,
                },
            ) => ia == ib && xa == xb && all_equivalent(ba, bb),
            (
                TypeVariableReference {
                    identifier: ia,
                    declaration: da,
                },
                TypeVariableReference {
                    identifier: ib,
                    declaration: db,
                },
            ) => ia == ib && da == db,
            _ => false,
        }
    }

    /// A hash consistent with [`Type::equivalent`].
    pub fn equivalence_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_equivalence(&mut hasher);
        hasher.finish()
    }

    pub(crate) fn hash_equivalence<H: Hasher>(&self, state: &mut H) {
        use TypeShape::*;
        match &self.shape {
            Void => 0u8.hash(state),
            Primitive(p) => {
                1u8.hash(state);
                p.hash(state);
            }
            Class(name) => {
                2u8.hash(state);
                name.hash(state);
            }
            Array {
                component,
                dimensions,
            } => {
                let (element, total) = flatten_array(component, *dimensions);
                3u8.hash(state);
                total.hash(state);
                element.hash_equivalence(state);
            }
            Parameterized {
                name,
                arguments,
                owner,
            } => {
                4u8.hash(state);
                name.hash(state);
                arguments.len().hash(state);
                for arg in arguments {
                    arg.hash_equivalence(state);
                }
                if let Some(owner) = owner {
                    owner.hash_equivalence(state);
                }
            }
            Wildcard(bound) => {
                5u8.hash(state);
                match bound {
                    WildcardBound::Unbounded => 0u8.hash(state),
                    WildcardBound::Extends(b) => {
                        1u8.hash(state);
                        b.hash_equivalence(state);
                    }
                    WildcardBound::Super(b) => {
                        2u8.hash(state);
                        b.hash_equivalence(state);
                    }
                }
            }
            TypeVariable {
                identifier, bounds, ..
            } => {
                6u8.hash(state);
                identifier.hash(state);
                for bound in bounds {
                    bound.hash_equivalence(state);
                }
            }
            TypeVariableReference {
                identifier,
                declaration,
            } => {
                7u8.hash(state);
                identifier.hash(state);
                declaration.hash(state);
            }
        }
    }

    /// A clone with no annotations at any level.
    pub fn without_annotations(&self) -> Type {
        let mut copy = self.clone();
        copy.visit_mut(&mut |t| t.annotations.clear());
        copy
    }

    /// Pre-order walk over this node and every node below it, type variable
    /// bounds included.
    pub(crate) fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Type)) {
        f(self);
        match &self.shape {
            TypeShape::Array { component, .. } => component.visit(f),
            TypeShape::Parameterized {
                arguments, owner, ..
            } => {
                for arg in arguments {
                    arg.visit(f);
                }
                if let Some(owner) = owner {
                    owner.visit(f);
                }
            }
            TypeShape::Wildcard(WildcardBound::Extends(b) | WildcardBound::Super(b)) => {
                b.visit(f)
            }
            TypeShape::TypeVariable { bounds, .. } => {
                for bound in bounds {
                    bound.visit(f);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn visit_mut(&mut self, f: &mut impl FnMut(&mut Type)) {
        self.visit_mut_in_bounds(false, &mut |node, _| f(node));
    }

    /// [`Type::visit_mut`], also telling `f` whether the node sits in the
    /// bounds of a type variable.
    pub(crate) fn visit_mut_in_bounds(
        &mut self,
        in_bounds: bool,
        f: &mut impl FnMut(&mut Type, bool),
    ) {
        f(self, in_bounds);
        match &mut self.shape {
            TypeShape::Array { component, .. } => component.visit_mut_in_bounds(in_bounds, f),
            TypeShape::Parameterized {
                arguments, owner, ..
            } => {
                for arg in arguments {
                    arg.visit_mut_in_bounds(in_bounds, f);
                }
                if let Some(owner) = owner {
                    owner.visit_mut_in_bounds(in_bounds, f);
                }
            }
            TypeShape::Wildcard(WildcardBound::Extends(b) | WildcardBound::Super(b)) => {
                b.visit_mut_in_bounds(in_bounds, f)
            }
            TypeShape::TypeVariable { bounds, .. } => {
                for bound in bounds {
                    bound.visit_mut_in_bounds(true, f);
                }
            }
            _ => {}
        }
    }
}

fn all_equivalent(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.equivalent(b))
}

/// Element type and total dimension count, looking through split arrays.
fn flatten_array(component: &Type, dimensions: u32) -> (&Type, u32) {
    match &component.shape {
        TypeShape::Array {
            component: inner,
            dimensions: inner_dims,
        } => flatten_array(inner, dimensions + inner_dims),
        _ => (component, dimensions),
    }
}

/// Accumulates a parameterized type; invariants are checked by
/// [`ParameterizedTypeBuilder::build`].
#[derive(Debug, Clone)]
pub struct ParameterizedTypeBuilder {
    name: DotName,
    arguments: Vec<Type>,
    owner: Option<Type>,
}

impl ParameterizedTypeBuilder {
    pub fn argument(mut self, argument: Type) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn owner(mut self, owner: Type) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn build(self) -> Result<Type, IndexError> {
        if self.arguments.is_empty() && self.owner.is_none() {
            return Err(IndexError::InvalidModel(
                "parameterized type without arguments or owner",
            ));
        }
        if self.arguments.iter().any(|a| a.kind() == TypeKind::Void) {
            return Err(IndexError::InvalidModel("void type argument"));
        }
        if let Some(owner) = &self.owner {
            if !matches!(owner.kind(), TypeKind::Class | TypeKind::Parameterized) {
                return Err(IndexError::InvalidModel(
                    "owner must be a class or parameterized type",
                ));
            }
        }
        Ok(Type::from_shape(TypeShape::Parameterized {
            name: self.name,
            arguments: self.arguments,
            owner: self.owner.map(Box::new),
        }))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for annotation in &self.annotations {
            write!(f, "@{} ", annotation.name())?;
        }
        match &self.shape {
            TypeShape::Void => f.write_str("void"),
            TypeShape::Primitive(p) => f.write_str(p.keyword()),
            TypeShape::Class(name) => write!(f, "{name}"),
            TypeShape::Array {
                component,
                dimensions,
            } => {
                write!(f, "{component}")?;
                for _ in 0..*dimensions {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            TypeShape::Parameterized {
                name,
                arguments,
                owner,
            } => {
                match owner {
                    Some(owner) => {
                        let simple = name.simple_class_name();
                        let local = simple.rsplit_once('$').map_or(simple.as_str(), |(_, l)| l);
                        write!(f, "{owner}.{local}")?
                    }
                    None => write!(f, "{name}")?,
                }
                if !arguments.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in arguments.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeShape::Wildcard(WildcardBound::Unbounded) => f.write_str("?"),
            TypeShape::Wildcard(WildcardBound::Extends(b)) => write!(f, "? extends {b}"),
            TypeShape::Wildcard(WildcardBound::Super(b)) => write!(f, "? super {b}"),
            TypeShape::TypeVariable { identifier, .. }
            | TypeShape::TypeVariableReference { identifier, .. } => f.write_str(identifier),
        }
    }
}
