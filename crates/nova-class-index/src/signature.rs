//! Turns signature syntax trees into [`Type`]s, binding type variable
//! identifiers to their declarations.
//!
//! Type parameters are declared in two phases. Every name of a parameter list
//! is registered before any bound is translated, then the parameters are
//! finished in order. Inside bounds, every type variable use becomes a
//! [`TypeShape::TypeVariableReference`] carrying the declaration position.
//! Self-referential bounds such as `T extends Comparable<T>` therefore never
//! recurse, and a declaration never embeds another one, so chained bounds
//! (`B extends Map<A, A>`, `C extends Map<B, B>`, ...) stay linear in size.
//! Uses outside a parameter list become a copy of the finished declaration.

use nova_classfile::{
    ClassTypeSignature, FieldType, ReturnType, TypeArgument, TypeParameter, TypeSignature,
};
use smol_str::SmolStr;

use crate::error::{IndexError, Result};
use crate::name::{DotName, NameTable};
use crate::types::{PrimitiveType, Type, TypeParameterOwner, TypeShape, TypeVariableDeclaration};

struct Scope {
    owner: TypeParameterOwner,
    names: Vec<SmolStr>,
    finished: Vec<Type>,
}

impl Scope {
    fn empty(owner: TypeParameterOwner) -> Self {
        Scope {
            owner,
            names: Vec::new(),
            finished: Vec::new(),
        }
    }

    fn lookup(&self, identifier: &str, in_bounds: bool) -> Option<Type> {
        let position = self.names.iter().position(|n| n == identifier)?;
        Some(match self.finished.get(position) {
            Some(declared) if !in_bounds => {
                let mut copy = declared.clone();
                copy.annotations.clear();
                copy
            }
            _ => Type::type_variable_reference(
                identifier,
                Some(TypeVariableDeclaration {
                    owner: self.owner.clone(),
                    position: position as u32,
                }),
            ),
        })
    }
}

pub(crate) struct TypeTranslator<'n> {
    names: &'n mut NameTable,
    class: DotName,
    class_scope: Scope,
    method_scope: Option<Scope>,
    /// Unknown identifiers may belong to an enclosing class or method.
    nested: bool,
    /// Translating the bounds of a type parameter list.
    in_bounds: bool,
}

impl<'n> TypeTranslator<'n> {
    pub(crate) fn new(names: &'n mut NameTable, class: DotName, nested: bool) -> Self {
        TypeTranslator {
            names,
            class_scope: Scope::empty(TypeParameterOwner::Class(class.clone())),
            class,
            method_scope: None,
            nested,
            in_bounds: false,
        }
    }

    pub(crate) fn names(&mut self) -> &mut NameTable {
        self.names
    }

    /// Declares the class type parameters. `decorate` runs on each finished
    /// parameter before later siblings can copy it.
    pub(crate) fn declare_class_type_parameters(
        &mut self,
        params: &[TypeParameter],
        decorate: impl FnMut(u32, &mut Type),
    ) -> Result<Vec<Type>> {
        self.method_scope = None;
        self.class_scope = Scope {
            owner: TypeParameterOwner::Class(self.class.clone()),
            names: params.iter().map(|p| SmolStr::new(&p.name)).collect(),
            finished: Vec::new(),
        };
        self.finish_parameters(params, false, decorate)?;
        Ok(self.class_scope.finished.clone())
    }

    /// Opens the scope of the method at `position` and declares its type
    /// parameters. The scope stays open until [`TypeTranslator::end_method`].
    pub(crate) fn begin_method(
        &mut self,
        position: u32,
        params: &[TypeParameter],
        decorate: impl FnMut(u32, &mut Type),
    ) -> Result<Vec<Type>> {
        self.method_scope = Some(Scope {
            owner: TypeParameterOwner::Method {
                class: self.class.clone(),
                method: position,
            },
            names: params.iter().map(|p| SmolStr::new(&p.name)).collect(),
            finished: Vec::new(),
        });
        self.finish_parameters(params, true, decorate)?;
        Ok(self
            .method_scope
            .as_ref()
            .map(|scope| scope.finished.clone())
            .unwrap_or_default())
    }

    pub(crate) fn end_method(&mut self) {
        self.method_scope = None;
    }

    fn finish_parameters(
        &mut self,
        params: &[TypeParameter],
        method: bool,
        mut decorate: impl FnMut(u32, &mut Type),
    ) -> Result<()> {
        for (i, param) in params.iter().enumerate() {
            self.in_bounds = true;
            let bounds = self.bounds(param);
            self.in_bounds = false;
            let bounds = bounds?;
            let mut declared = Type::type_variable(&param.name, bounds, param.class_bound.is_none());
            decorate(i as u32, &mut declared);

            let scope = if method {
                self.method_scope.as_mut()
            } else {
                Some(&mut self.class_scope)
            };
            if let Some(scope) = scope {
                scope.finished.push(declared);
            }
        }
        Ok(())
    }

    fn bounds(&mut self, param: &TypeParameter) -> Result<Vec<Type>> {
        let mut bounds = Vec::with_capacity(1 + param.interface_bounds.len());
        if let Some(class_bound) = &param.class_bound {
            bounds.push(self.type_signature(class_bound)?);
        }
        for bound in &param.interface_bounds {
            bounds.push(self.type_signature(bound)?);
        }
        Ok(bounds)
    }

    pub(crate) fn type_signature(&mut self, sig: &TypeSignature) -> Result<Type> {
        match sig {
            TypeSignature::Base(base) => Ok(Type::primitive(PrimitiveType::from(*base))),
            TypeSignature::Class(class) => self.class_type(class),
            TypeSignature::TypeVariable(identifier) => self.type_variable(identifier),
            TypeSignature::Array(_) => {
                let mut dimensions = 0u32;
                let mut element = sig;
                while let TypeSignature::Array(inner) = element {
                    dimensions += 1;
                    element = inner;
                }
                let element = self.type_signature(element)?;
                Ok(Type::array_unchecked(element, dimensions))
            }
        }
    }

    pub(crate) fn return_signature(&mut self, sig: Option<&TypeSignature>) -> Result<Type> {
        match sig {
            Some(sig) => self.type_signature(sig),
            None => Ok(Type::void()),
        }
    }

    pub(crate) fn class_type(&mut self, sig: &ClassTypeSignature) -> Result<Type> {
        let mut internal = String::new();
        if let Some(package) = &sig.package {
            internal.push_str(package);
            internal.push('/');
        }

        let mut current: Option<Type> = None;
        let mut outer: Option<DotName> = None;
        for (i, segment) in sig.segments.iter().enumerate() {
            if i > 0 {
                internal.push('$');
            }
            internal.push_str(&segment.name);

            let name = match &outer {
                Some(outer) => self.names.nested_class_name(outer, &segment.name, &internal),
                None => self.names.class_name(&internal),
            };
            let arguments = segment
                .type_arguments
                .iter()
                .map(|arg| self.type_argument(arg))
                .collect::<Result<Vec<_>>>()?;
            // Only generic enclosing types are kept as owners.
            let owner = current
                .take()
                .filter(|t| matches!(t.shape, TypeShape::Parameterized { .. }));

            current = Some(if arguments.is_empty() && owner.is_none() {
                Type::class(name.clone())
            } else {
                Type::from_shape(TypeShape::Parameterized {
                    name: name.clone(),
                    arguments,
                    owner: owner.map(Box::new),
                })
            });
            outer = Some(name);
        }

        current.ok_or_else(|| IndexError::MalformedSignature("empty class type".to_string()))
    }

    fn type_argument(&mut self, arg: &TypeArgument) -> Result<Type> {
        Ok(match arg {
            TypeArgument::Any => Type::unbounded_wildcard(),
            TypeArgument::Exact(sig) => self.type_signature(sig)?,
            TypeArgument::Extends(sig) => Type::wildcard_extends(self.type_signature(sig)?),
            TypeArgument::Super(sig) => Type::wildcard_super(self.type_signature(sig)?),
        })
    }

    fn type_variable(&self, identifier: &str) -> Result<Type> {
        if let Some(found) = self
            .method_scope
            .as_ref()
            .and_then(|scope| scope.lookup(identifier, self.in_bounds))
        {
            return Ok(found);
        }
        if let Some(found) = self.class_scope.lookup(identifier, self.in_bounds) {
            return Ok(found);
        }
        if self.nested {
            tracing::debug!(
                target: "nova.class_index",
                class = %self.class,
                identifier,
                "type variable not declared locally; deferring to enclosing scopes"
            );
            return Ok(Type::type_variable_reference(identifier, None));
        }
        Err(IndexError::MalformedSignature(format!(
            "undeclared type variable `{identifier}` in {}",
            self.class
        )))
    }

    /// The erased type of a descriptor.
    pub(crate) fn field_type(&mut self, ty: &FieldType) -> Type {
        field_type(self.names, ty)
    }

    pub(crate) fn return_type(&mut self, ty: &ReturnType) -> Type {
        return_type(self.names, ty)
    }
}

pub(crate) fn field_type(names: &mut NameTable, ty: &FieldType) -> Type {
    match ty {
        FieldType::Base(base) => Type::primitive(PrimitiveType::from(*base)),
        FieldType::Object(internal) => Type::class(names.class_name(internal)),
        FieldType::Array(_) => {
            let mut dimensions = 0u32;
            let mut element = ty;
            while let FieldType::Array(inner) = element {
                dimensions += 1;
                element = inner;
            }
            Type::array_unchecked(field_type(names, element), dimensions)
        }
    }
}

pub(crate) fn return_type(names: &mut NameTable, ty: &ReturnType) -> Type {
    match ty {
        ReturnType::Void => Type::void(),
        ReturnType::Type(ty) => field_type(names, ty),
    }
}
