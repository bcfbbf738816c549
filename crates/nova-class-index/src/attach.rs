//! Threads type-use annotations onto the node of a [`Type`] tree that a
//! type path designates.
//!
//! The walk is lenient. A step that cannot apply to the node reached so far is
//! skipped, a type argument index past the end stops the walk, and the
//! annotation lands on the last node reached.
//!
//! Nested-type steps count the enclosing instances of an inner type. Owners
//! that signatures leave out (non-generic ones) are rebuilt from the class
//! file's `InnerClasses` table for the walk and kept only when annotated.
//! Without that table, steps are counted from the outermost generic owner,
//! so a path that is short by the missing levels still finds the right node.

use std::collections::{HashMap, HashSet};

use nova_classfile::{InnerClassInfo, TypePathEntry, TypePathKind, ACC_STATIC};

use crate::annotations::{AnnotationInstance, TypePathStep};
use crate::name::{DotName, NameTable};
use crate::types::{Type, TypeShape, WildcardBound};

/// The immediately enclosing class of each non-static member class a class
/// file declares in its `InnerClasses` table.
#[derive(Debug, Default)]
pub(crate) struct EnclosingInstances(HashMap<DotName, DotName>);

impl EnclosingInstances {
    pub(crate) fn from_inner_classes(entries: &[InnerClassInfo], names: &mut NameTable) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            let (Some(outer), Some(simple)) = (&entry.outer_class, &entry.inner_name) else {
                continue;
            };
            if entry.access_flags & ACC_STATIC != 0 {
                continue;
            }
            let outer = names.class_name(outer);
            let inner = names.nested_class_name(&outer, simple, &entry.inner_class);
            map.insert(inner, outer);
        }
        EnclosingInstances(map)
    }

    /// `name`'s enclosing instance chain as an owner type, outermost last.
    fn owner_of(&self, name: &DotName) -> Option<Box<Type>> {
        let mut outers = Vec::new();
        let mut seen = HashSet::new();
        let mut current = name;
        while let Some(outer) = self.0.get(current) {
            if !seen.insert(outer) {
                tracing::debug!(
                    target: "nova.class_index",
                    class = %name,
                    "InnerClasses nesting is cyclic; truncating the owner chain"
                );
                break;
            }
            outers.push(outer);
            current = outer;
        }
        outers.into_iter().rev().fold(None, |owner, outer| {
            Some(Box::new(match owner {
                None => Type::class(outer.clone()),
                Some(owner) => Type::from_shape(TypeShape::Parameterized {
                    name: outer.clone(),
                    arguments: Vec::new(),
                    owner: Some(owner),
                }),
            }))
        })
    }
}

pub(crate) fn convert_path(entries: &[TypePathEntry]) -> Vec<TypePathStep> {
    entries
        .iter()
        .map(|entry| match entry.kind {
            TypePathKind::Array => TypePathStep::Array,
            TypePathKind::Nested => TypePathStep::Nested,
            TypePathKind::WildcardBound => TypePathStep::WildcardBound,
            TypePathKind::TypeArgument => TypePathStep::TypeArgument(entry.type_argument_index),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hop {
    /// Strips one array dimension.
    Component,
    Owner,
    Argument(usize),
    Bound,
}

/// Where an array walk currently stands: `stripped` dimensions of `node`
/// have been consumed.
#[derive(Clone, Copy)]
struct Cursor<'t> {
    node: &'t Type,
    stripped: u32,
}

impl<'t> Cursor<'t> {
    fn at(node: &'t Type) -> Self {
        Cursor { node, stripped: 0 }
    }

    /// The node this cursor designates when no array dimensions remain.
    fn settled(self) -> Option<&'t Type> {
        match &self.node.shape {
            TypeShape::Array { .. } if self.stripped > 0 => None,
            _ => Some(self.node),
        }
    }

    fn remaining_dimensions(&self) -> u32 {
        match &self.node.shape {
            TypeShape::Array { dimensions, .. } => dimensions - self.stripped,
            _ => 0,
        }
    }
}

fn owner_chain_len(node: &Type) -> usize {
    let mut len = 1;
    let mut current = node;
    while let TypeShape::Parameterized {
        owner: Some(owner), ..
    } = &current.shape
    {
        len += 1;
        current = owner;
    }
    len
}

/// Consumes the nested-type steps at `steps[*i..]` for the class type at
/// `node` and emits the owner hops they select.
fn enter_class_chain<'t>(
    node: &'t Type,
    steps: &[TypePathStep],
    i: &mut usize,
    hops: &mut Vec<Hop>,
) -> &'t Type {
    let mut nested = 0;
    while steps.get(*i + nested) == Some(&TypePathStep::Nested) {
        nested += 1;
    }
    *i += nested;

    let len = owner_chain_len(node);
    if nested > len - 1 {
        tracing::debug!(
            target: "nova.class_index",
            nested,
            depth = len,
            "type path has more nested steps than the owner chain; ignoring the excess"
        );
    }
    let up = len - 1 - nested.min(len - 1);
    let mut current = node;
    for _ in 0..up {
        if let TypeShape::Parameterized {
            owner: Some(owner), ..
        } = &current.shape
        {
            hops.push(Hop::Owner);
            current = owner;
        }
    }
    current
}

fn is_class_like(node: &Type) -> bool {
    matches!(
        node.shape,
        TypeShape::Class(_) | TypeShape::Parameterized { .. }
    )
}

/// Resolves a type path to concrete hops without touching the tree.
fn plan(root: &Type, steps: &[TypePathStep]) -> Vec<Hop> {
    let mut hops = Vec::new();
    let mut i = 0;
    let mut cursor = Cursor::at(root);
    if is_class_like(root) {
        cursor = Cursor::at(enter_class_chain(root, steps, &mut i, &mut hops));
    }

    while let Some(step) = steps.get(i) {
        i += 1;
        match step {
            TypePathStep::Array => {
                if cursor.remaining_dimensions() == 0 {
                    skip(step);
                    continue;
                }
                hops.push(Hop::Component);
                cursor.stripped += 1;
                if cursor.remaining_dimensions() == 0 {
                    if let TypeShape::Array { component, .. } = &cursor.node.shape {
                        cursor = Cursor::at(component);
                        if is_class_like(component) {
                            cursor =
                                Cursor::at(enter_class_chain(component, steps, &mut i, &mut hops));
                        }
                    }
                }
            }
            TypePathStep::Nested => skip(step),
            TypePathStep::WildcardBound => {
                let Some(node) = cursor.settled() else {
                    skip(step);
                    continue;
                };
                match &node.shape {
                    TypeShape::Wildcard(WildcardBound::Extends(bound))
                    | TypeShape::Wildcard(WildcardBound::Super(bound)) => {
                        hops.push(Hop::Bound);
                        cursor = Cursor::at(bound);
                        if is_class_like(bound) {
                            cursor = Cursor::at(enter_class_chain(bound, steps, &mut i, &mut hops));
                        }
                    }
                    _ => skip(step),
                }
            }
            TypePathStep::TypeArgument(index) => {
                let Some(node) = cursor.settled() else {
                    skip(step);
                    continue;
                };
                let TypeShape::Parameterized { arguments, .. } = &node.shape else {
                    skip(step);
                    continue;
                };
                let Some(argument) = arguments.get(*index as usize) else {
                    tracing::debug!(
                        target: "nova.class_index",
                        index,
                        arguments = arguments.len(),
                        "type argument index out of range; stopping the type path walk"
                    );
                    break;
                };
                hops.push(Hop::Argument(*index as usize));
                cursor = Cursor::at(argument);
                if is_class_like(argument) {
                    cursor = Cursor::at(enter_class_chain(argument, steps, &mut i, &mut hops));
                }
            }
        }
    }
    hops
}

fn skip(step: &TypePathStep) {
    tracing::debug!(
        target: "nova.class_index",
        ?step,
        "type path step does not apply here; skipping"
    );
}

fn follow<'t>(node: &'t mut Type, hops: &[Hop]) -> Option<&'t mut Type> {
    let Some((hop, rest)) = hops.split_first() else {
        return Some(node);
    };
    let next = match (hop, &mut node.shape) {
        (
            Hop::Component,
            TypeShape::Array {
                component,
                dimensions,
            },
        ) => {
            if *dimensions > 1 {
                // Split off the outermost dimension so the remaining ones
                // form a node of their own.
                let inner_dimensions = *dimensions - 1;
                let element = std::mem::replace(component.as_mut(), Type::void());
                **component = Type::from_shape(TypeShape::Array {
                    component: Box::new(element),
                    dimensions: inner_dimensions,
                });
                *dimensions = 1;
            }
            component.as_mut()
        }
        (
            Hop::Owner,
            TypeShape::Parameterized {
                owner: Some(owner), ..
            },
        ) => owner.as_mut(),
        (Hop::Argument(index), TypeShape::Parameterized { arguments, .. }) => {
            arguments.get_mut(*index)?
        }
        (
            Hop::Bound,
            TypeShape::Wildcard(WildcardBound::Extends(bound) | WildcardBound::Super(bound)),
        ) => bound.as_mut(),
        _ => return None,
    };
    follow(next, rest)
}

/// Re-merges array nodes split by [`follow`] that ended up unannotated.
fn fold_arrays(root: &mut Type) {
    root.visit_mut(&mut |node| {
        while let TypeShape::Array {
            component,
            dimensions,
        } = &mut node.shape
        {
            if !component.annotations.is_empty() {
                break;
            }
            let TypeShape::Array {
                component: inner,
                dimensions: inner_dimensions,
            } = &mut component.shape
            else {
                break;
            };
            let merged = *dimensions + *inner_dimensions;
            let element = std::mem::replace(inner.as_mut(), Type::void());
            **component = element;
            *dimensions = merged;
        }
    });
}

/// Gives every class type whose owner chain ends at a non-static member
/// class the missing enclosing levels as owners.
fn expose_owners(node: &mut Type, enclosing: &EnclosingInstances) {
    match &mut node.shape {
        TypeShape::Class(name) => {
            if let Some(owner) = enclosing.owner_of(name) {
                let name = name.clone();
                node.shape = TypeShape::Parameterized {
                    name,
                    arguments: Vec::new(),
                    owner: Some(owner),
                };
            }
        }
        TypeShape::Parameterized {
            name,
            arguments,
            owner,
        } => {
            for argument in arguments {
                expose_owners(argument, enclosing);
            }
            match owner.as_mut() {
                Some(owner) => expose_owners(owner, enclosing),
                None => *owner = enclosing.owner_of(name),
            }
        }
        TypeShape::Array { component, .. } => expose_owners(component, enclosing),
        TypeShape::Wildcard(WildcardBound::Extends(bound) | WildcardBound::Super(bound)) => {
            expose_owners(bound, enclosing)
        }
        _ => {}
    }
}

/// Undoes [`expose_owners`] for owners that stayed unannotated.
fn prune_owners(node: &mut Type) {
    match &mut node.shape {
        TypeShape::Parameterized {
            name,
            arguments,
            owner,
        } => {
            for argument in arguments.iter_mut() {
                prune_owners(argument);
            }
            if let Some(inner) = owner.as_mut() {
                prune_owners(inner);
                if matches!(inner.shape, TypeShape::Class(_)) && inner.annotations.is_empty() {
                    *owner = None;
                }
            }
            if arguments.is_empty() && owner.is_none() {
                let name = name.clone();
                node.shape = TypeShape::Class(name);
            }
        }
        TypeShape::Array { component, .. } => prune_owners(component),
        TypeShape::Wildcard(WildcardBound::Extends(bound) | WildcardBound::Super(bound)) => {
            prune_owners(bound)
        }
        _ => {}
    }
}

/// Attaches `annotation` to the node of `root` designated by `path`.
pub(crate) fn attach(
    root: &mut Type,
    enclosing: &EnclosingInstances,
    path: &[TypePathStep],
    annotation: AnnotationInstance,
) {
    expose_owners(root, enclosing);
    let hops = plan(root, path);
    match follow(root, &hops) {
        Some(node) => node.annotations.push(annotation.into_targetless()),
        None => tracing::debug!(
            target: "nova.class_index",
            annotation = %annotation.name(),
            "type path plan no longer matches the type; dropping annotation"
        ),
    }
    prune_owners(root);
    fold_arrays(root);
}
