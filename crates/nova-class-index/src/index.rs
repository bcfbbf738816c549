//! The frozen index and the query surface shared with
//! [`CompositeIndex`](crate::CompositeIndex).
//!
//! All lookup tables are derived from the class records by [`Index::link`],
//! which both the builder and the decoder call. Tables are always recomputed
//! from the whole class set, so they never depend on submission order.

use std::collections::{BTreeSet, HashMap};

use nova_classfile::SUPERCLASS_INDEX;

use crate::annotations::{
    AnnotationInstance, AnnotationTarget, TypePathStep, TypeTarget, TypeTargetUsage,
};
use crate::info::{ClassInfo, FieldInfo, MethodInfo, MethodParameterInfo, RecordComponentInfo};
use crate::name::DotName;
use crate::types::{Type, TypeParameterOwner, TypeShape, WildcardBound};

/// A declaration an [`AnnotationTarget`] resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    Class(&'a ClassInfo),
    Field(&'a ClassInfo, &'a FieldInfo),
    Method(&'a ClassInfo, &'a MethodInfo),
    MethodParameter(&'a ClassInfo, &'a MethodInfo, &'a MethodParameterInfo),
    RecordComponent(&'a ClassInfo, &'a RecordComponentInfo),
}

/// Read-only queries over a frozen index.
///
/// Name lists are sorted. Names that were never indexed simply have no
/// entries; supertypes outside the index are not an error.
pub trait IndexView {
    fn class_by_name(&self, name: &DotName) -> Option<&ClassInfo>;

    /// Every indexed class, sorted by name.
    fn known_classes(&self) -> Vec<&ClassInfo>;

    /// Every annotation of type `annotation`, declaration and type-use alike.
    fn annotations(&self, annotation: &DotName) -> &[AnnotationInstance];

    /// Every annotation anywhere inside `class`.
    fn class_annotations(&self, class: &DotName) -> &[AnnotationInstance];

    fn known_direct_subclasses(&self, class: &DotName) -> &[DotName];

    fn all_known_subclasses(&self, class: &DotName) -> &[DotName];

    fn known_direct_subinterfaces(&self, interface: &DotName) -> &[DotName];

    fn all_known_subinterfaces(&self, interface: &DotName) -> &[DotName];

    fn known_direct_implementors(&self, interface: &DotName) -> &[DotName];

    /// Classes implementing `interface` or any of its subinterfaces, and
    /// their subclasses.
    fn all_known_implementors(&self, interface: &DotName) -> &[DotName];

    /// `None` is the unnamed package.
    fn classes_in_package(&self, package: Option<&DotName>) -> &[DotName];

    /// The direct subpackages of `package`. A package counts when it, or a
    /// package below it, contains classes.
    fn subpackages(&self, package: Option<&DotName>) -> &[DotName];

    /// Classes whose declarations or constant pool mention `class`.
    fn known_users(&self, class: &DotName) -> &[DotName];

    fn resolve_target(&self, target: &AnnotationTarget) -> Option<Declaration<'_>> {
        match target {
            AnnotationTarget::Class(class) => self.class_by_name(class).map(Declaration::Class),
            AnnotationTarget::Field { class, position } => {
                let class = self.class_by_name(class)?;
                Some(Declaration::Field(
                    class,
                    class.fields.get(*position as usize)?,
                ))
            }
            AnnotationTarget::Method { class, position } => {
                let class = self.class_by_name(class)?;
                Some(Declaration::Method(
                    class,
                    class.methods.get(*position as usize)?,
                ))
            }
            AnnotationTarget::MethodParameter {
                class,
                method,
                position,
            } => {
                let class = self.class_by_name(class)?;
                let method = class.methods.get(*method as usize)?;
                Some(Declaration::MethodParameter(
                    class,
                    method,
                    method.parameter(*position)?,
                ))
            }
            AnnotationTarget::RecordComponent { class, position } => {
                let class = self.class_by_name(class)?;
                Some(Declaration::RecordComponent(
                    class,
                    class.record_components.get(*position as usize)?,
                ))
            }
            AnnotationTarget::Type(target) => self.resolve_target(&target.enclosing),
        }
    }

    /// The type variable a [`TypeShape::TypeVariableReference`] points at.
    /// `None` for other types and for references whose declaring class is not
    /// indexed.
    fn resolve_type_variable(&self, reference: &Type) -> Option<&Type> {
        let TypeShape::TypeVariableReference {
            declaration: Some(declaration),
            ..
        } = reference.shape()
        else {
            return None;
        };
        let type_parameters = match &declaration.owner {
            TypeParameterOwner::Class(class) => &self.class_by_name(class)?.type_parameters,
            TypeParameterOwner::Method { class, method } => {
                &self
                    .class_by_name(class)?
                    .methods
                    .get(*method as usize)?
                    .type_parameters
            }
        };
        type_parameters.get(declaration.position as usize)
    }
}

#[derive(Debug, Clone, Default)]
struct Hierarchy {
    direct_subclasses: HashMap<DotName, Vec<DotName>>,
    direct_subinterfaces: HashMap<DotName, Vec<DotName>>,
    direct_implementors: HashMap<DotName, Vec<DotName>>,
    all_subclasses: HashMap<DotName, Vec<DotName>>,
    all_subinterfaces: HashMap<DotName, Vec<DotName>>,
    all_implementors: HashMap<DotName, Vec<DotName>>,
}

/// An immutable, queryable set of indexed classes.
#[derive(Debug, Clone)]
pub struct Index {
    pub(crate) classes: HashMap<DotName, ClassInfo>,
    /// Per class, the names it mentions.
    pub(crate) uses: HashMap<DotName, Vec<DotName>>,
    sorted: Vec<DotName>,
    annotations: HashMap<DotName, Vec<AnnotationInstance>>,
    class_annotations: HashMap<DotName, Vec<AnnotationInstance>>,
    hierarchy: Hierarchy,
    packages: HashMap<Option<DotName>, Vec<DotName>>,
    subpackages: HashMap<Option<DotName>, Vec<DotName>>,
    users: HashMap<DotName, Vec<DotName>>,
}

impl Index {
    /// Derives every lookup table from the class records.
    pub(crate) fn link(
        classes: HashMap<DotName, ClassInfo>,
        uses: HashMap<DotName, Vec<DotName>>,
    ) -> Index {
        let mut sorted: Vec<DotName> = classes.keys().cloned().collect();
        sorted.sort();

        let mut annotations: HashMap<DotName, Vec<AnnotationInstance>> = HashMap::new();
        let mut class_annotations = HashMap::new();
        let mut hierarchy = Hierarchy::default();
        let mut packages: HashMap<Option<DotName>, Vec<DotName>> = HashMap::new();

        for name in &sorted {
            let Some(class) = classes.get(name) else {
                continue;
            };

            let derived = derive_annotations(class);
            for instance in &derived {
                annotations
                    .entry(instance.name().clone())
                    .or_default()
                    .push(instance.clone());
            }
            if !derived.is_empty() {
                class_annotations.insert(name.clone(), derived);
            }

            if class.is_interface() {
                for iface in class.interface_names() {
                    push(&mut hierarchy.direct_subinterfaces, iface, name);
                }
            } else {
                if let Some(super_name) = &class.super_name {
                    push(&mut hierarchy.direct_subclasses, super_name, name);
                }
                for iface in class.interface_names() {
                    push(&mut hierarchy.direct_implementors, iface, name);
                }
            }

            packages
                .entry(name.package_prefix())
                .or_default()
                .push(name.clone());
        }

        hierarchy.all_subclasses = closure(&hierarchy.direct_subclasses);
        hierarchy.all_subinterfaces = closure(&hierarchy.direct_subinterfaces);
        hierarchy.all_implementors = implementor_closure(&hierarchy);

        let mut subpackage_sets: HashMap<Option<DotName>, BTreeSet<DotName>> = HashMap::new();
        for package in packages.keys().flatten() {
            let mut child = package.clone();
            loop {
                let parent = child.package_prefix();
                let inserted = subpackage_sets
                    .entry(parent.clone())
                    .or_default()
                    .insert(child);
                match parent {
                    Some(parent) if inserted => child = parent,
                    _ => break,
                }
            }
        }
        let subpackages = subpackage_sets
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();

        let mut users: HashMap<DotName, Vec<DotName>> = HashMap::new();
        for name in &sorted {
            for used in uses.get(name).into_iter().flatten() {
                push(&mut users, used, name);
            }
        }

        tracing::debug!(
            target: "nova.class_index",
            classes = sorted.len(),
            annotation_types = annotations.len(),
            "linked class index"
        );

        Index {
            classes,
            uses,
            sorted,
            annotations,
            class_annotations,
            hierarchy,
            packages,
            subpackages,
            users,
        }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Indexed class names, sorted.
    pub fn class_names(&self) -> &[DotName] {
        &self.sorted
    }

    /// Names mentioned by `class`, as recorded at indexing time.
    pub fn uses_of(&self, class: &DotName) -> &[DotName] {
        slice(self.uses.get(class))
    }
}

fn push(map: &mut HashMap<DotName, Vec<DotName>>, key: &DotName, value: &DotName) {
    map.entry(key.clone()).or_default().push(value.clone());
}

fn slice<T>(entry: Option<&Vec<T>>) -> &[T] {
    entry.map(Vec::as_slice).unwrap_or(&[])
}

fn reachable(direct: &HashMap<DotName, Vec<DotName>>, start: &DotName) -> BTreeSet<DotName> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&DotName> = direct.get(start).into_iter().flatten().collect();
    while let Some(next) = stack.pop() {
        if seen.insert(next.clone()) {
            stack.extend(direct.get(next).into_iter().flatten());
        }
    }
    // A malformed hierarchy may loop back to the start.
    seen.remove(start);
    seen
}

fn closure(direct: &HashMap<DotName, Vec<DotName>>) -> HashMap<DotName, Vec<DotName>> {
    direct
        .keys()
        .map(|key| (key.clone(), reachable(direct, key).into_iter().collect()))
        .collect()
}

fn implementor_closure(hierarchy: &Hierarchy) -> HashMap<DotName, Vec<DotName>> {
    let keys: BTreeSet<&DotName> = hierarchy
        .direct_implementors
        .keys()
        .chain(hierarchy.direct_subinterfaces.keys())
        .collect();
    let mut out = HashMap::new();
    for key in keys {
        let interfaces = std::iter::once(key)
            .chain(slice(hierarchy.all_subinterfaces.get(key)).iter());
        let mut implementors = BTreeSet::new();
        for iface in interfaces {
            for implementor in slice(hierarchy.direct_implementors.get(iface)) {
                implementors.insert(implementor.clone());
                implementors.extend(
                    slice(hierarchy.all_subclasses.get(implementor))
                        .iter()
                        .cloned(),
                );
            }
        }
        if !implementors.is_empty() {
            out.insert(key.clone(), implementors.into_iter().collect());
        }
    }
    out
}

/// Targeted copies of every annotation in `class`, in declaration order.
fn derive_annotations(class: &ClassInfo) -> Vec<AnnotationInstance> {
    let mut out = Vec::new();
    let class_target = AnnotationTarget::Class(class.name.clone());

    for annotation in &class.annotations {
        out.push(annotation.with_target(class_target.clone()));
    }
    type_parameter_annotations(&class.type_parameters, &class_target, &mut out);
    if let Some(super_type) = &class.super_class_type {
        TypeWalker::new(
            &class_target,
            TypeTargetUsage::ClassExtends {
                position: SUPERCLASS_INDEX,
            },
            &mut out,
        )
        .walk_root(super_type);
    }
    for (i, iface) in class.interface_types.iter().enumerate() {
        TypeWalker::new(
            &class_target,
            TypeTargetUsage::ClassExtends { position: i as u16 },
            &mut out,
        )
        .walk_root(iface);
    }

    for (position, field) in class.fields.iter().enumerate() {
        let target = AnnotationTarget::Field {
            class: class.name.clone(),
            position: position as u32,
        };
        for annotation in &field.annotations {
            out.push(annotation.with_target(target.clone()));
        }
        TypeWalker::new(&target, TypeTargetUsage::Empty { receiver: false }, &mut out)
            .walk_root(&field.ty);
    }

    for (position, method) in class.methods.iter().enumerate() {
        let target = AnnotationTarget::Method {
            class: class.name.clone(),
            position: position as u32,
        };
        for annotation in &method.annotations {
            out.push(annotation.with_target(target.clone()));
        }
        for parameter in &method.parameters {
            let parameter_target = AnnotationTarget::MethodParameter {
                class: class.name.clone(),
                method: position as u32,
                position: parameter.position,
            };
            for annotation in &parameter.annotations {
                out.push(annotation.with_target(parameter_target.clone()));
            }
        }
        type_parameter_annotations(&method.type_parameters, &target, &mut out);
        TypeWalker::new(&target, TypeTargetUsage::Empty { receiver: false }, &mut out)
            .walk_root(&method.return_type);
        if let Some(receiver) = &method.receiver_type {
            TypeWalker::new(&target, TypeTargetUsage::Empty { receiver: true }, &mut out)
                .walk_root(receiver);
        }
        for parameter in &method.parameters {
            TypeWalker::new(
                &target,
                TypeTargetUsage::MethodParameter {
                    position: parameter.position,
                },
                &mut out,
            )
            .walk_root(&parameter.ty);
        }
        for (i, exception) in method.exceptions.iter().enumerate() {
            TypeWalker::new(
                &target,
                TypeTargetUsage::Throws { position: i as u16 },
                &mut out,
            )
            .walk_root(exception);
        }
    }

    for (position, component) in class.record_components.iter().enumerate() {
        let target = AnnotationTarget::RecordComponent {
            class: class.name.clone(),
            position: position as u32,
        };
        for annotation in &component.annotations {
            out.push(annotation.with_target(target.clone()));
        }
        TypeWalker::new(&target, TypeTargetUsage::Empty { receiver: false }, &mut out)
            .walk_root(&component.ty);
    }

    out
}

fn type_parameter_annotations(
    type_parameters: &[Type],
    enclosing: &AnnotationTarget,
    out: &mut Vec<AnnotationInstance>,
) {
    for (position, declared) in type_parameters.iter().enumerate() {
        let position = position as u32;
        TypeWalker::new(enclosing, TypeTargetUsage::TypeParameter { position }, out)
            .record(declared, &[]);
        if let TypeShape::TypeVariable { bounds, .. } = &declared.shape {
            for (bound, root) in bounds.iter().enumerate() {
                TypeWalker::new(
                    enclosing,
                    TypeTargetUsage::TypeParameterBound {
                        position,
                        bound: bound as u32,
                    },
                    out,
                )
                .walk_root(root);
            }
        }
    }
}

/// Records the annotations of one root type together with the canonical
/// type path of each annotated node.
struct TypeWalker<'a> {
    enclosing: &'a AnnotationTarget,
    usage: TypeTargetUsage,
    out: &'a mut Vec<AnnotationInstance>,
}

impl<'a> TypeWalker<'a> {
    fn new(
        enclosing: &'a AnnotationTarget,
        usage: TypeTargetUsage,
        out: &'a mut Vec<AnnotationInstance>,
    ) -> Self {
        TypeWalker {
            enclosing,
            usage,
            out,
        }
    }

    fn walk_root(mut self, root: &Type) {
        let mut path = Vec::new();
        self.walk(root, &mut path);
    }

    fn walk(&mut self, node: &Type, path: &mut Vec<TypePathStep>) {
        match &node.shape {
            TypeShape::Class(_) | TypeShape::Parameterized { .. } => self.walk_class(node, path),
            TypeShape::Array {
                component,
                dimensions,
            } => {
                self.record(node, path);
                let base = path.len();
                path.extend(std::iter::repeat(TypePathStep::Array).take(*dimensions as usize));
                self.walk(component, path);
                path.truncate(base);
            }
            TypeShape::Wildcard(WildcardBound::Extends(bound) | WildcardBound::Super(bound)) => {
                self.record(node, path);
                path.push(TypePathStep::WildcardBound);
                self.walk(bound, path);
                path.pop();
            }
            // Type variable bounds are walked from their declaration only.
            _ => self.record(node, path),
        }
    }

    fn walk_class(&mut self, node: &Type, path: &mut Vec<TypePathStep>) {
        let mut chain = vec![node];
        let mut current = node;
        while let TypeShape::Parameterized {
            owner: Some(owner), ..
        } = &current.shape
        {
            let owner: &Type = owner;
            chain.push(owner);
            current = owner;
        }

        let depth = chain.len();
        for (k, level) in chain.into_iter().enumerate() {
            let base = path.len();
            path.extend(std::iter::repeat(TypePathStep::Nested).take(depth - 1 - k));
            self.record(level, path);
            if let TypeShape::Parameterized { arguments, .. } = &level.shape {
                for (i, argument) in arguments.iter().enumerate() {
                    path.push(TypePathStep::TypeArgument(i as u8));
                    self.walk(argument, path);
                    path.pop();
                }
            }
            path.truncate(base);
        }
    }

    fn record(&mut self, node: &Type, path: &[TypePathStep]) {
        for annotation in &node.annotations {
            let target = TypeTarget {
                enclosing: self.enclosing.clone(),
                usage: self.usage,
                path: path.to_vec(),
                node: node.clone(),
            };
            self.out
                .push(annotation.with_target(AnnotationTarget::Type(Box::new(target))));
        }
    }
}

impl IndexView for Index {
    fn class_by_name(&self, name: &DotName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    fn known_classes(&self) -> Vec<&ClassInfo> {
        self.sorted
            .iter()
            .filter_map(|name| self.classes.get(name))
            .collect()
    }

    fn annotations(&self, annotation: &DotName) -> &[AnnotationInstance] {
        slice(self.annotations.get(annotation))
    }

    fn class_annotations(&self, class: &DotName) -> &[AnnotationInstance] {
        slice(self.class_annotations.get(class))
    }

    fn known_direct_subclasses(&self, class: &DotName) -> &[DotName] {
        slice(self.hierarchy.direct_subclasses.get(class))
    }

    fn all_known_subclasses(&self, class: &DotName) -> &[DotName] {
        slice(self.hierarchy.all_subclasses.get(class))
    }

    fn known_direct_subinterfaces(&self, interface: &DotName) -> &[DotName] {
        slice(self.hierarchy.direct_subinterfaces.get(interface))
    }

    fn all_known_subinterfaces(&self, interface: &DotName) -> &[DotName] {
        slice(self.hierarchy.all_subinterfaces.get(interface))
    }

    fn known_direct_implementors(&self, interface: &DotName) -> &[DotName] {
        slice(self.hierarchy.direct_implementors.get(interface))
    }

    fn all_known_implementors(&self, interface: &DotName) -> &[DotName] {
        slice(self.hierarchy.all_implementors.get(interface))
    }

    fn classes_in_package(&self, package: Option<&DotName>) -> &[DotName] {
        slice(self.packages.get(&package.cloned()))
    }

    fn subpackages(&self, package: Option<&DotName>) -> &[DotName] {
        slice(self.subpackages.get(&package.cloned()))
    }

    fn known_users(&self, class: &DotName) -> &[DotName] {
        slice(self.users.get(class))
    }
}
