//! Accumulates indexed classes and freezes them into an [`Index`].

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;

use nova_classfile::ClassFile;

use crate::config::{DuplicateClassPolicy, IndexerConfig};
use crate::error::{IndexError, Result};
use crate::index::Index;
use crate::indexer::{index_class_file, IndexedClass};
use crate::info::{ClassInfo, NestingInfo};
use crate::name::{DotName, NameTable};
use crate::types::{Type, TypeParameterOwner, TypeShape, TypeVariableDeclaration};

/// Collects classes one at a time. Each call either adds the class or fails
/// without touching what was already collected.
///
/// ```no_run
/// # fn main() -> nova_class_index::Result<()> {
/// use nova_class_index::{IndexBuilder, IndexView};
///
/// let mut builder = IndexBuilder::new();
/// builder.index_class(&std::fs::read("Foo.class")?)?;
/// let index = builder.build();
/// for class in index.known_classes() {
///     println!("{}", class.name());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct IndexBuilder {
    config: IndexerConfig,
    names: NameTable,
    classes: HashMap<DotName, ClassInfo>,
    uses: HashMap<DotName, Vec<DotName>>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: IndexerConfig) -> Self {
        IndexBuilder {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Parses and indexes one class file.
    pub fn index_class(&mut self, bytes: &[u8]) -> Result<&ClassInfo> {
        let class = ClassFile::parse(bytes)?;
        self.index_class_file(&class)
    }

    /// Reads one class file to the end of `input` and indexes it.
    pub fn index_stream(&mut self, input: impl Read) -> Result<&ClassInfo> {
        let class = ClassFile::read_from(input)??;
        self.index_class_file(&class)
    }

    pub fn index_class_file(&mut self, class: &ClassFile) -> Result<&ClassInfo> {
        let indexed = index_class_file(class, &mut self.names, &self.config)?;
        self.insert(indexed, self.config.duplicate_classes)
    }

    /// Indexes `bytes`, replacing any class of the same name regardless of
    /// the configured policy.
    pub fn replace_class(&mut self, bytes: &[u8]) -> Result<&ClassInfo> {
        let class = ClassFile::parse(bytes)?;
        let indexed = index_class_file(&class, &mut self.names, &self.config)?;
        self.insert(indexed, DuplicateClassPolicy::Replace)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, name: &DotName) -> bool {
        self.classes.contains_key(name)
    }

    fn insert(&mut self, indexed: IndexedClass, policy: DuplicateClassPolicy) -> Result<&ClassInfo> {
        let IndexedClass { info, uses } = indexed;
        let name = info.name.clone();
        let slot = match self.classes.entry(name.clone()) {
            Entry::Vacant(vacant) => vacant.insert(info),
            Entry::Occupied(occupied) if policy == DuplicateClassPolicy::Reject => {
                return Err(IndexError::DuplicateClass(occupied.key().clone()));
            }
            Entry::Occupied(mut occupied) => {
                tracing::debug!(target: "nova.class_index", class = %name, "replacing indexed class");
                occupied.insert(info);
                occupied.into_mut()
            }
        };
        self.uses.insert(name, uses);
        Ok(slot)
    }

    /// Resolves type variables borrowed from enclosing classes and freezes
    /// the collected classes.
    pub fn build(self) -> Index {
        let IndexBuilder {
            config,
            mut classes,
            mut uses,
            ..
        } = self;

        let mut pending = 0usize;
        for name in resolution_order(&classes) {
            let Some(mut class) = classes.remove(&name) else {
                continue;
            };
            pending += resolve_enclosing_type_variables(&mut class, &classes);
            classes.insert(name, class);
        }
        if !config.known_users {
            uses.clear();
        }

        tracing::debug!(
            target: "nova.class_index",
            classes = classes.len(),
            unresolved_type_variables = pending,
            "froze class index"
        );
        Index::link(classes, uses)
    }
}

/// Enclosing classes before nested ones and supertypes before subtypes.
/// Ties go to the smallest name; a cycle is broken at its smallest member.
fn resolution_order(classes: &HashMap<DotName, ClassInfo>) -> Vec<DotName> {
    let mut in_degree: BTreeMap<DotName, usize> =
        classes.keys().map(|name| (name.clone(), 0)).collect();
    let mut edges: HashMap<&DotName, Vec<&DotName>> = HashMap::new();

    for (name, class) in classes {
        let parents = class
            .nesting
            .enclosing_class
            .iter()
            .chain(class.super_name.iter())
            .chain(class.interface_names());
        let parents: BTreeSet<&DotName> = parents
            .filter(|parent| *parent != name && classes.contains_key(*parent))
            .collect();
        for parent in parents {
            edges.entry(parent).or_default().push(name);
            if let Some(degree) = in_degree.get_mut(name) {
                *degree += 1;
            }
        }
    }

    let mut ready: BTreeSet<DotName> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();
    let mut order = Vec::with_capacity(classes.len());

    while !in_degree.is_empty() {
        let next = match ready.pop_first() {
            Some(next) => next,
            None => {
                let Some(smallest) = in_degree.keys().next().cloned() else {
                    break;
                };
                tracing::debug!(
                    target: "nova.class_index",
                    class = %smallest,
                    "breaking cycle in class hierarchy"
                );
                smallest
            }
        };
        if in_degree.remove(&next).is_none() {
            continue;
        }
        for child in edges.get(&next).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(*child) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert((*child).clone());
                }
            }
        }
        order.push(next);
    }
    order
}

/// Resolves pending type variable references in `class` against its
/// enclosing methods and classes. Inside bounds a reference gets its
/// declaration position; elsewhere it is replaced by the declaration itself.
/// Returns how many stayed pending.
fn resolve_enclosing_type_variables(
    class: &mut ClassInfo,
    classes: &HashMap<DotName, ClassInfo>,
) -> usize {
    let nesting = class.nesting.clone();
    let owner = class.name.clone();
    let mut cache: HashMap<String, Option<(TypeVariableDeclaration, Type)>> = HashMap::new();
    let mut unresolved = 0;

    for_each_type_mut(class, &mut |root| {
        root.visit_mut_in_bounds(false, &mut |node, in_bounds| {
            let TypeShape::TypeVariableReference {
                identifier,
                declaration: None,
            } = &node.shape
            else {
                return;
            };
            let identifier = identifier.to_string();
            let declared = cache
                .entry(identifier.clone())
                .or_insert_with(|| enclosing_declaration(classes, &nesting, &identifier));
            match declared {
                Some((declaration, _)) if in_bounds => {
                    node.shape = TypeShape::TypeVariableReference {
                        identifier: identifier.into(),
                        declaration: Some(declaration.clone()),
                    }
                }
                Some((_, declared)) => node.shape = declared.shape.clone(),
                None => {
                    tracing::debug!(
                        target: "nova.class_index",
                        class = %owner,
                        identifier = %identifier,
                        "type variable reference left pending"
                    );
                    unresolved += 1;
                }
            }
        })
    });
    unresolved
}

fn enclosing_declaration(
    classes: &HashMap<DotName, ClassInfo>,
    nesting: &NestingInfo,
    identifier: &str,
) -> Option<(TypeVariableDeclaration, Type)> {
    let mut visited = HashSet::new();
    let mut method = nesting.enclosing_method.as_ref();
    let mut next = nesting.enclosing_class.as_ref();

    while let Some(name) = next {
        if !visited.insert(name) {
            break;
        }
        let class = classes.get(name)?;
        if let Some(method) = method {
            let found = class
                .methods
                .iter()
                .enumerate()
                .filter(|(_, m)| m.name == method.name && m.descriptor == method.descriptor)
                .find_map(|(i, m)| {
                    let position = m
                        .type_parameters
                        .iter()
                        .position(|t| t.identifier() == Some(identifier))?;
                    Some((i, position, &m.type_parameters[position]))
                });
            if let Some((i, position, declared)) = found {
                let owner = TypeParameterOwner::Method {
                    class: class.name.clone(),
                    method: i as u32,
                };
                return Some((declared_at(owner, position), declared.clone()));
            }
        }
        if let Some(position) = class
            .type_parameters
            .iter()
            .position(|t| t.identifier() == Some(identifier))
        {
            let owner = TypeParameterOwner::Class(class.name.clone());
            return Some((
                declared_at(owner, position),
                class.type_parameters[position].clone(),
            ));
        }
        method = class.nesting.enclosing_method.as_ref();
        next = class.nesting.enclosing_class.as_ref();
    }
    None
}

fn declared_at(owner: TypeParameterOwner, position: usize) -> TypeVariableDeclaration {
    TypeVariableDeclaration {
        owner,
        position: position as u32,
    }
}

fn for_each_type_mut(class: &mut ClassInfo, f: &mut impl FnMut(&mut Type)) {
    class.type_parameters.iter_mut().for_each(&mut *f);
    class.super_class_type.iter_mut().for_each(&mut *f);
    class.interface_types.iter_mut().for_each(&mut *f);
    for field in &mut class.fields {
        f(&mut field.ty);
    }
    for method in &mut class.methods {
        method.type_parameters.iter_mut().for_each(&mut *f);
        for parameter in &mut method.parameters {
            f(&mut parameter.ty);
        }
        f(&mut method.return_type);
        method.receiver_type.iter_mut().for_each(&mut *f);
        method.exceptions.iter_mut().for_each(&mut *f);
    }
    for component in &mut class.record_components {
        f(&mut component.ty);
    }
}
