//! A read-only union of several frozen indexes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::annotations::AnnotationInstance;
use crate::index::{Index, IndexView};
use crate::info::ClassInfo;
use crate::name::DotName;

/// Layers are ordered bottom to top: when two layers index the same class,
/// the later one shadows the earlier. Hierarchy, package and user tables are
/// computed over the merged view, so a subclass in one layer is found from
/// its superclass in another.
#[derive(Debug, Clone)]
pub struct CompositeIndex {
    layers: Vec<Arc<Index>>,
    owners: HashMap<DotName, usize>,
    merged: Index,
}

impl CompositeIndex {
    pub fn new(layers: Vec<Arc<Index>>) -> Self {
        let mut owners = HashMap::new();
        for (layer, index) in layers.iter().enumerate() {
            for name in index.class_names() {
                if let Some(shadowed) = owners.insert(name.clone(), layer) {
                    tracing::debug!(
                        target: "nova.class_index",
                        class = %name,
                        shadowed,
                        layer,
                        "class shadowed by a later layer"
                    );
                }
            }
        }

        let mut classes = HashMap::with_capacity(owners.len());
        let mut uses = HashMap::new();
        for (name, &layer) in &owners {
            let index = &layers[layer];
            if let Some(class) = index.classes.get(name) {
                classes.insert(name.clone(), class.clone());
            }
            if let Some(used) = index.uses.get(name) {
                uses.insert(name.clone(), used.clone());
            }
        }

        CompositeIndex {
            merged: Index::link(classes, uses),
            layers,
            owners,
        }
    }

    pub fn layers(&self) -> &[Arc<Index>] {
        &self.layers
    }

    /// The position of the layer that supplies `name`.
    pub fn layer_of(&self, name: &DotName) -> Option<usize> {
        self.owners.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}

impl IndexView for CompositeIndex {
    fn class_by_name(&self, name: &DotName) -> Option<&ClassInfo> {
        self.merged.class_by_name(name)
    }

    fn known_classes(&self) -> Vec<&ClassInfo> {
        self.merged.known_classes()
    }

    fn annotations(&self, annotation: &DotName) -> &[AnnotationInstance] {
        self.merged.annotations(annotation)
    }

    fn class_annotations(&self, class: &DotName) -> &[AnnotationInstance] {
        self.merged.class_annotations(class)
    }

    fn known_direct_subclasses(&self, class: &DotName) -> &[DotName] {
        self.merged.known_direct_subclasses(class)
    }

    fn all_known_subclasses(&self, class: &DotName) -> &[DotName] {
        self.merged.all_known_subclasses(class)
    }

    fn known_direct_subinterfaces(&self, interface: &DotName) -> &[DotName] {
        self.merged.known_direct_subinterfaces(interface)
    }

    fn all_known_subinterfaces(&self, interface: &DotName) -> &[DotName] {
        self.merged.all_known_subinterfaces(interface)
    }

    fn known_direct_implementors(&self, interface: &DotName) -> &[DotName] {
        self.merged.known_direct_implementors(interface)
    }

    fn all_known_implementors(&self, interface: &DotName) -> &[DotName] {
        self.merged.all_known_implementors(interface)
    }

    fn classes_in_package(&self, package: Option<&DotName>) -> &[DotName] {
        self.merged.classes_in_package(package)
    }

    fn subpackages(&self, package: Option<&DotName>) -> &[DotName] {
        self.merged.subpackages(package)
    }

    fn known_users(&self, class: &DotName) -> &[DotName] {
        self.merged.known_users(class)
    }
}
