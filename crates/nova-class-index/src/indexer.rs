//! Per-class indexing: one parsed [`ClassFile`] in, one [`ClassInfo`] plus the
//! names it mentions out.
//!
//! Nothing here touches builder state, so a failure leaves previously indexed
//! classes alone. The only shared input is the caller's [`NameTable`].

use std::collections::BTreeSet;

use nova_classfile::{
    parse_class_signature, parse_field_descriptor, parse_field_signature,
    parse_method_descriptor, parse_method_signature, parse_return_descriptor, Annotation,
    ClassFile, ClassMember, ConstValue, ElementValue, FieldType, InnerClassInfo, TypeAnnotation,
    TypeAnnotationTarget, ACC_ENUM, ACC_MANDATED, ACC_STATIC, ACC_SYNTHETIC, SUPERCLASS_INDEX,
};
use smol_str::SmolStr;

use crate::annotations::{AnnotationInstance, AnnotationValue, TypePathStep};
use crate::attach::{attach, convert_path, EnclosingInstances};
use crate::config::IndexerConfig;
use crate::error::{IndexError, Result};
use crate::info::{
    receiver_type, ClassInfo, ConstantValue, EnclosingMethodInfo, FieldInfo, MethodInfo,
    MethodParameterInfo, NestingInfo, NestingKind, ParameterKind, RecordComponentInfo,
};
use crate::name::{DotName, NameTable};
use crate::signature::{field_type, return_type, TypeTranslator};
use crate::types::{Type, TypeShape};

/// A freshly indexed class and the classes it refers to.
#[derive(Debug, Clone)]
pub(crate) struct IndexedClass {
    pub(crate) info: ClassInfo,
    /// Sorted, never containing the class itself.
    pub(crate) uses: Vec<DotName>,
}

struct PendingTypeAnnotation {
    target: TypeAnnotationTarget,
    path: Vec<TypePathStep>,
    annotation: AnnotationInstance,
}

pub(crate) fn index_class_file(
    class: &ClassFile,
    names: &mut NameTable,
    config: &IndexerConfig,
) -> Result<IndexedClass> {
    let self_entry = class.self_inner_class_entry();
    let (name, nesting, instance_inner) = nesting(class, self_entry, names)?;
    let flags = self_entry.map_or(class.access_flags, |entry| entry.access_flags);
    let is_enum = class.access_flags & ACC_ENUM != 0;
    let instances = EnclosingInstances::from_inner_classes(&class.inner_classes, names);

    let nested = nesting.enclosing_class.is_some();
    let mut tr = TypeTranslator::new(names, name.clone(), nested);

    let class_type_annotations = type_annotations(
        tr.names(),
        &class.runtime_visible_type_annotations,
        &class.runtime_invisible_type_annotations,
        config,
    )?;

    let super_name = class
        .super_class
        .as_deref()
        .map(|internal| tr.names().class_name(internal));
    let (type_parameters, mut super_class_type, mut interface_types) = match &class.signature {
        Some(signature) => {
            let sig = parse_class_signature(signature)?;
            let type_parameters =
                tr.declare_class_type_parameters(&sig.type_parameters, |position, declared| {
                    decorate_type_parameter(
                        declared,
                        position,
                        &class_type_annotations,
                        &instances,
                        false,
                    )
                })?;
            let super_class_type = match &super_name {
                Some(_) => Some(tr.class_type(&sig.super_class)?),
                None => None,
            };
            let interfaces = sig
                .interfaces
                .iter()
                .map(|iface| tr.class_type(iface))
                .collect::<Result<Vec<_>>>()?;
            (type_parameters, super_class_type, interfaces)
        }
        None => {
            let interfaces = class
                .interfaces
                .iter()
                .map(|internal| Type::class(tr.names().class_name(internal)))
                .collect();
            (Vec::new(), super_name.clone().map(Type::class), interfaces)
        }
    };

    for pending in &class_type_annotations {
        let TypeAnnotationTarget::ClassExtends { index } = pending.target else {
            continue;
        };
        let root = if index == SUPERCLASS_INDEX {
            super_class_type.as_mut()
        } else {
            interface_types.get_mut(index as usize)
        };
        match root {
            Some(root) => attach(root, &instances, &pending.path, pending.annotation.clone()),
            None => skipped_target(&name, "supertype index out of range"),
        }
    }

    let annotations = declaration_annotations(
        tr.names(),
        &class.runtime_visible_annotations,
        &class.runtime_invisible_annotations,
        config,
    )?;

    let mut fields = Vec::with_capacity(class.fields.len());
    let mut next_ordinal = 0u32;
    for field in &class.fields {
        let enum_ordinal = if is_enum && field.access_flags & ACC_ENUM != 0 {
            next_ordinal += 1;
            Some(next_ordinal - 1)
        } else {
            None
        };
        fields.push(index_field(&mut tr, field, enum_ordinal, &instances, config)?);
    }

    let leading_constructor_parameters = if is_enum {
        2
    } else if instance_inner {
        1
    } else {
        0
    };
    let mut methods = Vec::with_capacity(class.methods.len());
    for (position, method) in class.methods.iter().enumerate() {
        let leading = if method.name == "<init>" {
            leading_constructor_parameters
        } else {
            0
        };
        methods.push(index_method(
            &mut tr,
            &name,
            &type_parameters,
            position as u32,
            method,
            leading,
            &instances,
            config,
        )?);
    }

    let record = class.record_components.is_some();
    let mut record_components = Vec::new();
    for component in class.record_components.iter().flatten() {
        let mut ty = match &component.signature {
            Some(sig) => tr.type_signature(&parse_field_signature(sig)?)?,
            None => descriptor_type(&mut tr, &component.descriptor)?,
        };
        for pending in type_annotations(
            tr.names(),
            &component.runtime_visible_type_annotations,
            &component.runtime_invisible_type_annotations,
            config,
        )? {
            if pending.target == TypeAnnotationTarget::Field {
                attach(&mut ty, &instances, &pending.path, pending.annotation);
            }
        }
        let annotations = declaration_annotations(
            tr.names(),
            &component.runtime_visible_annotations,
            &component.runtime_invisible_annotations,
            config,
        )?;
        record_components.push(RecordComponentInfo {
            name: SmolStr::new(&component.name),
            ty,
            annotations,
        });
    }

    let permitted_subclasses = class
        .permitted_subclasses
        .iter()
        .map(|internal| tr.names().class_name(internal))
        .collect();

    let info = ClassInfo {
        name,
        flags,
        major_version: class.major_version,
        minor_version: class.minor_version,
        super_name,
        super_class_type,
        interface_types,
        type_parameters,
        fields,
        methods,
        record,
        record_components,
        annotations,
        nesting,
        permitted_subclasses,
    };

    let uses = if config.known_users {
        collect_uses(class, &info, tr.names())?
    } else {
        Vec::new()
    };
    Ok(IndexedClass { info, uses })
}

/// Resolves the class name and its nesting. The flag reports an inner member
/// class whose constructors take the enclosing instance first.
fn nesting(
    class: &ClassFile,
    self_entry: Option<&InnerClassInfo>,
    names: &mut NameTable,
) -> Result<(DotName, NestingInfo, bool)> {
    if let Some(InnerClassInfo {
        outer_class: Some(outer),
        inner_name: Some(simple),
        access_flags,
        ..
    }) = self_entry
    {
        let outer = names.class_name(outer);
        let name = names.nested_class_name(&outer, simple, &class.this_class);
        let info = NestingInfo {
            kind: NestingKind::Inner,
            simple_name: Some(SmolStr::new(simple)),
            enclosing_class: Some(outer),
            enclosing_method: None,
        };
        return Ok((name, info, access_flags & ACC_STATIC == 0));
    }

    let name = names.class_name(&class.this_class);
    let Some(entry) = self_entry else {
        if class.enclosing_method.is_none() {
            return Ok((name, NestingInfo::top_level(), false));
        }
        let mut info = enclosing(class, names)?;
        info.kind = NestingKind::Anonymous;
        return Ok((name, info, false));
    };

    let mut info = enclosing(class, names)?;
    match &entry.inner_name {
        Some(simple) => {
            info.kind = NestingKind::Local;
            info.simple_name = Some(SmolStr::new(simple));
        }
        None => info.kind = NestingKind::Anonymous,
    }
    Ok((name, info, false))
}

fn enclosing(class: &ClassFile, names: &mut NameTable) -> Result<NestingInfo> {
    let mut info = NestingInfo::top_level();
    let Some(enclosing) = &class.enclosing_method else {
        return Ok(info);
    };
    let enclosing_class = names.class_name(&enclosing.class);
    if let (Some(method), Some(raw)) = (&enclosing.method_name, &enclosing.method_descriptor) {
        let descriptor = parse_method_descriptor(raw)?;
        info.enclosing_method = Some(EnclosingMethodInfo {
            class: enclosing_class.clone(),
            name: SmolStr::new(method),
            descriptor: SmolStr::new(raw),
            parameters: descriptor
                .params
                .iter()
                .map(|p| field_type(names, p))
                .collect(),
            return_type: return_type(names, &descriptor.return_type),
        });
    }
    info.enclosing_class = Some(enclosing_class);
    Ok(info)
}

fn index_field(
    tr: &mut TypeTranslator<'_>,
    field: &ClassMember,
    enum_ordinal: Option<u32>,
    instances: &EnclosingInstances,
    config: &IndexerConfig,
) -> Result<FieldInfo> {
    let mut ty = match &field.signature {
        Some(sig) => tr.type_signature(&parse_field_signature(sig)?)?,
        None => descriptor_type(tr, &field.descriptor)?,
    };
    for pending in type_annotations(
        tr.names(),
        &field.runtime_visible_type_annotations,
        &field.runtime_invisible_type_annotations,
        config,
    )? {
        if pending.target == TypeAnnotationTarget::Field {
            attach(&mut ty, instances, &pending.path, pending.annotation);
        }
    }
    let annotations = declaration_annotations(
        tr.names(),
        &field.runtime_visible_annotations,
        &field.runtime_invisible_annotations,
        config,
    )?;
    let constant_value = field.constant_value.as_ref().map(|value| match value {
        nova_classfile::ConstantValue::Int(v) => ConstantValue::Int(*v),
        nova_classfile::ConstantValue::Long(v) => ConstantValue::Long(*v),
        nova_classfile::ConstantValue::Float(v) => ConstantValue::Float(*v),
        nova_classfile::ConstantValue::Double(v) => ConstantValue::Double(*v),
        nova_classfile::ConstantValue::String(v) => ConstantValue::String(v.clone()),
    });

    Ok(FieldInfo {
        name: SmolStr::new(&field.name),
        flags: field.access_flags,
        ty,
        annotations,
        constant_value,
        enum_ordinal,
    })
}

fn index_method(
    tr: &mut TypeTranslator<'_>,
    class: &DotName,
    class_type_parameters: &[Type],
    position: u32,
    method: &ClassMember,
    leading: usize,
    instances: &EnclosingInstances,
    config: &IndexerConfig,
) -> Result<MethodInfo> {
    let descriptor = parse_method_descriptor(&method.descriptor)?;
    let signature = method
        .signature
        .as_deref()
        .map(parse_method_signature)
        .transpose()?;
    let pending = type_annotations(
        tr.names(),
        &method.runtime_visible_type_annotations,
        &method.runtime_invisible_type_annotations,
        config,
    )?;

    let empty = Vec::new();
    let declared_type_parameters = signature.as_ref().map_or(&empty, |s| &s.type_parameters);
    let type_parameters = tr.begin_method(position, declared_type_parameters, |i, declared| {
        decorate_type_parameter(declared, i, &pending, instances, true)
    })?;

    let count = descriptor.params.len();
    let kinds = parameter_kinds(
        method,
        count,
        signature.as_ref().map(|s| s.parameters.len()),
        leading,
    );
    let declared: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(_, kind)| **kind == ParameterKind::Declared)
        .map(|(i, _)| i)
        .collect();

    let mut parameter_types: Vec<Type> = descriptor
        .params
        .iter()
        .map(|p| tr.field_type(p))
        .collect();
    if let Some(sig) = &signature {
        let positions: Option<Vec<usize>> = if sig.parameters.len() == count {
            Some((0..count).collect())
        } else if sig.parameters.len() == declared.len() {
            Some(declared.clone())
        } else {
            None
        };
        match positions {
            Some(positions) => {
                for (param, position) in sig.parameters.iter().zip(positions) {
                    parameter_types[position] = tr.type_signature(param)?;
                }
            }
            None => tracing::debug!(
                target: "nova.class_index",
                class = %class,
                method = %method.name,
                signature_parameters = sig.parameters.len(),
                descriptor_parameters = count,
                "signature does not line up with the descriptor; using erased parameter types"
            ),
        }
    }

    let mut return_ty = match &signature {
        Some(sig) => tr.return_signature(sig.return_type.as_ref())?,
        None => tr.return_type(&descriptor.return_type),
    };
    let mut exceptions = match &signature {
        Some(sig) if !sig.throws.is_empty() => sig
            .throws
            .iter()
            .map(|t| tr.type_signature(t))
            .collect::<Result<Vec<_>>>()?,
        _ => method
            .exceptions
            .iter()
            .map(|internal| Type::class(tr.names().class_name(internal)))
            .collect(),
    };
    tr.end_method();

    let mut receiver: Option<Type> = None;
    for pending in &pending {
        let root = match pending.target {
            TypeAnnotationTarget::MethodReturn => Some(&mut return_ty),
            TypeAnnotationTarget::MethodReceiver if method.access_flags & ACC_STATIC == 0 => Some(
                receiver.get_or_insert_with(|| receiver_type(class, class_type_parameters)),
            ),
            TypeAnnotationTarget::MethodFormalParameter { index } => declared
                .get(index as usize)
                .and_then(|p| parameter_types.get_mut(*p)),
            TypeAnnotationTarget::Throws { index } => exceptions.get_mut(index as usize),
            TypeAnnotationTarget::MethodTypeParameter { .. }
            | TypeAnnotationTarget::MethodTypeParameterBound { .. }
            | TypeAnnotationTarget::Code { .. } => continue,
            _ => None,
        };
        match root {
            Some(root) => attach(root, instances, &pending.path, pending.annotation.clone()),
            None => skipped_target(class, "method type annotation target does not exist"),
        }
    }

    let mut parameter_annotations: Vec<Vec<AnnotationInstance>> = vec![Vec::new(); count];
    for (lists, visible) in [
        (&method.runtime_visible_parameter_annotations, true),
        (&method.runtime_invisible_parameter_annotations, false),
    ] {
        if !visible && !config.invisible_annotations {
            continue;
        }
        let Some(lists) = lists else {
            continue;
        };
        // javac sizes these by declared parameters, other compilers by
        // descriptor parameters.
        let positions: Vec<usize> = if lists.len() == count {
            (0..count).collect()
        } else {
            declared.clone()
        };
        for (i, list) in lists.iter().enumerate() {
            let Some(&position) = positions.get(i) else {
                skipped_target(class, "parameter annotation index out of range");
                break;
            };
            for raw in list {
                parameter_annotations[position].push(annotation_instance(tr.names(), raw, visible)?);
            }
        }
    }

    let names: Vec<Option<SmolStr>> = match &method.method_parameters {
        Some(params) if params.len() == count => params
            .iter()
            .map(|p| p.name.as_deref().map(SmolStr::new))
            .collect(),
        _ => vec![None; count],
    };
    let flags: Vec<u16> = match &method.method_parameters {
        Some(params) if params.len() == count => params.iter().map(|p| p.access_flags).collect(),
        _ => vec![0; count],
    };

    let parameters = parameter_types
        .into_iter()
        .zip(parameter_annotations)
        .zip(kinds)
        .enumerate()
        .map(|(i, ((ty, annotations), kind))| MethodParameterInfo {
            position: i as u16,
            name: names[i].clone(),
            flags: flags[i],
            kind,
            ty,
            annotations,
        })
        .collect();

    let annotations = declaration_annotations(
        tr.names(),
        &method.runtime_visible_annotations,
        &method.runtime_invisible_annotations,
        config,
    )?;
    let default_value = method
        .annotation_default
        .as_ref()
        .map(|value| element_value(tr.names(), value, true))
        .transpose()?;

    Ok(MethodInfo {
        name: SmolStr::new(&method.name),
        flags: method.access_flags,
        descriptor: SmolStr::new(&method.descriptor),
        type_parameters,
        parameters,
        return_type: return_ty,
        receiver_type: receiver,
        exceptions,
        annotations,
        default_value,
    })
}

/// Classifies each descriptor parameter. `MethodParameters` wins when it
/// covers every parameter; otherwise compiler conventions decide: leading
/// enclosing-instance or enum name/ordinal parameters, and trailing captured
/// values the generic signature leaves out.
fn parameter_kinds(
    method: &ClassMember,
    count: usize,
    signature_count: Option<usize>,
    leading: usize,
) -> Vec<ParameterKind> {
    if let Some(params) = &method.method_parameters {
        if params.len() == count {
            return params
                .iter()
                .map(|p| {
                    if p.access_flags & ACC_MANDATED != 0 {
                        ParameterKind::Mandated
                    } else if p.access_flags & ACC_SYNTHETIC != 0 {
                        ParameterKind::Synthetic
                    } else {
                        ParameterKind::Declared
                    }
                })
                .collect();
        }
    }

    let (leading, trailing) = match signature_count {
        Some(s) if s < count => {
            let leading = leading.min(count - s);
            (leading, count - s - leading)
        }
        _ => (leading.min(count), 0),
    };
    let leading_kind = if leading == 1 {
        ParameterKind::Mandated
    } else {
        ParameterKind::Synthetic
    };
    (0..count)
        .map(|i| {
            if i < leading {
                leading_kind
            } else if i >= count - trailing {
                ParameterKind::Synthetic
            } else {
                ParameterKind::Declared
            }
        })
        .collect()
}

fn decorate_type_parameter(
    declared: &mut Type,
    position: u32,
    pending: &[PendingTypeAnnotation],
    instances: &EnclosingInstances,
    method: bool,
) {
    for p in pending {
        let bound = match (p.target, method) {
            (TypeAnnotationTarget::ClassTypeParameter { index }, false)
            | (TypeAnnotationTarget::MethodTypeParameter { index }, true)
                if index as u32 == position =>
            {
                attach(declared, instances, &p.path, p.annotation.clone());
                continue;
            }
            (
                TypeAnnotationTarget::ClassTypeParameterBound {
                    type_parameter,
                    bound,
                },
                false,
            )
            | (
                TypeAnnotationTarget::MethodTypeParameterBound {
                    type_parameter,
                    bound,
                },
                true,
            ) if type_parameter as u32 == position => bound,
            _ => continue,
        };

        let TypeShape::TypeVariable {
            bounds,
            implicit_object_bound,
            ..
        } = &mut declared.shape
        else {
            continue;
        };
        // Bound 0 is the class bound, present or not.
        let index = if *implicit_object_bound {
            (bound as usize).checked_sub(1)
        } else {
            Some(bound as usize)
        };
        match index.and_then(|i| bounds.get_mut(i)) {
            Some(root) => attach(root, instances, &p.path, p.annotation.clone()),
            None => tracing::debug!(
                target: "nova.class_index",
                position,
                bound,
                "type parameter bound index out of range; dropping annotation"
            ),
        }
    }
}

fn skipped_target(class: &DotName, reason: &'static str) {
    tracing::debug!(target: "nova.class_index", class = %class, reason, "skipping type annotation");
}

fn descriptor_type(tr: &mut TypeTranslator<'_>, descriptor: &str) -> Result<Type> {
    Ok(tr.field_type(&parse_field_descriptor(descriptor)?))
}

fn type_annotations(
    names: &mut NameTable,
    visible: &[TypeAnnotation],
    invisible: &[TypeAnnotation],
    config: &IndexerConfig,
) -> Result<Vec<PendingTypeAnnotation>> {
    let invisible: &[TypeAnnotation] = if config.invisible_annotations {
        invisible
    } else {
        &[]
    };
    let mut out = Vec::with_capacity(visible.len() + invisible.len());
    for (list, runtime_visible) in [(visible, true), (invisible, false)] {
        for raw in list {
            out.push(PendingTypeAnnotation {
                target: raw.target,
                path: convert_path(&raw.type_path),
                annotation: annotation_instance(names, &raw.annotation, runtime_visible)?,
            });
        }
    }
    Ok(out)
}

fn declaration_annotations(
    names: &mut NameTable,
    visible: &[Annotation],
    invisible: &[Annotation],
    config: &IndexerConfig,
) -> Result<Vec<AnnotationInstance>> {
    let mut out = Vec::with_capacity(visible.len());
    for raw in visible {
        out.push(annotation_instance(names, raw, true)?);
    }
    if config.invisible_annotations {
        for raw in invisible {
            out.push(annotation_instance(names, raw, false)?);
        }
    }
    Ok(out)
}

fn annotation_instance(
    names: &mut NameTable,
    raw: &Annotation,
    runtime_visible: bool,
) -> Result<AnnotationInstance> {
    let internal = raw.type_internal_name.as_deref().ok_or_else(|| {
        IndexError::MalformedInput(nova_classfile::Error::InvalidDescriptor(
            raw.type_descriptor.clone(),
        ))
    })?;
    let mut builder =
        AnnotationInstance::builder(names.class_name(internal)).runtime_visible(runtime_visible);
    for (member, value) in &raw.elements {
        builder = builder.value(member, element_value(names, value, runtime_visible)?);
    }
    builder.build().map_err(|_| {
        IndexError::MalformedInput(nova_classfile::Error::MalformedAttribute(
            "duplicate annotation member",
        ))
    })
}

fn element_value(
    names: &mut NameTable,
    value: &ElementValue,
    runtime_visible: bool,
) -> Result<AnnotationValue> {
    Ok(match value {
        ElementValue::Const(constant) => match constant {
            ConstValue::Byte(v) => AnnotationValue::Byte(*v),
            ConstValue::Char(v) => AnnotationValue::Char(*v),
            ConstValue::Short(v) => AnnotationValue::Short(*v),
            ConstValue::Int(v) => AnnotationValue::Int(*v),
            ConstValue::Long(v) => AnnotationValue::Long(*v),
            ConstValue::Float(v) => AnnotationValue::Float(*v),
            ConstValue::Double(v) => AnnotationValue::Double(*v),
            ConstValue::Boolean(v) => AnnotationValue::Boolean(*v),
            ConstValue::String(v) => AnnotationValue::String(v.clone()),
        },
        ElementValue::Enum {
            type_descriptor,
            const_name,
        } => {
            let internal = nova_classfile::descriptor_to_internal_name(type_descriptor)
                .ok_or_else(|| {
                    IndexError::MalformedInput(nova_classfile::Error::InvalidDescriptor(
                        type_descriptor.clone(),
                    ))
                })?;
            AnnotationValue::Enum {
                type_name: names.class_name(&internal),
                constant: SmolStr::new(const_name),
            }
        }
        ElementValue::Class(descriptor) => {
            AnnotationValue::Class(return_type(names, &parse_return_descriptor(descriptor)?))
        }
        ElementValue::Annotation(nested) => AnnotationValue::Nested(Box::new(
            annotation_instance(names, nested, runtime_visible)?,
        )),
        ElementValue::Array(values) => AnnotationValue::Array(
            values
                .iter()
                .map(|v| element_value(names, v, runtime_visible))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

fn collect_uses(class: &ClassFile, info: &ClassInfo, names: &mut NameTable) -> Result<Vec<DotName>> {
    let mut uses = BTreeSet::new();
    for internal in &class.constant_pool_classes {
        if internal.starts_with('[') {
            if let FieldType::Object(element) = element_of(parse_field_descriptor(internal)?) {
                uses.insert(names.class_name(&element));
            }
        } else {
            uses.insert(names.class_name(internal));
        }
    }

    let mut record = |ty: &Type| {
        ty.visit(&mut |node| {
            if let Some(name) = node.name() {
                uses.insert(name.clone());
            }
        })
    };
    info.type_parameters.iter().for_each(&mut record);
    info.super_class_type.iter().for_each(&mut record);
    info.interface_types.iter().for_each(&mut record);
    for field in &info.fields {
        record(&field.ty);
    }
    for method in &info.methods {
        method.type_parameters.iter().for_each(&mut record);
        method.parameters.iter().for_each(|p| record(&p.ty));
        record(&method.return_type);
        method.exceptions.iter().for_each(&mut record);
    }
    for component in &info.record_components {
        record(&component.ty);
    }

    uses.remove(&info.name);
    Ok(uses.into_iter().collect())
}

fn element_of(ty: FieldType) -> FieldType {
    match ty {
        FieldType::Array(inner) => element_of(*inner),
        other => other,
    }
}
