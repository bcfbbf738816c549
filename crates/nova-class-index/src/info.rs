//! Declaration records. Built once per class, immutable afterwards.
//!
//! Cross-class links (supertypes, enclosing classes) are stored as names and
//! resolved through an [`IndexView`](crate::IndexView), so a record stays
//! valid whether or not the class it names was ever indexed.

use nova_classfile::{
    ACC_ABSTRACT, ACC_ANNOTATION, ACC_ENUM, ACC_FINAL, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC,
    ACC_SYNTHETIC,
};
use smol_str::SmolStr;

use crate::annotations::{AnnotationInstance, AnnotationValue};
use crate::name::DotName;
use crate::types::{Type, TypeShape};

pub(crate) const ACC_BRIDGE: u16 = 0x0040;
pub(crate) const ACC_VARARGS: u16 = 0x0080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestingKind {
    TopLevel,
    /// A member class, static or not.
    Inner,
    Local,
    Anonymous,
}

/// The method a local or anonymous class is declared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingMethodInfo {
    pub(crate) class: DotName,
    pub(crate) name: SmolStr,
    pub(crate) descriptor: SmolStr,
    pub(crate) parameters: Vec<Type>,
    pub(crate) return_type: Type,
}

impl EnclosingMethodInfo {
    pub fn enclosing_class(&self) -> &DotName {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Descriptor parameter types.
    pub fn parameters(&self) -> &[Type] {
        &self.parameters
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NestingInfo {
    pub(crate) kind: NestingKind,
    pub(crate) simple_name: Option<SmolStr>,
    pub(crate) enclosing_class: Option<DotName>,
    pub(crate) enclosing_method: Option<EnclosingMethodInfo>,
}

impl NestingInfo {
    pub(crate) fn top_level() -> Self {
        Self {
            kind: NestingKind::TopLevel,
            simple_name: None,
            enclosing_class: None,
            enclosing_method: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub(crate) name: DotName,
    pub(crate) flags: u16,
    pub(crate) major_version: u16,
    pub(crate) minor_version: u16,
    pub(crate) super_name: Option<DotName>,
    pub(crate) super_class_type: Option<Type>,
    pub(crate) interface_types: Vec<Type>,
    pub(crate) type_parameters: Vec<Type>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) record: bool,
    pub(crate) record_components: Vec<RecordComponentInfo>,
    pub(crate) annotations: Vec<AnnotationInstance>,
    pub(crate) nesting: NestingInfo,
    pub(crate) permitted_subclasses: Vec<DotName>,
}

impl ClassInfo {
    pub fn name(&self) -> &DotName {
        &self.name
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn is_public(&self) -> bool {
        self.flags & ACC_PUBLIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.flags & ACC_FINAL != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & ACC_ABSTRACT != 0
    }

    pub fn is_interface(&self) -> bool {
        self.flags & ACC_INTERFACE != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.flags & ACC_ANNOTATION != 0
    }

    pub fn is_enum(&self) -> bool {
        self.flags & ACC_ENUM != 0
    }

    pub fn is_record(&self) -> bool {
        self.record
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags & ACC_SYNTHETIC != 0
    }

    pub fn is_sealed(&self) -> bool {
        !self.permitted_subclasses.is_empty()
    }

    /// `None` only for `java.lang.Object` and `module-info`.
    pub fn super_name(&self) -> Option<&DotName> {
        self.super_name.as_ref()
    }

    /// The generic superclass type, falling back to the raw class.
    pub fn super_class_type(&self) -> Option<&Type> {
        self.super_class_type.as_ref()
    }

    pub fn interface_types(&self) -> &[Type] {
        &self.interface_types
    }

    pub fn interface_names(&self) -> impl Iterator<Item = &DotName> + '_ {
        self.interface_types.iter().filter_map(Type::name)
    }

    /// Each entry is a [`TypeShape::TypeVariable`].
    pub fn type_parameters(&self) -> &[Type] {
        &self.type_parameters
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    /// Finds a method by name and language-level parameter types, compared
    /// by equivalence so annotations do not matter.
    pub fn method(&self, name: &str, parameter_types: &[Type]) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| {
            if m.name != name {
                return false;
            }
            let params: Vec<&Type> = m.parameter_types().collect();
            params.len() == parameter_types.len()
                && params
                    .iter()
                    .zip(parameter_types)
                    .all(|(a, b)| a.equivalent(b))
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodInfo> + '_ {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    pub fn record_components(&self) -> &[RecordComponentInfo] {
        &self.record_components
    }

    pub fn record_component(&self, name: &str) -> Option<&RecordComponentInfo> {
        self.record_components.iter().find(|c| c.name == name)
    }

    /// Declaration annotations of the class itself.
    pub fn declared_annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn declared_annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.annotations.iter().find(|a| a.name() == name)
    }

    pub fn nesting_kind(&self) -> NestingKind {
        self.nesting.kind
    }

    /// Source-level simple name; `None` for anonymous classes.
    pub fn simple_name(&self) -> Option<&str> {
        match self.nesting.kind {
            NestingKind::TopLevel => Some(self.name.local_simple()),
            NestingKind::Anonymous => None,
            NestingKind::Inner | NestingKind::Local => self.nesting.simple_name.as_deref(),
        }
    }

    pub fn enclosing_class(&self) -> Option<&DotName> {
        self.nesting.enclosing_class.as_ref()
    }

    pub fn enclosing_method(&self) -> Option<&EnclosingMethodInfo> {
        self.nesting.enclosing_method.as_ref()
    }

    pub fn permitted_subclasses(&self) -> &[DotName] {
        &self.permitted_subclasses
    }

    /// Enum constants ordered by ordinal.
    pub fn enum_constants(&self) -> Vec<&FieldInfo> {
        let mut constants: Vec<&FieldInfo> =
            self.fields.iter().filter(|f| f.is_enum_constant()).collect();
        constants.sort_by_key(|f| f.enum_ordinal);
        constants
    }

    /// The receiver type of instance methods: the class itself, parameterized
    /// by its own type parameters when it is generic.
    pub fn default_receiver_type(&self) -> Type {
        receiver_type(&self.name, &self.type_parameters)
    }
}

pub(crate) fn receiver_type(class: &DotName, type_parameters: &[Type]) -> Type {
    if type_parameters.is_empty() {
        return Type::class(class.clone());
    }
    let arguments = type_parameters
        .iter()
        .map(|tp| Type {
            shape: tp.shape.clone(),
            annotations: Vec::new(),
        })
        .collect();
    Type::from_shape(TypeShape::Parameterized {
        name: class.clone(),
        arguments,
        owner: None,
    })
}

impl DotName {
    /// The class name without its package.
    fn local_simple(&self) -> &str {
        let local = self.local();
        match local.rfind('.') {
            Some(i) => &local[i + 1..],
            None => local,
        }
    }
}

/// The value of a `ConstantValue` attribute.
#[derive(Debug, Clone)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl PartialEq for ConstantValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstantValue::Int(a), ConstantValue::Int(b)) => a == b,
            (ConstantValue::Long(a), ConstantValue::Long(b)) => a == b,
            (ConstantValue::Float(a), ConstantValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::Double(a), ConstantValue::Double(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::String(a), ConstantValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstantValue {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub(crate) name: SmolStr,
    pub(crate) flags: u16,
    pub(crate) ty: Type,
    pub(crate) annotations: Vec<AnnotationInstance>,
    pub(crate) constant_value: Option<ConstantValue>,
    pub(crate) enum_ordinal: Option<u32>,
}

impl FieldInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn field_type(&self) -> &Type {
        &self.ty
    }

    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.flags & ACC_FINAL != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags & ACC_SYNTHETIC != 0
    }

    pub fn is_enum_constant(&self) -> bool {
        self.enum_ordinal.is_some()
    }

    /// Position among the enum constants in declaration order.
    pub fn enum_constant_ordinal(&self) -> Option<u32> {
        self.enum_ordinal
    }

    /// Compile-time constant value, if the field has one.
    pub fn constant_value(&self) -> Option<&ConstantValue> {
        self.constant_value.as_ref()
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.annotations.iter().find(|a| a.name() == name)
    }
}

/// Whether a parameter appears in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Declared,
    /// Compiler-introduced, e.g. captured locals or an enum constructor's
    /// name and ordinal.
    Synthetic,
    /// Implicitly declared by the language, e.g. the enclosing instance of an
    /// inner class constructor.
    Mandated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameterInfo {
    pub(crate) position: u16,
    pub(crate) name: Option<SmolStr>,
    pub(crate) flags: u16,
    pub(crate) kind: ParameterKind,
    pub(crate) ty: Type,
    pub(crate) annotations: Vec<AnnotationInstance>,
}

impl MethodParameterInfo {
    /// Descriptor position.
    pub fn position(&self) -> u16 {
        self.position
    }

    /// From the `MethodParameters` attribute, when compiled with `-parameters`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn parameter_type(&self) -> &Type {
        &self.ty
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.annotations.iter().find(|a| a.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub(crate) name: SmolStr,
    pub(crate) flags: u16,
    pub(crate) descriptor: SmolStr,
    pub(crate) type_parameters: Vec<Type>,
    pub(crate) parameters: Vec<MethodParameterInfo>,
    pub(crate) return_type: Type,
    pub(crate) receiver_type: Option<Type>,
    pub(crate) exceptions: Vec<Type>,
    pub(crate) annotations: Vec<AnnotationInstance>,
    pub(crate) default_value: Option<AnnotationValue>,
}

impl MethodInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & ACC_ABSTRACT != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.flags & ACC_SYNTHETIC != 0
    }

    pub fn is_bridge(&self) -> bool {
        self.flags & ACC_BRIDGE != 0
    }

    pub fn is_varargs(&self) -> bool {
        self.flags & ACC_VARARGS != 0
    }

    pub fn type_parameters(&self) -> &[Type] {
        &self.type_parameters
    }

    /// Parameters as declared in source.
    pub fn parameters(&self) -> impl Iterator<Item = &MethodParameterInfo> + '_ {
        self.parameters
            .iter()
            .filter(|p| p.kind == ParameterKind::Declared)
    }

    /// Every descriptor parameter, synthetic and mandated ones included.
    pub fn descriptor_parameters(&self) -> &[MethodParameterInfo] {
        &self.parameters
    }

    pub fn parameters_count(&self) -> usize {
        self.parameters().count()
    }

    pub fn descriptor_parameters_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter_types(&self) -> impl Iterator<Item = &Type> + '_ {
        self.parameters().map(|p| &p.ty)
    }

    pub fn descriptor_parameter_types(&self) -> impl Iterator<Item = &Type> + '_ {
        self.parameters.iter().map(|p| &p.ty)
    }

    /// By descriptor position.
    pub fn parameter(&self, position: u16) -> Option<&MethodParameterInfo> {
        self.parameters.get(position as usize)
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Set only when the receiver carries type annotations; otherwise see
    /// [`ClassInfo::default_receiver_type`]. Always `None` for static methods.
    pub fn receiver_type(&self) -> Option<&Type> {
        self.receiver_type.as_ref()
    }

    pub fn exceptions(&self) -> &[Type] {
        &self.exceptions
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.annotations.iter().find(|a| a.name() == name)
    }

    /// `AnnotationDefault` of an annotation interface member.
    pub fn default_value(&self) -> Option<&AnnotationValue> {
        self.default_value.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponentInfo {
    pub(crate) name: SmolStr,
    pub(crate) ty: Type,
    pub(crate) annotations: Vec<AnnotationInstance>,
}

impl RecordComponentInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_type(&self) -> &Type {
        &self.ty
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn annotation(&self, name: &DotName) -> Option<&AnnotationInstance> {
        self.annotations.iter().find(|a| a.name() == name)
    }
}
