//! Reader for JVM `.class` files.
//!
//! Only the declaration-level structure is decoded: constant pool, members,
//! signatures and (type) annotations. Method bodies are skipped.

#![forbid(unsafe_code)]

mod annotation;
mod classfile;
mod constant_pool;
mod descriptor;
mod error;
mod reader;
mod signature;

pub use crate::annotation::{
    descriptor_to_internal_name, Annotation, ConstValue, ElementValue, TypeAnnotation,
    TypeAnnotationTarget, TypePathEntry, TypePathKind, MAX_ELEMENT_VALUE_NESTING,
    SUPERCLASS_INDEX,
};
pub use crate::classfile::{
    ClassFile, ClassMember, ConstantValue, EnclosingMethod, InnerClassInfo, MethodParameter,
    RecordComponent, ACC_ABSTRACT, ACC_ANNOTATION, ACC_ENUM, ACC_FINAL, ACC_INTERFACE,
    ACC_MANDATED, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC, MAX_MAJOR_VERSION, MIN_MAJOR_VERSION,
};
pub use crate::constant_pool::{decode_modified_utf8, ConstantPool, CpInfo};
pub use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, parse_return_descriptor,
};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
pub use crate::signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, ClassSignature,
    ClassTypeSignature, MethodSignature, SimpleClassTypeSignature, TypeArgument, TypeParameter,
    TypeSignature, MAX_SIGNATURE_NESTING,
};
