//! Static annotation and hierarchy index over compiled JVM classes.
//!
//! Class files are fed to an [`IndexBuilder`] one at a time. Freezing the
//! builder yields an immutable [`Index`] answering questions such as "which
//! declarations carry `@Entity`", "what implements `Runnable`" or "who
//! refers to `Foo`", without loading any class. Indexes can be persisted
//! with [`write_index`] and layered with [`CompositeIndex`].
//!
//! Generic signatures are kept intact: every [`Type`] carries its type
//! arguments, bounds and type-use annotations, and each annotation handed
//! out by the index knows exactly which declaration or type node it sits on.

#![forbid(unsafe_code)]

mod annotations;
mod attach;
mod builder;
mod composite;
mod config;
mod error;
mod index;
mod indexer;
mod info;
mod name;
mod persist;
mod signature;
mod types;

pub use crate::annotations::{
    AnnotationInstance, AnnotationInstanceBuilder, AnnotationMember, AnnotationTarget,
    AnnotationTargetKind, AnnotationValue, TypePathStep, TypeTarget, TypeTargetUsage,
};
pub use crate::builder::IndexBuilder;
pub use crate::composite::CompositeIndex;
pub use crate::config::{DuplicateClassPolicy, IndexerConfig};
pub use crate::error::{IndexError, Result};
pub use crate::index::{Declaration, Index, IndexView};
pub use crate::info::{
    ClassInfo, ConstantValue, EnclosingMethodInfo, FieldInfo, MethodInfo, MethodParameterInfo,
    NestingKind, ParameterKind, RecordComponentInfo,
};
pub use crate::name::{DotName, NameTable};
pub use crate::persist::{
    read_index, read_index_from, write_index, write_index_to, FormatVersion,
    DECODED_DEPTH_LIMIT, DECODED_NODES_MIN, DECODED_NODES_PER_BYTE, HEADER_LEN, MAGIC,
};
pub use crate::types::{
    ParameterizedTypeBuilder, PrimitiveType, Type, TypeKind, TypeParameterOwner, TypeShape,
    TypeVariableDeclaration, WildcardBound,
};
