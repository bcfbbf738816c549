mod builder;
mod composite;
mod generics;
mod hierarchy;
mod persistence;
mod support;
mod type_annotations;
