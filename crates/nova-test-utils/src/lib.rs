//! Utilities shared by Nova tests.
//!
//! [`classfile`] assembles `.class` files from a declarative description so
//! tests never depend on a JDK being installed. [`ClassDir`] writes them to a
//! temporary directory for tests that read from disk.

pub mod classfile;

mod fixtures;

pub use fixtures::ClassDir;
