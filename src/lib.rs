//! Class-loading core for the Mantle virtual machine.
//!
//! This crate covers three tightly coupled pieces of the runtime:
//! the tagged slot/header encoding used for literal and runtime values,
//! the binary class-file format (literal pool, descriptors, attributes,
//! bytecode), and the namespace tree a class loader links classes into.
//! Execution, compilation and garbage collection live elsewhere.

pub mod classfile;
pub mod loader;
pub mod namespace;
pub mod path;
pub mod pool;
pub mod slot;
pub mod stream;
