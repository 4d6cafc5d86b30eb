//! Core traits, layered settings and the module registry shared by every
//! turfbook crate.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module, SchemaChange};
pub use registry::ModuleRegistry;
