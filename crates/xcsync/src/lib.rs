//! xcsync - Managed/native UI type synchronization
//!
//! This crate keeps a C# project and a generated Xcode project in sync:
//! - Reading bound classes out of the managed project (`managed`)
//! - Parsing Objective-C headers (`native`)
//! - Generating native and designer sources (`codegen`)
//! - The native project file model (`pbx`)
//! - Configuration, enumeration and file watching (`project`)
//! - The sync passes and continuous mode (`sync`)

// Type mappings and registry
pub use xcsync_types;

// Code generation templates
pub mod codegen;

// C# front-end and managed reader
pub mod managed;

// Objective-C front-end
pub mod native;

// Native project model
pub mod pbx;

// Configuration and project enumeration
pub mod project;

// Sync passes
pub mod sync;

mod text;
