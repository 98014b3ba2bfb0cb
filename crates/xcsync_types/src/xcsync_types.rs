//! xcsync Types - Core data model for managed/native type synchronization
//!
//! This crate contains the pure data structures shared by the sync engine:
//!
//! - [`TypeMapping`] and its member descriptors ([`Outlet`], [`Action`], [`Parameter`])
//! - [`TypeRegistry`], the concurrent bidirectional index of mappings

mod mapping;
mod type_registry;

pub use mapping::*;
pub use type_registry::*;
