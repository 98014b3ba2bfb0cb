//! Project Management
//!
//! Configuration, managed project enumeration, bundle layout, and file watching.

pub mod bundle;
mod config;
mod loader;
mod watcher;

pub use config::*;
pub use loader::*;
pub use watcher::*;
