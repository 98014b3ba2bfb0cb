//! Native Project Model
//!
//! Typed object graph for the native project file, token generation, and the
//! JSON document format.

mod graph;
mod objects;
mod project;
mod token;

pub use graph::{ObjectGraph, ProjectError};
pub use objects::*;
pub use project::{ARCHIVE_VERSION, NativeProject, OBJECT_VERSION};
pub use token::{TOKEN_LEN, derived_token, is_token, random_token};
