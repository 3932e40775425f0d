//! Core type definitions for filestate-flutter.

pub mod project;
pub mod local_target;

pub use project::*;
pub use local_target::*;
