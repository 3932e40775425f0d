//! Core traits for filestate-flutter.
//!
//! - `target_file`: the host framework's view of a file being transformed
//! - `options`: file content options that compute a file's new content

pub mod options;
pub mod target_file;

pub use options::*;
pub use target_file::*;
