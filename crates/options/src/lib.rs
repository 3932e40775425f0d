#![deny(unused)]
//! Flutter file content options for filestate-flutter.
//!
//! This crate provides:
//! - `DartFormatOption`: fix and format a Dart file inside the sandbox
//! - Content option registry built from the declarative Flutter config value
//! - Dart file and project root recognition

pub mod dart_format;
pub mod flutter_file;
pub mod registry;

pub use dart_format::DartFormatOption;
pub use flutter_file::{discover_root, is_flutter_file};
pub use registry::ContentOptionRegistry;
