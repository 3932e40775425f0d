#![deny(unused)]
//! Core types, traits, and error definitions for filestate-flutter.
//!
//! This crate provides the building blocks shared by the sandbox session
//! manager, the Flutter content options and the command-line entry point.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
