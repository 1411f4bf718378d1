//! Underscore-style micro-templates
//!
//! Templates can be compiled at runtime with [`compile`] or at build time
//! with the [`template!`], [`file!`] and [`directory!`] macros. Each macro
//! defines a `pub fn <name>() -> &'static Template` plus a `<NAME>_SOURCE`
//! constant holding the generated source.

extern crate self as microtemplate;

pub use microtemplate_core::*;
pub use microtemplate_macros::microtemplate_directory as directory;
pub use microtemplate_macros::microtemplate_file as file;
pub use microtemplate_macros::microtemplate_str as template;
