//! Placeholder scanning and resolution.
//!
//! `#{…}` spans are bind placeholders: each becomes one positional `?` marker plus a
//! [`ParameterDescriptor`](crate::mapping::ParameterDescriptor). `${…}` spans are text
//! substitutions, expanded by the dynamic template before bind placeholders are resolved.

mod parsers;
mod resolver;
mod scanner;

pub use resolver::{CompiledSql, PlaceholderResolver};
pub use scanner::{BIND_PLACEHOLDER, TEXT_SUBSTITUTION, TokenScanner};
