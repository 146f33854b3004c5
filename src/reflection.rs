//! Argument values and property access by path.

mod argument;
pub mod property;

pub use argument::{Argument, PropertyAccess, Record, RecordType};
pub use property::PropertyPath;
