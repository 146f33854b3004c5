//! Query results: rows, result sets, and streaming result handlers.

mod handler;
mod result_set;
mod row;

pub(crate) use handler::drive;
pub use handler::{ResultContext, ResultHandler};
pub use result_set::ResultSet;
pub use row::CustomDbRow;
