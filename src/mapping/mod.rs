//! Mapped statements and the artifacts they produce per execution.

mod bound;
mod parameter;
mod statement;

pub use bound::BoundStatement;
pub use parameter::{ParameterDescriptor, ParameterDescriptorBuilder};
pub use statement::{CommandKind, MappedStatement, MappedStatementBuilder, StatementKind};

/// Pagination applied while collecting query rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowBounds {
    offset: usize,
    limit: usize,
}

impl RowBounds {
    pub const NO_ROW_OFFSET: usize = 0;
    pub const NO_ROW_LIMIT: usize = usize::MAX;

    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.offset == Self::NO_ROW_OFFSET && self.limit == Self::NO_ROW_LIMIT
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::new(Self::NO_ROW_OFFSET, Self::NO_ROW_LIMIT)
    }
}
