use thiserror::Error;

use crate::disk::{BlockNum, DiskError};

/// Relation id: index into the open-relation table
pub type RelId = usize;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Disk error: {0}")]
    Disk(#[from] DiskError),

    #[error("Index {index} out of bound (limit {limit})")]
    OutOfBound { index: i64, limit: usize },

    #[error("Block {0} is not in the buffer")]
    BlockNotInBuffer(BlockNum),

    #[error("No free frame in the buffer pool")]
    BufferFull,

    #[error("Disk is full")]
    DiskFull,

    #[error("Open relation table is full")]
    CacheFull,

    #[error("Relation catalog is full")]
    MaxRelations,

    #[error("Relation {0} does not exist")]
    RelNotExist(String),

    #[error("Relation id {0} is not open")]
    NotOpen(RelId),

    #[error("Relation {0} is not open")]
    RelNotOpen(String),

    #[error("Relation {0} already exists")]
    RelExist(String),

    #[error("Relation {0} is open")]
    RelOpen(String),

    #[error("Attribute {0} does not exist")]
    AttrNotExist(String),

    #[error("Attribute {0} already exists")]
    AttrExist(String),

    #[error("Duplicate attribute {0}")]
    DuplicateAttr(String),

    #[error("Attribute type mismatch: {0}")]
    AttrTypeMismatch(String),

    #[error("Expected {expected} attributes, got {actual}")]
    NAttrMismatch { expected: usize, actual: usize },

    #[error("Operation not permitted on system catalog")]
    NotPermitted,

    #[error("Block {0} has an unexpected type")]
    InvalidBlock(BlockNum),

    #[error("Attribute {0} has no index")]
    NoIndex(String),

    #[error("Name {0:?} is too long")]
    NameTooLong(String),

    #[error("Value {0:?} does not fit in an attribute")]
    ValueTooLong(String),
}

/// Coarse classification of engine failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    CapacityExhausted,
    InvalidArgument,
    Conflict,
    NotPermitted,
    Corruption,
    Io,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Disk(_) => ErrorKind::Io,
            DbError::RelNotExist(_)
            | DbError::NotOpen(_)
            | DbError::RelNotOpen(_)
            | DbError::AttrNotExist(_)
            | DbError::NoIndex(_) => ErrorKind::NotFound,
            DbError::BufferFull | DbError::DiskFull | DbError::CacheFull | DbError::MaxRelations => {
                ErrorKind::CapacityExhausted
            }
            DbError::OutOfBound { .. }
            | DbError::BlockNotInBuffer(_)
            | DbError::AttrTypeMismatch(_)
            | DbError::NAttrMismatch { .. }
            | DbError::NameTooLong(_)
            | DbError::ValueTooLong(_) => ErrorKind::InvalidArgument,
            DbError::RelExist(_)
            | DbError::RelOpen(_)
            | DbError::AttrExist(_)
            | DbError::DuplicateAttr(_) => ErrorKind::Conflict,
            DbError::NotPermitted => ErrorKind::NotPermitted,
            DbError::InvalidBlock(_) => ErrorKind::Corruption,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DbError::DiskFull.kind(), ErrorKind::CapacityExhausted);
        assert_eq!(DbError::RelExist("r".into()).kind(), ErrorKind::Conflict);
        assert_eq!(DbError::InvalidBlock(7).kind(), ErrorKind::Corruption);
        assert_eq!(
            DbError::OutOfBound { index: -1, limit: 20 }.kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(DbError::NotPermitted.kind(), ErrorKind::NotPermitted);
    }

    #[test]
    fn test_error_display() {
        let err = DbError::NAttrMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Expected 2 attributes, got 3");
    }
}
