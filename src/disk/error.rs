use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Disk file not found: {0}")]
    FileNotFound(String),

    #[error("Block {0} is outside the disk")]
    BlockOutOfRange(usize),

    #[error("Invalid block size: expected {expected}, got {actual}")]
    InvalidBlockSize { expected: usize, actual: usize },
}

pub type DiskResult<T> = Result<T, DiskError>;
