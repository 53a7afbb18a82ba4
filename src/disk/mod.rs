mod block_file;
mod buffer_pool;
mod error;

pub use block_file::Disk;
pub use buffer_pool::BufferPool;
pub use error::{DiskError, DiskResult};

/// Block size in bytes
pub const BLOCK_SIZE: usize = 2048;

/// Number of blocks on the disk
pub const DISK_BLOCKS: usize = 8192;

/// Blocks 0..4 hold the block allocation map, one byte per disk block
pub const BLOCK_ALLOCATION_MAP_SIZE: usize = 4;

/// Default number of frames in the buffer pool
pub const BUFFER_CAPACITY: usize = 32;

/// Block number on the disk
pub type BlockNum = usize;

/// Type tag of a block, as stored in its header and in the allocation map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Record,
    IndexInternal,
    IndexLeaf,
    Unused,
    Bitmap,
}

impl BlockType {
    pub fn code(self) -> u8 {
        match self {
            BlockType::Record => 0,
            BlockType::IndexInternal => 1,
            BlockType::IndexLeaf => 2,
            BlockType::Unused => 3,
            BlockType::Bitmap => 4,
        }
    }

    /// Decode a type tag; anything unknown reads as unused
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => BlockType::Record,
            1 => BlockType::IndexInternal,
            2 => BlockType::IndexLeaf,
            4 => BlockType::Bitmap,
            _ => BlockType::Unused,
        }
    }

    pub fn is_index(self) -> bool {
        matches!(self, BlockType::IndexInternal | BlockType::IndexLeaf)
    }
}
