//! Typed views over buffered disk blocks.
//!
//! A view is just a block number; every accessor goes through the buffer
//! pool, so a view stays valid across evictions of its block.

mod header;
mod index_block;
mod record_block;

pub use header::{HEADER_SIZE, HeadInfo};
pub use index_block::{
    INTERNAL_ENTRY_SIZE, InternalBlock, InternalEntry, LEAF_ENTRY_SIZE, LeafBlock, LeafEntry,
    MAX_KEYS_INTERNAL, MAX_KEYS_LEAF, MIDDLE_INDEX_INTERNAL, MIDDLE_INDEX_LEAF,
};
pub use record_block::{RecordBlock, slots_per_block};

use crate::disk::{BlockNum, BlockType, BufferPool};
use crate::error::DbResult;

/// Header access shared by all block views
pub trait BlockView {
    fn block_num(&self) -> BlockNum;

    fn header(&self, pool: &mut BufferPool) -> DbResult<HeadInfo> {
        Ok(HeadInfo::decode(pool.block(self.block_num())?))
    }

    /// Overwrite the header; the block is marked dirty
    fn set_header(&self, pool: &mut BufferPool, head: &HeadInfo) -> DbResult<()> {
        head.encode(pool.block_mut(self.block_num())?);
        Ok(())
    }

    /// Update selected header fields in place
    fn update_header<F>(&self, pool: &mut BufferPool, update: F) -> DbResult<()>
    where
        F: FnOnce(&mut HeadInfo),
    {
        let mut head = self.header(pool)?;
        update(&mut head);
        self.set_header(pool, &head)
    }

    /// Type of the block according to the allocation map
    fn block_type(&self, pool: &BufferPool) -> DbResult<BlockType> {
        pool.block_type(self.block_num())
    }

    /// Give the block back to the disk
    fn release(&self, pool: &mut BufferPool) {
        pool.release_block(self.block_num());
    }
}

/// Claim a block of the given type and write an empty header into it
pub(crate) fn allocate(pool: &mut BufferPool, block_type: BlockType) -> DbResult<BlockNum> {
    let block = pool.allocate_block(block_type)?;
    HeadInfo::empty(block_type).encode(pool.block_mut(block)?);
    Ok(block)
}

/// View of any block, exposing only its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericBlock(BlockNum);

impl GenericBlock {
    pub fn new(block: BlockNum) -> Self {
        Self(block)
    }
}

impl BlockView for GenericBlock {
    fn block_num(&self) -> BlockNum {
        self.0
    }
}
