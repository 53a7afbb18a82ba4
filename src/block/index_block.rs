use super::header::{HEADER_SIZE, read_i32, write_i32};
use super::{BlockView, allocate};
use crate::disk::{BlockNum, BlockType, BufferPool};
use crate::error::{DbError, DbResult};
use crate::record::{ATTR_SIZE, AttrType, RecordId, Value};

/// Leaf entry: key, record block, record slot and 8 unused bytes
pub const LEAF_ENTRY_SIZE: usize = 32;

/// Internal entry stride; the right child of entry `i` is the left child of entry `i + 1`
pub const INTERNAL_ENTRY_SIZE: usize = 20;

pub const MAX_KEYS_LEAF: usize = 63;
pub const MAX_KEYS_INTERNAL: usize = 100;
pub const MIDDLE_INDEX_LEAF: usize = 31;
pub const MIDDLE_INDEX_INTERNAL: usize = 50;

/// Entry of a leaf index block
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEntry {
    pub key: Value,
    pub rec_id: RecordId,
}

/// Entry of an internal index block
#[derive(Debug, Clone, PartialEq)]
pub struct InternalEntry {
    pub lchild: BlockNum,
    pub key: Value,
    pub rchild: BlockNum,
}

fn check_index(index: usize, limit: usize) -> DbResult<()> {
    if index >= limit {
        return Err(DbError::OutOfBound {
            index: index as i64,
            limit,
        });
    }
    Ok(())
}

fn read_child(data: &[u8], offset: usize, block: BlockNum) -> DbResult<BlockNum> {
    let raw = read_i32(data, offset);
    BlockNum::try_from(raw).map_err(|_| DbError::InvalidBlock(block))
}

/// Leaf node of a B+ tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafBlock(BlockNum);

impl LeafBlock {
    pub fn new(block: BlockNum) -> Self {
        Self(block)
    }

    pub fn allocate(pool: &mut BufferPool) -> DbResult<Self> {
        Ok(Self(allocate(pool, BlockType::IndexLeaf)?))
    }

    pub fn entry(&self, pool: &mut BufferPool, index: usize, key_type: AttrType) -> DbResult<LeafEntry> {
        check_index(index, MAX_KEYS_LEAF)?;
        let offset = HEADER_SIZE + index * LEAF_ENTRY_SIZE;
        let data = pool.block(self.0)?;

        let key = Value::decode(&data[offset..offset + ATTR_SIZE], key_type);
        let block = read_child(data, offset + ATTR_SIZE, self.0)?;
        let slot = read_i32(data, offset + ATTR_SIZE + 4).max(0) as usize;
        Ok(LeafEntry {
            key,
            rec_id: RecordId::new(block, slot),
        })
    }

    pub fn set_entry(&self, pool: &mut BufferPool, index: usize, entry: &LeafEntry) -> DbResult<()> {
        check_index(index, MAX_KEYS_LEAF)?;
        let key = entry.key.encode()?;
        let offset = HEADER_SIZE + index * LEAF_ENTRY_SIZE;
        let data = pool.block_mut(self.0)?;

        data[offset..offset + ATTR_SIZE].copy_from_slice(&key);
        write_i32(data, offset + ATTR_SIZE, entry.rec_id.block as i32);
        write_i32(data, offset + ATTR_SIZE + 4, entry.rec_id.slot as i32);
        data[offset + ATTR_SIZE + 8..offset + LEAF_ENTRY_SIZE].fill(0);
        Ok(())
    }

    /// Decode the first `num_entries` entries
    pub fn entries(&self, pool: &mut BufferPool, key_type: AttrType) -> DbResult<Vec<LeafEntry>> {
        let head = self.header(pool)?;
        (0..head.num_entries)
            .map(|i| self.entry(pool, i, key_type))
            .collect()
    }
}

impl BlockView for LeafBlock {
    fn block_num(&self) -> BlockNum {
        self.0
    }
}

/// Internal node of a B+ tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalBlock(BlockNum);

impl InternalBlock {
    pub fn new(block: BlockNum) -> Self {
        Self(block)
    }

    pub fn allocate(pool: &mut BufferPool) -> DbResult<Self> {
        Ok(Self(allocate(pool, BlockType::IndexInternal)?))
    }

    pub fn entry(
        &self,
        pool: &mut BufferPool,
        index: usize,
        key_type: AttrType,
    ) -> DbResult<InternalEntry> {
        check_index(index, MAX_KEYS_INTERNAL)?;
        let offset = HEADER_SIZE + index * INTERNAL_ENTRY_SIZE;
        let data = pool.block(self.0)?;

        Ok(InternalEntry {
            lchild: read_child(data, offset, self.0)?,
            key: Value::decode(&data[offset + 4..offset + 4 + ATTR_SIZE], key_type),
            rchild: read_child(data, offset + 4 + ATTR_SIZE, self.0)?,
        })
    }

    /// Write an entry; this also rewrites the left child of entry `index + 1`
    pub fn set_entry(
        &self,
        pool: &mut BufferPool,
        index: usize,
        entry: &InternalEntry,
    ) -> DbResult<()> {
        check_index(index, MAX_KEYS_INTERNAL)?;
        let key = entry.key.encode()?;
        let offset = HEADER_SIZE + index * INTERNAL_ENTRY_SIZE;
        let data = pool.block_mut(self.0)?;

        write_i32(data, offset, entry.lchild as i32);
        data[offset + 4..offset + 4 + ATTR_SIZE].copy_from_slice(&key);
        write_i32(data, offset + 4 + ATTR_SIZE, entry.rchild as i32);
        Ok(())
    }

    pub fn entries(
        &self,
        pool: &mut BufferPool,
        key_type: AttrType,
    ) -> DbResult<Vec<InternalEntry>> {
        let head = self.header(pool)?;
        (0..head.num_entries)
            .map(|i| self.entry(pool, i, key_type))
            .collect()
    }

    /// Every child pointer once: left child of entry 0, then the right child of each entry
    pub fn children(&self, pool: &mut BufferPool) -> DbResult<Vec<BlockNum>> {
        let head = self.header(pool)?;
        if head.num_entries == 0 {
            return Ok(Vec::new());
        }
        let data = pool.block(self.0)?;
        let mut children = Vec::with_capacity(head.num_entries + 1);
        children.push(read_child(data, HEADER_SIZE, self.0)?);
        for i in 0..head.num_entries.min(MAX_KEYS_INTERNAL) {
            let offset = HEADER_SIZE + i * INTERNAL_ENTRY_SIZE + 4 + ATTR_SIZE;
            children.push(read_child(data, offset, self.0)?);
        }
        Ok(children)
    }
}

impl BlockView for InternalBlock {
    fn block_num(&self) -> BlockNum {
        self.0
    }
}
