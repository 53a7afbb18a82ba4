use log::debug;
use lru::LruCache;

use super::block_file::Disk;
use super::{BLOCK_ALLOCATION_MAP_SIZE, BLOCK_SIZE, BlockNum, BlockType, DISK_BLOCKS};
use crate::error::{DbError, DbResult};

/// One in-memory slot able to hold a single disk block
struct Frame {
    data: Vec<u8>,
    /// Block currently bound to this frame
    block: Option<BlockNum>,
    dirty: bool,
}

/// Fixed-capacity cache of disk blocks with LRU replacement
///
/// The pool also owns the block allocation map: it is read from blocks
/// `0..BLOCK_ALLOCATION_MAP_SIZE` when the pool is created and written back on
/// every `flush_all`.
pub struct BufferPool {
    disk: Disk,
    frames: Vec<Frame>,
    /// Bound blocks and their frames, ordered by recency of access
    resident: LruCache<BlockNum, usize>,
    /// Unbound frames; the lowest index is handed out first
    free_frames: Vec<usize>,
    alloc_map: Vec<u8>,
}

impl BufferPool {
    /// Create a pool over an existing disk, loading its allocation map
    pub fn new(disk: Disk, capacity: usize) -> DbResult<Self> {
        let mut pool = Self::empty(disk, capacity);
        for i in 0..BLOCK_ALLOCATION_MAP_SIZE {
            let start = i * BLOCK_SIZE;
            pool.disk
                .read_block(i, &mut pool.alloc_map[start..start + BLOCK_SIZE])?;
        }
        Ok(pool)
    }

    /// Create a pool over a blank disk with a fresh allocation map
    ///
    /// The map blocks are tagged as bitmap blocks, the two catalog blocks
    /// that follow them as record blocks, and everything else as unused.
    pub fn formatted(disk: Disk, capacity: usize, catalog_blocks: &[BlockNum]) -> Self {
        let mut pool = Self::empty(disk, capacity);
        pool.alloc_map.fill(BlockType::Unused.code());
        pool.alloc_map[..BLOCK_ALLOCATION_MAP_SIZE].fill(BlockType::Bitmap.code());
        for &block in catalog_blocks {
            pool.alloc_map[block] = BlockType::Record.code();
        }
        pool
    }

    fn empty(disk: Disk, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let frames = (0..capacity)
            .map(|_| Frame {
                data: vec![0u8; BLOCK_SIZE],
                block: None,
                dirty: false,
            })
            .collect();

        Self {
            disk,
            frames,
            resident: LruCache::unbounded(),
            free_frames: (0..capacity).rev().collect(),
            alloc_map: vec![0u8; BLOCK_ALLOCATION_MAP_SIZE * BLOCK_SIZE],
        }
    }

    fn check_block(block: BlockNum) -> DbResult<()> {
        if block >= DISK_BLOCKS {
            return Err(DbError::OutOfBound {
                index: block as i64,
                limit: DISK_BLOCKS,
            });
        }
        Ok(())
    }

    /// Number of frames in the pool
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Frame holding `block`, loading it from disk if needed
    ///
    /// Marks the block as the most recently used one.
    pub fn frame_for_block(&mut self, block: BlockNum) -> DbResult<usize> {
        Self::check_block(block)?;

        if let Some(&frame) = self.resident.get(&block) {
            return Ok(frame);
        }

        let frame = self.take_frame()?;
        let entry = &mut self.frames[frame];
        if let Err(err) = self.disk.read_block(block, &mut entry.data) {
            self.free_frames.push(frame);
            return Err(err.into());
        }
        entry.block = Some(block);
        entry.dirty = false;
        self.resident.put(block, frame);
        Ok(frame)
    }

    /// Frame bound to `block`, if any, without touching recency
    pub fn lookup_frame(&self, block: BlockNum) -> Option<usize> {
        self.resident.peek(&block).copied()
    }

    /// Evict the least recently used block and return its now-free frame
    ///
    /// A dirty block is written to disk first. The frame goes back to the
    /// free list and is the next one handed out.
    pub fn evict_one(&mut self) -> DbResult<usize> {
        let frame = self.evict_lru()?;
        self.free_frames.push(frame);
        Ok(frame)
    }

    /// Unbind the least recently used block; the caller owns the frame
    fn evict_lru(&mut self) -> DbResult<usize> {
        let (block, frame) = self.resident.pop_lru().ok_or(DbError::BufferFull)?;
        let entry = &mut self.frames[frame];
        if entry.dirty {
            debug!("writing back dirty block {} on eviction", block);
            if let Err(err) = self.disk.write_block(block, &entry.data) {
                self.resident.put(block, frame);
                return Err(err.into());
            }
        }
        entry.block = None;
        entry.dirty = false;
        Ok(frame)
    }

    fn take_frame(&mut self) -> DbResult<usize> {
        match self.free_frames.pop() {
            Some(frame) => Ok(frame),
            None => self.evict_lru(),
        }
    }

    /// Bytes of `block`
    pub fn block(&mut self, block: BlockNum) -> DbResult<&[u8]> {
        let frame = self.frame_for_block(block)?;
        Ok(&self.frames[frame].data)
    }

    /// Mutable bytes of `block`; the block is marked dirty
    pub fn block_mut(&mut self, block: BlockNum) -> DbResult<&mut [u8]> {
        let frame = self.frame_for_block(block)?;
        let entry = &mut self.frames[frame];
        entry.dirty = true;
        Ok(&mut entry.data)
    }

    /// Mark a bound block as modified
    pub fn mark_dirty(&mut self, block: BlockNum) -> DbResult<()> {
        Self::check_block(block)?;
        let frame = self
            .lookup_frame(block)
            .ok_or(DbError::BlockNotInBuffer(block))?;
        self.frames[frame].dirty = true;
        Ok(())
    }

    /// Type of `block` according to the allocation map
    pub fn block_type(&self, block: BlockNum) -> DbResult<BlockType> {
        Self::check_block(block)?;
        Ok(BlockType::from_code(self.alloc_map[block] as i32))
    }

    /// Claim the first unused block for `block_type` and bind a zeroed frame to it
    pub fn allocate_block(&mut self, block_type: BlockType) -> DbResult<BlockNum> {
        let block = self
            .alloc_map
            .iter()
            .position(|&code| code == BlockType::Unused.code())
            .ok_or(DbError::DiskFull)?;

        let frame = self.take_frame()?;
        self.alloc_map[block] = block_type.code();

        let entry = &mut self.frames[frame];
        entry.data.fill(0);
        entry.block = Some(block);
        entry.dirty = true;
        self.resident.put(block, frame);
        Ok(block)
    }

    /// Drop `block` from the pool without writing it back and mark it unused
    ///
    /// Releasing an unallocated or out-of-range block does nothing.
    pub fn release_block(&mut self, block: BlockNum) {
        if block >= DISK_BLOCKS {
            return;
        }
        if let Some(frame) = self.resident.pop(&block) {
            let entry = &mut self.frames[frame];
            entry.block = None;
            entry.dirty = false;
            self.free_frames.push(frame);
        }
        self.alloc_map[block] = BlockType::Unused.code();
    }

    /// Write every dirty block and the allocation map to disk
    pub fn flush_all(&mut self) -> DbResult<()> {
        for entry in self.frames.iter_mut() {
            if let Some(block) = entry.block
                && entry.dirty
            {
                self.disk.write_block(block, &entry.data)?;
                entry.dirty = false;
            }
        }

        for i in 0..BLOCK_ALLOCATION_MAP_SIZE {
            let start = i * BLOCK_SIZE;
            self.disk
                .write_block(i, &self.alloc_map[start..start + BLOCK_SIZE])?;
        }

        self.disk.sync()?;
        Ok(())
    }

    /// Check if a block is bound to a frame
    pub fn is_cached(&self, block: BlockNum) -> bool {
        self.resident.contains(&block)
    }

    /// Number of frames holding a block
    pub fn occupied_frames(&self) -> usize {
        self.resident.len()
    }

    /// Number of frames holding unflushed changes
    pub fn dirty_frames(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.block.is_some() && f.dirty)
            .count()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}
