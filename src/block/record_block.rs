use super::header::HEADER_SIZE;
use super::{BlockView, allocate};
use crate::disk::{BLOCK_SIZE, BlockNum, BlockType, BufferPool};
use crate::error::{DbError, DbResult};
use crate::record::{ATTR_SIZE, AttrType, Record};

const SLOT_OCCUPIED: u8 = 1;
const SLOT_UNOCCUPIED: u8 = 0;

/// Number of records of `num_attrs` attributes that fit in one block
///
/// Each slot costs one byte of slot map plus the record itself.
pub fn slots_per_block(num_attrs: usize) -> usize {
    (BLOCK_SIZE - HEADER_SIZE) / (num_attrs * ATTR_SIZE + 1)
}

/// Record block layout: header, slot map (one byte per slot), fixed-size records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBlock(BlockNum);

impl RecordBlock {
    pub fn new(block: BlockNum) -> Self {
        Self(block)
    }

    /// Allocate a new record block with an empty header
    pub fn allocate(pool: &mut BufferPool) -> DbResult<Self> {
        Ok(Self(allocate(pool, BlockType::Record)?))
    }

    fn check_slot(slot: usize, num_slots: usize) -> DbResult<()> {
        if slot >= num_slots {
            return Err(DbError::OutOfBound {
                index: slot as i64,
                limit: num_slots,
            });
        }
        Ok(())
    }

    fn record_offset(num_slots: usize, num_attrs: usize, slot: usize) -> usize {
        HEADER_SIZE + num_slots + slot * num_attrs * ATTR_SIZE
    }

    /// Read the record stored in `slot`, decoding one attribute per type
    pub fn record(&self, pool: &mut BufferPool, slot: usize, types: &[AttrType]) -> DbResult<Record> {
        let head = self.header(pool)?;
        Self::check_slot(slot, head.num_slots)?;
        if types.len() != head.num_attrs {
            return Err(DbError::NAttrMismatch {
                expected: head.num_attrs,
                actual: types.len(),
            });
        }

        let offset = Self::record_offset(head.num_slots, head.num_attrs, slot);
        let data = pool.block(self.0)?;
        Ok(Record::decode(
            &data[offset..offset + head.num_attrs * ATTR_SIZE],
            types,
        ))
    }

    /// Overwrite the record stored in `slot`
    pub fn set_record(&self, pool: &mut BufferPool, slot: usize, record: &Record) -> DbResult<()> {
        let head = self.header(pool)?;
        Self::check_slot(slot, head.num_slots)?;
        if record.len() != head.num_attrs {
            return Err(DbError::NAttrMismatch {
                expected: head.num_attrs,
                actual: record.len(),
            });
        }

        let offset = Self::record_offset(head.num_slots, head.num_attrs, slot);
        let data = pool.block_mut(self.0)?;
        record.encode(&mut data[offset..offset + head.num_attrs * ATTR_SIZE])
    }

    /// Occupancy of every slot in the block
    pub fn slot_map(&self, pool: &mut BufferPool) -> DbResult<Vec<bool>> {
        let head = self.header(pool)?;
        let data = pool.block(self.0)?;
        Ok(data[HEADER_SIZE..HEADER_SIZE + head.num_slots]
            .iter()
            .map(|&b| b == SLOT_OCCUPIED)
            .collect())
    }

    pub fn set_slot_map(&self, pool: &mut BufferPool, slot_map: &[bool]) -> DbResult<()> {
        let head = self.header(pool)?;
        if slot_map.len() != head.num_slots {
            return Err(DbError::OutOfBound {
                index: slot_map.len() as i64,
                limit: head.num_slots,
            });
        }

        let data = pool.block_mut(self.0)?;
        for (byte, &occupied) in data[HEADER_SIZE..].iter_mut().zip(slot_map) {
            *byte = if occupied { SLOT_OCCUPIED } else { SLOT_UNOCCUPIED };
        }
        Ok(())
    }

    /// Flip the occupancy byte of one slot
    pub fn set_slot(&self, pool: &mut BufferPool, slot: usize, occupied: bool) -> DbResult<()> {
        let head = self.header(pool)?;
        Self::check_slot(slot, head.num_slots)?;
        pool.block_mut(self.0)?[HEADER_SIZE + slot] = if occupied {
            SLOT_OCCUPIED
        } else {
            SLOT_UNOCCUPIED
        };
        Ok(())
    }
}

impl BlockView for RecordBlock {
    fn block_num(&self) -> BlockNum {
        self.0
    }
}
