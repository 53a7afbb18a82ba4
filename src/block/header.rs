use crate::disk::{BlockNum, BlockType};

/// Size of the header prefix shared by every typed block
pub const HEADER_SIZE: usize = 32;

const TYPE_OFFSET: usize = 0;
const PBLOCK_OFFSET: usize = 4;
const LBLOCK_OFFSET: usize = 8;
const RBLOCK_OFFSET: usize = 12;
const NUM_ENTRIES_OFFSET: usize = 16;
const NUM_ATTRS_OFFSET: usize = 20;
const NUM_SLOTS_OFFSET: usize = 24;

/// Decoded block header
///
/// Links are stored on disk as 4-byte integers with `-1` meaning "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadInfo {
    pub block_type: BlockType,
    pub pblock: Option<BlockNum>,
    pub lblock: Option<BlockNum>,
    pub rblock: Option<BlockNum>,
    pub num_entries: usize,
    pub num_attrs: usize,
    pub num_slots: usize,
}

impl HeadInfo {
    /// Header of a freshly allocated block
    pub fn empty(block_type: BlockType) -> Self {
        Self {
            block_type,
            pblock: None,
            lblock: None,
            rblock: None,
            num_entries: 0,
            num_attrs: 0,
            num_slots: 0,
        }
    }

    pub fn encode(&self, data: &mut [u8]) {
        write_i32(data, TYPE_OFFSET, self.block_type.code() as i32);
        write_link(data, PBLOCK_OFFSET, self.pblock);
        write_link(data, LBLOCK_OFFSET, self.lblock);
        write_link(data, RBLOCK_OFFSET, self.rblock);
        write_i32(data, NUM_ENTRIES_OFFSET, self.num_entries as i32);
        write_i32(data, NUM_ATTRS_OFFSET, self.num_attrs as i32);
        write_i32(data, NUM_SLOTS_OFFSET, self.num_slots as i32);
    }

    pub fn decode(data: &[u8]) -> Self {
        Self {
            block_type: BlockType::from_code(read_i32(data, TYPE_OFFSET)),
            pblock: read_link(data, PBLOCK_OFFSET),
            lblock: read_link(data, LBLOCK_OFFSET),
            rblock: read_link(data, RBLOCK_OFFSET),
            num_entries: read_i32(data, NUM_ENTRIES_OFFSET).max(0) as usize,
            num_attrs: read_i32(data, NUM_ATTRS_OFFSET).max(0) as usize,
            num_slots: read_i32(data, NUM_SLOTS_OFFSET).max(0) as usize,
        }
    }
}

pub(crate) fn read_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub(crate) fn write_i32(data: &mut [u8], offset: usize, value: i32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_link(data: &[u8], offset: usize) -> Option<BlockNum> {
    let raw = read_i32(data, offset);
    (raw >= 0).then_some(raw as BlockNum)
}

pub(crate) fn write_link(data: &mut [u8], offset: usize, link: Option<BlockNum>) {
    write_i32(data, offset, link.map_or(-1, |b| b as i32));
}
