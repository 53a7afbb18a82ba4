use super::value::{ATTR_SIZE, AttrType, Value};
use crate::disk::BlockNum;
use crate::error::{DbError, DbResult};

/// Physical identifier for a record (block + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub block: BlockNum,
    pub slot: usize,
}

impl RecordId {
    pub fn new(block: BlockNum, slot: usize) -> Self {
        Self { block, slot }
    }
}

/// Position of an entry inside an index block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId {
    pub block: BlockNum,
    pub index: usize,
}

impl IndexId {
    pub fn new(block: BlockNum, index: usize) -> Self {
        Self { block, index }
    }
}

/// A single record (tuple) of attribute values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Create a new record
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get the number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if record is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by index
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Replace a value; out-of-range indices are ignored
    pub fn set(&mut self, idx: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(idx) {
            *slot = value;
        }
    }

    /// Encode into `len() * ATTR_SIZE` bytes
    pub fn encode(&self, out: &mut [u8]) -> DbResult<()> {
        let needed = self.values.len() * ATTR_SIZE;
        if out.len() < needed {
            return Err(DbError::OutOfBound {
                index: needed as i64,
                limit: out.len(),
            });
        }
        for (value, chunk) in self.values.iter().zip(out.chunks_exact_mut(ATTR_SIZE)) {
            chunk.copy_from_slice(&value.encode()?);
        }
        Ok(())
    }

    /// Decode one attribute per entry of `types`
    pub fn decode(bytes: &[u8], types: &[AttrType]) -> Self {
        let values = types
            .iter()
            .zip(bytes.chunks_exact(ATTR_SIZE))
            .map(|(&ty, chunk)| Value::decode(chunk, ty))
            .collect();
        Self { values }
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
