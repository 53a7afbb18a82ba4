use crate::block::{BlockView, RecordBlock};
use crate::engine::Engine;
use crate::error::{DbResult, RelId};
use crate::record::{CompareOp, Record, RecordId, Value};

/// Predicate on one attribute of a record
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub offset: usize,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(offset: usize, op: CompareOp, value: Value) -> Self {
        Self { offset, op, value }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(self.offset)
            .is_some_and(|v| self.op.matches(v.compare(&self.value)))
    }
}

/// Find the first occupied record after `after` in block-chain order
///
/// `None` starts from slot 0 of the relation's first block.
pub(crate) fn scan_from(
    engine: &mut Engine,
    rel_id: RelId,
    after: Option<RecordId>,
    condition: Option<&Condition>,
) -> DbResult<Option<(RecordId, Record)>> {
    let types = engine.cache.attr_types(rel_id)?;
    let (mut block, mut start) = match after {
        Some(rec_id) => (Some(rec_id.block), rec_id.slot + 1),
        None => (engine.cache.rel_entry(rel_id)?.first_block, 0),
    };

    while let Some(num) = block {
        let view = RecordBlock::new(num);
        let head = view.header(&mut engine.pool)?;
        let slot_map = view.slot_map(&mut engine.pool)?;

        for slot in start..head.num_slots {
            if !slot_map[slot] {
                continue;
            }
            let record = view.record(&mut engine.pool, slot, &types)?;
            if condition.is_none_or(|c| c.matches(&record)) {
                return Ok(Some((RecordId::new(num, slot), record)));
            }
        }

        block = head.rblock;
        start = 0;
    }
    Ok(None)
}

/// Restartable scan over one relation that keeps its own position
///
/// Unlike the cursor in the open-relation table, a `Scan` is owned by the
/// caller, so any number of scans over the same relation can be interleaved.
#[derive(Debug, Clone)]
pub struct Scan {
    rel_id: RelId,
    condition: Option<Condition>,
    cursor: Option<RecordId>,
    done: bool,
}

impl Scan {
    /// Scan every record of the relation
    pub fn new(rel_id: RelId) -> Self {
        Self {
            rel_id,
            condition: None,
            cursor: None,
            done: false,
        }
    }

    /// Scan the records whose `attr_name` compares to `value` by `op`
    pub fn filtered(
        engine: &Engine,
        rel_id: RelId,
        attr_name: &str,
        op: CompareOp,
        value: Value,
    ) -> DbResult<Self> {
        let offset = engine.cache.attr_entry(rel_id, attr_name)?.offset;
        Ok(Self {
            condition: Some(Condition::new(offset, op, value)),
            ..Self::new(rel_id)
        })
    }

    pub fn rel_id(&self) -> RelId {
        self.rel_id
    }

    /// Position of the last record returned
    pub fn position(&self) -> Option<RecordId> {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = None;
        self.done = false;
    }

    pub fn next(&mut self, engine: &mut Engine) -> DbResult<Option<(RecordId, Record)>> {
        if self.done {
            return Ok(None);
        }
        match scan_from(engine, self.rel_id, self.cursor, self.condition.as_ref())? {
            Some((rec_id, record)) => {
                self.cursor = Some(rec_id);
                Ok(Some((rec_id, record)))
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Borrow the engine for a standard iterator over the remaining records
    pub fn iter<'a>(&'a mut self, engine: &'a mut Engine) -> ScanIter<'a> {
        ScanIter { scan: self, engine }
    }
}

pub struct ScanIter<'a> {
    scan: &'a mut Scan,
    engine: &'a mut Engine,
}

impl Iterator for ScanIter<'_> {
    type Item = DbResult<(RecordId, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan.next(self.engine).transpose()
    }
}
