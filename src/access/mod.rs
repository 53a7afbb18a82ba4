//! Record-level access to relations.
//!
//! Relations are chains of record blocks linked through their headers. The
//! functions here find free slots, walk the chain, keep the catalog rows in
//! the open-relation table current, and keep B+ tree indexes in step with
//! inserted records.

mod scan;
#[cfg(test)]
mod tests;

pub use scan::{Condition, Scan, ScanIter};

use log::{debug, warn};

use crate::block::{BlockView, HeadInfo, RecordBlock};
use crate::btree;
use crate::catalog::{
    ATTRCAT_ATTR_RELNAME, ATTRCAT_RELID, AttrCatEntry, RELCAT_ATTR_RELNAME, RELCAT_RELID,
    RelCatEntry, attrcat_types, is_catalog, relcat_types,
};
use crate::disk::{BlockNum, BlockType};
use crate::engine::Engine;
use crate::error::{DbError, DbResult, RelId};
use crate::record::{CompareOp, Record, RecordId, Value};
use scan::scan_from;

/// Result of a successful insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(RecordId),
    /// The record was stored, but at least one index ran out of disk space
    /// and was dropped
    IndexBlocksReleased(RecordId),
}

impl InsertOutcome {
    pub fn rec_id(&self) -> RecordId {
        match *self {
            InsertOutcome::Inserted(rec_id) | InsertOutcome::IndexBlocksReleased(rec_id) => rec_id,
        }
    }
}

fn check_record(engine: &Engine, rel_id: RelId, record: &Record) -> DbResult<()> {
    let attrs = engine.cache.attr_entries(rel_id)?;
    if record.len() != attrs.len() {
        return Err(DbError::NAttrMismatch {
            expected: attrs.len(),
            actual: record.len(),
        });
    }
    for (attr, value) in attrs.iter().zip(record.values()) {
        if value.attr_type() != attr.attr_type {
            return Err(DbError::AttrTypeMismatch(attr.attr_name.clone()));
        }
        value.encode()?;
    }
    Ok(())
}

/// First free slot in the relation's block chain
fn find_free_slot(engine: &mut Engine, first_block: Option<BlockNum>) -> DbResult<Option<RecordId>> {
    let mut block = first_block;
    while let Some(num) = block {
        let view = RecordBlock::new(num);
        if let Some(slot) = view.slot_map(&mut engine.pool)?.iter().position(|&o| !o) {
            return Ok(Some(RecordId::new(num, slot)));
        }
        block = view.header(&mut engine.pool)?.rblock;
    }
    Ok(None)
}

/// Allocate a record block and link it at the tail of the relation's chain
fn append_block(engine: &mut Engine, rel: &mut RelCatEntry) -> DbResult<BlockNum> {
    let view = RecordBlock::allocate(&mut engine.pool)?;
    let block = view.block_num();
    view.set_header(
        &mut engine.pool,
        &HeadInfo {
            lblock: rel.last_block,
            num_attrs: rel.num_attrs,
            num_slots: rel.num_slots_per_block,
            ..HeadInfo::empty(BlockType::Record)
        },
    )?;

    match rel.last_block {
        Some(last) => {
            RecordBlock::new(last).update_header(&mut engine.pool, |h| h.rblock = Some(block))?
        }
        None => rel.first_block = Some(block),
    }
    rel.last_block = Some(block);

    debug!("relation {} grew by block {}", rel.rel_name, block);
    Ok(block)
}

/// Store a record in the first free slot of an open relation
///
/// Every indexed attribute gets the new key. An index that runs out of disk
/// space is dropped; the record itself stays and the outcome reports it.
pub fn insert(engine: &mut Engine, rel_id: RelId, record: &Record) -> DbResult<InsertOutcome> {
    check_record(engine, rel_id, record)?;
    let mut rel = engine.cache.rel_entry(rel_id)?;

    let rec_id = match find_free_slot(engine, rel.first_block)? {
        Some(rec_id) => rec_id,
        // The relation catalog lives in a single block
        None if rel_id == RELCAT_RELID => return Err(DbError::MaxRelations),
        None => RecordId::new(append_block(engine, &mut rel)?, 0),
    };

    let view = RecordBlock::new(rec_id.block);
    view.set_record(&mut engine.pool, rec_id.slot, record)?;
    view.set_slot(&mut engine.pool, rec_id.slot, true)?;
    view.update_header(&mut engine.pool, |h| h.num_entries += 1)?;

    rel.num_recs += 1;
    engine.cache.set_rel_entry(rel_id, rel)?;

    let mut released = false;
    for attr in engine.cache.attr_entries(rel_id)? {
        if attr.root_block.is_none() {
            continue;
        }
        let Some(value) = record.get(attr.offset) else {
            continue;
        };
        match btree::insert(engine, rel_id, &attr.attr_name, value, rec_id) {
            Ok(()) => {}
            Err(DbError::DiskFull) => {
                warn!(
                    "index on {}.{} dropped: disk full",
                    attr.rel_name, attr.attr_name
                );
                released = true;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(if released {
        InsertOutcome::IndexBlocksReleased(rec_id)
    } else {
        InsertOutcome::Inserted(rec_id)
    })
}

/// Next record id whose `attr_name` compares to `value` by `op`
///
/// Resumes after the relation's search cursor and moves the cursor to the
/// match. The cursor is left alone when nothing more matches.
pub fn linear_search(
    engine: &mut Engine,
    rel_id: RelId,
    attr_name: &str,
    value: &Value,
    op: CompareOp,
) -> DbResult<Option<RecordId>> {
    let offset = engine.cache.attr_entry(rel_id, attr_name)?.offset;
    let condition = Condition::new(offset, op, value.clone());
    let cursor = engine.cache.search_cursor(rel_id)?;

    match scan_from(engine, rel_id, cursor, Some(&condition))? {
        Some((rec_id, _)) => {
            engine.cache.set_search_cursor(rel_id, Some(rec_id))?;
            Ok(Some(rec_id))
        }
        None => Ok(None),
    }
}

/// Next matching record, through the attribute's index when it has one
pub fn search(
    engine: &mut Engine,
    rel_id: RelId,
    attr_name: &str,
    value: &Value,
    op: CompareOp,
) -> DbResult<Option<Record>> {
    let attr = engine.cache.attr_entry(rel_id, attr_name)?;
    let found = if attr.root_block.is_some() {
        btree::search(engine, rel_id, attr_name, value, op)?
    } else {
        linear_search(engine, rel_id, attr_name, value, op)?
    };

    let Some(rec_id) = found else {
        return Ok(None);
    };
    let types = engine.cache.attr_types(rel_id)?;
    RecordBlock::new(rec_id.block)
        .record(&mut engine.pool, rec_id.slot, &types)
        .map(Some)
}

/// Next record of the relation in block-chain order, resuming after the cursor
pub fn project(engine: &mut Engine, rel_id: RelId) -> DbResult<Option<Record>> {
    let cursor = engine.cache.search_cursor(rel_id)?;
    match scan_from(engine, rel_id, cursor, None)? {
        Some((rec_id, record)) => {
            engine.cache.set_search_cursor(rel_id, Some(rec_id))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// Locate a relation's row in the relation catalog
fn find_relation(engine: &mut Engine, rel_name: &str) -> DbResult<Option<RecordId>> {
    engine.cache.reset_search_cursor(RELCAT_RELID)?;
    linear_search(
        engine,
        RELCAT_RELID,
        RELCAT_ATTR_RELNAME,
        &Value::Str(rel_name.to_string()),
        CompareOp::Eq,
    )
}

/// Every attribute-catalog row of a relation
fn find_attributes(engine: &mut Engine, rel_name: &str) -> DbResult<Vec<(AttrCatEntry, RecordId)>> {
    let name = Value::Str(rel_name.to_string());
    let types = attrcat_types();
    let mut attrs = Vec::new();

    engine.cache.reset_search_cursor(ATTRCAT_RELID)?;
    while let Some(rec_id) =
        linear_search(engine, ATTRCAT_RELID, ATTRCAT_ATTR_RELNAME, &name, CompareOp::Eq)?
    {
        let record = RecordBlock::new(rec_id.block).record(&mut engine.pool, rec_id.slot, &types)?;
        attrs.push((AttrCatEntry::from_record(&record)?, rec_id));
    }
    Ok(attrs)
}

/// Free a catalog slot; returns true if its block became empty
fn free_catalog_slot(engine: &mut Engine, rec_id: RecordId) -> DbResult<bool> {
    let view = RecordBlock::new(rec_id.block);
    view.set_slot(&mut engine.pool, rec_id.slot, false)?;
    let mut empty = false;
    view.update_header(&mut engine.pool, |h| {
        h.num_entries = h.num_entries.saturating_sub(1);
        empty = h.num_entries == 0;
    })?;
    Ok(empty)
}

/// Unlink an emptied attribute-catalog block from the chain and release it
fn release_attrcat_block(engine: &mut Engine, block: BlockNum) -> DbResult<()> {
    let view = RecordBlock::new(block);
    let head = view.header(&mut engine.pool)?;
    let mut attrcat = engine.cache.rel_entry(ATTRCAT_RELID)?;

    match head.lblock {
        Some(left) => {
            RecordBlock::new(left).update_header(&mut engine.pool, |h| h.rblock = head.rblock)?
        }
        None => attrcat.first_block = head.rblock,
    }
    match head.rblock {
        Some(right) => {
            RecordBlock::new(right).update_header(&mut engine.pool, |h| h.lblock = head.lblock)?
        }
        None => attrcat.last_block = head.lblock,
    }

    engine.cache.set_rel_entry(ATTRCAT_RELID, attrcat)?;
    view.release(&mut engine.pool);
    debug!("released attribute catalog block {}", block);
    Ok(())
}

/// Remove a closed relation: its records, indexes and catalog rows
pub fn delete_relation(engine: &mut Engine, rel_name: &str) -> DbResult<()> {
    if is_catalog(rel_name) {
        return Err(DbError::NotPermitted);
    }

    let rel_rec_id =
        find_relation(engine, rel_name)?.ok_or_else(|| DbError::RelNotExist(rel_name.to_string()))?;
    let record =
        RecordBlock::new(rel_rec_id.block).record(&mut engine.pool, rel_rec_id.slot, &relcat_types())?;
    let rel = RelCatEntry::from_record(&record)?;

    let mut block = rel.first_block;
    while let Some(num) = block {
        let view = RecordBlock::new(num);
        block = view.header(&mut engine.pool)?.rblock;
        view.release(&mut engine.pool);
    }

    let attrs = find_attributes(engine, rel_name)?;
    for (attr, rec_id) in &attrs {
        if let Some(root) = attr.root_block {
            btree::destroy(&mut engine.pool, root)?;
        }
        if free_catalog_slot(engine, *rec_id)? {
            release_attrcat_block(engine, rec_id.block)?;
        }
    }
    engine.cache.reset_search_cursor(ATTRCAT_RELID)?;

    free_catalog_slot(engine, rel_rec_id)?;
    engine.cache.reset_search_cursor(RELCAT_RELID)?;

    let mut relcat = engine.cache.rel_entry(RELCAT_RELID)?;
    relcat.num_recs = relcat.num_recs.saturating_sub(1);
    engine.cache.set_rel_entry(RELCAT_RELID, relcat)?;

    let mut attrcat = engine.cache.rel_entry(ATTRCAT_RELID)?;
    attrcat.num_recs = attrcat.num_recs.saturating_sub(attrs.len());
    engine.cache.set_rel_entry(ATTRCAT_RELID, attrcat)?;

    debug!("deleted relation {}", rel_name);
    Ok(())
}

/// Rename a closed relation in both catalogs
pub fn rename_relation(engine: &mut Engine, old_name: &str, new_name: &str) -> DbResult<()> {
    if find_relation(engine, new_name)?.is_some() {
        return Err(DbError::RelExist(new_name.to_string()));
    }
    let rel_rec_id =
        find_relation(engine, old_name)?.ok_or_else(|| DbError::RelNotExist(old_name.to_string()))?;

    let view = RecordBlock::new(rel_rec_id.block);
    let mut record = view.record(&mut engine.pool, rel_rec_id.slot, &relcat_types())?;
    record.set(0, Value::Str(new_name.to_string()));
    view.set_record(&mut engine.pool, rel_rec_id.slot, &record)?;

    for (mut attr, rec_id) in find_attributes(engine, old_name)? {
        attr.rel_name = new_name.to_string();
        RecordBlock::new(rec_id.block).set_record(&mut engine.pool, rec_id.slot, &attr.to_record())?;
    }
    Ok(())
}

/// Rename one attribute of a closed relation
pub fn rename_attribute(
    engine: &mut Engine,
    rel_name: &str,
    old_name: &str,
    new_name: &str,
) -> DbResult<()> {
    if find_relation(engine, rel_name)?.is_none() {
        return Err(DbError::RelNotExist(rel_name.to_string()));
    }

    let attrs = find_attributes(engine, rel_name)?;
    if attrs.iter().any(|(attr, _)| attr.attr_name == new_name) {
        return Err(DbError::AttrExist(new_name.to_string()));
    }
    let (mut attr, rec_id) = attrs
        .into_iter()
        .find(|(attr, _)| attr.attr_name == old_name)
        .ok_or_else(|| DbError::AttrNotExist(old_name.to_string()))?;

    attr.attr_name = new_name.to_string();
    RecordBlock::new(rec_id.block).set_record(&mut engine.pool, rec_id.slot, &attr.to_record())
}
