use log::{debug, info};

use super::cache::OpenRelation;
use super::entry::{
    ATTRCAT_ATTR_RELNAME, AttrCatEntry, RELCAT_ATTR_RELNAME, RelCatEntry, attrcat_types,
    relcat_types,
};
use super::{ATTRCAT_RELID, RELCAT_RELID, is_catalog_id};
use crate::access;
use crate::block::RecordBlock;
use crate::disk::BufferPool;
use crate::engine::Engine;
use crate::error::{DbError, DbResult, RelId};
use crate::record::{CompareOp, Value};

/// Open a relation, loading its catalog rows into the cache
///
/// Opening an already open relation returns its existing id.
pub fn open_rel(engine: &mut Engine, rel_name: &str) -> DbResult<RelId> {
    if let Ok(rel_id) = engine.cache.rel_id(rel_name) {
        return Ok(rel_id);
    }

    let rel_id = engine.cache.free_slot().ok_or(DbError::CacheFull)?;
    let name = Value::Str(rel_name.to_string());

    engine.cache.reset_search_cursor(RELCAT_RELID)?;
    let rel_rec_id =
        access::linear_search(engine, RELCAT_RELID, RELCAT_ATTR_RELNAME, &name, CompareOp::Eq)?
            .ok_or_else(|| DbError::RelNotExist(rel_name.to_string()))?;
    let record =
        RecordBlock::new(rel_rec_id.block).record(&mut engine.pool, rel_rec_id.slot, &relcat_types())?;
    let rel = RelCatEntry::from_record(&record)?;

    let mut attrs = Vec::with_capacity(rel.num_attrs);
    engine.cache.reset_search_cursor(ATTRCAT_RELID)?;
    while let Some(rec_id) =
        access::linear_search(engine, ATTRCAT_RELID, ATTRCAT_ATTR_RELNAME, &name, CompareOp::Eq)?
    {
        let record =
            RecordBlock::new(rec_id.block).record(&mut engine.pool, rec_id.slot, &attrcat_types())?;
        attrs.push((AttrCatEntry::from_record(&record)?, rec_id));
    }

    engine
        .cache
        .install(rel_id, OpenRelation::new(rel, rel_rec_id, attrs));
    info!("opened relation {} as {}", rel_name, rel_id);
    Ok(rel_id)
}

/// Write modified catalog rows of an open relation back to their blocks
fn write_back(pool: &mut BufferPool, relation: &OpenRelation) -> DbResult<()> {
    if relation.rel.dirty {
        let rec_id = relation.rel.rec_id;
        RecordBlock::new(rec_id.block).set_record(pool, rec_id.slot, &relation.rel.entry.to_record())?;
    }
    for attr in relation.attrs.iter().filter(|a| a.dirty) {
        debug!(
            "writing back attribute {}.{}",
            attr.entry.rel_name, attr.entry.attr_name
        );
        RecordBlock::new(attr.rec_id.block).set_record(
            pool,
            attr.rec_id.slot,
            &attr.entry.to_record(),
        )?;
    }
    Ok(())
}

/// Close an open relation, persisting any modified catalog rows
pub fn close_rel(engine: &mut Engine, rel_id: RelId) -> DbResult<()> {
    if is_catalog_id(rel_id) {
        return Err(DbError::NotPermitted);
    }

    let relation = engine
        .cache
        .relation(rel_id)?
        .clone();
    write_back(&mut engine.pool, &relation)?;
    engine.cache.take(rel_id);

    info!("closed relation {}", relation.rel.entry.rel_name);
    Ok(())
}

/// Close every user relation and write back the catalogs' own rows
pub fn close_all(engine: &mut Engine) -> DbResult<()> {
    for rel_id in engine.cache.open_ids() {
        if !is_catalog_id(rel_id) {
            close_rel(engine, rel_id)?;
        }
    }

    for rel_id in [RELCAT_RELID, ATTRCAT_RELID] {
        let Engine { pool, cache } = engine;
        if let Ok(relation) = cache.relation(rel_id) {
            write_back(pool, relation)?;
            cache.mark_clean(rel_id)?;
        }
    }
    Ok(())
}
