use log::info;

use super::cache::{OpenRelTable, OpenRelation};
use super::entry::{
    ATTRCAT_SCHEMA, AttrCatEntry, RELCAT_SCHEMA, RelCatEntry, attrcat_types, relcat_types,
};
use super::{ATTRCAT_BLOCK, ATTRCAT_NAME, ATTRCAT_RELID, RELCAT_BLOCK, RELCAT_NAME, RELCAT_RELID};
use crate::block::{BlockView, HeadInfo, RecordBlock, slots_per_block};
use crate::disk::{BlockType, BufferPool};
use crate::error::{DbError, DbResult, RelId};
use crate::record::{AttrType, Record, RecordId};

fn catalog_attrs(rel_name: &str, schema: &[(&str, AttrType)]) -> Vec<AttrCatEntry> {
    schema
        .iter()
        .enumerate()
        .map(|(offset, &(name, ty))| AttrCatEntry::new(rel_name, name, ty, offset))
        .collect()
}

fn write_rows(
    pool: &mut BufferPool,
    block: RecordBlock,
    num_attrs: usize,
    rows: &[Record],
) -> DbResult<()> {
    pool.block_mut(block.block_num())?.fill(0);
    block.set_header(
        pool,
        &HeadInfo {
            num_entries: rows.len(),
            num_attrs,
            num_slots: slots_per_block(num_attrs),
            ..HeadInfo::empty(BlockType::Record)
        },
    )?;
    for (slot, row) in rows.iter().enumerate() {
        block.set_record(pool, slot, row)?;
        block.set_slot(pool, slot, true)?;
    }
    Ok(())
}

/// Write the self-describing catalog rows of an empty disk
///
/// The relation catalog block holds the rows of both catalogs; the attribute
/// catalog block holds the relation catalog's attributes followed by its own.
pub(crate) fn format(pool: &mut BufferPool) -> DbResult<()> {
    let num_slots = slots_per_block(RELCAT_SCHEMA.len());
    let relcat = RelCatEntry {
        rel_name: RELCAT_NAME.to_string(),
        num_attrs: RELCAT_SCHEMA.len(),
        num_recs: 2,
        first_block: Some(RELCAT_BLOCK),
        last_block: Some(RELCAT_BLOCK),
        num_slots_per_block: num_slots,
    };
    let attrcat = RelCatEntry {
        rel_name: ATTRCAT_NAME.to_string(),
        num_attrs: ATTRCAT_SCHEMA.len(),
        num_recs: RELCAT_SCHEMA.len() + ATTRCAT_SCHEMA.len(),
        first_block: Some(ATTRCAT_BLOCK),
        last_block: Some(ATTRCAT_BLOCK),
        num_slots_per_block: num_slots,
    };
    write_rows(
        pool,
        RecordBlock::new(RELCAT_BLOCK),
        RELCAT_SCHEMA.len(),
        &[relcat.to_record(), attrcat.to_record()],
    )?;

    let attr_rows: Vec<Record> = catalog_attrs(RELCAT_NAME, &RELCAT_SCHEMA)
        .into_iter()
        .chain(catalog_attrs(ATTRCAT_NAME, &ATTRCAT_SCHEMA))
        .map(|attr| attr.to_record())
        .collect();
    write_rows(
        pool,
        RecordBlock::new(ATTRCAT_BLOCK),
        ATTRCAT_SCHEMA.len(),
        &attr_rows,
    )?;

    info!("formatted disk with relation and attribute catalogs");
    Ok(())
}

fn load_catalog(
    pool: &mut BufferPool,
    table: &mut OpenRelTable,
    rel_id: RelId,
    expected_name: &str,
) -> DbResult<()> {
    let rel_slot = rel_id;
    let record = RecordBlock::new(RELCAT_BLOCK).record(pool, rel_slot, &relcat_types())?;
    let entry = RelCatEntry::from_record(&record)?;
    if entry.rel_name != expected_name {
        return Err(DbError::InvalidBlock(RELCAT_BLOCK));
    }

    let first_attr_slot = rel_id * RELCAT_SCHEMA.len();
    let attrcat = RecordBlock::new(ATTRCAT_BLOCK);
    let mut attrs = Vec::with_capacity(entry.num_attrs);
    for slot in first_attr_slot..first_attr_slot + entry.num_attrs {
        let record = attrcat.record(pool, slot, &attrcat_types())?;
        attrs.push((
            AttrCatEntry::from_record(&record)?,
            RecordId::new(ATTRCAT_BLOCK, slot),
        ));
    }

    table.install(
        rel_id,
        OpenRelation::new(entry, RecordId::new(RELCAT_BLOCK, rel_slot), attrs),
    );
    Ok(())
}

/// Install both catalogs into their fixed relation ids
pub(crate) fn load_catalogs(pool: &mut BufferPool, table: &mut OpenRelTable) -> DbResult<()> {
    if pool.block_type(RELCAT_BLOCK)? != BlockType::Record {
        return Err(DbError::InvalidBlock(RELCAT_BLOCK));
    }
    load_catalog(pool, table, RELCAT_RELID, RELCAT_NAME)?;
    load_catalog(pool, table, ATTRCAT_RELID, ATTRCAT_NAME)
}
