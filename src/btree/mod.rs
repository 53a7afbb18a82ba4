//! Disk-resident B+ tree indexes over a single attribute
//!
//! Nodes are index blocks. Leaves hold `(key, record id)` pairs sorted by key
//! and are doubly linked, so range scans walk the leaf chain independently of
//! the tree shape. Internal nodes hold `(lchild, key, rchild)` entries where
//! the right child of entry `i` is the left child of entry `i + 1`.
//!
//! The root block of an index is stored in the attribute's catalog row;
//! `None` means the attribute has no index.


use std::cmp::Ordering;

use log::{debug, info, warn};

use crate::access::Scan;
use crate::block::{
    BlockView, GenericBlock, HeadInfo, InternalBlock, InternalEntry, LeafBlock, LeafEntry,
    MAX_KEYS_INTERNAL, MAX_KEYS_LEAF, MIDDLE_INDEX_INTERNAL, MIDDLE_INDEX_LEAF,
};
use crate::catalog::is_catalog_id;
use crate::disk::{BlockNum, BlockType, BufferPool};
use crate::engine::Engine;
use crate::error::{DbError, DbResult, RelId};
use crate::record::{AttrType, CompareOp, IndexId, RecordId, Value};

/// Next index entry matching `key op value`, starting after `after`
///
/// With no starting position the search descends from `root`. Returns the
/// position of the matching leaf entry with its record id.
pub fn search_from(
    pool: &mut BufferPool,
    root: BlockNum,
    key_type: AttrType,
    after: Option<IndexId>,
    value: &Value,
    op: CompareOp,
) -> DbResult<Option<(IndexId, RecordId)>> {
    let (mut leaf, mut start) = match after {
        Some(cursor) => (Some(cursor.block), cursor.index + 1),
        None => (Some(descend(pool, root, key_type, value, op)?), 0),
    };

    while let Some(block) = leaf {
        let view = LeafBlock::new(block);
        let head = view.header(pool)?;

        for index in start..head.num_entries {
            let entry = view.entry(pool, index, key_type)?;
            let ordering = entry.key.compare(value);
            if op.matches(ordering) {
                return Ok(Some((IndexId::new(block, index), entry.rec_id)));
            }
            // Keys only grow from here on
            if ordering == Ordering::Greater
                && matches!(op, CompareOp::Eq | CompareOp::Le | CompareOp::Lt)
            {
                return Ok(None);
            }
        }

        leaf = head.rblock;
        start = 0;
    }
    Ok(None)
}

/// Walk down to the leaf where matches of `op value` begin
fn descend(
    pool: &mut BufferPool,
    root: BlockNum,
    key_type: AttrType,
    value: &Value,
    op: CompareOp,
) -> DbResult<BlockNum> {
    let mut block = root;
    while pool.block_type(block)? == BlockType::IndexInternal {
        let entries = InternalBlock::new(block).entries(pool, key_type)?;
        let first = entries.first().ok_or(DbError::InvalidBlock(block))?;

        let next = match op {
            CompareOp::Ne | CompareOp::Lt | CompareOp::Le => Some(first.lchild),
            CompareOp::Eq | CompareOp::Ge => entries
                .iter()
                .find(|e| e.key.compare(value) != Ordering::Less)
                .map(|e| e.lchild),
            CompareOp::Gt => entries
                .iter()
                .find(|e| e.key.compare(value) == Ordering::Greater)
                .map(|e| e.lchild),
        };
        block = match next {
            Some(child) => child,
            None => entries.last().map_or(first.rchild, |e| e.rchild),
        };
    }

    if pool.block_type(block)? != BlockType::IndexLeaf {
        return Err(DbError::InvalidBlock(block));
    }
    Ok(block)
}

/// Next record id of an open relation whose indexed `attr_name` matches
///
/// Resumes after the attribute's index cursor and moves the cursor to the match.
/// An insert into the index invalidates the cursor; reset it before searching again.
pub fn search(
    engine: &mut Engine,
    rel_id: RelId,
    attr_name: &str,
    value: &Value,
    op: CompareOp,
) -> DbResult<Option<RecordId>> {
    let attr = engine.cache.attr_entry(rel_id, attr_name)?;
    let root = attr
        .root_block
        .ok_or_else(|| DbError::NoIndex(attr_name.to_string()))?;
    let cursor = engine.cache.attr_search_cursor(rel_id, attr_name)?;

    match search_from(&mut engine.pool, root, attr.attr_type, cursor, value, op)? {
        Some((index_id, rec_id)) => {
            engine
                .cache
                .set_attr_search_cursor(rel_id, attr_name, Some(index_id))?;
            Ok(Some(rec_id))
        }
        None => Ok(None),
    }
}

/// Build an index on an attribute of an open relation from its current records
///
/// Does nothing if the attribute is already indexed.
pub fn create(engine: &mut Engine, rel_id: RelId, attr_name: &str) -> DbResult<()> {
    if is_catalog_id(rel_id) {
        return Err(DbError::NotPermitted);
    }
    let mut attr = engine.cache.attr_entry(rel_id, attr_name)?;
    if attr.root_block.is_some() {
        return Ok(());
    }

    let root = LeafBlock::allocate(&mut engine.pool)?;
    attr.root_block = Some(root.block_num());
    let offset = attr.offset;
    engine.cache.set_attr_entry(rel_id, attr_name, attr)?;

    let mut scan = Scan::new(rel_id);
    let mut count = 0;
    while let Some((rec_id, record)) = scan.next(engine)? {
        let Some(value) = record.get(offset) else {
            continue;
        };
        insert(engine, rel_id, attr_name, value, rec_id)?;
        count += 1;
    }

    info!(
        "created index on attribute {} of relation {} with {} entries",
        attr_name, rel_id, count
    );
    Ok(())
}

/// Add `(value, rec_id)` to the index on `attr_name`
///
/// If the disk fills up mid-insert the whole index is destroyed, the
/// attribute is left unindexed and `DiskFull` is returned.
pub fn insert(
    engine: &mut Engine,
    rel_id: RelId,
    attr_name: &str,
    value: &Value,
    rec_id: RecordId,
) -> DbResult<()> {
    let mut attr = engine.cache.attr_entry(rel_id, attr_name)?;
    let root = attr
        .root_block
        .ok_or_else(|| DbError::NoIndex(attr_name.to_string()))?;
    let entry = LeafEntry {
        key: value.clone(),
        rec_id,
    };

    match insert_entry(&mut engine.pool, root, attr.attr_type, entry) {
        Ok(None) => Ok(()),
        Ok(Some(new_root)) => {
            attr.root_block = Some(new_root);
            engine.cache.set_attr_entry(rel_id, attr_name, attr)
        }
        Err(DbError::DiskFull) => {
            warn!("disk full while indexing {}, dropping the index", attr_name);
            attr.root_block = None;
            engine.cache.set_attr_entry(rel_id, attr_name, attr)?;
            engine.cache.reset_attr_search_cursor(rel_id, attr_name)?;
            Err(DbError::DiskFull)
        }
        Err(err) => Err(err),
    }
}

/// Insert an entry into the tree rooted at `root`
///
/// Returns the new root when the root was split. On `DiskFull` every block of
/// the tree has already been released.
pub fn insert_entry(
    pool: &mut BufferPool,
    root: BlockNum,
    key_type: AttrType,
    entry: LeafEntry,
) -> DbResult<Option<BlockNum>> {
    let leaf = find_leaf(pool, root, key_type, &entry.key)?;
    match insert_into_leaf(pool, key_type, leaf, entry) {
        Err(DbError::DiskFull) => {
            destroy(pool, root)?;
            Err(DbError::DiskFull)
        }
        result => result,
    }
}

/// Leaf where `key` belongs; equal keys go after the existing ones
fn find_leaf(
    pool: &mut BufferPool,
    root: BlockNum,
    key_type: AttrType,
    key: &Value,
) -> DbResult<BlockNum> {
    let mut block = root;
    while pool.block_type(block)? == BlockType::IndexInternal {
        let entries = InternalBlock::new(block).entries(pool, key_type)?;
        block = entries
            .iter()
            .find(|e| e.key.compare(key) == Ordering::Greater)
            .map(|e| e.lchild)
            .or_else(|| entries.last().map(|e| e.rchild))
            .ok_or(DbError::InvalidBlock(block))?;
    }

    if pool.block_type(block)? != BlockType::IndexLeaf {
        return Err(DbError::InvalidBlock(block));
    }
    debug!("selected leaf {} for insertion", block);
    Ok(block)
}

fn insert_into_leaf(
    pool: &mut BufferPool,
    key_type: AttrType,
    block: BlockNum,
    entry: LeafEntry,
) -> DbResult<Option<BlockNum>> {
    let view = LeafBlock::new(block);
    let mut head = view.header(pool)?;
    let mut entries = view.entries(pool, key_type)?;

    let pos = entries
        .iter()
        .position(|e| e.key.compare(&entry.key) == Ordering::Greater)
        .unwrap_or(entries.len());
    entries.insert(pos, entry);

    if entries.len() <= MAX_KEYS_LEAF {
        for (index, entry) in entries.iter().enumerate().skip(pos) {
            view.set_entry(pool, index, entry)?;
        }
        head.num_entries = entries.len();
        view.set_header(pool, &head)?;
        return Ok(None);
    }

    let right = split_leaf(pool, view, &entries)?;
    let promoted = InternalEntry {
        lchild: block,
        key: entries[MIDDLE_INDEX_LEAF].key.clone(),
        rchild: right,
    };
    attach(pool, key_type, head.pblock, promoted)
}

/// Move the upper half of an overfull leaf into a new right sibling
fn split_leaf(pool: &mut BufferPool, left: LeafBlock, entries: &[LeafEntry]) -> DbResult<BlockNum> {
    let right = LeafBlock::allocate(pool)?;
    let right_num = right.block_num();
    let mut left_head = left.header(pool)?;
    let split = MIDDLE_INDEX_LEAF + 1;

    right.set_header(
        pool,
        &HeadInfo {
            pblock: left_head.pblock,
            lblock: Some(left.block_num()),
            rblock: left_head.rblock,
            num_entries: entries.len() - split,
            ..HeadInfo::empty(BlockType::IndexLeaf)
        },
    )?;
    if let Some(next) = left_head.rblock {
        LeafBlock::new(next).update_header(pool, |h| h.lblock = Some(right_num))?;
    }

    left_head.num_entries = split;
    left_head.rblock = Some(right_num);
    left.set_header(pool, &left_head)?;

    for (index, entry) in entries[..split].iter().enumerate() {
        left.set_entry(pool, index, entry)?;
    }
    for (index, entry) in entries[split..].iter().enumerate() {
        right.set_entry(pool, index, entry)?;
    }

    debug!("split leaf {} into {}", left.block_num(), right_num);
    Ok(right_num)
}

/// Hook a promoted entry into `parent`, or into a new root if there is none
///
/// If that fails, the block split off below is no longer reachable from
/// the tree and is destroyed here.
fn attach(
    pool: &mut BufferPool,
    key_type: AttrType,
    parent: Option<BlockNum>,
    entry: InternalEntry,
) -> DbResult<Option<BlockNum>> {
    match parent {
        Some(parent) => insert_into_internal(pool, key_type, parent, entry),
        None => match create_new_root(pool, &entry) {
            Ok(root) => Ok(Some(root)),
            Err(err) => {
                destroy(pool, entry.rchild)?;
                Err(err)
            }
        },
    }
}

fn insert_into_internal(
    pool: &mut BufferPool,
    key_type: AttrType,
    block: BlockNum,
    entry: InternalEntry,
) -> DbResult<Option<BlockNum>> {
    let view = InternalBlock::new(block);
    let mut head = view.header(pool)?;
    let mut entries = view.entries(pool, key_type)?;

    // The entry goes right before the one whose left child was just split
    let pos = entries
        .iter()
        .position(|e| e.lchild == entry.lchild)
        .unwrap_or(entries.len());
    let orphan = entry.rchild;
    entries.insert(pos, entry);
    if let Some(next) = entries.get_mut(pos + 1) {
        next.lchild = orphan;
    }

    if entries.len() <= MAX_KEYS_INTERNAL {
        for (index, entry) in entries.iter().enumerate().skip(pos) {
            view.set_entry(pool, index, entry)?;
        }
        head.num_entries = entries.len();
        view.set_header(pool, &head)?;
        return Ok(None);
    }

    let right = match split_internal(pool, view, &entries) {
        Ok(right) => right,
        Err(err) => {
            destroy(pool, orphan)?;
            return Err(err);
        }
    };
    let promoted = InternalEntry {
        lchild: block,
        key: entries[MIDDLE_INDEX_INTERNAL].key.clone(),
        rchild: right,
    };
    attach(pool, key_type, head.pblock, promoted)
}

/// Split an overfull internal node around its middle entry
///
/// The middle entry is not kept in either half; its key is promoted by the
/// caller.
fn split_internal(
    pool: &mut BufferPool,
    left: InternalBlock,
    entries: &[InternalEntry],
) -> DbResult<BlockNum> {
    let right = InternalBlock::allocate(pool)?;
    let right_num = right.block_num();
    let mut left_head = left.header(pool)?;
    let right_entries = &entries[MIDDLE_INDEX_INTERNAL + 1..];

    right.set_header(
        pool,
        &HeadInfo {
            pblock: left_head.pblock,
            num_entries: right_entries.len(),
            ..HeadInfo::empty(BlockType::IndexInternal)
        },
    )?;
    for (index, entry) in right_entries.iter().enumerate() {
        right.set_entry(pool, index, entry)?;
    }

    left_head.num_entries = MIDDLE_INDEX_INTERNAL;
    left.set_header(pool, &left_head)?;
    for (index, entry) in entries[..MIDDLE_INDEX_INTERNAL].iter().enumerate() {
        left.set_entry(pool, index, entry)?;
    }

    for child in right.children(pool)? {
        GenericBlock::new(child).update_header(pool, |h| h.pblock = Some(right_num))?;
    }

    debug!("split internal node {} into {}", left.block_num(), right_num);
    Ok(right_num)
}

fn create_new_root(pool: &mut BufferPool, entry: &InternalEntry) -> DbResult<BlockNum> {
    let root = InternalBlock::allocate(pool)?;
    let root_num = root.block_num();
    root.set_header(
        pool,
        &HeadInfo {
            num_entries: 1,
            ..HeadInfo::empty(BlockType::IndexInternal)
        },
    )?;
    root.set_entry(pool, 0, entry)?;

    for child in [entry.lchild, entry.rchild] {
        GenericBlock::new(child).update_header(pool, |h| h.pblock = Some(root_num))?;
    }

    info!("created new index root {}", root_num);
    Ok(root_num)
}

/// Release every block of the tree rooted at `block`
///
/// Internal nodes visit the left child of their first entry and then the
/// right child of every entry, so each child is released exactly once.
pub fn destroy(pool: &mut BufferPool, block: BlockNum) -> DbResult<()> {
    match pool.block_type(block)? {
        BlockType::IndexLeaf => {}
        BlockType::IndexInternal => {
            for child in InternalBlock::new(block).children(pool)? {
                destroy(pool, child)?;
            }
        }
        _ => return Err(DbError::InvalidBlock(block)),
    }
    pool.release_block(block);
    Ok(())
}
