//! Relational operators over open relations.
//!
//! Every operator that produces a relation creates and opens the target,
//! fills it, and closes it. If anything fails after the target was created,
//! the target is closed and deleted again before the error is returned.


use log::{info, warn};

use crate::access::{self, InsertOutcome, Scan};
use crate::btree;
use crate::catalog::is_catalog;
use crate::engine::Engine;
use crate::error::{DbError, DbResult, RelId};
use crate::record::{AttrType, CompareOp, Record, Value};
use crate::schema;

/// Create `target`, let `fill` populate it, then close it
///
/// On failure the target is removed again.
fn with_target<S, F>(
    engine: &mut Engine,
    target: &str,
    attrs: &[(S, AttrType)],
    fill: F,
) -> DbResult<()>
where
    S: AsRef<str>,
    F: FnOnce(&mut Engine, RelId) -> DbResult<()>,
{
    schema::create_rel(engine, target, attrs)?;

    let result = schema::open_rel(engine, target).and_then(|target_id| fill(engine, target_id));
    match result {
        Ok(()) => schema::close_rel(engine, target),
        Err(err) => {
            if engine.cache.is_open(target)
                && let Err(close_err) = schema::close_rel(engine, target)
            {
                warn!("could not close {} after failure: {}", target, close_err);
            }
            if let Err(delete_err) = schema::delete_rel(engine, target) {
                warn!("could not delete {} after failure: {}", target, delete_err);
            }
            Err(err)
        }
    }
}

fn schema_of(engine: &Engine, rel_id: RelId) -> DbResult<Vec<(String, AttrType)>> {
    Ok(engine
        .cache
        .attr_entries(rel_id)?
        .into_iter()
        .map(|attr| (attr.attr_name, attr.attr_type))
        .collect())
}

/// Insert a row given as text, converting each value to its attribute's type
pub fn insert<S: AsRef<str>>(
    engine: &mut Engine,
    rel_name: &str,
    values: &[S],
) -> DbResult<InsertOutcome> {
    if is_catalog(rel_name) {
        return Err(DbError::NotPermitted);
    }
    let rel_id = engine.cache.rel_id(rel_name)?;
    let attrs = engine.cache.attr_entries(rel_id)?;
    if values.len() != attrs.len() {
        return Err(DbError::NAttrMismatch {
            expected: attrs.len(),
            actual: values.len(),
        });
    }

    let values = attrs
        .iter()
        .zip(values)
        .map(|(attr, text)| Value::parse(text.as_ref(), attr.attr_type))
        .collect::<DbResult<Vec<_>>>()?;
    access::insert(engine, rel_id, &Record::new(values))
}

/// Copy the records of `src` whose `attr` compares to `value` by `op` into `target`
pub fn select(
    engine: &mut Engine,
    src: &str,
    target: &str,
    attr_name: &str,
    op: CompareOp,
    value: &str,
) -> DbResult<()> {
    let src_id = engine.cache.rel_id(src)?;
    let attr = engine.cache.attr_entry(src_id, attr_name)?;
    let value = Value::parse(value, attr.attr_type)?;
    let attrs = schema_of(engine, src_id)?;

    let mut count = 0;
    with_target(engine, target, &attrs, |engine, target_id| {
        engine.cache.reset_search_cursor(src_id)?;
        engine.cache.reset_attr_search_cursor(src_id, attr_name)?;
        while let Some(record) = access::search(engine, src_id, attr_name, &value, op)? {
            access::insert(engine, target_id, &record)?;
            count += 1;
        }
        Ok(())
    })?;

    info!("selected {} records of {} into {}", count, src, target);
    Ok(())
}

/// Copy every record of `src` into `target`
pub fn project(engine: &mut Engine, src: &str, target: &str) -> DbResult<()> {
    let src_id = engine.cache.rel_id(src)?;
    let attrs = schema_of(engine, src_id)?;

    with_target(engine, target, &attrs, |engine, target_id| {
        let mut scan = Scan::new(src_id);
        while let Some((_, record)) = scan.next(engine)? {
            access::insert(engine, target_id, &record)?;
        }
        Ok(())
    })
}

/// Copy the listed attributes of every record of `src` into `target`
pub fn project_attrs<S: AsRef<str>>(
    engine: &mut Engine,
    src: &str,
    target: &str,
    attr_names: &[S],
) -> DbResult<()> {
    let src_id = engine.cache.rel_id(src)?;
    let mut offsets = Vec::with_capacity(attr_names.len());
    let mut attrs = Vec::with_capacity(attr_names.len());
    for name in attr_names {
        let attr = engine.cache.attr_entry(src_id, name.as_ref())?;
        offsets.push(attr.offset);
        attrs.push((attr.attr_name, attr.attr_type));
    }

    with_target(engine, target, &attrs, |engine, target_id| {
        let mut scan = Scan::new(src_id);
        while let Some((_, record)) = scan.next(engine)? {
            let values = offsets
                .iter()
                .filter_map(|&offset| record.get(offset).cloned())
                .collect();
            access::insert(engine, target_id, &Record::new(values))?;
        }
        Ok(())
    })
}

/// Equi-join `src1.attr1 = src2.attr2` into `target`
///
/// The target holds every attribute of `src1` followed by those of `src2`
/// except `attr2`. The inner relation is probed through an index on `attr2`,
/// which is built if missing.
pub fn join(
    engine: &mut Engine,
    src1: &str,
    src2: &str,
    target: &str,
    attr1: &str,
    attr2: &str,
) -> DbResult<()> {
    let outer_id = engine.cache.rel_id(src1)?;
    let inner_id = engine.cache.rel_id(src2)?;
    let outer_attr = engine.cache.attr_entry(outer_id, attr1)?;
    let inner_attr = engine.cache.attr_entry(inner_id, attr2)?;
    if outer_attr.attr_type != inner_attr.attr_type {
        return Err(DbError::AttrTypeMismatch(attr2.to_string()));
    }

    let mut attrs = schema_of(engine, outer_id)?;
    for (name, attr_type) in schema_of(engine, inner_id)? {
        if name == attr2 {
            continue;
        }
        if attrs.iter().any(|(outer_name, _)| *outer_name == name) {
            return Err(DbError::DuplicateAttr(name));
        }
        attrs.push((name, attr_type));
    }

    let mut count = 0;
    with_target(engine, target, &attrs, |engine, target_id| {
        let mut outer = Scan::new(outer_id);
        while let Some((_, outer_record)) = outer.next(engine)? {
            let Some(key) = outer_record.get(outer_attr.offset).cloned() else {
                continue;
            };
            // A full disk may have dropped the index since the last probe
            btree::create(engine, inner_id, attr2)?;
            engine.cache.reset_attr_search_cursor(inner_id, attr2)?;

            while let Some(inner_record) = access::search(engine, inner_id, attr2, &key, CompareOp::Eq)? {
                let mut values = outer_record.values().to_vec();
                values.extend(
                    inner_record
                        .into_values()
                        .into_iter()
                        .enumerate()
                        .filter(|&(offset, _)| offset != inner_attr.offset)
                        .map(|(_, value)| value),
                );
                access::insert(engine, target_id, &Record::new(values))?;
                count += 1;
            }
        }
        Ok(())
    })?;

    info!("joined {} and {} into {} ({} records)", src1, src2, target, count);
    Ok(())
}
