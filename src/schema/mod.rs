//! Data definition: creating, dropping, opening and renaming relations, and
//! building or dropping indexes.

use ahash::AHashSet;
use log::{info, warn};

use crate::access;
use crate::btree;
use crate::catalog::{
    self, ATTRCAT_RELID, AttrCatEntry, RELCAT_ATTR_RELNAME, RELCAT_RELID, RelCatEntry, is_catalog,
};
use crate::engine::Engine;
use crate::error::{DbError, DbResult, RelId};
use crate::record::{AttrType, CompareOp, MAX_STRING_LEN, Value};

fn check_name(name: &str) -> DbResult<()> {
    if name.len() > MAX_STRING_LEN {
        return Err(DbError::NameTooLong(name.to_string()));
    }
    Ok(())
}

fn reject_catalog(rel_name: &str) -> DbResult<()> {
    if is_catalog(rel_name) {
        return Err(DbError::NotPermitted);
    }
    Ok(())
}

fn reject_open(engine: &Engine, rel_name: &str) -> DbResult<()> {
    if engine.cache.is_open(rel_name) {
        return Err(DbError::RelOpen(rel_name.to_string()));
    }
    Ok(())
}

/// Create an empty relation with the given attributes, in order
pub fn create_rel<S: AsRef<str>>(
    engine: &mut Engine,
    rel_name: &str,
    attrs: &[(S, AttrType)],
) -> DbResult<()> {
    check_name(rel_name)?;
    let mut seen = AHashSet::new();
    for (name, _) in attrs {
        let name = name.as_ref();
        check_name(name)?;
        if !seen.insert(name) {
            return Err(DbError::DuplicateAttr(name.to_string()));
        }
    }

    engine.cache.reset_search_cursor(RELCAT_RELID)?;
    let existing = access::linear_search(
        engine,
        RELCAT_RELID,
        RELCAT_ATTR_RELNAME,
        &Value::Str(rel_name.to_string()),
        CompareOp::Eq,
    )?;
    if existing.is_some() {
        return Err(DbError::RelExist(rel_name.to_string()));
    }

    let rel = RelCatEntry::new(rel_name, attrs.len());
    access::insert(engine, RELCAT_RELID, &rel.to_record())?;

    for (offset, (name, attr_type)) in attrs.iter().enumerate() {
        let attr = AttrCatEntry::new(rel_name, name.as_ref(), *attr_type, offset);
        if let Err(err) = access::insert(engine, ATTRCAT_RELID, &attr.to_record()) {
            if let Err(rollback_err) = access::delete_relation(engine, rel_name) {
                warn!("could not roll back {}: {}", rel_name, rollback_err);
            }
            return Err(err);
        }
    }

    info!("created relation {} with {} attributes", rel_name, attrs.len());
    Ok(())
}

/// Delete a closed relation with all its records and indexes
pub fn delete_rel(engine: &mut Engine, rel_name: &str) -> DbResult<()> {
    reject_catalog(rel_name)?;
    reject_open(engine, rel_name)?;
    access::delete_relation(engine, rel_name)?;

    info!("deleted relation {}", rel_name);
    Ok(())
}

pub fn open_rel(engine: &mut Engine, rel_name: &str) -> DbResult<RelId> {
    catalog::open_rel(engine, rel_name)
}

pub fn close_rel(engine: &mut Engine, rel_name: &str) -> DbResult<()> {
    reject_catalog(rel_name)?;
    let rel_id = engine.cache.rel_id(rel_name)?;
    catalog::close_rel(engine, rel_id)
}

pub fn rename_rel(engine: &mut Engine, old_name: &str, new_name: &str) -> DbResult<()> {
    reject_catalog(old_name)?;
    reject_catalog(new_name)?;
    check_name(new_name)?;
    reject_open(engine, old_name)?;
    access::rename_relation(engine, old_name, new_name)
}

pub fn rename_attr(
    engine: &mut Engine,
    rel_name: &str,
    old_name: &str,
    new_name: &str,
) -> DbResult<()> {
    reject_catalog(rel_name)?;
    check_name(new_name)?;
    reject_open(engine, rel_name)?;
    access::rename_attribute(engine, rel_name, old_name, new_name)
}

/// Build a B+ tree on an attribute of an open relation
pub fn create_index(engine: &mut Engine, rel_name: &str, attr_name: &str) -> DbResult<()> {
    reject_catalog(rel_name)?;
    let rel_id = engine.cache.rel_id(rel_name)?;
    btree::create(engine, rel_id, attr_name)
}

/// Destroy the B+ tree on an attribute of an open relation
pub fn drop_index(engine: &mut Engine, rel_name: &str, attr_name: &str) -> DbResult<()> {
    reject_catalog(rel_name)?;
    let rel_id = engine.cache.rel_id(rel_name)?;
    let mut attr = engine.cache.attr_entry(rel_id, attr_name)?;
    let root = attr
        .root_block
        .ok_or_else(|| DbError::NoIndex(attr_name.to_string()))?;

    btree::destroy(&mut engine.pool, root)?;
    attr.root_block = None;
    engine.cache.set_attr_entry(rel_id, attr_name, attr)?;
    engine.cache.reset_attr_search_cursor(rel_id, attr_name)?;

    info!("dropped index on {}.{}", rel_name, attr_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ATTRCAT_NAME, RELCAT_NAME};
    use crate::config::EngineConfig;
    use crate::disk::BlockType;
    use tempfile::TempDir;

    const STUDENTS: [(&str, AttrType); 2] = [("Name", AttrType::Str), ("Age", AttrType::Number)];

    fn setup_engine() -> (TempDir, EngineConfig, Engine) {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig::with_disk(temp_dir.path().join("disk"));
        let engine = Engine::create(&config).unwrap();
        (temp_dir, config, engine)
    }

    #[test]
    fn test_create_and_open() {
        let (_temp_dir, _config, mut engine) = setup_engine();
        create_rel(&mut engine, "Students", &STUDENTS).unwrap();

        let rel_id = open_rel(&mut engine, "Students").unwrap();
        assert_eq!(rel_id, 2);
        assert_eq!(open_rel(&mut engine, "Students").unwrap(), rel_id);

        let rel = engine.cache().rel_entry(rel_id).unwrap();
        assert_eq!(rel.num_attrs, 2);
        assert_eq!(rel.num_recs, 0);
        assert_eq!(rel.first_block, None);
        assert_eq!(rel.num_slots_per_block, 61);

        let age = engine.cache().attr_entry(rel_id, "Age").unwrap();
        assert_eq!(age.offset, 1);
        assert_eq!(age.attr_type, AttrType::Number);

        assert_eq!(engine.cache().rel_entry(RELCAT_RELID).unwrap().num_recs, 3);
        assert_eq!(engine.cache().rel_entry(ATTRCAT_RELID).unwrap().num_recs, 14);
    }

    #[test]
    fn test_create_errors() {
        let (_temp_dir, _config, mut engine) = setup_engine();
        create_rel(&mut engine, "Students", &STUDENTS).unwrap();

        assert!(matches!(
            create_rel(&mut engine, "Students", &STUDENTS),
            Err(DbError::RelExist(_))
        ));
        assert!(matches!(
            create_rel(&mut engine, RELCAT_NAME, &STUDENTS),
            Err(DbError::RelExist(_))
        ));
        assert!(matches!(
            create_rel(
                &mut engine,
                "Twice",
                &[("A", AttrType::Str), ("A", AttrType::Number)]
            ),
            Err(DbError::DuplicateAttr(_))
        ));
        assert!(matches!(
            create_rel(&mut engine, "AVeryLongRelationName", &STUDENTS),
            Err(DbError::NameTooLong(_))
        ));
        assert!(matches!(
            open_rel(&mut engine, "Missing"),
            Err(DbError::RelNotExist(_))
        ));
    }

    #[test]
    fn test_create_rolls_back_on_full_disk() {
        let (_temp_dir, _config, mut engine) = setup_engine();
        while engine.pool().allocate_block(BlockType::Record).is_ok() {}

        // The attribute catalog block has room for 8 more rows
        let attrs: Vec<(String, AttrType)> = (0..10)
            .map(|i| (format!("A{}", i), AttrType::Number))
            .collect();
        assert!(matches!(
            create_rel(&mut engine, "Wide", &attrs),
            Err(DbError::DiskFull)
        ));

        assert!(matches!(
            open_rel(&mut engine, "Wide"),
            Err(DbError::RelNotExist(_))
        ));
        assert_eq!(engine.cache().rel_entry(RELCAT_RELID).unwrap().num_recs, 2);
        assert_eq!(engine.cache().rel_entry(ATTRCAT_RELID).unwrap().num_recs, 12);

        // The rows freed by the rollback are usable again
        create_rel(&mut engine, "Narrow", &attrs[..8]).unwrap();
        assert_eq!(engine.cache().rel_entry(ATTRCAT_RELID).unwrap().num_recs, 20);
    }

    #[test]
    fn test_relation_catalog_is_bounded() {
        let (_temp_dir, _config, mut engine) = setup_engine();

        // The relation catalog block holds 20 rows, two of them its own
        for i in 0..18 {
            create_rel(&mut engine, &format!("R{}", i), &[("A", AttrType::Number)]).unwrap();
        }
        assert!(matches!(
            create_rel(&mut engine, "R18", &[("A", AttrType::Number)]),
            Err(DbError::MaxRelations)
        ));
    }

    #[test]
    fn test_open_table_is_bounded() {
        let (_temp_dir, _config, mut engine) = setup_engine();
        for i in 0..11 {
            create_rel(&mut engine, &format!("R{}", i), &[("A", AttrType::Number)]).unwrap();
        }
        for i in 0..10 {
            open_rel(&mut engine, &format!("R{}", i)).unwrap();
        }
        assert!(matches!(
            open_rel(&mut engine, "R10"),
            Err(DbError::CacheFull)
        ));

        close_rel(&mut engine, "R3").unwrap();
        assert_eq!(open_rel(&mut engine, "R10").unwrap(), 5);
    }

    #[test]
    fn test_delete_rel() {
        let (_temp_dir, _config, mut engine) = setup_engine();
        create_rel(&mut engine, "Students", &STUDENTS).unwrap();
        let rel_id = open_rel(&mut engine, "Students").unwrap();
        let record = crate::record::Record::new(vec![
            Value::Str("Alice".into()),
            Value::Number(20.0),
        ]);
        let block = access::insert(&mut engine, rel_id, &record)
            .unwrap()
            .rec_id()
            .block;

        assert!(matches!(
            delete_rel(&mut engine, "Students"),
            Err(DbError::RelOpen(_))
        ));
        assert!(matches!(
            delete_rel(&mut engine, ATTRCAT_NAME),
            Err(DbError::NotPermitted)
        ));

        close_rel(&mut engine, "Students").unwrap();
        delete_rel(&mut engine, "Students").unwrap();

        assert_eq!(engine.pool().block_type(block).unwrap(), BlockType::Unused);
        assert_eq!(engine.cache().rel_entry(RELCAT_RELID).unwrap().num_recs, 2);
        assert_eq!(engine.cache().rel_entry(ATTRCAT_RELID).unwrap().num_recs, 12);
        assert!(matches!(
            open_rel(&mut engine, "Students"),
            Err(DbError::RelNotExist(_))
        ));
        assert!(matches!(
            delete_rel(&mut engine, "Students"),
            Err(DbError::RelNotExist(_))
        ));

        // The freed catalog slots are reused
        create_rel(&mut engine, "Pupils", &STUDENTS).unwrap();
        assert_eq!(engine.cache().rel_entry(RELCAT_RELID).unwrap().num_recs, 3);
    }

    #[test]
    fn test_renames() {
        let (_temp_dir, _config, mut engine) = setup_engine();
        create_rel(&mut engine, "Students", &STUDENTS).unwrap();
        create_rel(&mut engine, "Staff", &STUDENTS).unwrap();

        assert!(matches!(
            rename_rel(&mut engine, "Students", "Staff"),
            Err(DbError::RelExist(_))
        ));
        assert!(matches!(
            rename_rel(&mut engine, "Nobody", "Others"),
            Err(DbError::RelNotExist(_))
        ));
        assert!(matches!(
            rename_rel(&mut engine, RELCAT_NAME, "Others"),
            Err(DbError::NotPermitted)
        ));

        rename_rel(&mut engine, "Students", "Pupils").unwrap();
        rename_attr(&mut engine, "Pupils", "Age", "Years").unwrap();
        assert!(matches!(
            rename_attr(&mut engine, "Pupils", "Name", "Years"),
            Err(DbError::AttrExist(_))
        ));
        assert!(matches!(
            rename_attr(&mut engine, "Pupils", "Height", "Size"),
            Err(DbError::AttrNotExist(_))
        ));

        let rel_id = open_rel(&mut engine, "Pupils").unwrap();
        let names: Vec<String> = engine
            .cache()
            .attr_entries(rel_id)
            .unwrap()
            .into_iter()
            .map(|a| a.attr_name)
            .collect();
        assert_eq!(names, vec!["Name", "Years"]);

        assert!(matches!(
            rename_rel(&mut engine, "Pupils", "Kids"),
            Err(DbError::RelOpen(_))
        ));
        assert!(matches!(
            open_rel(&mut engine, "Students"),
            Err(DbError::RelNotExist(_))
        ));
    }

    #[test]
    fn test_index_survives_reopen() {
        let (_temp_dir, config, mut engine) = setup_engine();
        create_rel(&mut engine, "Students", &STUDENTS).unwrap();
        open_rel(&mut engine, "Students").unwrap();

        assert!(matches!(
            drop_index(&mut engine, "Students", "Age"),
            Err(DbError::NoIndex(_))
        ));
        create_index(&mut engine, "Students", "Age").unwrap();
        engine.shutdown().unwrap();

        let mut engine = Engine::open(&config).unwrap();
        let rel_id = open_rel(&mut engine, "Students").unwrap();
        let root = engine
            .cache()
            .attr_entry(rel_id, "Age")
            .unwrap()
            .root_block
            .unwrap();
        assert_eq!(engine.pool().block_type(root).unwrap(), BlockType::IndexLeaf);

        drop_index(&mut engine, "Students", "Age").unwrap();
        assert_eq!(engine.pool().block_type(root).unwrap(), BlockType::Unused);
        assert_eq!(
            engine.cache().attr_entry(rel_id, "Age").unwrap().root_block,
            None
        );
        assert!(matches!(
            create_index(&mut engine, RELCAT_NAME, "RelName"),
            Err(DbError::NotPermitted)
        ));
    }
}
