use super::*;
use crate::catalog::ATTRCAT_NAME;
use crate::config::EngineConfig;
use crate::record::AttrType;
use crate::schema;
use tempfile::TempDir;

fn setup_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::with_disk(temp_dir.path().join("disk"));
    let engine = Engine::create(&config).unwrap();
    (temp_dir, engine)
}

fn student(name: &str, age: f64) -> Record {
    Record::new(vec![Value::Str(name.to_string()), Value::Number(age)])
}

fn create_students(engine: &mut Engine, count: usize) -> RelId {
    schema::create_rel(
        engine,
        "Students",
        &[("Name", AttrType::Str), ("Age", AttrType::Number)],
    )
    .unwrap();
    let rel_id = schema::open_rel(engine, "Students").unwrap();
    for i in 0..count {
        insert(engine, rel_id, &student(&format!("s{}", i), i as f64)).unwrap();
    }
    rel_id
}

#[test]
fn test_insert_round_trip() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 0);

    let alice = student("Alice", 20.0);
    let outcome = insert(&mut engine, rel_id, &alice).unwrap();
    assert!(matches!(outcome, InsertOutcome::Inserted(_)));

    let rec_id = outcome.rec_id();
    let types = engine.cache().attr_types(rel_id).unwrap();
    let stored = RecordBlock::new(rec_id.block)
        .record(engine.pool(), rec_id.slot, &types)
        .unwrap();
    assert_eq!(stored, alice);

    let rel = engine.cache().rel_entry(rel_id).unwrap();
    assert_eq!(rel.num_recs, 1);
    assert_eq!(rel.first_block, Some(rec_id.block));
    assert_eq!(rel.last_block, Some(rec_id.block));
}

#[test]
fn test_insert_rejects_bad_records() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 0);

    assert!(matches!(
        insert(&mut engine, rel_id, &Record::new(vec![Value::Number(1.0)])),
        Err(DbError::NAttrMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert!(matches!(
        insert(
            &mut engine,
            rel_id,
            &Record::new(vec![Value::Number(1.0), Value::Number(2.0)])
        ),
        Err(DbError::AttrTypeMismatch(_))
    ));
    assert!(matches!(
        insert(&mut engine, rel_id, &student("A name far too long", 1.0)),
        Err(DbError::ValueTooLong(_))
    ));
    assert_eq!(engine.cache().rel_entry(rel_id).unwrap().num_recs, 0);
}

#[test]
fn test_chain_grows_at_tail() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 130);

    let rel = engine.cache().rel_entry(rel_id).unwrap();
    assert_eq!(rel.num_recs, 130);

    let first = rel.first_block.unwrap();
    let head = RecordBlock::new(first).header(engine.pool()).unwrap();
    assert_eq!(head.lblock, None);
    assert_eq!(head.num_entries, 61);
    assert_eq!(head.num_slots, 61);

    let second = head.rblock.unwrap();
    let head = RecordBlock::new(second).header(engine.pool()).unwrap();
    assert_eq!(head.lblock, Some(first));
    let third = head.rblock.unwrap();
    let head = RecordBlock::new(third).header(engine.pool()).unwrap();
    assert_eq!(head.rblock, None);
    assert_eq!(head.num_entries, 8);
    assert_eq!(rel.last_block, Some(third));
}

#[test]
fn test_project_visits_every_record_once() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 100);

    // Punch holes into both blocks
    let first = engine.cache().rel_entry(rel_id).unwrap().first_block.unwrap();
    let view = RecordBlock::new(first);
    for slot in [0, 7, 60] {
        view.set_slot(engine.pool(), slot, false).unwrap();
    }
    let second = view.header(engine.pool()).unwrap().rblock.unwrap();
    RecordBlock::new(second)
        .set_slot(engine.pool(), 1, false)
        .unwrap();

    engine.cache_mut().reset_search_cursor(rel_id).unwrap();
    let mut ages = Vec::new();
    while let Some(record) = project(&mut engine, rel_id).unwrap() {
        ages.push(record.get(1).unwrap().as_number().unwrap() as usize);
    }

    let expected: Vec<usize> = (0..100).filter(|a| ![0, 7, 60, 62].contains(a)).collect();
    assert_eq!(ages, expected);
    assert!(project(&mut engine, rel_id).unwrap().is_none());
}

#[test]
fn test_linear_search_resumes() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 0);
    for (name, age) in [("Alice", 20.0), ("Bob", 21.0), ("Carol", 20.0), ("Dan", 19.0)] {
        insert(&mut engine, rel_id, &student(name, age)).unwrap();
    }

    let twenty = Value::Number(20.0);
    engine.cache_mut().reset_search_cursor(rel_id).unwrap();
    let first = linear_search(&mut engine, rel_id, "Age", &twenty, CompareOp::Eq)
        .unwrap()
        .unwrap();
    let second = linear_search(&mut engine, rel_id, "Age", &twenty, CompareOp::Eq)
        .unwrap()
        .unwrap();
    assert_eq!(first.slot, 0);
    assert_eq!(second.slot, 2);
    assert!(linear_search(&mut engine, rel_id, "Age", &twenty, CompareOp::Eq)
        .unwrap()
        .is_none());
    assert_eq!(engine.cache().search_cursor(rel_id).unwrap(), Some(second));

    engine.cache_mut().reset_search_cursor(rel_id).unwrap();
    let mut young = Vec::new();
    while let Some(record) = search(&mut engine, rel_id, "Age", &twenty, CompareOp::Le).unwrap() {
        young.push(record.get(0).unwrap().as_str().unwrap().to_string());
    }
    assert_eq!(young, vec!["Alice", "Carol", "Dan"]);

    assert!(matches!(
        linear_search(&mut engine, rel_id, "Height", &twenty, CompareOp::Eq),
        Err(DbError::AttrNotExist(_))
    ));
}

#[test]
fn test_search_uses_index() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 80);
    schema::create_index(&mut engine, "Students", "Age").unwrap();

    let value = Value::Number(70.0);
    let mut ages = Vec::new();
    while let Some(record) = search(&mut engine, rel_id, "Age", &value, CompareOp::Ge).unwrap() {
        ages.push(record.get(1).unwrap().as_number().unwrap());
    }
    assert_eq!(ages, (70..80i32).map(f64::from).collect::<Vec<_>>());
    // The relation cursor is untouched by index searches
    assert_eq!(engine.cache().search_cursor(rel_id).unwrap(), None);
}

#[test]
fn test_scans_are_independent() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 5);

    let mut all = Scan::new(rel_id);
    let mut old = Scan::filtered(&engine, rel_id, "Age", CompareOp::Ge, Value::Number(3.0)).unwrap();

    let (_, first) = all.next(&mut engine).unwrap().unwrap();
    let (_, three) = old.next(&mut engine).unwrap().unwrap();
    let (_, second) = all.next(&mut engine).unwrap().unwrap();
    assert_eq!(first, student("s0", 0.0));
    assert_eq!(three, student("s3", 3.0));
    assert_eq!(second, student("s1", 1.0));

    let rest: Vec<Record> = old
        .iter(&mut engine)
        .map(|r| r.unwrap().1)
        .collect();
    assert_eq!(rest, vec![student("s4", 4.0)]);
    assert!(old.next(&mut engine).unwrap().is_none());

    old.reset();
    assert_eq!(old.iter(&mut engine).count(), 2);
    assert_eq!(all.iter(&mut engine).count(), 3);
}

#[test]
fn test_released_blocks_are_reused_clean() {
    let (_temp_dir, mut engine) = setup_engine();
    let rel_id = create_students(&mut engine, 70);
    let old_first = engine.cache().rel_entry(rel_id).unwrap().first_block.unwrap();

    schema::close_rel(&mut engine, "Students").unwrap();
    schema::delete_rel(&mut engine, "Students").unwrap();

    schema::create_rel(&mut engine, "Tiny", &[("Id", AttrType::Number)]).unwrap();
    let tiny = schema::open_rel(&mut engine, "Tiny").unwrap();
    let rec_id = insert(&mut engine, tiny, &Record::new(vec![Value::Number(1.0)]))
        .unwrap()
        .rec_id();
    assert_eq!(rec_id, RecordId::new(old_first, 0));

    let view = RecordBlock::new(rec_id.block);
    let head = view.header(engine.pool()).unwrap();
    assert_eq!(head.num_entries, 1);
    assert_eq!(head.num_attrs, 1);
    assert_eq!(head.rblock, None);
    let occupied = view
        .slot_map(engine.pool())
        .unwrap()
        .iter()
        .filter(|&&o| o)
        .count();
    assert_eq!(occupied, 1);
}

#[test]
fn test_delete_releases_attribute_catalog_blocks() {
    let (_temp_dir, mut engine) = setup_engine();
    let attrs: Vec<(String, AttrType)> = (0..12)
        .map(|i| (format!("A{}", i), AttrType::Number))
        .collect();

    // 12 catalog rows plus 12 more overflow the first attribute catalog block
    schema::create_rel(&mut engine, "Wide", &attrs).unwrap();
    let attrcat = engine.cache().rel_entry(ATTRCAT_RELID).unwrap();
    let overflow = attrcat.last_block.unwrap();
    assert_ne!(attrcat.first_block, attrcat.last_block);

    schema::delete_rel(&mut engine, "Wide").unwrap();
    let attrcat = engine.cache().rel_entry(ATTRCAT_RELID).unwrap();
    assert_eq!(attrcat.last_block, attrcat.first_block);
    assert_eq!(attrcat.num_recs, 12);
    assert_eq!(engine.pool().block_type(overflow).unwrap(), BlockType::Unused);

    let head = RecordBlock::new(attrcat.first_block.unwrap())
        .header(engine.pool())
        .unwrap();
    assert_eq!(head.rblock, None);
}

#[test]
fn test_catalog_relations_are_protected() {
    let (_temp_dir, mut engine) = setup_engine();
    assert!(matches!(
        delete_relation(&mut engine, ATTRCAT_NAME),
        Err(DbError::NotPermitted)
    ));
    assert!(matches!(
        delete_relation(&mut engine, "Ghost"),
        Err(DbError::RelNotExist(_))
    ));
}

#[test]
fn test_insert_reports_dropped_index() {
    let (_temp_dir, mut engine) = setup_engine();
    // 63 keys fill the single index leaf; the record block still has free slots
    let rel_id = create_students(&mut engine, 63);
    schema::create_index(&mut engine, "Students", "Age").unwrap();
    let root = engine.cache().attr_entry(rel_id, "Age").unwrap().root_block.unwrap();

    while engine.pool().allocate_block(BlockType::Record).is_ok() {}

    let outcome = insert(&mut engine, rel_id, &student("late", 100.0)).unwrap();
    assert!(matches!(outcome, InsertOutcome::IndexBlocksReleased(_)));
    assert_eq!(engine.cache().attr_entry(rel_id, "Age").unwrap().root_block, None);
    assert_eq!(engine.pool().block_type(root).unwrap(), BlockType::Unused);
    assert_eq!(engine.cache().rel_entry(rel_id).unwrap().num_recs, 64);

    // Searches fall back to a linear scan and still see the new record
    engine.cache_mut().reset_search_cursor(rel_id).unwrap();
    let found = search(&mut engine, rel_id, "Age", &Value::Number(100.0), CompareOp::Eq).unwrap();
    assert_eq!(found, Some(student("late", 100.0)));
}
