use crate::block::slots_per_block;
use crate::disk::BlockNum;
use crate::error::{DbError, DbResult};
use crate::record::{AttrType, Record, Value};

pub const RELCAT_ATTR_RELNAME: &str = "RelName";
pub const RELCAT_ATTR_NO_ATTRIBUTES: &str = "#Attributes";
pub const RELCAT_ATTR_NO_RECORDS: &str = "#Records";
pub const RELCAT_ATTR_FIRST_BLOCK: &str = "FirstBlock";
pub const RELCAT_ATTR_LAST_BLOCK: &str = "LastBlock";
pub const RELCAT_ATTR_NO_SLOTS: &str = "#Slots";

pub const ATTRCAT_ATTR_RELNAME: &str = "RelName";
pub const ATTRCAT_ATTR_ATTRIBUTE_NAME: &str = "AttributeName";
pub const ATTRCAT_ATTR_ATTRIBUTE_TYPE: &str = "AttributeType";
pub const ATTRCAT_ATTR_PRIMARY_FLAG: &str = "PrimaryFlag";
pub const ATTRCAT_ATTR_ROOT_BLOCK: &str = "RootBlock";
pub const ATTRCAT_ATTR_OFFSET: &str = "Offset";

/// Schema of the relation catalog, in attribute order
pub const RELCAT_SCHEMA: [(&str, AttrType); 6] = [
    (RELCAT_ATTR_RELNAME, AttrType::Str),
    (RELCAT_ATTR_NO_ATTRIBUTES, AttrType::Number),
    (RELCAT_ATTR_NO_RECORDS, AttrType::Number),
    (RELCAT_ATTR_FIRST_BLOCK, AttrType::Number),
    (RELCAT_ATTR_LAST_BLOCK, AttrType::Number),
    (RELCAT_ATTR_NO_SLOTS, AttrType::Number),
];

/// Schema of the attribute catalog, in attribute order
pub const ATTRCAT_SCHEMA: [(&str, AttrType); 6] = [
    (ATTRCAT_ATTR_RELNAME, AttrType::Str),
    (ATTRCAT_ATTR_ATTRIBUTE_NAME, AttrType::Str),
    (ATTRCAT_ATTR_ATTRIBUTE_TYPE, AttrType::Number),
    (ATTRCAT_ATTR_PRIMARY_FLAG, AttrType::Number),
    (ATTRCAT_ATTR_ROOT_BLOCK, AttrType::Number),
    (ATTRCAT_ATTR_OFFSET, AttrType::Number),
];

pub fn relcat_types() -> Vec<AttrType> {
    RELCAT_SCHEMA.iter().map(|&(_, ty)| ty).collect()
}

pub fn attrcat_types() -> Vec<AttrType> {
    ATTRCAT_SCHEMA.iter().map(|&(_, ty)| ty).collect()
}

fn str_field(record: &Record, idx: usize) -> DbResult<String> {
    match record.get(idx) {
        Some(Value::Str(s)) => Ok(s.clone()),
        other => Err(DbError::AttrTypeMismatch(format!(
            "catalog field {} should be a string, found {:?}",
            idx, other
        ))),
    }
}

fn num_field(record: &Record, idx: usize) -> DbResult<f64> {
    match record.get(idx) {
        Some(Value::Number(n)) => Ok(*n),
        other => Err(DbError::AttrTypeMismatch(format!(
            "catalog field {} should be a number, found {:?}",
            idx, other
        ))),
    }
}

fn count_field(record: &Record, idx: usize) -> DbResult<usize> {
    Ok(num_field(record, idx)?.max(0.0) as usize)
}

fn link_field(record: &Record, idx: usize) -> DbResult<Option<BlockNum>> {
    let raw = num_field(record, idx)?;
    Ok((raw >= 0.0).then_some(raw as BlockNum))
}

fn link_value(link: Option<BlockNum>) -> Value {
    Value::Number(link.map_or(-1.0, |b| b as f64))
}

/// One row of the relation catalog
#[derive(Debug, Clone, PartialEq)]
pub struct RelCatEntry {
    pub rel_name: String,
    pub num_attrs: usize,
    pub num_recs: usize,
    pub first_block: Option<BlockNum>,
    pub last_block: Option<BlockNum>,
    pub num_slots_per_block: usize,
}

impl RelCatEntry {
    /// Row of a new, empty relation
    pub fn new(rel_name: &str, num_attrs: usize) -> Self {
        Self {
            rel_name: rel_name.to_string(),
            num_attrs,
            num_recs: 0,
            first_block: None,
            last_block: None,
            num_slots_per_block: slots_per_block(num_attrs),
        }
    }

    pub fn to_record(&self) -> Record {
        Record::new(vec![
            Value::Str(self.rel_name.clone()),
            Value::Number(self.num_attrs as f64),
            Value::Number(self.num_recs as f64),
            link_value(self.first_block),
            link_value(self.last_block),
            Value::Number(self.num_slots_per_block as f64),
        ])
    }

    pub fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            rel_name: str_field(record, 0)?,
            num_attrs: count_field(record, 1)?,
            num_recs: count_field(record, 2)?,
            first_block: link_field(record, 3)?,
            last_block: link_field(record, 4)?,
            num_slots_per_block: count_field(record, 5)?,
        })
    }
}

/// One row of the attribute catalog
#[derive(Debug, Clone, PartialEq)]
pub struct AttrCatEntry {
    pub rel_name: String,
    pub attr_name: String,
    pub attr_type: AttrType,
    pub primary_flag: bool,
    pub root_block: Option<BlockNum>,
    pub offset: usize,
}

impl AttrCatEntry {
    pub fn new(rel_name: &str, attr_name: &str, attr_type: AttrType, offset: usize) -> Self {
        Self {
            rel_name: rel_name.to_string(),
            attr_name: attr_name.to_string(),
            attr_type,
            primary_flag: false,
            root_block: None,
            offset,
        }
    }

    pub fn to_record(&self) -> Record {
        Record::new(vec![
            Value::Str(self.rel_name.clone()),
            Value::Str(self.attr_name.clone()),
            Value::Number(self.attr_type.code() as f64),
            Value::Number(if self.primary_flag { 1.0 } else { -1.0 }),
            link_value(self.root_block),
            Value::Number(self.offset as f64),
        ])
    }

    pub fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            rel_name: str_field(record, 0)?,
            attr_name: str_field(record, 1)?,
            attr_type: AttrType::from_code(num_field(record, 2)? as i32)?,
            primary_flag: num_field(record, 3)? > 0.0,
            root_block: link_field(record, 4)?,
            offset: count_field(record, 5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rel_cat_entry_record() {
        let mut entry = RelCatEntry::new("Students", 2);
        assert_eq!(entry.num_slots_per_block, 61);
        assert_eq!(entry.first_block, None);

        entry.first_block = Some(6);
        entry.last_block = Some(9);
        entry.num_recs = 70;

        let record = entry.to_record();
        assert_eq!(record.get(3), Some(&Value::Number(6.0)));
        assert_eq!(RelCatEntry::from_record(&record).unwrap(), entry);

        let empty = RelCatEntry::new("Empty", 1).to_record();
        assert_eq!(empty.get(3), Some(&Value::Number(-1.0)));
    }

    #[test]
    fn test_attr_cat_entry_record() {
        let mut entry = AttrCatEntry::new("Students", "Age", AttrType::Number, 1);
        entry.root_block = Some(40);

        let record = entry.to_record();
        assert_eq!(record.len(), ATTRCAT_SCHEMA.len());
        assert_eq!(AttrCatEntry::from_record(&record).unwrap(), entry);
    }

    #[test]
    fn test_malformed_catalog_row() {
        let record = Record::new(vec![Value::Number(1.0)]);
        assert!(matches!(
            RelCatEntry::from_record(&record),
            Err(DbError::AttrTypeMismatch(_))
        ));
    }
}
