//! Relation and attribute catalogs.
//!
//! Both catalogs are ordinary relations stored in record blocks. Open
//! relations get their catalog rows mirrored in an [`OpenRelTable`]; the rows
//! are written back when the relation is closed.

mod bootstrap;
mod cache;
mod entry;
mod open;

pub use cache::OpenRelTable;
pub use entry::{
    ATTRCAT_ATTR_ATTRIBUTE_NAME, ATTRCAT_ATTR_ATTRIBUTE_TYPE, ATTRCAT_ATTR_OFFSET,
    ATTRCAT_ATTR_PRIMARY_FLAG, ATTRCAT_ATTR_RELNAME, ATTRCAT_ATTR_ROOT_BLOCK, ATTRCAT_SCHEMA,
    AttrCatEntry, RELCAT_ATTR_FIRST_BLOCK, RELCAT_ATTR_LAST_BLOCK, RELCAT_ATTR_NO_ATTRIBUTES,
    RELCAT_ATTR_NO_RECORDS, RELCAT_ATTR_NO_SLOTS, RELCAT_ATTR_RELNAME, RELCAT_SCHEMA,
    RelCatEntry, attrcat_types, relcat_types,
};
pub use open::{close_all, close_rel, open_rel};

pub(crate) use bootstrap::{format, load_catalogs};

use crate::disk::BlockNum;
use crate::error::RelId;

pub const RELCAT_RELID: RelId = 0;
pub const ATTRCAT_RELID: RelId = 1;

pub const RELCAT_BLOCK: BlockNum = 4;
pub const ATTRCAT_BLOCK: BlockNum = 5;

pub const RELCAT_NAME: &str = "RELATIONCAT";
pub const ATTRCAT_NAME: &str = "ATTRIBUTECAT";

/// Default size of the open-relation table
pub const MAX_OPEN: usize = 12;

pub fn is_catalog(rel_name: &str) -> bool {
    rel_name == RELCAT_NAME || rel_name == ATTRCAT_NAME
}

pub fn is_catalog_id(rel_id: RelId) -> bool {
    rel_id == RELCAT_RELID || rel_id == ATTRCAT_RELID
}
