use ahash::AHashMap;

use super::entry::{AttrCatEntry, RelCatEntry};
use crate::error::{DbError, DbResult, RelId};
use crate::record::{AttrType, IndexId, RecordId};

/// Cached relation catalog row of an open relation
#[derive(Debug, Clone)]
pub(crate) struct RelCacheEntry {
    pub(crate) entry: RelCatEntry,
    /// Where the row lives in the relation catalog
    pub(crate) rec_id: RecordId,
    pub(crate) dirty: bool,
    /// Last record matched by a linear scan; `None` means reset
    pub(crate) cursor: Option<RecordId>,
}

/// Cached attribute catalog row of an open relation
#[derive(Debug, Clone)]
pub(crate) struct AttrCacheEntry {
    pub(crate) entry: AttrCatEntry,
    pub(crate) rec_id: RecordId,
    pub(crate) dirty: bool,
    /// Last index entry matched by a tree search; `None` means reset
    pub(crate) cursor: Option<IndexId>,
}

/// Everything cached for one open relation
#[derive(Debug, Clone)]
pub(crate) struct OpenRelation {
    pub(crate) rel: RelCacheEntry,
    /// Sorted by attribute offset
    pub(crate) attrs: Vec<AttrCacheEntry>,
}

impl OpenRelation {
    pub(crate) fn new(
        entry: RelCatEntry,
        rec_id: RecordId,
        mut attrs: Vec<(AttrCatEntry, RecordId)>,
    ) -> Self {
        attrs.sort_by_key(|(attr, _)| attr.offset);
        Self {
            rel: RelCacheEntry {
                entry,
                rec_id,
                dirty: false,
                cursor: None,
            },
            attrs: attrs
                .into_iter()
                .map(|(entry, rec_id)| AttrCacheEntry {
                    entry,
                    rec_id,
                    dirty: false,
                    cursor: None,
                })
                .collect(),
        }
    }
}

/// In-memory catalog mirror for every open relation, indexed by relation id
pub struct OpenRelTable {
    slots: Vec<Option<OpenRelation>>,
    /// Relation name to relation id
    names: AHashMap<String, RelId>,
}

impl OpenRelTable {
    /// Create a table with room for `max_open` relations, catalogs included
    pub fn new(max_open: usize) -> Self {
        Self {
            slots: vec![None; max_open.max(2)],
            names: AHashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, rel_id: RelId) -> DbResult<&OpenRelation> {
        self.slots
            .get(rel_id)
            .and_then(Option::as_ref)
            .ok_or(DbError::NotOpen(rel_id))
    }

    fn slot_mut(&mut self, rel_id: RelId) -> DbResult<&mut OpenRelation> {
        self.slots
            .get_mut(rel_id)
            .and_then(Option::as_mut)
            .ok_or(DbError::NotOpen(rel_id))
    }

    fn attr(&self, rel_id: RelId, attr_name: &str) -> DbResult<&AttrCacheEntry> {
        self.slot(rel_id)?
            .attrs
            .iter()
            .find(|a| a.entry.attr_name == attr_name)
            .ok_or_else(|| DbError::AttrNotExist(attr_name.to_string()))
    }

    fn attr_mut(&mut self, rel_id: RelId, attr_name: &str) -> DbResult<&mut AttrCacheEntry> {
        self.slot_mut(rel_id)?
            .attrs
            .iter_mut()
            .find(|a| a.entry.attr_name == attr_name)
            .ok_or_else(|| DbError::AttrNotExist(attr_name.to_string()))
    }

    /// Relation id of an open relation
    pub fn rel_id(&self, rel_name: &str) -> DbResult<RelId> {
        self.names
            .get(rel_name)
            .copied()
            .ok_or_else(|| DbError::RelNotOpen(rel_name.to_string()))
    }

    pub fn is_open(&self, rel_name: &str) -> bool {
        self.names.contains_key(rel_name)
    }

    /// Ids of all open relations, in ascending order
    pub fn open_ids(&self) -> Vec<RelId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
            .collect()
    }

    pub(crate) fn free_slot(&self) -> Option<RelId> {
        self.slots.iter().position(Option::is_none)
    }

    pub(crate) fn install(&mut self, rel_id: RelId, relation: OpenRelation) {
        self.names
            .insert(relation.rel.entry.rel_name.clone(), rel_id);
        self.slots[rel_id] = Some(relation);
    }

    pub(crate) fn take(&mut self, rel_id: RelId) -> Option<OpenRelation> {
        let relation = self.slots.get_mut(rel_id)?.take()?;
        self.names.remove(&relation.rel.entry.rel_name);
        Some(relation)
    }

    pub(crate) fn relation(&self, rel_id: RelId) -> DbResult<&OpenRelation> {
        self.slot(rel_id)
    }

    /// Forget pending write-backs once they reached the catalog blocks
    pub(crate) fn mark_clean(&mut self, rel_id: RelId) -> DbResult<()> {
        let relation = self.slot_mut(rel_id)?;
        relation.rel.dirty = false;
        for attr in relation.attrs.iter_mut() {
            attr.dirty = false;
        }
        Ok(())
    }

    pub fn rel_entry(&self, rel_id: RelId) -> DbResult<RelCatEntry> {
        Ok(self.slot(rel_id)?.rel.entry.clone())
    }

    /// Replace the cached relation catalog row; it is written back on close
    pub fn set_rel_entry(&mut self, rel_id: RelId, entry: RelCatEntry) -> DbResult<()> {
        let old_name = {
            let rel = &mut self.slot_mut(rel_id)?.rel;
            let old_name = std::mem::replace(&mut rel.entry, entry);
            rel.dirty = true;
            old_name.rel_name
        };

        let new_name = self.slot(rel_id)?.rel.entry.rel_name.clone();
        if new_name != old_name {
            self.names.remove(&old_name);
            self.names.insert(new_name, rel_id);
        }
        Ok(())
    }

    pub fn attr_entry(&self, rel_id: RelId, attr_name: &str) -> DbResult<AttrCatEntry> {
        Ok(self.attr(rel_id, attr_name)?.entry.clone())
    }

    pub fn attr_entry_at(&self, rel_id: RelId, offset: usize) -> DbResult<AttrCatEntry> {
        self.slot(rel_id)?
            .attrs
            .iter()
            .find(|a| a.entry.offset == offset)
            .map(|a| a.entry.clone())
            .ok_or_else(|| DbError::AttrNotExist(format!("#{}", offset)))
    }

    /// All attributes of a relation, in offset order
    pub fn attr_entries(&self, rel_id: RelId) -> DbResult<Vec<AttrCatEntry>> {
        Ok(self
            .slot(rel_id)?
            .attrs
            .iter()
            .map(|a| a.entry.clone())
            .collect())
    }

    /// Attribute types of a relation, in offset order
    pub fn attr_types(&self, rel_id: RelId) -> DbResult<Vec<AttrType>> {
        Ok(self
            .slot(rel_id)?
            .attrs
            .iter()
            .map(|a| a.entry.attr_type)
            .collect())
    }

    pub fn set_attr_entry(
        &mut self,
        rel_id: RelId,
        attr_name: &str,
        entry: AttrCatEntry,
    ) -> DbResult<()> {
        let attr = self.attr_mut(rel_id, attr_name)?;
        attr.entry = entry;
        attr.dirty = true;
        Ok(())
    }

    pub fn search_cursor(&self, rel_id: RelId) -> DbResult<Option<RecordId>> {
        Ok(self.slot(rel_id)?.rel.cursor)
    }

    pub fn set_search_cursor(&mut self, rel_id: RelId, cursor: Option<RecordId>) -> DbResult<()> {
        self.slot_mut(rel_id)?.rel.cursor = cursor;
        Ok(())
    }

    pub fn reset_search_cursor(&mut self, rel_id: RelId) -> DbResult<()> {
        self.set_search_cursor(rel_id, None)
    }

    pub fn attr_search_cursor(&self, rel_id: RelId, attr_name: &str) -> DbResult<Option<IndexId>> {
        Ok(self.attr(rel_id, attr_name)?.cursor)
    }

    pub fn set_attr_search_cursor(
        &mut self,
        rel_id: RelId,
        attr_name: &str,
        cursor: Option<IndexId>,
    ) -> DbResult<()> {
        self.attr_mut(rel_id, attr_name)?.cursor = cursor;
        Ok(())
    }

    pub fn reset_attr_search_cursor(&mut self, rel_id: RelId, attr_name: &str) -> DbResult<()> {
        self.set_attr_search_cursor(rel_id, attr_name, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students() -> OpenRelation {
        let rel = RelCatEntry::new("Students", 2);
        // Deliberately out of offset order
        let attrs = vec![
            (
                AttrCatEntry::new("Students", "Age", AttrType::Number, 1),
                RecordId::new(5, 13),
            ),
            (
                AttrCatEntry::new("Students", "Name", AttrType::Str, 0),
                RecordId::new(5, 12),
            ),
        ];
        OpenRelation::new(rel, RecordId::new(4, 2), attrs)
    }

    #[test]
    fn test_install_and_lookup() {
        let mut table = OpenRelTable::new(4);
        table.install(2, students());

        assert_eq!(table.rel_id("Students").unwrap(), 2);
        assert!(matches!(
            table.rel_id("Other"),
            Err(DbError::RelNotOpen(_))
        ));
        assert_eq!(table.rel_entry(2).unwrap().num_attrs, 2);
        assert_eq!(table.attr_entry_at(2, 0).unwrap().attr_name, "Name");
        assert_eq!(
            table.attr_types(2).unwrap(),
            vec![AttrType::Str, AttrType::Number]
        );
        assert!(matches!(
            table.attr_entry(2, "Height"),
            Err(DbError::AttrNotExist(_))
        ));
        assert!(matches!(table.rel_entry(3), Err(DbError::NotOpen(3))));
        assert!(matches!(table.rel_entry(99), Err(DbError::NotOpen(99))));
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut table = OpenRelTable::new(4);
        table.install(2, students());

        let mut rel = table.rel_entry(2).unwrap();
        rel.num_recs = 3;
        table.set_rel_entry(2, rel).unwrap();

        let mut age = table.attr_entry(2, "Age").unwrap();
        age.root_block = Some(30);
        table.set_attr_entry(2, "Age", age).unwrap();

        let relation = table.relation(2).unwrap();
        assert!(relation.rel.dirty);
        assert!(relation.attrs[1].dirty);
        assert!(!relation.attrs[0].dirty);

        table.mark_clean(2).unwrap();
        assert!(!table.relation(2).unwrap().rel.dirty);
    }

    #[test]
    fn test_rename_updates_name_index() {
        let mut table = OpenRelTable::new(4);
        table.install(2, students());

        let mut rel = table.rel_entry(2).unwrap();
        rel.rel_name = "Pupils".into();
        table.set_rel_entry(2, rel).unwrap();

        assert!(!table.is_open("Students"));
        assert_eq!(table.rel_id("Pupils").unwrap(), 2);
    }

    #[test]
    fn test_cursors_are_independent() {
        let mut table = OpenRelTable::new(4);
        table.install(2, students());

        table
            .set_search_cursor(2, Some(RecordId::new(8, 1)))
            .unwrap();
        table
            .set_attr_search_cursor(2, "Age", Some(IndexId::new(9, 4)))
            .unwrap();

        assert_eq!(table.search_cursor(2).unwrap(), Some(RecordId::new(8, 1)));
        assert_eq!(table.attr_search_cursor(2, "Name").unwrap(), None);
        assert_eq!(
            table.attr_search_cursor(2, "Age").unwrap(),
            Some(IndexId::new(9, 4))
        );

        table.reset_search_cursor(2).unwrap();
        table.reset_attr_search_cursor(2, "Age").unwrap();
        assert_eq!(table.search_cursor(2).unwrap(), None);
        assert_eq!(table.attr_search_cursor(2, "Age").unwrap(), None);
    }

    #[test]
    fn test_take_frees_slot() {
        let mut table = OpenRelTable::new(3);
        assert_eq!(table.free_slot(), Some(0));
        table.install(0, students());
        table.install(1, students());
        table.install(2, students());
        assert_eq!(table.free_slot(), None);

        assert!(table.take(2).is_some());
        assert_eq!(table.free_slot(), Some(2));
        assert!(table.take(2).is_none());
        assert_eq!(table.open_ids(), vec![0, 1]);
    }
}
