//! The world's per-component columnar store.
//!
//! Unlike the teacher's per-archetype table, storage here is **global per
//! component**: one [`Column`] per registered [`ComponentId`], a dense byte
//! array indexed directly by a world-unique row number that an entity keeps
//! for its entire life, independent of which archetype node currently
//! classifies it. Moving an entity between archetypes therefore never
//! copies component bytes — only the archetype graph's membership lists
//! change. A parallel `versions` array holds the tick at which each row was
//! last written, so a `Changed`/`entered` query filter is a single integer
//! comparison.

use relaytick_component::ComponentId;

/// One component type's dense, row-indexed storage.
#[derive(Debug, Clone)]
pub struct Column {
    id: ComponentId,
    item_size: usize,
    data: Vec<u8>,
    present: Vec<bool>,
    versions: Vec<u32>,
}

impl Column {
    /// Create an empty column for `id`, whose values are `item_size` bytes
    /// each (`0` for tags — a tag's presence bit *is* its payload).
    #[must_use]
    pub fn new(id: ComponentId, item_size: usize) -> Self {
        Self {
            id,
            item_size,
            data: Vec::new(),
            present: Vec::new(),
            versions: Vec::new(),
        }
    }

    /// The component type this column stores.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    fn ensure_capacity(&mut self, row: u32) {
        let row = row as usize;
        if row >= self.present.len() {
            self.present.resize(row + 1, false);
            self.versions.resize(row + 1, 0);
            self.data.resize((row + 1) * self.item_size.max(1), 0);
        }
    }

    /// Write `bytes` (must be exactly `item_size` long, empty for tags) at
    /// `row`, growing the column if needed, and stamp its write tick.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() != item_size`.
    pub fn set_raw(&mut self, row: u32, bytes: &[u8], tick: u64) {
        assert_eq!(bytes.len(), self.item_size, "component byte length mismatch");
        self.ensure_capacity(row);
        let row = row as usize;
        self.present[row] = true;
        self.versions[row] = tick as u32;
        if self.item_size > 0 {
            let start = row * self.item_size;
            self.data[start..start + self.item_size].copy_from_slice(bytes);
        }
    }

    /// Read the raw bytes at `row`, if present.
    #[must_use]
    pub fn get_raw(&self, row: u32) -> Option<&[u8]> {
        let row_usize = row as usize;
        if !*self.present.get(row_usize)? {
            return None;
        }
        let start = row_usize * self.item_size;
        Some(&self.data[start..start + self.item_size])
    }

    /// Mutably borrow the raw bytes at `row` and stamp the write tick,
    /// recording a mutation made through the returned slice.
    pub fn get_raw_mut(&mut self, row: u32, tick: u64) -> Option<&mut [u8]> {
        let row_usize = row as usize;
        if !*self.present.get(row_usize)? {
            return None;
        }
        self.versions[row_usize] = tick as u32;
        let start = row_usize * self.item_size;
        Some(&mut self.data[start..start + self.item_size])
    }

    /// Clear the presence bit at `row`, without shrinking the backing
    /// arrays — a later `set_raw` at the same row reuses the slot.
    pub fn clear(&mut self, row: u32) {
        if let Some(flag) = self.present.get_mut(row as usize) {
            *flag = false;
        }
    }

    /// `true` if `row` currently holds a value.
    #[must_use]
    pub fn contains(&self, row: u32) -> bool {
        matches!(self.present.get(row as usize), Some(true))
    }

    /// The tick at which `row` was last written, if present.
    #[must_use]
    pub fn version(&self, row: u32) -> Option<u32> {
        if self.contains(row) {
            self.versions.get(row as usize).copied()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_raw() {
        let mut col = Column::new(ComponentId(0), 4);
        col.set_raw(2, &[1, 2, 3, 4], 10);
        assert_eq!(col.get_raw(2), Some(&[1, 2, 3, 4][..]));
        assert_eq!(col.get_raw(0), None);
    }

    #[test]
    fn test_version_tracks_last_write_tick() {
        let mut col = Column::new(ComponentId(0), 4);
        col.set_raw(0, &[0; 4], 5);
        assert_eq!(col.version(0), Some(5));
        col.set_raw(0, &[1; 4], 9);
        assert_eq!(col.version(0), Some(9));
    }

    #[test]
    fn test_clear_then_reuse_slot() {
        let mut col = Column::new(ComponentId(0), 4);
        col.set_raw(0, &[7; 4], 1);
        col.clear(0);
        assert!(!col.contains(0));
        assert_eq!(col.get_raw(0), None);
        col.set_raw(0, &[9; 4], 2);
        assert_eq!(col.get_raw(0), Some(&[9; 4][..]));
    }

    #[test]
    fn test_tag_column_zero_item_size() {
        let mut col = Column::new(ComponentId(0), 0);
        col.set_raw(3, &[], 1);
        assert!(col.contains(3));
        assert_eq!(col.get_raw(3), Some(&[][..]));
    }

    #[test]
    fn test_mutable_access_stamps_new_version() {
        let mut col = Column::new(ComponentId(0), 4);
        col.set_raw(0, &[0; 4], 1);
        {
            let slot = col.get_raw_mut(0, 7).unwrap();
            slot.copy_from_slice(&[9; 4]);
        }
        assert_eq!(col.get_raw(0), Some(&[9; 4][..]));
        assert_eq!(col.version(0), Some(7));
    }
}
