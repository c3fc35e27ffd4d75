//! Display-list object store.
//!
//! Holds every live render object for one scene and a cached sort order.
//! The cache survives frames; any insert, removal or sort-relevant update
//! invalidates it and the next [`DisplayList::sorted`] call rebuilds.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use thunderdome::Index as NodeIndex;

use crate::display::object::{ObjectId, RenderObject};
use crate::display::sort::RenderKey;

#[derive(Default)]
pub struct DisplayList {
    objects: FxHashMap<ObjectId, RenderObject>,
    order: Vec<ObjectId>,
    order_valid: bool,
    next_seq: u32,
}

impl DisplayList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates the entry for `obj.id`.
    ///
    /// A new entry gets the next insertion sequence; an update keeps the
    /// old one so declaration order stays the tie-break. The cached order
    /// survives updates that do not touch sort-relevant fields.
    pub fn upsert(&mut self, mut obj: RenderObject) {
        match self.objects.entry(obj.id) {
            Entry::Occupied(mut e) => {
                obj.seq = e.get().seq;
                if e.get().sort_fields() != obj.sort_fields() {
                    self.order_valid = false;
                }
                e.insert(obj);
            }
            Entry::Vacant(v) => {
                obj.seq = self.next_seq;
                self.next_seq = self.next_seq.wrapping_add(1);
                self.order_valid = false;
                v.insert(obj);
            }
        }
    }

    pub fn remove(&mut self, id: ObjectId) -> bool {
        let removed = self.objects.remove(&id).is_some();
        if removed {
            self.order_valid = false;
        }
        removed
    }

    /// Removes every object rooted at `leaf`, across all instance sites.
    pub fn remove_leaf(&mut self, leaf: NodeIndex) {
        let before = self.objects.len();
        self.objects.retain(|id, _| id.leaf != leaf);
        if self.objects.len() != before {
            self.order_valid = false;
        }
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&RenderObject> {
        self.objects.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut RenderObject> {
        self.objects.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderObject> {
        self.objects.values()
    }

    /// Invalidates the cached order without structural change, used when a
    /// mutation bumped a sort-relevant core in place.
    pub fn invalidate_order(&mut self) {
        self.order_valid = false;
    }

    /// The complete sorted order. Idempotent; rebuilt only after a
    /// mutation invalidated the cache.
    pub fn sorted(&mut self) -> &[ObjectId] {
        if !self.order_valid {
            self.order.clear();
            self.order.extend(self.objects.keys().copied());
            let objects = &self.objects;
            self.order.sort_unstable_by_key(|id| {
                let o = &objects[id];
                RenderKey::new(o.pass, o.layer, o.program_sort, o.texture_sort, o.seq)
            });
            self.order_valid = true;
        }
        &self.order
    }

    /// Sorted objects, resolved. Convenience over [`DisplayList::sorted`].
    pub fn sorted_objects(&mut self) -> Vec<ObjectId> {
        self.sorted().to_vec()
    }
}
