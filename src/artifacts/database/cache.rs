use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use std::collections::{HashMap, VecDeque};

/// Bounded first-in first-out cache of raw objects
///
/// Objects never change once written, so entries are only ever evicted,
/// never invalidated. Payloads are reference counted; a hit is a cheap clone.
#[derive(Debug)]
pub struct ObjectCache {
    entries: HashMap<ObjectId, RawObject>,
    order: VecDeque<ObjectId>,
    max_entries: usize,
    max_object_size: usize,
}

impl ObjectCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 1024;
    pub const DEFAULT_MAX_OBJECT_SIZE: usize = 1 << 20;

    pub fn new(max_entries: usize, max_object_size: usize) -> Self {
        ObjectCache {
            entries: HashMap::with_capacity(max_entries.min(Self::DEFAULT_MAX_ENTRIES)),
            order: VecDeque::new(),
            max_entries,
            max_object_size,
        }
    }

    pub fn get(&self, oid: &ObjectId) -> Option<RawObject> {
        let hit = self.entries.get(oid).cloned();
        if hit.is_some() {
            tracing::trace!("object cache hit {}", oid);
        }
        hit
    }

    pub fn insert(&mut self, oid: ObjectId, raw: &RawObject) {
        if self.max_entries == 0 || raw.len() > self.max_object_size || self.entries.contains_key(&oid) {
            return;
        }

        while self.entries.len() >= self.max_entries {
            match self.order.pop_front() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                }
                None => break,
            }
        }

        self.entries.insert(oid, raw.clone());
        self.order.push_back(oid);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES, Self::DEFAULT_MAX_OBJECT_SIZE)
    }
}
