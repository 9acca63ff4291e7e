//! Bookkeeping of rows present on the client.
//!
//! Rows the client drops are only marked. The mark is swept on the next push,
//! minus whatever that push sends again, so a row that scrolls out and
//! straight back in keeps its generator state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use horizon_dataflow_core::logging::targets;

use super::key_mapper::DataKeyMapper;
use crate::identity::{DataItem, IdentifierGetter, ItemId, self_identity};

/// Tracks active and dropped rows by item identity.
pub struct ActiveDataHandler<T: DataItem> {
    active: HashMap<ItemId, T>,
    dropped: HashSet<ItemId>,
    key_mapper: Arc<dyn DataKeyMapper<T>>,
    id_getter: IdentifierGetter<T>,
}

impl<T: DataItem> ActiveDataHandler<T> {
    /// Creates an empty handler resolving client keys through `key_mapper`.
    pub fn new(key_mapper: Arc<dyn DataKeyMapper<T>>) -> Self {
        Self {
            active: HashMap::new(),
            dropped: HashSet::new(),
            key_mapper,
            id_getter: self_identity(),
        }
    }

    /// Changes how item identity is computed. Call only when empty.
    pub fn set_identifier_getter(&mut self, id_getter: IdentifierGetter<T>) {
        self.id_getter = id_getter;
    }

    fn id(&self, item: &T) -> ItemId {
        (self.id_getter)(item)
    }

    /// Registers freshly pushed items as active.
    pub fn add_active_data<'a>(&mut self, items: impl IntoIterator<Item = &'a T>) {
        for item in items {
            let id = self.id(item);
            self.active.entry(id).or_insert_with(|| item.clone());
        }
    }

    /// Sweeps dropped rows that `pushed` did not bring back.
    ///
    /// The swept rows stop being active and are returned so their generator
    /// data and keys can be destroyed.
    pub fn clean_up<'a>(&mut self, pushed: impl IntoIterator<Item = &'a T>) -> Vec<T> {
        for item in pushed {
            let id = self.id(item);
            self.dropped.remove(&id);
        }
        let swept: Vec<T> = self
            .dropped
            .drain()
            .filter_map(|id| self.active.remove(&id))
            .collect();
        if !swept.is_empty() {
            tracing::trace!(
                target: targets::COMMUNICATOR,
                destroyed = swept.len(),
                "swept dropped rows"
            );
        }
        swept
    }

    /// Marks the row with client key `key` as dropped.
    ///
    /// Returns `false` if the key is unknown or the row is not active.
    pub fn drop_active_data(&mut self, key: &str) -> bool {
        let Some(item) = self.key_mapper.get(key) else {
            return false;
        };
        let id = self.id(&item);
        if !self.active.contains_key(&id) {
            return false;
        }
        self.dropped.insert(id);
        true
    }

    /// Marks every active row as dropped.
    pub fn drop_all_active_data(&mut self) {
        self.dropped.extend(self.active.keys().cloned());
    }

    /// Forgets all rows without sweeping. Returns the rows that were active.
    pub fn destroy_all_data(&mut self) -> Vec<T> {
        self.dropped.clear();
        self.active.drain().map(|(_, item)| item).collect()
    }

    /// Returns `true` if an item with `item`'s identity is active.
    pub fn is_active(&self, item: &T) -> bool {
        self.active.contains_key(&self.id(item))
    }

    /// Stores `item` as the latest instance of its identity if it is active.
    pub fn update_active(&mut self, item: &T) -> bool {
        let id = self.id(item);
        match self.active.get_mut(&id) {
            Some(current) => {
                *current = item.clone();
                true
            }
            None => false,
        }
    }

    /// Identity of `item` as used by this handler.
    pub fn identity(&self, item: &T) -> ItemId {
        self.id(item)
    }

    /// A snapshot of the active rows, in no particular order.
    pub fn active_items(&self) -> Vec<T> {
        self.active.values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of rows marked dropped and not yet swept.
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// The active row with client key `key`.
    pub fn item_for_key(&self, key: &str) -> Option<T> {
        let item = self.key_mapper.get(key)?;
        self.active.get(&self.id(&item)).cloned()
    }
}
