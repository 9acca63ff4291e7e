//! Mapping between items and the string keys the client sees.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_dataflow_core::logging::targets;
use parking_lot::Mutex;

use crate::identity::{DataItem, IdentifierGetter, ItemId, self_identity};

/// Correlates items with stable client keys.
///
/// Two items with the same identity share a key. A key issued once is never
/// reissued for a different item during the mapper's lifetime.
pub trait DataKeyMapper<T>: Send + Sync {
    /// Returns the key of `item`, issuing a new one if needed.
    fn key(&self, item: &T) -> String;

    /// Returns `true` if `item` currently has a key.
    fn has(&self, item: &T) -> bool;

    /// The latest known item for `key`.
    fn get(&self, key: &str) -> Option<T>;

    /// Returns `true` if `key` is currently issued.
    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Releases the key of `item`.
    fn remove(&self, item: &T);

    /// Releases every key.
    fn remove_all(&self);

    /// Replaces the stored instance for `item`'s identity with `item`.
    fn refresh(&self, item: &T);

    /// Changes how item identity is computed. Releases every key if the
    /// getter differs from the current one.
    fn set_identifier_getter(&self, getter: IdentifierGetter<T>);
}

struct KeyMapperState<T> {
    last_key: u64,
    keys: HashMap<ItemId, String>,
    items: HashMap<String, T>,
    id_getter: IdentifierGetter<T>,
}

impl<T: DataItem> KeyMapperState<T> {
    fn id(&self, item: &T) -> ItemId {
        (self.id_getter)(item)
    }
}

/// The default key mapper: keys are an increasing counter.
pub struct KeyMapper<T: DataItem> {
    state: Mutex<KeyMapperState<T>>,
}

impl<T: DataItem> Default for KeyMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataItem> KeyMapper<T> {
    /// A mapper identifying items by value.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KeyMapperState {
                last_key: 0,
                keys: HashMap::new(),
                items: HashMap::new(),
                id_getter: self_identity(),
            }),
        }
    }

    /// Number of keys currently issued.
    pub fn len(&self) -> usize {
        self.state.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: DataItem> DataKeyMapper<T> for KeyMapper<T> {
    fn key(&self, item: &T) -> String {
        let mut state = self.state.lock();
        let id = state.id(item);
        if let Some(key) = state.keys.get(&id) {
            return key.clone();
        }
        state.last_key += 1;
        let key = state.last_key.to_string();
        state.keys.insert(id, key.clone());
        state.items.insert(key.clone(), item.clone());
        key
    }

    fn has(&self, item: &T) -> bool {
        let state = self.state.lock();
        state.keys.contains_key(&state.id(item))
    }

    fn get(&self, key: &str) -> Option<T> {
        self.state.lock().items.get(key).cloned()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.state.lock().items.contains_key(key)
    }

    fn remove(&self, item: &T) {
        let mut state = self.state.lock();
        let id = state.id(item);
        if let Some(key) = state.keys.remove(&id) {
            state.items.remove(&key);
        }
    }

    fn remove_all(&self) {
        let mut state = self.state.lock();
        state.keys.clear();
        state.items.clear();
    }

    fn refresh(&self, item: &T) {
        let mut state = self.state.lock();
        let id = state.id(item);
        if let Some(key) = state.keys.get(&id).cloned() {
            state.items.insert(key, item.clone());
        }
    }

    fn set_identifier_getter(&self, getter: IdentifierGetter<T>) {
        let mut state = self.state.lock();
        if Arc::ptr_eq(&state.id_getter, &getter) {
            return;
        }
        tracing::trace!(
            target: targets::KEY_MAPPER,
            released = state.keys.len(),
            "identifier getter changed"
        );
        state.keys.clear();
        state.items.clear();
        state.id_getter = getter;
    }
}

static_assertions::assert_impl_all!(KeyMapper<String>: Send, Sync);
