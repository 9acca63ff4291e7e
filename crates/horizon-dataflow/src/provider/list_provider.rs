//! In-memory provider over a shared list.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::in_memory::{InMemoryDataProvider, InMemoryState};
use super::predicate::Predicate;
use super::query::Query;
use super::traits::{DataProvider, ItemStream, ProviderSignals};
use crate::error::Result;
use crate::identity::{DataItem, IdentifierGetter, ItemId};

/// A data provider over an in-memory list.
///
/// The list is shared, not copied: changes made through [`backing`] become
/// visible on the next query. Call [`DataProvider::refresh_all`] afterwards
/// so that listeners pick them up.
///
/// # Example
///
/// ```
/// use horizon_dataflow::provider::{DataProvider, InMemoryDataProvider, ListDataProvider, Query};
/// use horizon_dataflow::provider::{Comparator, Predicate};
///
/// let provider = ListDataProvider::new(vec![1, 2, 3, 4, 5]);
/// provider.set_filter(Some(Predicate::new(|v: &i32| *v > 2)));
///
/// let query = Query::full(0, 10, Vec::new(), Some(Comparator::natural().reversed()), None);
/// let items: Vec<i32> = provider.fetch(&query).unwrap().collect();
/// assert_eq!(items, vec![5, 4, 3]);
/// ```
///
/// [`backing`]: ListDataProvider::backing
pub struct ListDataProvider<T: DataItem> {
    items: Arc<RwLock<Vec<T>>>,
    state: InMemoryState<T>,
    signals: ProviderSignals<T>,
    id_getter: Option<IdentifierGetter<T>>,
}

impl<T: DataItem> ListDataProvider<T> {
    /// Creates a provider owning `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self::from_shared(Arc::new(RwLock::new(items)))
    }

    /// Creates a provider over a list shared with the caller.
    pub fn from_shared(items: Arc<RwLock<Vec<T>>>) -> Self {
        Self {
            items,
            state: InMemoryState::new(),
            signals: ProviderSignals::new(),
            id_getter: None,
        }
    }

    /// Identifies items by a key instead of by value.
    pub fn with_id_getter<K, G>(mut self, getter: G) -> Self
    where
        K: Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.id_getter = Some(Arc::new(move |item: &T| ItemId::new(getter(item))));
        self
    }

    /// Read access to the items in backing order.
    pub fn items(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.items.read()
    }

    /// The shared backing list.
    pub fn backing(&self) -> Arc<RwLock<Vec<T>>> {
        self.items.clone()
    }
}

impl<T: DataItem> DataProvider<T, Predicate<T>> for ListDataProvider<T> {
    fn is_in_memory(&self) -> bool {
        true
    }

    fn size(&self, query: &Query<T, Predicate<T>>) -> Result<usize> {
        Ok(self.state.count(self.items.read().iter(), query))
    }

    fn fetch(&self, query: &Query<T, Predicate<T>>) -> Result<ItemStream<T>> {
        let window = self.state.apply(self.items.read().iter(), query);
        Ok(Box::new(window.into_iter()))
    }

    fn signals(&self) -> &ProviderSignals<T> {
        &self.signals
    }

    fn id(&self, item: &T) -> ItemId {
        match &self.id_getter {
            Some(getter) => getter(item),
            None => ItemId::new(item.clone()),
        }
    }
}

impl<T: DataItem> InMemoryDataProvider<T> for ListDataProvider<T> {
    fn in_memory_state(&self) -> &InMemoryState<T> {
        &self.state
    }
}

static_assertions::assert_impl_all!(ListDataProvider<String>: Send, Sync);
