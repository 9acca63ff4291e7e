//! Core data provider traits.
//!
//! A data provider is the query interface to a store of items. It answers
//! [`DataProvider::size`] and [`DataProvider::fetch`] for a [`Query`] and
//! announces changes to the store through its [`ProviderSignals`].
//!
//! Hierarchical stores implement [`HierarchicalDataProvider`] on top. Code
//! that accepts either kind works with the tagged [`AnyDataProvider`].

use std::sync::Arc;

use horizon_dataflow_core::logging::targets;
use horizon_dataflow_core::{ConnectionGuard, Signal};

use super::query::{HierarchicalQuery, Query};
use crate::error::Result;
use crate::identity::{DataItem, ItemId};

/// Items produced by a single fetch. The stream is consumed once.
pub type ItemStream<T> = Box<dyn Iterator<Item = T> + Send>;

/// Change notification sent by a data provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChangeEvent<T> {
    /// Anything may have changed; all cached data is stale.
    RefreshAll,
    /// A single item was updated in place.
    RefreshItem(T),
}

/// Callback registered with [`DataProvider::add_data_provider_listener`].
pub type Listener<T> = Arc<dyn Fn(&DataChangeEvent<T>) + Send + Sync>;

/// Keeps a listener registered. Dropping it removes the listener.
pub type Registration<T> = ConnectionGuard<DataChangeEvent<T>>;

/// Change signals of a data provider.
pub struct ProviderSignals<T: 'static> {
    changed: Arc<Signal<DataChangeEvent<T>>>,
}

impl<T: 'static> Default for ProviderSignals<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ProviderSignals<T> {
    /// Creates signals with no listeners.
    pub fn new() -> Self {
        Self {
            changed: Arc::new(Signal::new()),
        }
    }

    /// Notifies listeners that all data is stale.
    pub fn refresh_all(&self) {
        tracing::trace!(target: targets::PROVIDER, "refresh all");
        self.changed.emit(DataChangeEvent::RefreshAll);
    }

    /// Notifies listeners that `item` was updated.
    pub fn refresh_item(&self, item: T) {
        self.changed.emit(DataChangeEvent::RefreshItem(item));
    }

    /// Registers a listener for the lifetime of the returned guard.
    pub fn add_listener(&self, listener: Listener<T>) -> Registration<T> {
        self.changed.connect_scoped(move |event| listener(event))
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.changed.connection_count()
    }
}

/// Query interface to a store of items of type `T` filtered by `F`.
///
/// # Implementing DataProvider
///
/// ```
/// use horizon_dataflow::provider::{DataProvider, ItemStream, ProviderSignals, Query};
/// use horizon_dataflow::Result;
///
/// struct Numbers {
///     upto: u32,
///     signals: ProviderSignals<u32>,
/// }
///
/// impl DataProvider<u32, ()> for Numbers {
///     fn is_in_memory(&self) -> bool {
///         false
///     }
///
///     fn size(&self, _query: &Query<u32, ()>) -> Result<usize> {
///         Ok(self.upto as usize)
///     }
///
///     fn fetch(&self, query: &Query<u32, ()>) -> Result<ItemStream<u32>> {
///         let items = (0..self.upto).skip(query.offset()).take(query.limit());
///         Ok(Box::new(items.collect::<Vec<_>>().into_iter()))
///     }
///
///     fn signals(&self) -> &ProviderSignals<u32> {
///         &self.signals
///     }
/// }
///
/// let numbers = Numbers { upto: 10, signals: ProviderSignals::new() };
/// let window = numbers.fetch(&Query::full(8, 5, Vec::new(), None, None)).unwrap();
/// assert_eq!(window.collect::<Vec<_>>(), vec![8, 9]);
/// ```
pub trait DataProvider<T: DataItem, F>: Send + Sync {
    /// Returns `true` if all items are held in memory.
    ///
    /// In-memory providers honor [`Query::in_memory_sorting`]; others honor
    /// [`Query::sort_orders`].
    fn is_in_memory(&self) -> bool;

    /// Number of items matching the query's filter.
    ///
    /// Window and sorting of the query do not affect the result.
    fn size(&self, query: &Query<T, F>) -> Result<usize>;

    /// Items matching the query, sorted and windowed.
    ///
    /// A window reaching past the last item yields whatever is available.
    fn fetch(&self, query: &Query<T, F>) -> Result<ItemStream<T>>;

    /// Returns the change signals of this provider.
    fn signals(&self) -> &ProviderSignals<T>;

    // -------------------------------------------------------------------------
    // Optional methods with default implementations
    // -------------------------------------------------------------------------

    /// Identity of an item. Defaults to the item itself.
    fn id(&self, item: &T) -> ItemId {
        ItemId::new(item.clone())
    }

    /// Announces that `item` was updated in place.
    fn refresh_item(&self, item: &T) {
        self.signals().refresh_item(item.clone());
    }

    /// Announces that any item may have changed.
    fn refresh_all(&self) {
        self.signals().refresh_all();
    }

    /// Registers a change listener for the lifetime of the returned guard.
    fn add_data_provider_listener(&self, listener: Listener<T>) -> Registration<T> {
        self.signals().add_listener(listener)
    }
}

/// A data provider over a tree of items.
///
/// Flat [`DataProvider::size`] and [`DataProvider::fetch`] calls must carry a
/// hierarchical scope; implementations reject flat queries, usually by
/// delegating through [`HierarchicalQuery::from_query`].
pub trait HierarchicalDataProvider<T: DataItem, F>: DataProvider<T, F> {
    /// Number of direct children of the query's parent matching its filter.
    fn child_count(&self, query: &HierarchicalQuery<T, F>) -> Result<usize>;

    /// Direct children of the query's parent, sorted and windowed.
    fn fetch_children(&self, query: &HierarchicalQuery<T, F>) -> Result<ItemStream<T>>;

    /// Returns `true` if `item` has at least one child.
    fn has_children(&self, item: &T) -> Result<bool>;
}

/// Either kind of data provider.
pub enum AnyDataProvider<T: DataItem, F> {
    /// A flat provider.
    Flat(Arc<dyn DataProvider<T, F>>),
    /// A hierarchical provider.
    Hierarchical(Arc<dyn HierarchicalDataProvider<T, F>>),
}

impl<T: DataItem, F: 'static> AnyDataProvider<T, F> {
    /// Wraps a flat provider.
    pub fn flat(provider: impl DataProvider<T, F> + 'static) -> Self {
        Self::Flat(Arc::new(provider))
    }

    /// Wraps a hierarchical provider.
    pub fn hierarchical(provider: impl HierarchicalDataProvider<T, F> + 'static) -> Self {
        Self::Hierarchical(Arc::new(provider))
    }

    /// Returns the hierarchical provider, if this is one.
    pub fn as_hierarchical(&self) -> Option<&Arc<dyn HierarchicalDataProvider<T, F>>> {
        match self {
            Self::Hierarchical(provider) => Some(provider),
            Self::Flat(_) => None,
        }
    }

    /// Returns `true` if both handles point to the same provider instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        let a = self.as_ptr();
        let b = other.as_ptr();
        std::ptr::addr_eq(a, b)
    }

    fn as_ptr(&self) -> *const () {
        match self {
            Self::Flat(provider) => Arc::as_ptr(provider) as *const (),
            Self::Hierarchical(provider) => Arc::as_ptr(provider) as *const (),
        }
    }
}

impl<T: DataItem, F> Clone for AnyDataProvider<T, F> {
    fn clone(&self) -> Self {
        match self {
            Self::Flat(provider) => Self::Flat(provider.clone()),
            Self::Hierarchical(provider) => Self::Hierarchical(provider.clone()),
        }
    }
}

impl<T: DataItem, F> std::fmt::Debug for AnyDataProvider<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat(_) => f.write_str("AnyDataProvider::Flat"),
            Self::Hierarchical(_) => f.write_str("AnyDataProvider::Hierarchical"),
        }
    }
}

impl<T: DataItem, F: 'static> DataProvider<T, F> for AnyDataProvider<T, F> {
    fn is_in_memory(&self) -> bool {
        match self {
            Self::Flat(p) => p.is_in_memory(),
            Self::Hierarchical(p) => p.is_in_memory(),
        }
    }

    fn size(&self, query: &Query<T, F>) -> Result<usize> {
        match self {
            Self::Flat(p) => p.size(query),
            Self::Hierarchical(p) => p.size(query),
        }
    }

    fn fetch(&self, query: &Query<T, F>) -> Result<ItemStream<T>> {
        match self {
            Self::Flat(p) => p.fetch(query),
            Self::Hierarchical(p) => p.fetch(query),
        }
    }

    fn signals(&self) -> &ProviderSignals<T> {
        match self {
            Self::Flat(p) => p.signals(),
            Self::Hierarchical(p) => p.signals(),
        }
    }

    fn id(&self, item: &T) -> ItemId {
        match self {
            Self::Flat(p) => p.id(item),
            Self::Hierarchical(p) => p.id(item),
        }
    }

    fn refresh_item(&self, item: &T) {
        match self {
            Self::Flat(p) => p.refresh_item(item),
            Self::Hierarchical(p) => p.refresh_item(item),
        }
    }

    fn refresh_all(&self) {
        match self {
            Self::Flat(p) => p.refresh_all(),
            Self::Hierarchical(p) => p.refresh_all(),
        }
    }

    fn add_data_provider_listener(&self, listener: Listener<T>) -> Registration<T> {
        match self {
            Self::Flat(p) => p.add_data_provider_listener(listener),
            Self::Hierarchical(p) => p.add_data_provider_listener(listener),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_listener_receives_events() {
        let signals = ProviderSignals::<String>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let registration = signals.add_listener(Arc::new(move |event: &DataChangeEvent<String>| {
            seen_clone.lock().push(event.clone());
        }));

        signals.refresh_item("a".to_string());
        signals.refresh_all();
        assert_eq!(
            *seen.lock(),
            vec![
                DataChangeEvent::RefreshItem("a".to_string()),
                DataChangeEvent::RefreshAll
            ]
        );

        drop(registration);
        assert_eq!(signals.listener_count(), 0);
        signals.refresh_all();
        assert_eq!(seen.lock().len(), 2);
    }
}
