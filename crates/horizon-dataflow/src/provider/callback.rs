//! Back end providers built from callbacks.
//!
//! The callbacks receive the query with the provider's default sort orders
//! mixed in, and must honor its window. Returning more rows than the query's
//! limit is reported as an error rather than silently truncated.

use std::sync::Arc;

use parking_lot::RwLock;

use super::query::{HierarchicalQuery, Query};
use super::sort::{QuerySortOrder, mix_in_sort_orders};
use super::traits::{DataProvider, HierarchicalDataProvider, ItemStream, ProviderSignals};
use crate::error::{DataError, Result};
use crate::identity::{DataItem, IdentifierGetter, ItemId};

/// Fetches one window of items.
pub type FetchCallback<T, F> = Arc<dyn Fn(&Query<T, F>) -> Result<Vec<T>> + Send + Sync>;

/// Counts the items matching a query.
pub type CountCallback<T, F> = Arc<dyn Fn(&Query<T, F>) -> Result<usize> + Send + Sync>;

/// Default sort orders and identity shared by the back end providers.
struct BackEndState<T: DataItem> {
    sort_orders: RwLock<Vec<QuerySortOrder>>,
    id_getter: Option<IdentifierGetter<T>>,
    signals: ProviderSignals<T>,
}

impl<T: DataItem> BackEndState<T> {
    fn new() -> Self {
        Self {
            sort_orders: RwLock::new(Vec::new()),
            id_getter: None,
            signals: ProviderSignals::new(),
        }
    }

    fn prepare<F: Clone>(&self, query: &Query<T, F>) -> Query<T, F> {
        mix_in_sort_orders(query, &self.sort_orders.read())
    }

    fn id(&self, item: &T) -> ItemId {
        match &self.id_getter {
            Some(getter) => getter(item),
            None => ItemId::new(item.clone()),
        }
    }

    fn set_sort_orders(&self, sort_orders: Vec<QuerySortOrder>) {
        *self.sort_orders.write() = sort_orders;
        self.signals.refresh_all();
    }
}

fn check_limit<T>(items: Vec<T>, limit: usize) -> Result<ItemStream<T>>
where
    T: Send + 'static,
{
    if items.len() > limit {
        return Err(DataError::illegal_state(format!(
            "back end returned {} items for a query limited to {limit}",
            items.len()
        )));
    }
    Ok(Box::new(items.into_iter()))
}

/// A flat back end provider.
///
/// ```
/// use horizon_dataflow::provider::{CallbackDataProvider, DataProvider, Query, QuerySortOrder};
///
/// let people = CallbackDataProvider::new(
///     |query: &Query<String, ()>| {
///         // A real back end would run SQL here.
///         assert_eq!(query.sort_orders()[0], QuerySortOrder::asc("name"));
///         Ok(vec!["ada".to_string(), "bob".to_string()])
///     },
///     |_query: &Query<String, ()>| Ok(2),
/// );
/// people.set_sort_orders(vec![QuerySortOrder::asc("name")]);
///
/// assert_eq!(people.fetch(&Query::new()).unwrap().count(), 2);
/// ```
pub struct CallbackDataProvider<T: DataItem, F> {
    fetch: FetchCallback<T, F>,
    count: CountCallback<T, F>,
    state: BackEndState<T>,
}

impl<T: DataItem, F: Clone> CallbackDataProvider<T, F> {
    /// Creates a provider from fetch and count callbacks.
    pub fn new<Fe, Co>(fetch: Fe, count: Co) -> Self
    where
        Fe: Fn(&Query<T, F>) -> Result<Vec<T>> + Send + Sync + 'static,
        Co: Fn(&Query<T, F>) -> Result<usize> + Send + Sync + 'static,
    {
        Self {
            fetch: Arc::new(fetch),
            count: Arc::new(count),
            state: BackEndState::new(),
        }
    }

    /// Identifies items by a key instead of by value.
    pub fn with_id_getter<K, G>(mut self, getter: G) -> Self
    where
        K: Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.state.id_getter = Some(Arc::new(move |item: &T| ItemId::new(getter(item))));
        self
    }

    /// Sets the default sort orders appended to every query and refreshes.
    pub fn set_sort_orders(&self, sort_orders: Vec<QuerySortOrder>) {
        self.state.set_sort_orders(sort_orders);
    }
}

impl<T, F> DataProvider<T, F> for CallbackDataProvider<T, F>
where
    T: DataItem,
    F: Clone,
{
    fn is_in_memory(&self) -> bool {
        false
    }

    fn size(&self, query: &Query<T, F>) -> Result<usize> {
        (self.count)(&self.state.prepare(query))
    }

    fn fetch(&self, query: &Query<T, F>) -> Result<ItemStream<T>> {
        let query = self.state.prepare(query);
        check_limit((self.fetch)(&query)?, query.limit())
    }

    fn signals(&self) -> &ProviderSignals<T> {
        &self.state.signals
    }

    fn id(&self, item: &T) -> ItemId {
        self.state.id(item)
    }
}

/// Fetches one window of children.
pub type FetchChildrenCallback<T, F> =
    Arc<dyn Fn(&HierarchicalQuery<T, F>) -> Result<Vec<T>> + Send + Sync>;

/// Counts the children matching a hierarchical query.
pub type ChildCountCallback<T, F> =
    Arc<dyn Fn(&HierarchicalQuery<T, F>) -> Result<usize> + Send + Sync>;

/// Reports whether an item has children.
pub type HasChildrenCallback<T> = Arc<dyn Fn(&T) -> Result<bool> + Send + Sync>;

/// A hierarchical back end provider.
pub struct CallbackHierarchicalDataProvider<T: DataItem, F> {
    fetch_children: FetchChildrenCallback<T, F>,
    child_count: ChildCountCallback<T, F>,
    has_children: HasChildrenCallback<T>,
    state: BackEndState<T>,
}

impl<T: DataItem, F: Clone> CallbackHierarchicalDataProvider<T, F> {
    /// Creates a provider from children, count and has-children callbacks.
    pub fn new<Fe, Co, Ha>(fetch_children: Fe, child_count: Co, has_children: Ha) -> Self
    where
        Fe: Fn(&HierarchicalQuery<T, F>) -> Result<Vec<T>> + Send + Sync + 'static,
        Co: Fn(&HierarchicalQuery<T, F>) -> Result<usize> + Send + Sync + 'static,
        Ha: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            fetch_children: Arc::new(fetch_children),
            child_count: Arc::new(child_count),
            has_children: Arc::new(has_children),
            state: BackEndState::new(),
        }
    }

    /// Identifies items by a key instead of by value.
    pub fn with_id_getter<K, G>(mut self, getter: G) -> Self
    where
        K: Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.state.id_getter = Some(Arc::new(move |item: &T| ItemId::new(getter(item))));
        self
    }

    /// Sets the default sort orders appended to every query and refreshes.
    pub fn set_sort_orders(&self, sort_orders: Vec<QuerySortOrder>) {
        self.state.set_sort_orders(sort_orders);
    }

    fn prepare(&self, query: &HierarchicalQuery<T, F>) -> Result<HierarchicalQuery<T, F>> {
        HierarchicalQuery::from_query(&self.state.prepare(query.as_query()))
    }
}

impl<T, F> DataProvider<T, F> for CallbackHierarchicalDataProvider<T, F>
where
    T: DataItem,
    F: Clone,
{
    fn is_in_memory(&self) -> bool {
        false
    }

    fn size(&self, query: &Query<T, F>) -> Result<usize> {
        self.child_count(&HierarchicalQuery::from_query(query)?)
    }

    fn fetch(&self, query: &Query<T, F>) -> Result<ItemStream<T>> {
        self.fetch_children(&HierarchicalQuery::from_query(query)?)
    }

    fn signals(&self) -> &ProviderSignals<T> {
        &self.state.signals
    }

    fn id(&self, item: &T) -> ItemId {
        self.state.id(item)
    }
}

impl<T, F> HierarchicalDataProvider<T, F> for CallbackHierarchicalDataProvider<T, F>
where
    T: DataItem,
    F: Clone,
{
    fn child_count(&self, query: &HierarchicalQuery<T, F>) -> Result<usize> {
        (self.child_count)(&self.prepare(query)?)
    }

    fn fetch_children(&self, query: &HierarchicalQuery<T, F>) -> Result<ItemStream<T>> {
        let query = self.prepare(query)?;
        check_limit((self.fetch_children)(&query)?, query.limit())
    }

    fn has_children(&self, item: &T) -> Result<bool> {
        (self.has_children)(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DataChangeEvent, NO_LIMIT};
    use parking_lot::Mutex;

    #[test]
    fn test_limit_exceeded_is_illegal_state() {
        let provider = CallbackDataProvider::new(
            |_: &Query<u8, ()>| Ok(vec![1, 2, 3]),
            |_: &Query<u8, ()>| Ok(3),
        );
        let err = provider
            .fetch(&Query::full(0, 2, Vec::new(), None, None))
            .err()
            .unwrap();
        assert!(err.is_illegal_state());
        assert_eq!(provider.fetch(&Query::new()).unwrap().count(), 3);
    }

    #[test]
    fn test_default_sort_orders_mixed_in() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let provider = CallbackDataProvider::new(
            move |query: &Query<u8, ()>| {
                seen_clone.lock().push(query.sort_orders().to_vec());
                Ok(Vec::new())
            },
            |_: &Query<u8, ()>| Ok(0),
        );
        let refreshed = Arc::new(Mutex::new(false));
        let flag = refreshed.clone();
        let _registration = provider.add_data_provider_listener(Arc::new(
            move |event: &DataChangeEvent<u8>| *flag.lock() = *event == DataChangeEvent::RefreshAll,
        ));

        provider.set_sort_orders(vec![QuerySortOrder::asc("id"), QuerySortOrder::asc("name")]);
        assert!(*refreshed.lock());

        let query = Query::full(0, NO_LIMIT, vec![QuerySortOrder::desc("name")], None, None);
        let _ = provider.fetch(&query).unwrap().count();
        assert_eq!(
            seen.lock()[0],
            vec![QuerySortOrder::desc("name"), QuerySortOrder::asc("id")]
        );
    }

    #[test]
    fn test_id_getter_projects_key() {
        let provider = CallbackDataProvider::new(
            |_: &Query<(u32, &'static str), ()>| Ok(Vec::new()),
            |_: &Query<(u32, &'static str), ()>| Ok(0),
        )
        .with_id_getter(|row| row.0);
        assert_eq!(provider.id(&(5, "x")), provider.id(&(5, "y")));
    }

    #[test]
    fn test_hierarchical_callbacks() {
        let provider = CallbackHierarchicalDataProvider::new(
            |query: &HierarchicalQuery<u32, ()>| {
                let base = query.parent().map_or(0, |p| p * 10);
                Ok((1..=3)
                    .map(|n| base + n)
                    .skip(query.offset())
                    .take(query.limit())
                    .collect())
            },
            |_: &HierarchicalQuery<u32, ()>| Ok(3),
            |item: &u32| Ok(*item < 10),
        );

        let children: Vec<u32> = provider
            .fetch_children(&HierarchicalQuery::new(None, Some(2)))
            .unwrap()
            .collect();
        assert_eq!(children, vec![21, 22, 23]);
        assert!(provider.has_children(&3).unwrap());
        assert!(!provider.has_children(&31).unwrap());
        assert!(provider.size(&Query::new()).unwrap_err().is_invalid_argument());
    }
}
