//! Filter-transforming provider wrappers.
//!
//! A [`DataProviderWrapper`] exposes an inner provider with filter type `M`
//! as a provider with filter type `F`. Every `size` and `fetch` call is
//! rewritten by a [`FilterHook`] that computes the inner filter from the
//! outer query; window, sorting and scope pass through unchanged.
//!
//! The hooks in this module cover the usual compositions:
//!
//! | Hook | Wrapper | Inner filter |
//! |------|---------|--------------|
//! | [`ConvertFilter`] | [`ConvertedFilterDataProvider`] | `convert(query filter)` |
//! | [`FixedFilter`] | [`SingleFilteringDataProvider`] | the stored filter |
//! | [`CombineFilters`] | [`ConfigurableFilterDataProviderWrapper`] | `combine(query filter, configured filter)` |
//! | [`AppendedFilter`] | [`AppendableFilterDataProvider`] | query filter combined with the appended chain |

use std::marker::PhantomData;
use std::sync::Arc;

use horizon_dataflow_core::logging::targets;
use parking_lot::RwLock;

use super::query::{HierarchicalQuery, Query};
use super::traits::{
    AnyDataProvider, DataProvider, HierarchicalDataProvider, ItemStream, ProviderSignals,
};
use crate::error::{DataError, Result};
use crate::identity::{DataItem, ItemId};

/// Computes the inner filter for an outer query.
pub trait FilterHook<T, F, M>: Send + Sync {
    /// Returns the filter to hand to the inner provider.
    fn inner_filter(&self, query: &Query<T, F>) -> Option<M>;
}

/// A provider that rewrites the filter of every query before delegating.
///
/// Wrapping a hierarchical provider yields a hierarchical provider; see
/// [`DataProviderWrapper::into_any`].
pub struct DataProviderWrapper<T: DataItem, F, M, H> {
    inner: AnyDataProvider<T, M>,
    hook: H,
    _outer: PhantomData<fn(F)>,
}

impl<T, F, M, H> DataProviderWrapper<T, F, M, H>
where
    T: DataItem,
    M: 'static,
    H: FilterHook<T, F, M>,
{
    /// Wraps `inner` with `hook`.
    pub fn new(inner: AnyDataProvider<T, M>, hook: H) -> Self {
        Self {
            inner,
            hook,
            _outer: PhantomData,
        }
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &AnyDataProvider<T, M> {
        &self.inner
    }

    /// The filter hook.
    pub fn hook(&self) -> &H {
        &self.hook
    }

    fn inner_query(&self, query: &Query<T, F>) -> Query<T, M> {
        query.map_filter(self.hook.inner_filter(query))
    }

    fn hierarchical_inner(&self) -> Result<&Arc<dyn HierarchicalDataProvider<T, M>>> {
        self.inner.as_hierarchical().ok_or_else(|| {
            DataError::invalid_argument("wrapped data provider is not hierarchical")
        })
    }
}

impl<T, F, M, H> DataProviderWrapper<T, F, M, H>
where
    T: DataItem,
    F: 'static,
    M: 'static,
    H: FilterHook<T, F, M> + 'static,
{
    /// Erases the wrapper, keeping the kind of the wrapped provider.
    pub fn into_any(self) -> AnyDataProvider<T, F> {
        match self.inner {
            AnyDataProvider::Flat(_) => AnyDataProvider::Flat(Arc::new(self)),
            AnyDataProvider::Hierarchical(_) => AnyDataProvider::Hierarchical(Arc::new(self)),
        }
    }
}

impl<T, F, M, H> DataProvider<T, F> for DataProviderWrapper<T, F, M, H>
where
    T: DataItem,
    M: 'static,
    H: FilterHook<T, F, M>,
{
    fn is_in_memory(&self) -> bool {
        self.inner.is_in_memory()
    }

    fn size(&self, query: &Query<T, F>) -> Result<usize> {
        self.inner.size(&self.inner_query(query))
    }

    fn fetch(&self, query: &Query<T, F>) -> Result<ItemStream<T>> {
        self.inner.fetch(&self.inner_query(query))
    }

    fn signals(&self) -> &ProviderSignals<T> {
        self.inner.signals()
    }

    fn id(&self, item: &T) -> ItemId {
        self.inner.id(item)
    }
}

impl<T, F, M, H> HierarchicalDataProvider<T, F> for DataProviderWrapper<T, F, M, H>
where
    T: DataItem,
    M: 'static,
    H: FilterHook<T, F, M>,
{
    fn child_count(&self, query: &HierarchicalQuery<T, F>) -> Result<usize> {
        let inner = self.hierarchical_inner()?;
        inner.child_count(&query.map_filter(self.hook.inner_filter(query)))
    }

    fn fetch_children(&self, query: &HierarchicalQuery<T, F>) -> Result<ItemStream<T>> {
        let inner = self.hierarchical_inner()?;
        inner.fetch_children(&query.map_filter(self.hook.inner_filter(query)))
    }

    fn has_children(&self, item: &T) -> Result<bool> {
        self.hierarchical_inner()?.has_children(item)
    }
}

// -----------------------------------------------------------------------------
// Filter conversion
// -----------------------------------------------------------------------------

/// Maps the outer filter through a pure function.
pub struct ConvertFilter<F, M> {
    convert: Arc<dyn Fn(&F) -> M + Send + Sync>,
}

impl<T, F, M> FilterHook<T, F, M> for ConvertFilter<F, M> {
    fn inner_filter(&self, query: &Query<T, F>) -> Option<M> {
        query.filter().map(|filter| (self.convert)(filter))
    }
}

/// A provider whose filter is converted before reaching the inner provider.
pub type ConvertedFilterDataProvider<T, F, M> = DataProviderWrapper<T, F, M, ConvertFilter<F, M>>;

/// Exposes `inner` with filter type `F`, converting each filter to `M`.
///
/// ```
/// use horizon_dataflow::provider::{
///     with_converted_filter, AnyDataProvider, DataProvider, ListDataProvider, Predicate, Query,
/// };
///
/// let words = AnyDataProvider::flat(ListDataProvider::new(vec!["ant", "bee", "cow"]));
/// let by_prefix = with_converted_filter(words, |prefix: &String| {
///     let prefix = prefix.clone();
///     Predicate::new(move |word: &&str| word.starts_with(prefix.as_str()))
/// });
/// assert_eq!(by_prefix.size(&Query::filtered(Some("b".to_string()))).unwrap(), 1);
/// assert_eq!(by_prefix.size(&Query::new()).unwrap(), 3);
/// ```
pub fn with_converted_filter<T, F, M, C>(
    inner: AnyDataProvider<T, M>,
    convert: C,
) -> ConvertedFilterDataProvider<T, F, M>
where
    T: DataItem,
    M: 'static,
    C: Fn(&F) -> M + Send + Sync + 'static,
{
    DataProviderWrapper::new(
        inner,
        ConvertFilter {
            convert: Arc::new(convert),
        },
    )
}

// -----------------------------------------------------------------------------
// Fixed filter
// -----------------------------------------------------------------------------

/// Replaces any outer filter with a stored value.
pub struct FixedFilter<M> {
    filter: RwLock<Option<M>>,
}

impl<T, F, M> FilterHook<T, F, M> for FixedFilter<M>
where
    M: Clone + Send + Sync,
{
    fn inner_filter(&self, _query: &Query<T, F>) -> Option<M> {
        self.filter.read().clone()
    }
}

/// A provider that always queries its inner provider with one stored filter.
///
/// The outer filter type is `F`; whatever filter an outer query carries is
/// ignored.
pub type SingleFilteringDataProvider<T, M, F = ()> = DataProviderWrapper<T, F, M, FixedFilter<M>>;

/// Wraps `inner` so that every query uses `filter`.
pub fn single_filtering<T, M, F>(
    inner: AnyDataProvider<T, M>,
    filter: Option<M>,
) -> SingleFilteringDataProvider<T, M, F>
where
    T: DataItem,
    M: Clone + Send + Sync + 'static,
{
    DataProviderWrapper::new(
        inner,
        FixedFilter {
            filter: RwLock::new(filter),
        },
    )
}

impl<T, F, M> DataProviderWrapper<T, F, M, FixedFilter<M>>
where
    T: DataItem,
    M: Clone + PartialEq + Send + Sync + 'static,
{
    /// The stored filter.
    pub fn filter(&self) -> Option<M> {
        self.hook.filter.read().clone()
    }

    /// Replaces the stored filter. Listeners are refreshed only on change.
    pub fn set_filter(&self, filter: Option<M>) {
        {
            let mut current = self.hook.filter.write();
            if *current == filter {
                return;
            }
            *current = filter;
        }
        self.refresh_all();
    }
}

// -----------------------------------------------------------------------------
// Configurable filter
// -----------------------------------------------------------------------------

/// Combines the outer query filter `Q` with a configured filter `C`.
pub struct CombineFilters<Q, C, M> {
    configured: RwLock<Option<C>>,
    combine: Arc<dyn Fn(Option<&Q>, Option<&C>) -> Option<M> + Send + Sync>,
}

impl<T, Q, C, M> FilterHook<T, Q, M> for CombineFilters<Q, C, M>
where
    C: Send + Sync,
{
    fn inner_filter(&self, query: &Query<T, Q>) -> Option<M> {
        let configured = self.configured.read();
        match (query.filter(), configured.as_ref()) {
            (None, None) => None,
            (query_filter, configured) => (self.combine)(query_filter, configured),
        }
    }
}

/// A provider with a configurable filter combined with each query's filter.
///
/// The combiner is skipped when neither filter is present.
pub type ConfigurableFilterDataProviderWrapper<T, Q, C, M> =
    DataProviderWrapper<T, Q, M, CombineFilters<Q, C, M>>;

/// Wraps `inner` with a configurable filter that replaces the query filter.
///
/// Outer queries carry no filter of their own.
pub fn with_configurable_filter<T, M>(
    inner: AnyDataProvider<T, M>,
) -> ConfigurableFilterDataProviderWrapper<T, (), M, M>
where
    T: DataItem,
    M: Clone + Send + Sync + 'static,
{
    with_configurable_filter_combined(inner, |_: Option<&()>, configured: Option<&M>| {
        configured.cloned()
    })
}

/// Wraps `inner` with a configurable filter merged into each query filter by
/// `combine`.
pub fn with_configurable_filter_combined<T, Q, C, M, K>(
    inner: AnyDataProvider<T, M>,
    combine: K,
) -> ConfigurableFilterDataProviderWrapper<T, Q, C, M>
where
    T: DataItem,
    C: Send + Sync + 'static,
    M: 'static,
    K: Fn(Option<&Q>, Option<&C>) -> Option<M> + Send + Sync + 'static,
{
    DataProviderWrapper::new(
        inner,
        CombineFilters {
            configured: RwLock::new(None),
            combine: Arc::new(combine),
        },
    )
}

impl<T, Q, C, M> DataProviderWrapper<T, Q, M, CombineFilters<Q, C, M>>
where
    T: DataItem,
    C: Clone + PartialEq + Send + Sync + 'static,
    M: 'static,
{
    /// The configured filter.
    pub fn configured_filter(&self) -> Option<C> {
        self.hook.configured.read().clone()
    }

    /// Replaces the configured filter.
    ///
    /// Setting the filter that is already configured is a no-op; any other
    /// value refreshes listeners.
    pub fn set_filter(&self, filter: Option<C>) {
        {
            let mut configured = self.hook.configured.write();
            if *configured == filter {
                return;
            }
            *configured = filter;
        }
        tracing::debug!(target: targets::PROVIDER, "configured filter changed");
        self.refresh_all();
    }
}

// -----------------------------------------------------------------------------
// Appendable filter chain
// -----------------------------------------------------------------------------

/// Combines the query filter with an appended filter chain.
pub struct AppendedFilter<F> {
    appended: Option<F>,
    combine: Arc<dyn Fn(&F, &F) -> F + Send + Sync>,
}

impl<T, F> FilterHook<T, F, F> for AppendedFilter<F>
where
    F: Clone + Send + Sync,
{
    fn inner_filter(&self, query: &Query<T, F>) -> Option<F> {
        match (query.filter(), self.appended.as_ref()) {
            (Some(query_filter), Some(appended)) => Some((self.combine)(query_filter, appended)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }
}

/// A provider to which filters can be appended, each call yielding a new
/// provider. Earlier providers in the chain are unaffected.
pub type AppendableFilterDataProvider<T, F> = DataProviderWrapper<T, F, F, AppendedFilter<F>>;

/// Wraps `inner` so that filters can be appended with `combine`.
pub fn appendable<T, F, K>(
    inner: AnyDataProvider<T, F>,
    combine: K,
) -> AppendableFilterDataProvider<T, F>
where
    T: DataItem,
    F: Clone + Send + Sync + 'static,
    K: Fn(&F, &F) -> F + Send + Sync + 'static,
{
    DataProviderWrapper::new(
        inner,
        AppendedFilter {
            appended: None,
            combine: Arc::new(combine),
        },
    )
}

impl<T, F> DataProviderWrapper<T, F, F, AppendedFilter<F>>
where
    T: DataItem,
    F: Clone + Send + Sync + 'static,
{
    /// The filter appended so far.
    pub fn appended_filter(&self) -> Option<&F> {
        self.hook.appended.as_ref()
    }

    /// Returns a new provider with `filter` combined into the chain.
    pub fn append_filter(&self, filter: F) -> Self {
        let appended = match &self.hook.appended {
            Some(existing) => (self.hook.combine)(existing, &filter),
            None => filter,
        };
        DataProviderWrapper::new(
            self.inner.clone(),
            AppendedFilter {
                appended: Some(appended),
                combine: self.hook.combine.clone(),
            },
        )
    }
}
