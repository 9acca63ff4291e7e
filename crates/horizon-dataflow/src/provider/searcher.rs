//! A provider wrapper holding a set of active search filters.
//!
//! Unlike an appended filter chain, the searcher keeps its filters as a set
//! that can be replaced, extended and cleared in place. Before each query
//! the set is reduced pairwise with the back end's combiner. Listeners are
//! refreshed only when the membership of the set actually changes.

use std::sync::Arc;

use horizon_dataflow_core::logging::targets;
use parking_lot::RwLock;

use super::query::Query;
use super::traits::{AnyDataProvider, DataProvider};
use super::wrapper::{DataProviderWrapper, FilterHook};
use crate::identity::DataItem;

/// The active search filters and their combiner.
pub struct SearchFilters<F> {
    filters: RwLock<Vec<F>>,
    combine: Arc<dyn Fn(&F, &F) -> F + Send + Sync>,
}

impl<F: Clone> SearchFilters<F> {
    fn reduce(&self, filters: &[F]) -> Option<F> {
        let (first, rest) = filters.split_first()?;
        Some(
            rest.iter()
                .fold(first.clone(), |acc, next| (self.combine)(&acc, next)),
        )
    }
}

impl<T, F> FilterHook<T, F, F> for SearchFilters<F>
where
    F: Clone + Send + Sync,
{
    fn inner_filter(&self, query: &Query<T, F>) -> Option<F> {
        let active = self.reduce(&self.filters.read());
        match (query.filter(), active) {
            (Some(query_filter), Some(active)) => Some((self.combine)(query_filter, &active)),
            (Some(query_filter), None) => Some(query_filter.clone()),
            (None, active) => active,
        }
    }
}

/// A provider filtered by a mutable set of search filters.
pub type AppendableSearcher<T, F> = DataProviderWrapper<T, F, F, SearchFilters<F>>;

/// Wraps `inner` with an empty search filter set reduced by `combine`.
///
/// ```
/// use horizon_dataflow::provider::{searcher, AnyDataProvider, DataProvider, ListDataProvider, Predicate, Query};
///
/// let numbers = AnyDataProvider::flat(ListDataProvider::new((1..=10).collect::<Vec<i32>>()));
/// let search = searcher(numbers, |a: &Predicate<i32>, b: &Predicate<i32>| a.and(b));
/// search.add_filter(Predicate::new(|n: &i32| n % 2 == 0));
/// search.add_filter(Predicate::new(|n: &i32| *n > 5));
/// assert_eq!(search.size(&Query::new()).unwrap(), 3);
/// ```
pub fn searcher<T, F, K>(inner: AnyDataProvider<T, F>, combine: K) -> AppendableSearcher<T, F>
where
    T: DataItem,
    F: Clone + Send + Sync + 'static,
    K: Fn(&F, &F) -> F + Send + Sync + 'static,
{
    DataProviderWrapper::new(
        inner,
        SearchFilters {
            filters: RwLock::new(Vec::new()),
            combine: Arc::new(combine),
        },
    )
}

impl<T, F> DataProviderWrapper<T, F, F, SearchFilters<F>>
where
    T: DataItem,
    F: Clone + PartialEq + Send + Sync + 'static,
{
    /// Replaces the whole filter set with `filter`.
    ///
    /// A no-op when `filter` already is the only active filter.
    pub fn search_by(&self, filter: F) {
        {
            let mut filters = self.hook().filters.write();
            if filters.len() == 1 && filters[0] == filter {
                return;
            }
            filters.clear();
            filters.push(filter);
        }
        self.membership_changed();
    }

    /// Adds `filter` to the set unless it is already active.
    pub fn add_filter(&self, filter: F) {
        {
            let mut filters = self.hook().filters.write();
            if filters.contains(&filter) {
                return;
            }
            filters.push(filter);
        }
        self.membership_changed();
    }

    /// Removes `filter` from the set if present.
    pub fn remove_filter(&self, filter: &F) {
        {
            let mut filters = self.hook().filters.write();
            let before = filters.len();
            filters.retain(|active| active != filter);
            if filters.len() == before {
                return;
            }
        }
        self.membership_changed();
    }

    /// Removes all filters.
    pub fn clear_filters(&self) {
        {
            let mut filters = self.hook().filters.write();
            if filters.is_empty() {
                return;
            }
            filters.clear();
        }
        self.membership_changed();
    }

    /// The active filters in insertion order.
    pub fn active_filters(&self) -> Vec<F> {
        self.hook().filters.read().clone()
    }

    /// The active filters reduced to one, `None` if the set is empty.
    pub fn combined_filter(&self) -> Option<F> {
        let hook = self.hook();
        hook.reduce(&hook.filters.read())
    }

    fn membership_changed(&self) {
        tracing::debug!(
            target: targets::PROVIDER,
            active = self.hook().filters.read().len(),
            "search filters changed"
        );
        self.refresh_all();
    }
}
