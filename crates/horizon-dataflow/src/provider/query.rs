//! Query descriptors passed to data providers.
//!
//! A [`Query`] is built fresh for every request and never mutated afterwards.
//! Hierarchical providers require a [`HierarchicalQuery`], which additionally
//! names the parent whose children are requested.

use std::ops::Deref;

use super::predicate::Comparator;
use super::sort::QuerySortOrder;
use crate::error::{DataError, Result};

/// Limit value meaning "no limit".
pub const NO_LIMIT: usize = usize::MAX;

/// Which part of the data set a query addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope<T> {
    /// A flat data set.
    Flat,
    /// The direct children of a parent; `None` is the root level.
    Children(Option<T>),
}

/// An immutable data request: window, sorting and filter.
///
/// `sort_orders` are meant for back ends and `in_memory_sorting` for
/// in-memory providers. A provider honors the one it understands and ignores
/// the other.
#[derive(Debug, Clone)]
pub struct Query<T, F> {
    offset: usize,
    limit: usize,
    sort_orders: Vec<QuerySortOrder>,
    in_memory_sorting: Option<Comparator<T>>,
    filter: Option<F>,
    scope: QueryScope<T>,
}

impl<T, F> Default for Query<T, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, F> Query<T, F> {
    /// A query for every item, unfiltered and unsorted.
    pub fn new() -> Self {
        Self::filtered(None)
    }

    /// A query for every item matching `filter`.
    pub fn filtered(filter: Option<F>) -> Self {
        Self::full(0, NO_LIMIT, Vec::new(), None, filter)
    }

    /// A query with every parameter given explicitly.
    pub fn full(
        offset: usize,
        limit: usize,
        sort_orders: Vec<QuerySortOrder>,
        in_memory_sorting: Option<Comparator<T>>,
        filter: Option<F>,
    ) -> Self {
        Self {
            offset,
            limit,
            sort_orders,
            in_memory_sorting,
            filter,
            scope: QueryScope::Flat,
        }
    }

    /// Index of the first requested item.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Maximum number of requested items, [`NO_LIMIT`] for all.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Back end sort orders, most significant first.
    pub fn sort_orders(&self) -> &[QuerySortOrder] {
        &self.sort_orders
    }

    /// Comparator for in-memory sorting.
    pub fn in_memory_sorting(&self) -> Option<&Comparator<T>> {
        self.in_memory_sorting.as_ref()
    }

    /// The filter, if any.
    pub fn filter(&self) -> Option<&F> {
        self.filter.as_ref()
    }

    /// The addressed scope.
    pub fn scope(&self) -> &QueryScope<T> {
        &self.scope
    }

    /// Returns `true` if this query addresses the children of a parent.
    pub fn is_hierarchical(&self) -> bool {
        matches!(self.scope, QueryScope::Children(_))
    }

    /// Exclusive end index of the requested window.
    pub fn requested_range_end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

impl<T: Clone, F> Query<T, F> {
    /// Returns the same query with `filter` in place of the current one.
    ///
    /// Window, sorting and scope are carried over unchanged.
    pub fn map_filter<G>(&self, filter: Option<G>) -> Query<T, G> {
        Query {
            offset: self.offset,
            limit: self.limit,
            sort_orders: self.sort_orders.clone(),
            in_memory_sorting: self.in_memory_sorting.clone(),
            filter,
            scope: self.scope.clone(),
        }
    }
}

impl<T: Clone, F: Clone> Query<T, F> {
    /// Returns the same query with different back end sort orders.
    pub fn with_sort_orders(&self, sort_orders: Vec<QuerySortOrder>) -> Self {
        Self {
            sort_orders,
            ..self.clone()
        }
    }
}

/// A query for the children of one parent item.
#[derive(Debug, Clone)]
pub struct HierarchicalQuery<T, F> {
    query: Query<T, F>,
}

impl<T, F> HierarchicalQuery<T, F> {
    /// All children of `parent` (root level for `None`) matching `filter`.
    pub fn new(filter: Option<F>, parent: Option<T>) -> Self {
        Self::full(0, NO_LIMIT, Vec::new(), None, filter, parent)
    }

    /// A hierarchical query with every parameter given explicitly.
    pub fn full(
        offset: usize,
        limit: usize,
        sort_orders: Vec<QuerySortOrder>,
        in_memory_sorting: Option<Comparator<T>>,
        filter: Option<F>,
        parent: Option<T>,
    ) -> Self {
        let mut query = Query::full(offset, limit, sort_orders, in_memory_sorting, filter);
        query.scope = QueryScope::Children(parent);
        Self { query }
    }

    /// The parent item, `None` for the root level.
    pub fn parent(&self) -> Option<&T> {
        match &self.query.scope {
            QueryScope::Children(parent) => parent.as_ref(),
            QueryScope::Flat => None,
        }
    }

    /// The underlying query.
    pub fn as_query(&self) -> &Query<T, F> {
        &self.query
    }

    /// Unwraps the underlying query.
    pub fn into_query(self) -> Query<T, F> {
        self.query
    }
}

impl<T: Clone, F> HierarchicalQuery<T, F> {
    /// Returns the same query with `filter` in place of the current one.
    pub fn map_filter<G>(&self, filter: Option<G>) -> HierarchicalQuery<T, G> {
        HierarchicalQuery {
            query: self.query.map_filter(filter),
        }
    }
}

impl<T: Clone, F: Clone> HierarchicalQuery<T, F> {
    /// Reinterprets a query as hierarchical.
    ///
    /// Fails with [`DataError::InvalidArgument`] if the query is flat.
    pub fn from_query(query: &Query<T, F>) -> Result<Self> {
        if query.is_hierarchical() {
            Ok(Self {
                query: query.clone(),
            })
        } else {
            Err(DataError::invalid_argument(
                "hierarchical data provider requires a hierarchical query",
            ))
        }
    }
}

impl<T, F> Deref for HierarchicalQuery<T, F> {
    type Target = Query<T, F>;

    fn deref(&self) -> &Self::Target {
        &self.query
    }
}

impl<T, F> From<HierarchicalQuery<T, F>> for Query<T, F> {
    fn from(query: HierarchicalQuery<T, F>) -> Self {
        query.query
    }
}
