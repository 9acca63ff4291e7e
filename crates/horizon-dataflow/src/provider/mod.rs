//! Data providers and queries.
//!
//! A data provider is the query interface to a store of items that may be
//! far larger than what is ever shown. Consumers describe what they need
//! with an immutable [`Query`] (window, sorting, filter) and receive a
//! one-shot stream of items, or a count.
//!
//! # Core Types
//!
//! - `Query` / `HierarchicalQuery`: request descriptors
//! - `DataProvider` / `HierarchicalDataProvider`: the provider traits
//! - `AnyDataProvider`: either kind, as a tagged union
//! - `ProviderSignals`: change notifications (`RefreshAll`, `RefreshItem`)
//!
//! # Provider Implementations
//!
//! - `ListDataProvider`: in-memory list
//! - `TreeDataProvider`: in-memory tree over `TreeData`
//! - `SimpleHierarchicalDataProvider`: in-memory tree over a lookup function
//! - `CallbackDataProvider` / `CallbackHierarchicalDataProvider`: back ends
//!
//! # Composition
//!
//! ```text
//! outer Query<T, F> ──> DataProviderWrapper ──> inner Query<T, M> ──> provider
//!                          (FilterHook)
//! ```
//!
//! Wrappers rewrite only the filter; see the [`wrapper`] module for the
//! available hooks and [`AppendableSearcher`] for a mutable filter set.

mod callback;
mod in_memory;
mod list_provider;
mod predicate;
mod query;
mod searcher;
mod sort;
mod traits;
mod tree_data;
mod tree_provider;
pub mod wrapper;

pub use callback::{
    CallbackDataProvider, CallbackHierarchicalDataProvider, ChildCountCallback, CountCallback,
    FetchCallback, FetchChildrenCallback, HasChildrenCallback,
};
pub use in_memory::{
    InMemoryDataProvider, InMemoryState, Locale, filtering_by, filtering_by_equals,
    filtering_by_prefix, filtering_by_substring,
};
pub use list_provider::ListDataProvider;
pub use predicate::{Comparator, Predicate};
pub use query::{HierarchicalQuery, NO_LIMIT, Query, QueryScope};
pub use searcher::{AppendableSearcher, SearchFilters, searcher};
pub use sort::{QuerySortOrder, QuerySortOrderBuilder, SortDirection, mix_in_sort_orders};
pub use traits::{
    AnyDataProvider, DataChangeEvent, DataProvider, HierarchicalDataProvider, ItemStream,
    Listener, ProviderSignals, Registration,
};
pub use tree_data::TreeData;
pub use tree_provider::{ChildrenLookup, SimpleHierarchicalDataProvider, TreeDataProvider};
pub use wrapper::{
    AppendableFilterDataProvider, ConfigurableFilterDataProviderWrapper,
    ConvertedFilterDataProvider, DataProviderWrapper, FilterHook, SingleFilteringDataProvider,
    appendable, single_filtering, with_configurable_filter, with_configurable_filter_combined,
    with_converted_filter,
};
