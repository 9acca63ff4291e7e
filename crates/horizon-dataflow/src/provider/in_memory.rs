//! Filtering and sorting for providers that hold their items in memory.
//!
//! [`InMemoryState`] carries the provider's own filter and default sort
//! comparator and runs the fetch pipeline over any item sequence:
//!
//! 1. the provider filter
//! 2. the query filter
//! 3. sorting by the query comparator, ties broken by the provider default
//! 4. skipping `offset` and taking `limit`
//!
//! The provider filter runs first so that a query filter never sees an item
//! the provider itself has excluded.

use std::sync::Arc;

use parking_lot::RwLock;

use super::predicate::{Comparator, Predicate};
use super::query::Query;
use super::sort::SortDirection;
use super::traits::{AnyDataProvider, DataProvider};
use super::wrapper::{ConvertedFilterDataProvider, with_converted_filter};
use crate::identity::DataItem;

/// Provider-level filter and default sorting of an in-memory provider.
pub struct InMemoryState<T> {
    filter: RwLock<Option<Predicate<T>>>,
    sort_comparator: RwLock<Option<Comparator<T>>>,
}

impl<T: DataItem> Default for InMemoryState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataItem> InMemoryState<T> {
    /// Creates a state with no filter and no default sorting.
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(None),
            sort_comparator: RwLock::new(None),
        }
    }

    /// The provider filter.
    pub fn filter(&self) -> Option<Predicate<T>> {
        self.filter.read().clone()
    }

    /// The default sort comparator.
    pub fn sort_comparator(&self) -> Option<Comparator<T>> {
        self.sort_comparator.read().clone()
    }

    /// Replaces the provider filter.
    pub fn set_filter(&self, filter: Option<Predicate<T>>) {
        *self.filter.write() = filter;
    }

    /// Adds a filter that must hold in addition to the current one.
    pub fn add_filter(&self, filter: Predicate<T>) {
        let mut current = self.filter.write();
        *current = Some(match current.take() {
            Some(existing) => existing.and(&filter),
            None => filter,
        });
    }

    /// Removes the provider filter.
    pub fn clear_filters(&self) {
        self.set_filter(None);
    }

    /// Replaces the default sort comparator.
    pub fn set_sort_comparator(&self, comparator: Option<Comparator<T>>) {
        *self.sort_comparator.write() = comparator;
    }

    /// Adds a comparator that breaks ties of the current default sorting.
    pub fn add_sort_comparator(&self, comparator: Comparator<T>) {
        let mut current = self.sort_comparator.write();
        *current = Some(match current.take() {
            Some(existing) => existing.then(&comparator),
            None => comparator,
        });
    }

    /// Sorts by a key extracted from each item.
    pub fn set_sort_order<K, G>(&self, key: G, direction: SortDirection)
    where
        K: Ord,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.set_sort_comparator(Some(directed(Comparator::comparing(key), direction)));
    }

    /// Adds a key-based sort order after the current default sorting.
    pub fn add_sort_order<K, G>(&self, key: G, direction: SortDirection)
    where
        K: Ord,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.add_sort_comparator(directed(Comparator::comparing(key), direction));
    }

    /// Runs the full pipeline: filter, sort, window.
    pub fn apply<'a, I>(&self, items: I, query: &Query<T, Predicate<T>>) -> Vec<T>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut matching = self.filtered(items, query);

        if let Some(comparator) = self.effective_comparator(query) {
            matching.sort_by(|a, b| comparator.compare(a, b));
        }

        matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect()
    }

    /// Counts items passing both filters. Sorting and windowing do not apply.
    pub fn count<'a, I>(&self, items: I, query: &Query<T, Predicate<T>>) -> usize
    where
        I: IntoIterator<Item = &'a T>,
    {
        let provider_filter = self.filter();
        items
            .into_iter()
            .filter(|item| passes(provider_filter.as_ref(), query.filter(), item))
            .count()
    }

    fn filtered<'a, I>(&self, items: I, query: &Query<T, Predicate<T>>) -> Vec<T>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let provider_filter = self.filter();
        items
            .into_iter()
            .filter(|item| passes(provider_filter.as_ref(), query.filter(), item))
            .cloned()
            .collect()
    }

    fn effective_comparator(&self, query: &Query<T, Predicate<T>>) -> Option<Comparator<T>> {
        match (query.in_memory_sorting(), self.sort_comparator()) {
            (Some(primary), Some(tiebreak)) => Some(primary.then(&tiebreak)),
            (Some(primary), None) => Some(primary.clone()),
            (None, default) => default,
        }
    }
}

fn passes<T>(provider: Option<&Predicate<T>>, query: Option<&Predicate<T>>, item: &T) -> bool
where
    T: 'static,
{
    provider.is_none_or(|f| f.test(item)) && query.is_none_or(|f| f.test(item))
}

fn directed<T: 'static>(comparator: Comparator<T>, direction: SortDirection) -> Comparator<T> {
    match direction {
        SortDirection::Ascending => comparator,
        SortDirection::Descending => comparator.reversed(),
    }
}

/// An in-memory provider: filter type [`Predicate`], with provider-level
/// filtering and default sorting.
///
/// Every mutator notifies listeners with a full refresh.
pub trait InMemoryDataProvider<T: DataItem>: DataProvider<T, Predicate<T>> {
    /// The provider's filter and sort state.
    fn in_memory_state(&self) -> &InMemoryState<T>;

    /// Replaces the provider filter.
    fn set_filter(&self, filter: Option<Predicate<T>>) {
        self.in_memory_state().set_filter(filter);
        self.refresh_all();
    }

    /// Adds a filter that must hold in addition to the current one.
    fn add_filter(&self, filter: Predicate<T>) {
        self.in_memory_state().add_filter(filter);
        self.refresh_all();
    }

    /// Keeps only items whose extracted value equals `value`.
    fn set_filter_by_value<V, G>(&self, getter: G, value: V)
    where
        Self: Sized,
        V: PartialEq + Send + Sync + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.set_filter(Some(Predicate::new(move |item| getter(item) == value)));
    }

    /// Adds an equality filter on an extracted value.
    fn add_filter_by_value<V, G>(&self, getter: G, value: V)
    where
        Self: Sized,
        V: PartialEq + Send + Sync + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.add_filter(Predicate::new(move |item| getter(item) == value));
    }

    /// Removes the provider filter.
    fn clear_filters(&self) {
        self.in_memory_state().clear_filters();
        self.refresh_all();
    }

    /// Replaces the default sort comparator.
    fn set_sort_comparator(&self, comparator: Option<Comparator<T>>) {
        self.in_memory_state().set_sort_comparator(comparator);
        self.refresh_all();
    }

    /// Adds a comparator after the current default sorting.
    fn add_sort_comparator(&self, comparator: Comparator<T>) {
        self.in_memory_state().add_sort_comparator(comparator);
        self.refresh_all();
    }

    /// Sorts by an extracted key.
    fn set_sort_order<K, G>(&self, key: G, direction: SortDirection)
    where
        Self: Sized,
        K: Ord,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.in_memory_state().set_sort_order(key, direction);
        self.refresh_all();
    }

    /// Adds a key-based sort order after the current default sorting.
    fn add_sort_order<K, G>(&self, key: G, direction: SortDirection)
    where
        Self: Sized,
        K: Ord,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.in_memory_state().add_sort_order(key, direction);
        self.refresh_all();
    }
}

/// Locale used for case-insensitive text filters.
///
/// Lowercasing is locale sensitive: in Turkish and Azeri, `I` lowers to the
/// dotless `ı` and `İ` to `i`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Locale {
    tag: String,
}

impl Locale {
    /// The language-neutral locale.
    pub fn root() -> Self {
        Self::default()
    }

    /// A locale from a language tag such as `"en-US"` or `"tr"`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// The language tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn language(&self) -> &str {
        self.tag.split(['-', '_']).next().unwrap_or_default()
    }

    /// Lowercases `text` according to this locale.
    pub fn lowercase(&self, text: &str) -> String {
        match self.language().to_ascii_lowercase().as_str() {
            "tr" | "az" => text
                .chars()
                .map(|c| match c {
                    'I' => 'ı',
                    'İ' => 'i',
                    other => other,
                })
                .collect::<String>()
                .to_lowercase(),
            _ => text.to_lowercase(),
        }
    }
}

/// Wraps an in-memory provider so that it is filtered by a value `Q`.
///
/// An item passes a filter value `q` when `matches(&getter(item), &q)` holds.
pub fn filtering_by<T, V, Q, G, P>(
    provider: AnyDataProvider<T, Predicate<T>>,
    getter: G,
    matches: P,
) -> ConvertedFilterDataProvider<T, Q, Predicate<T>>
where
    T: DataItem,
    Q: Clone + Send + Sync + 'static,
    G: Fn(&T) -> V + Send + Sync + 'static,
    P: Fn(&V, &Q) -> bool + Send + Sync + 'static,
{
    let getter = Arc::new(getter);
    let matches = Arc::new(matches);
    with_converted_filter(provider, move |query_value: &Q| {
        let getter = getter.clone();
        let matches = matches.clone();
        let query_value = query_value.clone();
        Predicate::new(move |item| matches(&getter(item), &query_value))
    })
}

/// Filters by equality of an extracted value.
pub fn filtering_by_equals<T, V, G>(
    provider: AnyDataProvider<T, Predicate<T>>,
    getter: G,
) -> ConvertedFilterDataProvider<T, V, Predicate<T>>
where
    T: DataItem,
    V: PartialEq + Clone + Send + Sync + 'static,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    filtering_by(provider, getter, |value: &V, query_value: &V| value == query_value)
}

/// Case-insensitive substring filter on an extracted text.
pub fn filtering_by_substring<T, G>(
    provider: AnyDataProvider<T, Predicate<T>>,
    getter: G,
    locale: Locale,
) -> ConvertedFilterDataProvider<T, String, Predicate<T>>
where
    T: DataItem,
    G: Fn(&T) -> String + Send + Sync + 'static,
{
    filtering_by_text(provider, getter, locale, |value, needle| value.contains(needle))
}

/// Case-insensitive prefix filter on an extracted text.
pub fn filtering_by_prefix<T, G>(
    provider: AnyDataProvider<T, Predicate<T>>,
    getter: G,
    locale: Locale,
) -> ConvertedFilterDataProvider<T, String, Predicate<T>>
where
    T: DataItem,
    G: Fn(&T) -> String + Send + Sync + 'static,
{
    filtering_by_text(provider, getter, locale, |value, needle| value.starts_with(needle))
}

fn filtering_by_text<T, G>(
    provider: AnyDataProvider<T, Predicate<T>>,
    getter: G,
    locale: Locale,
    test: fn(&str, &str) -> bool,
) -> ConvertedFilterDataProvider<T, String, Predicate<T>>
where
    T: DataItem,
    G: Fn(&T) -> String + Send + Sync + 'static,
{
    filtering_by(provider, getter, move |value: &String, needle: &String| {
        test(&locale.lowercase(value), &locale.lowercase(needle))
    })
}
