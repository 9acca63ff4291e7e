//! Behavioral properties of queries, providers and wrappers.

use std::sync::Arc;

use horizon_dataflow::provider::{
    AnyDataProvider, Comparator, DataChangeEvent, DataProvider, InMemoryDataProvider,
    ListDataProvider, Predicate, Query, QuerySortOrder, SortDirection, mix_in_sort_orders,
    searcher, with_configurable_filter,
};
use parking_lot::Mutex;

fn collect<T: horizon_dataflow::DataItem, F>(
    provider: &impl DataProvider<T, F>,
    query: &Query<T, F>,
) -> Vec<T> {
    provider.fetch(query).unwrap().collect()
}

fn window(offset: usize, limit: usize) -> Query<u32, Predicate<u32>> {
    Query::full(offset, limit, Vec::new(), None, None)
}

#[test]
fn test_fetch_returns_the_requested_slice() {
    let items: Vec<u32> = (0..7).collect();
    let provider = ListDataProvider::new(items.clone());

    for offset in 0..10 {
        for limit in 0..10 {
            let fetched = collect(&provider, &window(offset, limit));
            let start = offset.min(items.len());
            let end = (offset + limit).min(items.len());
            assert_eq!(fetched, items[start..end], "offset {offset} limit {limit}");
            if limit > 0 {
                assert_eq!(fetched.len() < limit, offset + limit > items.len());
            }
        }
    }
}

#[test]
fn test_query_sort_orders_take_precedence_over_defaults() {
    let query: Query<u32, ()> = Query::full(
        0,
        10,
        vec![QuerySortOrder::desc("name"), QuerySortOrder::asc("age")],
        None,
        None,
    );
    let defaults = [
        QuerySortOrder::asc("id"),
        QuerySortOrder::asc("name"),
        QuerySortOrder::desc("created"),
    ];

    let mixed = mix_in_sort_orders(&query, &defaults);
    assert_eq!(
        mixed.sort_orders(),
        [
            QuerySortOrder::desc("name"),
            QuerySortOrder::asc("age"),
            QuerySortOrder::asc("id"),
            QuerySortOrder::desc("created"),
        ]
    );
    assert_eq!((mixed.offset(), mixed.limit()), (0, 10));
}

#[test]
fn test_filter_then_descending_sort() {
    let provider = ListDataProvider::new(vec![1_u32, 2, 3, 4, 5]);
    provider.set_filter(Some(Predicate::new(|value: &u32| *value > 2)));
    provider.set_sort_order(|value: &u32| *value, SortDirection::Descending);

    assert_eq!(collect(&provider, &window(0, 10)), vec![5, 4, 3]);

    // An explicit in-memory sorting on the query wins over the default.
    let ascending = Query::full(0, 10, Vec::new(), Some(Comparator::natural()), None);
    assert_eq!(collect(&provider, &ascending), vec![3, 4, 5]);
}

#[test]
fn test_repeated_filter_changes_notify_once() {
    let numbers = AnyDataProvider::flat(ListDataProvider::new((1..=10).collect::<Vec<u32>>()));
    let search = searcher(numbers.clone(), |a: &Predicate<u32>, b: &Predicate<u32>| a.and(b));
    let configurable = with_configurable_filter(numbers);

    let refreshes = Arc::new(Mutex::new(0));
    let counter = refreshes.clone();
    let _registration = search.add_data_provider_listener(Arc::new(
        move |event: &DataChangeEvent<u32>| {
            if *event == DataChangeEvent::RefreshAll {
                *counter.lock() += 1;
            }
        },
    ));

    let even = Predicate::new(|n: &u32| n % 2 == 0);
    search.search_by(even.clone());
    search.search_by(even);
    assert_eq!(*refreshes.lock(), 1);
    assert_eq!(search.size(&Query::new()).unwrap(), 5);

    // Both wrappers share the list's signals.
    *refreshes.lock() = 0;
    configurable.set_filter(None);
    assert_eq!(*refreshes.lock(), 0);
    configurable.set_filter(Some(Predicate::new(|n: &u32| *n > 8)));
    assert_eq!(*refreshes.lock(), 1);
    assert_eq!(configurable.size(&Query::new()).unwrap(), 2);
}

#[test]
fn test_provider_filter_runs_before_query_filter() {
    let provider = ListDataProvider::new(vec![Some(1_u32), None, Some(5), None, Some(3)]);
    provider.set_filter(Some(Predicate::new(|value: &Option<u32>| value.is_some())));

    // Would panic on the missing values if applied first.
    let above_two = Predicate::new(|value: &Option<u32>| value.expect("present") > 2);
    let query = Query::filtered(Some(above_two));

    assert_eq!(provider.size(&query).unwrap(), 2);
    assert_eq!(collect(&provider, &query), vec![Some(5), Some(3)]);
}
