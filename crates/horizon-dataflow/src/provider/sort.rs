//! Back end sort orders.
//!
//! Back end providers receive sorting as an ordered list of
//! [`QuerySortOrder`]s naming a sortable property and a direction. Providers
//! may configure default orders that only break ties left by the query's own
//! orders; see [`mix_in_sort_orders`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::query::Query;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Returns the other direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// A sort order for back end queries: a property identifier and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySortOrder {
    sorted: String,
    direction: SortDirection,
}

impl QuerySortOrder {
    /// Creates a sort order.
    pub fn new(sorted: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sorted: sorted.into(),
            direction,
        }
    }

    /// Ascending order by `sorted`.
    pub fn asc(sorted: impl Into<String>) -> Self {
        Self::new(sorted, SortDirection::Ascending)
    }

    /// Descending order by `sorted`.
    pub fn desc(sorted: impl Into<String>) -> Self {
        Self::new(sorted, SortDirection::Descending)
    }

    /// The sorted property identifier.
    pub fn sorted(&self) -> &str {
        &self.sorted
    }

    /// The direction.
    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

/// Builder for a list of [`QuerySortOrder`]s.
///
/// ```
/// use horizon_dataflow::provider::{QuerySortOrderBuilder, SortDirection};
///
/// let orders = QuerySortOrderBuilder::new().then_desc("age").then_asc("name").build();
/// assert_eq!(orders.len(), 2);
/// assert_eq!(orders[0].direction(), SortDirection::Descending);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QuerySortOrderBuilder {
    orders: Vec<QuerySortOrder>,
}

impl QuerySortOrderBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an ascending order.
    pub fn then_asc(mut self, sorted: impl Into<String>) -> Self {
        self.orders.push(QuerySortOrder::asc(sorted));
        self
    }

    /// Appends a descending order.
    pub fn then_desc(mut self, sorted: impl Into<String>) -> Self {
        self.orders.push(QuerySortOrder::desc(sorted));
        self
    }

    /// Returns the collected orders.
    pub fn build(self) -> Vec<QuerySortOrder> {
        self.orders
    }
}

/// Appends `defaults` to the query's own sort orders.
///
/// A default whose property is already sorted by the query is skipped, so the
/// explicit order always wins and defaults only break ties. Everything else
/// about the query is kept.
pub fn mix_in_sort_orders<T: Clone, F: Clone>(
    query: &Query<T, F>,
    defaults: &[QuerySortOrder],
) -> Query<T, F> {
    if defaults.is_empty() {
        return query.clone();
    }

    let explicit: HashSet<&str> = query.sort_orders().iter().map(|o| o.sorted()).collect();
    let mut combined = query.sort_orders().to_vec();
    combined.extend(
        defaults
            .iter()
            .filter(|order| !explicit.contains(order.sorted()))
            .cloned(),
    );
    query.with_sort_orders(combined)
}
