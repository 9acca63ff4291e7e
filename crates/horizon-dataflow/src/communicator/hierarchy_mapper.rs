//! Flattening of an expandable tree into indexable rows.
//!
//! The flattened view is recomputed from the provider on every request:
//! starting at the root level, every child is followed by the flattened
//! children of that child if it is expanded. No index is cached between
//! calls, so filter and sort changes never leave stale positions behind.
//!
//! While flattening, the mapper records which parent each visible item was
//! reached from. Those links answer depth and parent queries, and are pruned
//! when an expanded item turns out to have no children any more.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use horizon_dataflow_core::PerfSpan;
use horizon_dataflow_core::logging::{span_names, targets};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use super::data_communicator::{FilterValue, RowSource};
use super::generator::{DataGenerator, RowRecord, fields};
use super::range::Range;
use crate::error::Result;
use crate::identity::{DataItem, ItemId};
use crate::provider::{
    Comparator, HierarchicalDataProvider, HierarchicalQuery, NO_LIMIT, Predicate, Query,
    QuerySortOrder,
};

#[derive(Clone)]
struct ParentLink<T> {
    id: ItemId,
    item: T,
}

/// Expansion state and the parent links discovered while flattening.
struct TreeState<T> {
    expanded: HashSet<ItemId>,
    /// Known children per parent; `None` is the root level.
    children: HashMap<Option<ItemId>, Vec<ItemId>>,
    /// Parent of each known child; `None` for root items.
    parents: HashMap<ItemId, Option<ParentLink<T>>>,
}

impl<T> TreeState<T> {
    fn new() -> Self {
        Self {
            expanded: HashSet::new(),
            children: HashMap::new(),
            parents: HashMap::new(),
        }
    }

    /// Records the current children of `parent`. Children known from an
    /// earlier pass that are gone now are purged with their descendants.
    fn register_children(&mut self, parent: Option<ParentLink<T>>, children: Vec<ItemId>)
    where
        T: Clone,
    {
        let key = parent.as_ref().map(|link| link.id.clone());
        if let Some(previous) = self.children.remove(&key) {
            let current: HashSet<&ItemId> = children.iter().collect();
            for gone in previous.into_iter().filter(|id| !current.contains(&id)) {
                self.parents.remove(&gone);
                self.remove_children(Some(gone));
            }
        }
        for child in &children {
            self.parents.insert(child.clone(), parent.clone());
        }
        self.children.insert(key, children);
    }

    /// Forgets the children of `parent` and, transitively, their
    /// descendants. A purged item is no longer expanded.
    fn remove_children(&mut self, parent: Option<ItemId>) {
        let mut pending = vec![parent];
        while let Some(parent) = pending.pop() {
            if let Some(children) = self.children.remove(&parent) {
                for child in children {
                    self.parents.remove(&child);
                    pending.push(Some(child));
                }
            }
            if let Some(id) = parent {
                self.expanded.remove(&id);
            }
        }
    }
}

/// Presents a hierarchical provider as a flat sequence of visible rows.
///
/// The root level is always visible; any other item is visible when all of
/// its ancestors are expanded.
pub struct HierarchyMapper<T: DataItem, F> {
    provider: Arc<dyn HierarchicalDataProvider<T, F>>,
    template: RwLock<Query<T, F>>,
    tree: Mutex<TreeState<T>>,
    collapse_allowed: RwLock<Predicate<T>>,
}

impl<T: DataItem, F: FilterValue> HierarchyMapper<T, F> {
    /// Creates a mapper over `provider` with everything collapsed.
    pub fn new(provider: Arc<dyn HierarchicalDataProvider<T, F>>) -> Self {
        Self {
            provider,
            template: RwLock::new(Query::new()),
            tree: Mutex::new(TreeState::new()),
            collapse_allowed: RwLock::new(Predicate::always()),
        }
    }

    /// The provider this mapper reads from.
    pub fn provider(&self) -> &Arc<dyn HierarchicalDataProvider<T, F>> {
        &self.provider
    }

    /// Sets the filter and sorting used for every child fetch.
    pub fn configure(
        &self,
        filter: Option<F>,
        in_memory_sorting: Option<Comparator<T>>,
        back_end_sorting: Vec<QuerySortOrder>,
    ) {
        *self.template.write() =
            Query::full(0, NO_LIMIT, back_end_sorting, in_memory_sorting, filter);
    }

    /// Decides which expanded items the user may collapse.
    pub fn set_item_collapse_allowed_provider(&self, allowed: Predicate<T>) {
        *self.collapse_allowed.write() = allowed;
    }

    fn id(&self, item: &T) -> ItemId {
        self.provider.id(item)
    }

    fn child_query(&self, parent: Option<&T>, window: Range) -> HierarchicalQuery<T, F> {
        let template = self.template.read();
        HierarchicalQuery::full(
            window.start(),
            window.length(),
            template.sort_orders().to_vec(),
            template.in_memory_sorting().cloned(),
            template.filter().cloned(),
            parent.cloned(),
        )
    }

    // =========================================================================
    // Flattening
    // =========================================================================

    /// Appends the visible descendants of `parent` to `out`, depth first.
    fn flatten_into(&self, parent: Option<&T>, out: &mut Vec<T>) -> Result<()> {
        let expanded = match parent {
            Some(item) => self.is_expanded(item),
            None => true,
        };
        if !expanded {
            return Ok(());
        }

        let children: Vec<T> = self
            .provider
            .fetch_children(&self.child_query(parent, Range::with_length(0, NO_LIMIT)))?
            .collect();
        let parent_id = parent.map(|item| self.id(item));
        if children.is_empty() {
            self.tree.lock().remove_children(parent_id);
        } else {
            let child_ids = children.iter().map(|child| self.id(child)).collect();
            let link = parent.zip(parent_id).map(|(item, id)| ParentLink {
                id,
                item: item.clone(),
            });
            self.tree.lock().register_children(link, child_ids);
        }

        for child in children {
            out.push(child.clone());
            self.flatten_into(Some(&child), out)?;
        }
        Ok(())
    }

    fn flatten(&self, parent: Option<&T>) -> Result<Vec<T>> {
        let _span = PerfSpan::new(span_names::FLATTEN);
        let mut rows = Vec::new();
        self.flatten_into(parent, &mut rows)?;
        Ok(rows)
    }

    fn window(rows: Vec<T>, range: Range) -> Vec<T> {
        rows.into_iter()
            .skip(range.start())
            .take(range.length())
            .collect()
    }

    /// Number of visible rows.
    pub fn tree_size(&self) -> Result<usize> {
        Ok(self.flatten(None)?.len())
    }

    /// Number of root items matching the filter.
    pub fn root_size(&self) -> Result<usize> {
        self.provider
            .child_count(&self.child_query(None, Range::with_length(0, NO_LIMIT)))
    }

    /// The visible rows in `range`.
    pub fn fetch_items(&self, range: Range) -> Result<Vec<T>> {
        Ok(Self::window(self.flatten(None)?, range))
    }

    /// The visible descendants of `parent` in `range`, relative to the row
    /// after `parent`.
    pub fn fetch_child_items(&self, parent: &T, range: Range) -> Result<Vec<T>> {
        Ok(Self::window(self.flatten(Some(parent))?, range))
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    pub fn is_expanded(&self, item: &T) -> bool {
        let id = self.id(item);
        self.tree.lock().expanded.contains(&id)
    }

    /// Expands `item`.
    ///
    /// With the item's row index as `position`, returns the rows that became
    /// visible. Expanding an expanded or childless item does nothing.
    pub fn expand(&self, item: &T, position: Option<usize>) -> Result<Range> {
        if self.is_expanded(item) || !self.provider.has_children(item)? {
            return Ok(Range::empty());
        }
        let id = self.id(item);
        self.tree.lock().expanded.insert(id);
        tracing::debug!(target: targets::HIERARCHY, ?item, "expanded");

        match position {
            Some(position) => Ok(Range::with_length(
                position + 1,
                self.flatten(Some(item))?.len(),
            )),
            None => Ok(Range::empty()),
        }
    }

    /// Collapses `item` and forgets the expansion of its descendants.
    ///
    /// With the item's row index as `position`, returns the rows that were
    /// visible below it. Collapsing a collapsed item does nothing.
    pub fn collapse(&self, item: &T, position: Option<usize>) -> Result<Range> {
        if !self.is_expanded(item) {
            return Ok(Range::empty());
        }
        let removed = match position {
            Some(position) => Range::with_length(position + 1, self.flatten(Some(item))?.len()),
            None => Range::empty(),
        };
        let id = self.id(item);
        self.tree.lock().remove_children(Some(id));
        tracing::debug!(target: targets::HIERARCHY, ?item, "collapsed");
        Ok(removed)
    }

    /// Forgets the known children of `parent` (the root level for `None`)
    /// and of all their descendants.
    pub fn remove_children(&self, parent: Option<&T>) {
        let id = parent.map(|item| self.id(item));
        self.tree.lock().remove_children(id);
    }

    pub fn has_children(&self, item: &T) -> Result<bool> {
        self.provider.has_children(item)
    }

    // =========================================================================
    // Positions
    // =========================================================================

    /// Row index of `item`, `None` if it is not visible.
    pub fn index_of(&self, item: &T) -> Result<Option<usize>> {
        let id = self.id(item);
        Ok(self
            .flatten(None)?
            .iter()
            .position(|row| self.id(row) == id))
    }

    /// Row index of `item`'s parent; `None` for root items and unknown items.
    pub fn parent_index(&self, item: &T) -> Result<Option<usize>> {
        match self.parent_of(item) {
            Some(parent) => self.index_of(&parent),
            None => Ok(None),
        }
    }

    /// The parent `item` was last reached from.
    pub fn parent_of(&self, item: &T) -> Option<T> {
        let id = self.id(item);
        let tree = self.tree.lock();
        tree.parents
            .get(&id)
            .and_then(|link| link.as_ref().map(|link| link.item.clone()))
    }

    /// Number of ancestors of `item`; 0 for root items.
    pub fn depth(&self, item: &T) -> usize {
        let tree = self.tree.lock();
        let mut depth = 0;
        let mut current = self.id(item);
        while let Some(Some(link)) = tree.parents.get(&current) {
            depth += 1;
            current = link.id.clone();
        }
        depth
    }

    /// Forgets all parent links. Expansion state is kept.
    pub fn destroy_all_data(&self) {
        let mut tree = self.tree.lock();
        tree.children.clear();
        tree.parents.clear();
    }

    /// Writes the hierarchy description of `item` into `record`.
    pub fn generate_data(&self, item: &T, record: &mut RowRecord) -> Result<()> {
        let mut hierarchy = Map::new();
        hierarchy.insert(fields::ROW_DEPTH.into(), Value::from(self.depth(item)));
        if self.provider.has_children(item)? {
            hierarchy.insert(fields::ROW_COLLAPSED.into(), Value::from(!self.is_expanded(item)));
            hierarchy.insert(fields::ROW_LEAF.into(), Value::from(false));
            let allowed = self.collapse_allowed.read().test(item);
            hierarchy.insert(fields::ROW_COLLAPSE_ALLOWED.into(), Value::from(allowed));
        } else {
            hierarchy.insert(fields::ROW_LEAF.into(), Value::from(true));
        }
        record.insert(
            fields::ROW_HIERARCHY_DESCRIPTION.into(),
            Value::Object(hierarchy),
        );
        Ok(())
    }
}

impl<T: DataItem, F: FilterValue> DataGenerator<T> for HierarchyMapper<T, F> {
    fn generate_data(&self, item: &T, record: &mut RowRecord) -> Result<()> {
        HierarchyMapper::generate_data(self, item, record)
    }

    fn destroy_all_data(&self) {
        HierarchyMapper::destroy_all_data(self);
    }
}

impl<T: DataItem, F: FilterValue> RowSource<T, F> for HierarchyMapper<T, F> {
    fn configure(&self, template: &Query<T, F>) {
        HierarchyMapper::configure(
            self,
            template.filter().cloned(),
            template.in_memory_sorting().cloned(),
            template.sort_orders().to_vec(),
        );
    }

    fn size(&self, _template: &Query<T, F>) -> Result<usize> {
        self.tree_size()
    }

    fn fetch(&self, query: &Query<T, F>) -> Result<Vec<T>> {
        self.fetch_items(Range::with_length(query.offset(), query.limit()))
    }
}

static_assertions::assert_impl_all!(HierarchyMapper<String, String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{TreeData, TreeDataProvider};

    type Mapper = HierarchyMapper<&'static str, Predicate<&'static str>>;

    /// root -> {p1, p2}, p1 -> {c1, c2}, c1 -> {g1}
    fn mapper() -> (Mapper, Arc<TreeDataProvider<&'static str>>) {
        let mut tree = TreeData::new();
        tree.add_root_items(["p1", "p2"]).unwrap();
        tree.add_items(Some(&"p1"), ["c1", "c2"]).unwrap();
        tree.add_item(Some(&"c1"), "g1").unwrap();
        let provider = Arc::new(TreeDataProvider::new(tree));
        let mapper: Mapper = HierarchyMapper::new(provider.clone());
        (mapper, provider)
    }

    #[test]
    fn test_expand_collapse_ranges() {
        let (mapper, _) = mapper();
        assert_eq!(mapper.tree_size().unwrap(), 2);
        assert_eq!(mapper.root_size().unwrap(), 2);

        let inserted = mapper.expand(&"p1", Some(0)).unwrap();
        assert_eq!(inserted, Range::between(1, 3));
        assert_eq!(mapper.tree_size().unwrap(), 4);
        assert_eq!(
            mapper.fetch_items(Range::with_length(0, 10)).unwrap(),
            vec!["p1", "c1", "c2", "p2"]
        );

        let removed = mapper.collapse(&"p1", Some(0)).unwrap();
        assert_eq!(removed, Range::between(1, 3));
        assert_eq!(mapper.tree_size().unwrap(), 2);
    }

    #[test]
    fn test_noop_expand_and_collapse() {
        let (mapper, _) = mapper();
        assert!(mapper.expand(&"p2", Some(1)).unwrap().is_empty());
        assert!(!mapper.is_expanded(&"p2"));
        assert!(mapper.collapse(&"p1", Some(0)).unwrap().is_empty());
        mapper.expand(&"p1", Some(0)).unwrap();
        assert!(mapper.expand(&"p1", Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_collapse_purges_descendants() {
        let (mapper, _) = mapper();
        mapper.expand(&"p1", None).unwrap();
        mapper.expand(&"c1", Some(1)).unwrap();
        assert_eq!(mapper.tree_size().unwrap(), 5);
        assert_eq!(mapper.depth(&"g1"), 2);

        let removed = mapper.collapse(&"p1", Some(0)).unwrap();
        assert_eq!(removed.length(), 3);
        assert!(!mapper.is_expanded(&"c1"));
        assert_eq!(mapper.parent_of(&"c1"), None);

        mapper.expand(&"p1", Some(0)).unwrap();
        assert_eq!(mapper.tree_size().unwrap(), 4);
    }

    #[test]
    fn test_positions_and_depth() {
        let (mapper, _) = mapper();
        mapper.expand(&"p1", None).unwrap();
        assert_eq!(mapper.index_of(&"p2").unwrap(), Some(3));
        assert_eq!(mapper.index_of(&"g1").unwrap(), None);
        assert_eq!(mapper.parent_index(&"c2").unwrap(), Some(0));
        assert_eq!(mapper.parent_index(&"p1").unwrap(), None);
        assert_eq!(mapper.parent_of(&"c2"), Some("p1"));
        assert_eq!(mapper.depth(&"p1"), 0);
        assert_eq!(mapper.depth(&"c2"), 1);
        assert_eq!(
            mapper
                .fetch_child_items(&"p1", Range::with_length(1, 5))
                .unwrap(),
            vec!["c2"]
        );
    }

    #[test]
    fn test_removed_children_are_pruned() {
        let (mapper, provider) = mapper();
        mapper.expand(&"p1", Some(0)).unwrap();
        assert_eq!(mapper.tree_size().unwrap(), 4);

        {
            let mut tree = provider.tree_data_mut();
            tree.remove_item(&"c1").unwrap();
            tree.remove_item(&"c2").unwrap();
        }
        assert_eq!(mapper.tree_size().unwrap(), 2);
        assert!(!mapper.is_expanded(&"p1"));
        assert_eq!(mapper.parent_of(&"c1"), None);
    }

    #[test]
    fn test_removed_sibling_forgets_its_expansion() {
        let (mapper, provider) = mapper();
        mapper.expand(&"p1", Some(0)).unwrap();
        mapper.expand(&"c1", Some(1)).unwrap();
        assert_eq!(mapper.tree_size().unwrap(), 5);

        provider.tree_data_mut().remove_item(&"c1").unwrap();
        assert_eq!(mapper.tree_size().unwrap(), 3);
        assert!(mapper.is_expanded(&"p1"));
        assert!(!mapper.is_expanded(&"c1"));
        assert_eq!(mapper.parent_of(&"c1"), None);
        assert_eq!(mapper.parent_of(&"g1"), None);
        assert_eq!(mapper.parent_of(&"c2"), Some("p1"));
    }

    #[test]
    fn test_filter_applies_per_level() {
        let (mapper, _) = mapper();
        mapper.expand(&"p1", None).unwrap();
        mapper.configure(
            Some(Predicate::new(|item: &&str| *item != "c1")),
            Some(Comparator::natural().reversed()),
            Vec::new(),
        );
        assert_eq!(
            mapper.fetch_items(Range::with_length(0, 10)).unwrap(),
            vec!["p2", "p1", "c2"]
        );
    }

    #[test]
    fn test_hierarchy_description() {
        let (mapper, _) = mapper();
        mapper.set_item_collapse_allowed_provider(Predicate::new(|item: &&str| *item != "p1"));
        mapper.expand(&"p1", None).unwrap();
        mapper.tree_size().unwrap();

        let mut record = RowRecord::new();
        mapper.generate_data(&"p1", &mut record).unwrap();
        assert_eq!(
            record[fields::ROW_HIERARCHY_DESCRIPTION],
            serde_json::json!({"d": 0, "c": false, "l": false, "ca": false})
        );

        let mut record = RowRecord::new();
        mapper.generate_data(&"c2", &mut record).unwrap();
        assert_eq!(
            record[fields::ROW_HIERARCHY_DESCRIPTION],
            serde_json::json!({"d": 1, "l": true})
        );
    }
}
