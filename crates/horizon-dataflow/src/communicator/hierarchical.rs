//! A data communicator over a tree.
//!
//! Rows are read from a [`HierarchyMapper`] instead of the provider, so the
//! client sees the flattened tree. Expanding and collapsing an item sends the
//! exact rows to insert or remove rather than resetting the whole client,
//! unless a reset is already on its way.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;

use super::channel::ClientChannel;
use super::config::CommunicatorBuilder;
use super::data_communicator::{DataCommunicator, FilterSlot, FilterValue};
use super::generator::DataGenerator;
use super::hierarchy_mapper::HierarchyMapper;
use super::range::Range;
use crate::error::{DataError, Result};
use crate::identity::DataItem;
use crate::provider::{AnyDataProvider, HierarchicalDataProvider, Predicate};

/// Synchronizes a flattened tree with one client.
///
/// Everything not specific to trees is available through [`Deref`] to the
/// underlying [`DataCommunicator`].
pub struct HierarchicalDataCommunicator<T: DataItem, F> {
    communicator: Arc<DataCommunicator<T, F>>,
    mapper: RwLock<Option<Arc<HierarchyMapper<T, F>>>>,
    collapse_allowed: RwLock<Predicate<T>>,
}

impl<T: DataItem, F: FilterValue> HierarchicalDataCommunicator<T, F> {
    /// Creates a communicator with default configuration pushing to `channel`.
    pub fn new(channel: Arc<dyn ClientChannel>) -> Self {
        CommunicatorBuilder::new().build_hierarchical(channel)
    }

    pub(crate) fn from_communicator(communicator: Arc<DataCommunicator<T, F>>) -> Self {
        Self {
            communicator,
            mapper: RwLock::new(None),
            collapse_allowed: RwLock::new(Predicate::always()),
        }
    }

    /// The underlying flat communicator.
    pub fn communicator(&self) -> &Arc<DataCommunicator<T, F>> {
        &self.communicator
    }

    /// The mapper of the installed provider.
    pub fn mapper(&self) -> Option<Arc<HierarchyMapper<T, F>>> {
        self.mapper.read().clone()
    }

    fn require_mapper(&self) -> Result<Arc<HierarchyMapper<T, F>>> {
        self.mapper()
            .ok_or_else(|| DataError::illegal_state("no hierarchical data provider installed"))
    }

    /// Installs a hierarchical provider.
    ///
    /// Fails with [`DataError::InvalidArgument`] for a flat provider.
    pub fn set_data_provider(
        &self,
        provider: AnyDataProvider<T, F>,
        initial_filter: Option<F>,
    ) -> Result<FilterSlot<T, F>> {
        let hierarchical = provider.as_hierarchical().cloned().ok_or_else(|| {
            DataError::invalid_argument(
                "hierarchical data communicator requires a hierarchical data provider",
            )
        })?;
        Ok(self.install(provider, hierarchical, initial_filter))
    }

    /// Installs `provider`.
    pub fn set_hierarchical_data_provider(
        &self,
        provider: Arc<dyn HierarchicalDataProvider<T, F>>,
        initial_filter: Option<F>,
    ) -> FilterSlot<T, F> {
        self.install(
            AnyDataProvider::Hierarchical(provider.clone()),
            provider,
            initial_filter,
        )
    }

    fn install(
        &self,
        provider: AnyDataProvider<T, F>,
        hierarchical: Arc<dyn HierarchicalDataProvider<T, F>>,
        initial_filter: Option<F>,
    ) -> FilterSlot<T, F> {
        let mapper = Arc::new(HierarchyMapper::new(hierarchical));
        mapper.set_item_collapse_allowed_provider(self.collapse_allowed.read().clone());

        let slot = self
            .communicator
            .install(provider, initial_filter, mapper.clone());

        let previous = self.mapper.write().replace(mapper.clone());
        if let Some(previous) = previous {
            let previous: Arc<dyn DataGenerator<T>> = previous;
            self.communicator.remove_data_generator(&previous);
        }
        self.communicator.add_data_generator(mapper);
        slot
    }

    /// Decides which expanded items the user may collapse, and resends the
    /// rows the client has.
    pub fn set_item_collapse_allowed_provider(&self, allowed: Predicate<T>) {
        *self.collapse_allowed.write() = allowed.clone();
        if let Some(mapper) = self.mapper() {
            mapper.set_item_collapse_allowed_provider(allowed);
        }
        for item in self.communicator.active_items() {
            self.communicator.refresh(&item);
        }
    }

    // =========================================================================
    // Expand and collapse
    // =========================================================================

    /// Expands `item` at its current row.
    pub fn expand(&self, item: &T) -> Result<()> {
        let index = self.index_of(item)?;
        self.do_expand(item, index)
    }

    /// Expands `item`, which the client shows at row `index`.
    pub fn expand_at(&self, item: &T, index: usize) -> Result<()> {
        self.do_expand(item, Some(index))
    }

    /// Expands each of `items`.
    pub fn expand_items<'a>(&self, items: impl IntoIterator<Item = &'a T>) -> Result<()> {
        for item in items {
            self.expand(item)?;
        }
        Ok(())
    }

    /// Collapses `item` at its current row.
    pub fn collapse(&self, item: &T) -> Result<()> {
        let index = self.index_of(item)?;
        self.do_collapse(item, index)
    }

    /// Collapses `item`, which the client shows at row `index`.
    pub fn collapse_at(&self, item: &T, index: usize) -> Result<()> {
        self.do_collapse(item, Some(index))
    }

    /// Collapses each of `items`.
    pub fn collapse_items<'a>(&self, items: impl IntoIterator<Item = &'a T>) -> Result<()> {
        for item in items {
            self.collapse(item)?;
        }
        Ok(())
    }

    fn do_expand(&self, item: &T, index: Option<usize>) -> Result<()> {
        let mapper = self.require_mapper()?;
        let inserted = mapper.expand(item, index)?;
        if !inserted.is_empty() && !self.communicator.is_reset_pending() {
            let children =
                mapper.fetch_child_items(item, Range::with_length(0, inserted.length()))?;
            let records = self.communicator.build_records(&children)?;
            self.communicator
                .channel()
                .insert_rows(inserted.start(), inserted.length());
            self.communicator
                .send_rows(inserted.start(), &children, records);
        }
        self.communicator.refresh(item);
        Ok(())
    }

    fn do_collapse(&self, item: &T, index: Option<usize>) -> Result<()> {
        let mapper = self.require_mapper()?;
        let removed = mapper.collapse(item, index)?;
        if !removed.is_empty() && !self.communicator.is_reset_pending() {
            self.communicator
                .channel()
                .remove_rows(removed.start(), removed.length());
        }
        self.communicator.refresh(item);
        Ok(())
    }

    // =========================================================================
    // Tree queries
    // =========================================================================

    pub fn is_expanded(&self, item: &T) -> bool {
        self.mapper()
            .is_some_and(|mapper| mapper.is_expanded(item))
    }

    pub fn has_children(&self, item: &T) -> Result<bool> {
        self.require_mapper()?.has_children(item)
    }

    /// Row index of `item`, `None` if it is not visible.
    pub fn index_of(&self, item: &T) -> Result<Option<usize>> {
        self.require_mapper()?.index_of(item)
    }

    /// Row index of the parent of `item`.
    pub fn parent_index(&self, item: &T) -> Result<Option<usize>> {
        self.require_mapper()?.parent_index(item)
    }

    /// The parent of `item`, if known.
    pub fn parent_item(&self, item: &T) -> Option<T> {
        self.mapper().and_then(|mapper| mapper.parent_of(item))
    }

    pub fn depth(&self, item: &T) -> usize {
        self.mapper().map_or(0, |mapper| mapper.depth(item))
    }

    /// Number of visible rows.
    pub fn tree_size(&self) -> Result<usize> {
        self.require_mapper()?.tree_size()
    }
}

impl<T: DataItem, F> Deref for HierarchicalDataCommunicator<T, F> {
    type Target = DataCommunicator<T, F>;

    fn deref(&self) -> &Self::Target {
        &self.communicator
    }
}

static_assertions::assert_impl_all!(HierarchicalDataCommunicator<String, String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::{ClientCommand, RecordingChannel, fields};
    use crate::provider::{ListDataProvider, TreeData, TreeDataProvider};

    type Tree = HierarchicalDataCommunicator<&'static str, Predicate<&'static str>>;

    fn setup() -> (Tree, Arc<RecordingChannel>) {
        let mut data = TreeData::new();
        data.add_root_items(["p1", "p2"]).unwrap();
        data.add_items(Some(&"p1"), ["c1", "c2"]).unwrap();
        let channel = Arc::new(RecordingChannel::new());
        let tree: Tree = HierarchicalDataCommunicator::new(channel.clone());
        tree.set_data_provider(AnyDataProvider::hierarchical(TreeDataProvider::new(data)), None)
            .unwrap();
        tree.attach();
        tree.before_client_response(true).unwrap();
        channel.take();
        (tree, channel)
    }

    #[test]
    fn test_flat_provider_rejected() {
        let channel = Arc::new(RecordingChannel::new());
        let tree: Tree = HierarchicalDataCommunicator::new(channel);
        let err = tree
            .set_data_provider(AnyDataProvider::flat(ListDataProvider::new(vec!["a"])), None)
            .err()
            .unwrap();
        assert!(err.is_invalid_argument());
        assert!(tree.tree_size().unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_expand_inserts_and_pushes_children() {
        let (tree, channel) = setup();
        tree.expand(&"p1").unwrap();

        let commands = channel.take();
        assert_eq!(
            commands[0],
            ClientCommand::InsertRows {
                first_index: 1,
                count: 2
            }
        );
        let ClientCommand::SetData {
            first_index,
            records,
        } = &commands[1]
        else {
            panic!("expected set data, got {commands:?}");
        };
        assert_eq!(*first_index, 1);
        assert_eq!(records[0][fields::ROW_HIERARCHY_DESCRIPTION]["d"], 1);
        assert!(tree.is_expanded(&"p1"));
        assert_eq!(tree.tree_size().unwrap(), 4);

        // The expanded row itself is resent with its collapsed flag cleared.
        tree.before_client_response(false).unwrap();
        let commands = channel.take();
        let [ClientCommand::UpdateData { records }] = commands.as_slice() else {
            panic!("expected an update, got {commands:?}");
        };
        assert_eq!(records[0][fields::ROW_HIERARCHY_DESCRIPTION]["c"], false);
    }

    #[test]
    fn test_collapse_removes_rows() {
        let (tree, channel) = setup();
        tree.expand_at(&"p1", 0).unwrap();
        channel.take();

        tree.collapse(&"p1").unwrap();
        assert_eq!(
            channel.take(),
            vec![ClientCommand::RemoveRows {
                first_index: 1,
                count: 2
            }]
        );
        assert_eq!(tree.tree_size().unwrap(), 2);

        // Collapsing again is a quiet no-op.
        tree.collapse(&"p1").unwrap();
        assert!(channel.take().is_empty());
    }

    #[test]
    fn test_pending_reset_suppresses_row_commands() {
        let (tree, channel) = setup();
        tree.set_in_memory_sorting(Some(crate::provider::Comparator::natural()))
            .unwrap();
        tree.expand(&"p1").unwrap();
        assert!(channel.take().is_empty());
        assert!(tree.is_expanded(&"p1"));
    }

    #[test]
    fn test_parent_queries() {
        let (tree, _) = setup();
        tree.expand_items([&"p1"]).unwrap();
        assert_eq!(tree.parent_item(&"c2"), Some("p1"));
        assert_eq!(tree.parent_index(&"c2").unwrap(), Some(0));
        assert_eq!(tree.index_of(&"p2").unwrap(), Some(3));
        assert_eq!(tree.depth(&"c1"), 1);
        assert!(tree.has_children(&"p1").unwrap());
        tree.collapse_items([&"p1"]).unwrap();
        assert_eq!(tree.tree_size().unwrap(), 2);
    }

    #[test]
    fn test_collapse_allowed_resends_active_rows() {
        let (tree, channel) = setup();
        tree.set_item_collapse_allowed_provider(Predicate::new(|_: &&str| false));
        tree.before_client_response(false).unwrap();
        let commands = channel.take();
        let [ClientCommand::UpdateData { records }] = commands.as_slice() else {
            panic!("expected an update, got {commands:?}");
        };
        assert_eq!(records.len(), 2);
    }
}
