//! In-memory hierarchical providers.
//!
//! Both providers run the in-memory filter and sort pipeline over the direct
//! children of the requested parent. Asking for the children of an item the
//! backing structure does not know fails instead of yielding nothing.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::in_memory::{InMemoryDataProvider, InMemoryState};
use super::predicate::Predicate;
use super::query::{HierarchicalQuery, Query};
use super::traits::{DataProvider, HierarchicalDataProvider, ItemStream, ProviderSignals};
use super::tree_data::TreeData;
use crate::error::{DataError, Result};
use crate::identity::DataItem;

/// A hierarchical provider over a shared [`TreeData`].
pub struct TreeDataProvider<T: DataItem> {
    tree: Arc<RwLock<TreeData<T>>>,
    state: InMemoryState<T>,
    signals: ProviderSignals<T>,
}

impl<T: DataItem> TreeDataProvider<T> {
    /// Creates a provider owning `tree`.
    pub fn new(tree: TreeData<T>) -> Self {
        Self::from_shared(Arc::new(RwLock::new(tree)))
    }

    /// Creates a provider over a tree shared with the caller.
    pub fn from_shared(tree: Arc<RwLock<TreeData<T>>>) -> Self {
        Self {
            tree,
            state: InMemoryState::new(),
            signals: ProviderSignals::new(),
        }
    }

    /// Read access to the tree.
    pub fn tree_data(&self) -> RwLockReadGuard<'_, TreeData<T>> {
        self.tree.read()
    }

    /// Write access to the tree.
    ///
    /// Listeners are not notified; call [`DataProvider::refresh_all`] once
    /// the edit is done.
    pub fn tree_data_mut(&self) -> RwLockWriteGuard<'_, TreeData<T>> {
        self.tree.write()
    }
}

impl<T: DataItem> DataProvider<T, Predicate<T>> for TreeDataProvider<T> {
    fn is_in_memory(&self) -> bool {
        true
    }

    fn size(&self, query: &Query<T, Predicate<T>>) -> Result<usize> {
        self.child_count(&HierarchicalQuery::from_query(query)?)
    }

    fn fetch(&self, query: &Query<T, Predicate<T>>) -> Result<ItemStream<T>> {
        self.fetch_children(&HierarchicalQuery::from_query(query)?)
    }

    fn signals(&self) -> &ProviderSignals<T> {
        &self.signals
    }
}

impl<T: DataItem> HierarchicalDataProvider<T, Predicate<T>> for TreeDataProvider<T> {
    fn child_count(&self, query: &HierarchicalQuery<T, Predicate<T>>) -> Result<usize> {
        Ok(self.fetch_children(query)?.count())
    }

    fn fetch_children(&self, query: &HierarchicalQuery<T, Predicate<T>>) -> Result<ItemStream<T>> {
        let tree = self.tree.read();
        let children = tree.children(query.parent())?;
        let window = self.state.apply(children, query);
        Ok(Box::new(window.into_iter()))
    }

    fn has_children(&self, item: &T) -> Result<bool> {
        let tree = self.tree.read();
        // Items removed from the tree since the last fetch have no children.
        if !tree.contains(item) {
            return Ok(false);
        }
        Ok(!tree.children(Some(item))?.is_empty())
    }
}

impl<T: DataItem> InMemoryDataProvider<T> for TreeDataProvider<T> {
    fn in_memory_state(&self) -> &InMemoryState<T> {
        &self.state
    }
}

/// Looks up the direct children of a parent; `None` for unknown parents.
pub type ChildrenLookup<T> = Arc<dyn Fn(Option<&T>) -> Option<Vec<T>> + Send + Sync>;

/// A hierarchical in-memory provider backed by a children-lookup function.
///
/// The lookup answers the root level for `None` and returns `None` for a
/// parent it does not know.
pub struct SimpleHierarchicalDataProvider<T: DataItem> {
    children: ChildrenLookup<T>,
    state: InMemoryState<T>,
    signals: ProviderSignals<T>,
}

impl<T: DataItem> SimpleHierarchicalDataProvider<T> {
    /// Creates a provider over `children`.
    pub fn new<C>(children: C) -> Self
    where
        C: Fn(Option<&T>) -> Option<Vec<T>> + Send + Sync + 'static,
    {
        Self {
            children: Arc::new(children),
            state: InMemoryState::new(),
            signals: ProviderSignals::new(),
        }
    }

    fn lookup(&self, parent: Option<&T>) -> Result<Vec<T>> {
        (self.children)(parent).ok_or_else(|| {
            DataError::invalid_argument(format!("unknown parent item {parent:?}"))
        })
    }
}

impl<T: DataItem> DataProvider<T, Predicate<T>> for SimpleHierarchicalDataProvider<T> {
    fn is_in_memory(&self) -> bool {
        true
    }

    fn size(&self, query: &Query<T, Predicate<T>>) -> Result<usize> {
        self.child_count(&HierarchicalQuery::from_query(query)?)
    }

    fn fetch(&self, query: &Query<T, Predicate<T>>) -> Result<ItemStream<T>> {
        self.fetch_children(&HierarchicalQuery::from_query(query)?)
    }

    fn signals(&self) -> &ProviderSignals<T> {
        &self.signals
    }
}

impl<T: DataItem> HierarchicalDataProvider<T, Predicate<T>> for SimpleHierarchicalDataProvider<T> {
    fn child_count(&self, query: &HierarchicalQuery<T, Predicate<T>>) -> Result<usize> {
        Ok(self.fetch_children(query)?.count())
    }

    fn fetch_children(&self, query: &HierarchicalQuery<T, Predicate<T>>) -> Result<ItemStream<T>> {
        let children = self.lookup(query.parent())?;
        let window = self.state.apply(&children, query);
        Ok(Box::new(window.into_iter()))
    }

    fn has_children(&self, item: &T) -> Result<bool> {
        Ok(!self.lookup(Some(item))?.is_empty())
    }
}

impl<T: DataItem> InMemoryDataProvider<T> for SimpleHierarchicalDataProvider<T> {
    fn in_memory_state(&self) -> &InMemoryState<T> {
        &self.state
    }
}

static_assertions::assert_impl_all!(TreeDataProvider<String>: Send, Sync);
static_assertions::assert_impl_all!(SimpleHierarchicalDataProvider<String>: Send, Sync);
