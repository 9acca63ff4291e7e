//! Hierarchical item storage.
//!
//! `TreeData<T>` keeps explicit parent and child links for every item. Items
//! are their own keys, so each item may appear only once in the tree.

use std::collections::HashMap;

use crate::error::{DataError, Result};
use crate::identity::DataItem;

/// Links of one item.
#[derive(Debug, Clone)]
struct TreeNode<T> {
    parent: Option<T>,
    children: Vec<T>,
}

impl<T> TreeNode<T> {
    fn new(parent: Option<T>) -> Self {
        Self {
            parent,
            children: Vec::new(),
        }
    }
}

/// A tree of items with ordered children.
///
/// # Example
///
/// ```
/// use horizon_dataflow::provider::TreeData;
///
/// let mut tree = TreeData::new();
/// tree.add_root_items(["fruit", "vegetable"]).unwrap();
/// tree.add_items(Some(&"fruit"), ["apple", "pear"]).unwrap();
///
/// assert_eq!(tree.children(Some(&"fruit")).unwrap(), &["apple", "pear"]);
/// assert_eq!(tree.parent(&"pear").unwrap(), Some(&"fruit"));
/// assert!(tree.children(Some(&"meat")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct TreeData<T: DataItem> {
    nodes: HashMap<T, TreeNode<T>>,
    roots: Vec<T>,
}

impl<T: DataItem> Default for TreeData<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DataItem> TreeData<T> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Number of items in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no items.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `item` is in the tree.
    pub fn contains(&self, item: &T) -> bool {
        self.nodes.contains_key(item)
    }

    /// Adds `item` as the last child of `parent`, or as a root for `None`.
    ///
    /// Fails if the parent is unknown or the item is already in the tree.
    pub fn add_item(&mut self, parent: Option<&T>, item: T) -> Result<()> {
        if let Some(parent) = parent
            && !self.contains(parent)
        {
            return Err(not_in_tree(parent));
        }
        if self.contains(&item) {
            return Err(DataError::invalid_argument(format!(
                "item {item:?} is already in the tree"
            )));
        }

        match parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.push(item.clone());
                }
            }
            None => self.roots.push(item.clone()),
        }
        self.nodes.insert(item, TreeNode::new(parent.cloned()));
        Ok(())
    }

    /// Adds several items under the same parent, in order.
    pub fn add_items<I>(&mut self, parent: Option<&T>, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.add_item(parent, item)?;
        }
        Ok(())
    }

    /// Adds items at the root level.
    pub fn add_root_items<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.add_items(None, items)
    }

    /// Adds `roots` and, recursively, the children reported by `children_of`.
    pub fn add_items_recursively<I, C>(&mut self, roots: I, children_of: C) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        C: Fn(&T) -> Vec<T>,
    {
        let mut pending: Vec<(Option<T>, T)> = roots.into_iter().map(|item| (None, item)).collect();
        pending.reverse();

        while let Some((parent, item)) = pending.pop() {
            self.add_item(parent.as_ref(), item.clone())?;
            let children = children_of(&item);
            pending.extend(children.into_iter().rev().map(|child| (Some(item.clone()), child)));
        }
        Ok(())
    }

    /// Removes `item` and all of its descendants.
    pub fn remove_item(&mut self, item: &T) -> Result<()> {
        let node = self.nodes.get(item).ok_or_else(|| not_in_tree(item))?;
        match node.parent.clone() {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(&parent) {
                    parent.children.retain(|child| child != item);
                }
            }
            None => self.roots.retain(|root| root != item),
        }

        let mut doomed = vec![item.clone()];
        while let Some(next) = doomed.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                doomed.extend(node.children);
            }
        }
        Ok(())
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    /// The root items in order.
    pub fn root_items(&self) -> &[T] {
        &self.roots
    }

    /// The direct children of `parent`, or the roots for `None`.
    ///
    /// Fails if `parent` is not in the tree.
    pub fn children(&self, parent: Option<&T>) -> Result<&[T]> {
        match parent {
            None => Ok(&self.roots),
            Some(parent) => self
                .nodes
                .get(parent)
                .map(|node| node.children.as_slice())
                .ok_or_else(|| not_in_tree(parent)),
        }
    }

    /// The parent of `item`, `None` for roots.
    pub fn parent(&self, item: &T) -> Result<Option<&T>> {
        self.nodes
            .get(item)
            .map(|node| node.parent.as_ref())
            .ok_or_else(|| not_in_tree(item))
    }

    /// Moves `item` (with its subtree) to the end of `parent`'s children.
    ///
    /// Fails if either item is unknown or `parent` lies inside `item`'s
    /// subtree.
    pub fn set_parent(&mut self, item: &T, parent: Option<&T>) -> Result<()> {
        if !self.contains(item) {
            return Err(not_in_tree(item));
        }
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(not_in_tree(parent));
            }
            let mut ancestor = Some(parent);
            while let Some(current) = ancestor {
                if current == item {
                    return Err(DataError::invalid_argument(format!(
                        "cannot move {item:?} below its own descendant {parent:?}"
                    )));
                }
                ancestor = self.nodes.get(current).and_then(|node| node.parent.as_ref());
            }
        }

        self.detach(item);
        match parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.children.push(item.clone());
                }
            }
            None => self.roots.push(item.clone()),
        }
        if let Some(node) = self.nodes.get_mut(item) {
            node.parent = parent.cloned();
        }
        Ok(())
    }

    /// Moves `item` right after `sibling` among their shared parent's
    /// children, or first for `None`.
    pub fn move_after_sibling(&mut self, item: &T, sibling: Option<&T>) -> Result<()> {
        let parent = self.parent(item)?.cloned();
        if let Some(sibling) = sibling
            && self.parent(sibling)? != parent.as_ref()
        {
            return Err(DataError::invalid_argument(format!(
                "{item:?} and {sibling:?} do not share a parent"
            )));
        }

        let siblings = match &parent {
            Some(parent) => match self.nodes.get_mut(parent) {
                Some(node) => &mut node.children,
                None => return Err(not_in_tree(parent)),
            },
            None => &mut self.roots,
        };
        siblings.retain(|child| child != item);
        let position = match sibling {
            Some(sibling) => siblings
                .iter()
                .position(|child| child == sibling)
                .map_or(siblings.len(), |index| index + 1),
            None => 0,
        };
        siblings.insert(position, item.clone());
        Ok(())
    }

    fn detach(&mut self, item: &T) {
        let parent = self.nodes.get(item).and_then(|node| node.parent.clone());
        match parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    node.children.retain(|child| child != item);
                }
            }
            None => self.roots.retain(|root| root != item),
        }
    }
}

fn not_in_tree<T: std::fmt::Debug>(item: &T) -> DataError {
    DataError::invalid_argument(format!("item {item:?} is not in the tree"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeData<&'static str> {
        let mut tree = TreeData::new();
        tree.add_root_items(["a", "b"]).unwrap();
        tree.add_items(Some(&"a"), ["a1", "a2", "a3"]).unwrap();
        tree.add_item(Some(&"a1"), "a1x").unwrap();
        tree
    }

    #[test]
    fn test_structure() {
        let tree = sample();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.root_items(), &["a", "b"]);
        assert_eq!(tree.children(Some(&"a")).unwrap(), &["a1", "a2", "a3"]);
        assert_eq!(tree.parent(&"a1x").unwrap(), Some(&"a1"));
        assert_eq!(tree.parent(&"b").unwrap(), None);
    }

    #[test]
    fn test_rejects_unknown_and_duplicate() {
        let mut tree = sample();
        assert!(tree.add_item(Some(&"zzz"), "c").unwrap_err().is_invalid_argument());
        assert!(tree.add_item(None, "a2").unwrap_err().is_invalid_argument());
        assert!(tree.children(Some(&"zzz")).is_err());
        assert!(tree.remove_item(&"zzz").is_err());
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = sample();
        tree.remove_item(&"a1").unwrap();
        assert!(!tree.contains(&"a1x"));
        assert_eq!(tree.children(Some(&"a")).unwrap(), &["a2", "a3"]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_add_items_recursively_keeps_order() {
        let mut tree = TreeData::new();
        tree.add_items_recursively([1_u32, 2], |n| {
            if *n < 10 { vec![n * 10, n * 10 + 1] } else { Vec::new() }
        })
        .unwrap();
        assert_eq!(tree.root_items(), &[1, 2]);
        assert_eq!(tree.children(Some(&1)).unwrap(), &[10, 11]);
        assert_eq!(tree.children(Some(&2)).unwrap(), &[20, 21]);
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_move_after_sibling() {
        let mut tree = sample();
        tree.move_after_sibling(&"a1", Some(&"a3")).unwrap();
        assert_eq!(tree.children(Some(&"a")).unwrap(), &["a2", "a3", "a1"]);
        tree.move_after_sibling(&"a3", None).unwrap();
        assert_eq!(tree.children(Some(&"a")).unwrap(), &["a3", "a2", "a1"]);
        assert!(tree.move_after_sibling(&"a3", Some(&"b")).is_err());
    }

    #[test]
    fn test_set_parent() {
        let mut tree = sample();
        tree.set_parent(&"a1", Some(&"b")).unwrap();
        assert_eq!(tree.children(Some(&"b")).unwrap(), &["a1"]);
        assert_eq!(tree.parent(&"a1x").unwrap(), Some(&"a1"));
        assert!(tree.set_parent(&"b", Some(&"a1x")).is_err());
        tree.set_parent(&"a2", None).unwrap();
        assert_eq!(tree.root_items(), &["a", "b", "a2"]);
    }
}
