//! Item identity.
//!
//! Providers decide which items are "the same row". By default an item is its
//! own identity; back ends usually map an item to its primary key instead. The
//! identity is type-erased into an [`ItemId`] so that communicators and key
//! mappers can track items without knowing the key type.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Bound for items flowing through providers and communicators.
pub trait DataItem: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> DataItem for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Maps an item to its identity.
pub type IdentifierGetter<T> = Arc<dyn Fn(&T) -> ItemId + Send + Sync>;

trait IdValue: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn IdValue) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<K> IdValue for K
where
    K: Any + Eq + Hash + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn IdValue) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .is_some_and(|other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<K>().hash(&mut state);
        self.hash(&mut state);
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A type-erased, hashable item identity.
///
/// Two ids are equal only if they wrap values of the same type that compare
/// equal.
///
/// # Example
///
/// ```
/// use horizon_dataflow::ItemId;
///
/// assert_eq!(ItemId::new(7_u32), ItemId::new(7_u32));
/// assert_ne!(ItemId::new(7_u32), ItemId::new(7_u64));
/// assert_eq!(ItemId::new("a".to_string()).downcast_ref::<String>().map(String::as_str), Some("a"));
/// ```
#[derive(Clone)]
pub struct ItemId(Arc<dyn IdValue>);

impl ItemId {
    /// Wraps an identity value.
    pub fn new<K>(value: K) -> Self
    where
        K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// Returns the wrapped value if it has type `K`.
    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }
}

impl PartialEq for ItemId {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(&*other.0)
    }
}

impl Eq for ItemId {}

impl Hash for ItemId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemId(")?;
        self.0.dyn_fmt(f)?;
        f.write_str(")")
    }
}

/// Identity getter that uses the item itself.
pub fn self_identity<T: DataItem>() -> IdentifierGetter<T> {
    Arc::new(|item: &T| ItemId::new(item.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Person {
        id: u32,
        name: String,
    }

    #[test]
    fn test_equality_by_value_and_type() {
        assert_eq!(ItemId::new("x".to_string()), ItemId::new("x".to_string()));
        assert_ne!(ItemId::new("x".to_string()), ItemId::new("y".to_string()));
        assert_ne!(ItemId::new(1_i32), ItemId::new(1_i64));
    }

    #[test]
    fn test_hash_set_membership() {
        let mut ids = HashSet::new();
        ids.insert(ItemId::new(1_u32));
        ids.insert(ItemId::new(1_u32));
        ids.insert(ItemId::new(2_u32));
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&ItemId::new(2_u32)));
    }

    #[test]
    fn test_key_projection() {
        let by_id: IdentifierGetter<Person> = Arc::new(|p: &Person| ItemId::new(p.id));
        let before = Person {
            id: 3,
            name: "Ada".into(),
        };
        let after = Person {
            id: 3,
            name: "Ada L.".into(),
        };
        assert_eq!(by_id(&before), by_id(&after));
        let by_value = self_identity::<Person>();
        assert_ne!(by_value(&before), by_value(&after));
    }

    #[test]
    fn test_debug_shows_value() {
        assert_eq!(format!("{:?}", ItemId::new(5_u8)), "ItemId(5)");
    }
}
