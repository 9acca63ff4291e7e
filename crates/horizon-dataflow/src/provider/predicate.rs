//! Shared filter predicates and comparators.
//!
//! Both wrap an `Arc`'d closure and compare by reference: two predicates are
//! equal only if they are clones of the same instance. Setting a filter to
//! the instance that is already installed is therefore a cheap no-op, while
//! any freshly built closure always counts as a change.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A shareable item predicate used as an in-memory filter.
pub struct Predicate<T> {
    test: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: 'static> Predicate<T> {
    /// Creates a predicate from a closure.
    pub fn new<P>(test: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Arc::new(test),
        }
    }

    /// A predicate that accepts every item.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Evaluates the predicate.
    pub fn test(&self, item: &T) -> bool {
        (self.test)(item)
    }

    /// Returns a predicate accepting items accepted by both `self` and `other`.
    ///
    /// `other` is only evaluated for items that pass `self`.
    pub fn and(&self, other: &Predicate<T>) -> Self {
        let first = self.test.clone();
        let second = other.test.clone();
        Self::new(move |item| first(item) && second(item))
    }

    /// Returns the negation of this predicate.
    pub fn negate(&self) -> Self {
        let inner = self.test.clone();
        Self::new(move |item| !inner(item))
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: self.test.clone(),
        }
    }
}

impl<T> PartialEq for Predicate<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.test), Arc::as_ptr(&other.test))
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({:p})", Arc::as_ptr(&self.test))
    }
}

/// A shareable comparator used for in-memory sorting.
pub struct Comparator<T> {
    compare: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
}

impl<T: 'static> Comparator<T> {
    /// Creates a comparator from a closure.
    pub fn new<C>(compare: C) -> Self
    where
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Compares by a key extracted from each item.
    pub fn comparing<K, G>(key: G) -> Self
    where
        K: Ord,
        G: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::new(move |a, b| key(a).cmp(&key(b)))
    }

    /// Natural ordering of the items themselves.
    pub fn natural() -> Self
    where
        T: Ord,
    {
        Self::new(|a: &T, b: &T| a.cmp(b))
    }

    /// Compares two items.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }

    /// Returns the reverse ordering.
    pub fn reversed(&self) -> Self {
        let inner = self.compare.clone();
        Self::new(move |a, b| inner(b, a))
    }

    /// Returns a comparator that breaks ties of `self` with `tiebreak`.
    pub fn then(&self, tiebreak: &Comparator<T>) -> Self {
        let primary = self.compare.clone();
        let secondary = tiebreak.compare.clone();
        Self::new(move |a, b| primary(a, b).then_with(|| secondary(a, b)))
    }
}

impl<T> Clone for Comparator<T> {
    fn clone(&self) -> Self {
        Self {
            compare: self.compare.clone(),
        }
    }
}

impl<T> PartialEq for Comparator<T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.compare), Arc::as_ptr(&other.compare))
    }
}

impl<T> fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comparator({:p})", Arc::as_ptr(&self.compare))
    }
}
