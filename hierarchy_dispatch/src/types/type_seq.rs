//! Finite ordered sequences of type tags and the operations dispatch needs
//! over them.
//!
//! Every operation is pure and returns a new sequence. The element type is
//! generic so the same algebra works on plain [`TypeTag`]s, on hierarchy
//! members and on the pairs produced by [`TypeSeq::product`].

use std::fmt;

use serde::Serialize;

use super::TypeTag;

/// An ordered, finite sequence. Duplicates are allowed here; hierarchies
/// reject them when the sequence is declared (see [`TypeSeq::first_duplicate`]).
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeSeq<T = TypeTag> {
    items: Vec<T>,
}

impl<T> TypeSeq<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn head(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// True when `pred` holds for every element (vacuously true when empty).
    pub fn all(&self, pred: impl FnMut(&T) -> bool) -> bool {
        self.items.iter().all(pred)
    }

    /// True when `pred` holds for at least one element.
    pub fn any(&self, pred: impl FnMut(&T) -> bool) -> bool {
        self.items.iter().any(pred)
    }

    /// Element-wise transform.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> TypeSeq<U> {
        TypeSeq {
            items: self.items.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> TypeSeq<T> {
    /// Everything after the head; empty for an empty sequence.
    pub fn tail(&self) -> Self {
        Self {
            items: self.items.iter().skip(1).cloned().collect(),
        }
    }

    pub fn prepend(&self, item: T) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(item);
        items.extend(self.items.iter().cloned());
        Self { items }
    }

    pub fn append(&self, item: T) -> Self {
        let mut items = self.items.clone();
        items.push(item);
        Self { items }
    }

    pub fn concat(&self, other: &Self) -> Self {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        Self { items }
    }

    pub fn reverse(&self) -> Self {
        Self {
            items: self.items.iter().rev().cloned().collect(),
        }
    }

    /// Pair each element with its position.
    pub fn indexed(&self) -> TypeSeq<(usize, T)> {
        TypeSeq {
            items: self.items.iter().cloned().enumerate().collect(),
        }
    }

    /// Cartesian product in row-major order: for `m` and `n` elements the
    /// result holds `m * n` pairs and the second sequence varies fastest.
    ///
    /// ```
    /// use hierarchy_dispatch::types::TypeSeq;
    ///
    /// let rows: TypeSeq<char> = ['a', 'b'].into_iter().collect();
    /// let cols: TypeSeq<u8> = [1, 2, 3].into_iter().collect();
    /// let pairs: Vec<_> = rows.product(&cols).iter().copied().collect();
    /// assert_eq!(
    ///     pairs,
    ///     [('a', 1), ('a', 2), ('a', 3), ('b', 1), ('b', 2), ('b', 3)]
    /// );
    /// ```
    pub fn product<U: Clone>(&self, other: &TypeSeq<U>) -> TypeSeq<(T, U)> {
        let n = other.len();
        let items = (0..self.len() * n)
            .map(|i| (self.items[i / n].clone(), other.items[i % n].clone()))
            .collect();
        TypeSeq { items }
    }
}

impl<T: PartialEq> TypeSeq<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Number of occurrences of `item`.
    pub fn count(&self, item: &T) -> usize {
        self.items.iter().filter(|x| *x == item).count()
    }

    /// Position of the first occurrence of `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|x| x == item)
    }

    pub fn all_unique(&self) -> bool {
        self.first_duplicate().is_none()
    }

    /// The first element that also occurs earlier in the sequence.
    pub fn first_duplicate(&self) -> Option<&T> {
        self.items
            .iter()
            .enumerate()
            .find(|(i, item)| self.items[..*i].contains(item))
            .map(|(_, item)| item)
    }
}

impl<T: PartialEq + Clone> TypeSeq<T> {
    /// Drop every occurrence of `item`.
    pub fn remove(&self, item: &T) -> Self {
        Self {
            items: self.items.iter().filter(|x| *x != item).cloned().collect(),
        }
    }

    /// Keep only the first occurrence of each element, preserving order.
    pub fn uniques(&self) -> Self {
        let mut items: Vec<T> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !items.contains(item) {
                items.push(item.clone());
            }
        }
        Self { items }
    }
}

impl<T> Default for TypeSeq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for TypeSeq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> From<Vec<T>> for TypeSeq<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> IntoIterator for TypeSeq<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a TypeSeq<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for TypeSeq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}
