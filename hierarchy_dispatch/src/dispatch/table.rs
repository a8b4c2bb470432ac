//! Dispatch tables and the builders that fill them.

use std::any::TypeId;
use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::hierarchy::{ConcreteType, HierarchyDescriptor};
use crate::types::{DispatchError, TypeSeq};

use super::resolve::{resolve, Resolution, Signature};
use super::{Access, MissingCasePolicy};

/// Immutable map from a dispatch key to the entry bound for it.
///
/// Single dispatch keys by the concrete `TypeId`, double dispatch by the
/// ordered pair of `TypeId`s.
pub struct DispatchTable<K, E> {
    entries: FxHashMap<K, E>,
}

impl<K: Eq + Hash, E> DispatchTable<K, E> {
    pub fn get(&self, key: &K) -> Option<&E> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

impl<K: Eq + Hash, E> FromIterator<(K, E)> for DispatchTable<K, E> {
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K, E> fmt::Debug for DispatchTable<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// The case list a table is built from.
pub(crate) struct CaseSet<'s> {
    /// Handler name for diagnostics.
    pub(crate) handler: &'s str,
    pub(crate) signatures: &'s [Signature],
    pub(crate) policy: MissingCasePolicy,
}

impl CaseSet<'_> {
    /// Resolve one concrete combination. `Ok(None)` means "leave it out".
    fn select(
        &self,
        concretes: &[&ConcreteType],
        operands: &[Access],
    ) -> Result<Option<usize>, DispatchError> {
        match resolve(self.signatures, concretes, operands) {
            Resolution::Selected(index) => Ok(Some(index)),
            Resolution::Missing => self.missing(concretes).map(|()| None),
            Resolution::Ambiguous(candidates) => Err(self.ambiguous(concretes, &candidates)),
        }
    }

    fn missing(&self, concretes: &[&ConcreteType]) -> Result<(), DispatchError> {
        let types = type_names(concretes);
        match self.policy {
            MissingCasePolicy::Reject => Err(DispatchError::MissingCase {
                handler: self.handler.to_string(),
                types,
            }),
            MissingCasePolicy::Skip => {
                warn!(
                    handler = self.handler,
                    types = ?types,
                    "no case accepts this combination; leaving it out of the table"
                );
                Ok(())
            }
        }
    }

    fn ambiguous(&self, concretes: &[&ConcreteType], candidates: &[usize]) -> DispatchError {
        let candidates = candidates
            .iter()
            .filter_map(|&i| self.signatures.get(i))
            .map(|sig| sig.iter().map(|param| param.target.name()).collect())
            .collect();
        DispatchError::AmbiguousCase {
            handler: self.handler.to_string(),
            types: type_names(concretes),
            candidates,
        }
    }
}

fn type_names(concretes: &[&ConcreteType]) -> Vec<&'static str> {
    concretes.iter().map(|c| c.tag().name()).collect()
}

/// Build a single-dispatch table over every concrete type of `descriptor`.
///
/// `bind` turns the selected case index into the table entry for one
/// concrete type; `None` leaves the type out.
pub(crate) fn build_single<E>(
    cases: &CaseSet<'_>,
    descriptor: &'static HierarchyDescriptor,
    access: Access,
    mut bind: impl FnMut(usize, &'static ConcreteType) -> Option<E>,
) -> Result<DispatchTable<TypeId, E>, DispatchError> {
    debug!(
        handler = cases.handler,
        hierarchy = %descriptor.base(),
        ?access,
        "building single dispatch table"
    );
    let mut entries = FxHashMap::default();
    for concrete in descriptor.concretes() {
        let Some(index) = cases.select(&[concrete], &[access])? else {
            continue;
        };
        match bind(index, concrete) {
            Some(entry) => {
                entries.insert(concrete.tag().id(), entry);
            }
            None => cases.missing(&[concrete])?,
        }
    }
    debug!(
        handler = cases.handler,
        entries = entries.len(),
        "single dispatch table built"
    );
    Ok(DispatchTable { entries })
}

/// Build a double-dispatch table over every ordered pair of concrete types,
/// enumerated as the row-major product of the two hierarchies.
pub(crate) fn build_double<E>(
    cases: &CaseSet<'_>,
    first: &'static HierarchyDescriptor,
    second: &'static HierarchyDescriptor,
    access: [Access; 2],
    mut bind: impl FnMut(usize, &'static ConcreteType, &'static ConcreteType) -> Option<E>,
) -> Result<DispatchTable<(TypeId, TypeId), E>, DispatchError> {
    debug!(
        handler = cases.handler,
        first = %first.base(),
        second = %second.base(),
        ?access,
        "building double dispatch table"
    );
    let rows: TypeSeq<&'static ConcreteType> = first.concretes().iter().collect();
    let cols: TypeSeq<&'static ConcreteType> = second.concretes().iter().collect();
    let mut entries = FxHashMap::default();
    for (a, b) in rows.product(&cols) {
        let Some(index) = cases.select(&[a, b], &access)? else {
            continue;
        };
        match bind(index, a, b) {
            Some(entry) => {
                entries.insert((a.tag().id(), b.tag().id()), entry);
            }
            None => cases.missing(&[a, b])?,
        }
    }
    debug!(
        handler = cases.handler,
        entries = entries.len(),
        "double dispatch table built"
    );
    Ok(DispatchTable { entries })
}
