//! Specificity resolution: which case handles a concrete type combination.
//!
//! For every operand position a case parameter is ranked by the depth of its
//! type in the concrete type's lineage, then by a penalty for a shared case
//! receiving an exclusive operand. The winner must rank at least as well as
//! every other applicable case in every position and strictly better in at
//! least one.

use std::cmp::Ordering;

use crate::hierarchy::ConcreteType;
use crate::types::TypeTag;

use super::Access;

/// One parameter of a case: its target type and how it accesses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Param {
    pub(crate) target: TypeTag,
    pub(crate) access: Access,
}

impl Param {
    pub(crate) fn shared<T: ?Sized + 'static>() -> Self {
        Self {
            target: TypeTag::of::<T>(),
            access: Access::Shared,
        }
    }

    pub(crate) fn exclusive<T: ?Sized + 'static>() -> Self {
        Self {
            target: TypeTag::of::<T>(),
            access: Access::Exclusive,
        }
    }
}

/// Parameter list of one case, one entry per operand.
pub(crate) type Signature = Vec<Param>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Selected(usize),
    Missing,
    /// Indices of the equally specific candidates.
    Ambiguous(Vec<usize>),
}

type Rank = (usize, u8);

/// Rank of `param` for an operand of type `concrete` with `operand` access,
/// or `None` when the case cannot accept it.
fn rank(param: &Param, concrete: &ConcreteType, operand: Access) -> Option<Rank> {
    let depth = concrete.depth_of(&param.target)?;
    let penalty = match (param.access, operand) {
        (Access::Shared, Access::Shared) | (Access::Exclusive, Access::Exclusive) => 0,
        (Access::Shared, Access::Exclusive) => 1,
        (Access::Exclusive, Access::Shared) => return None,
    };
    Some((depth, penalty))
}

/// Compare two applicable cases position by position.
///
/// `Less` when `a` is more specific, `Greater` when `b` is, `Equal` for
/// identical ranks and `None` when neither dominates.
fn compare(a: &[Rank], b: &[Rank]) -> Option<Ordering> {
    let mut result = Ordering::Equal;
    for (x, y) in a.iter().zip(b) {
        match (result, x.cmp(y)) {
            (_, Ordering::Equal) => {}
            (Ordering::Equal, ord) => result = ord,
            (current, ord) if current != ord => return None,
            _ => {}
        }
    }
    Some(result)
}

/// Select the case of `cases` that handles `concretes` accessed as `operands`.
pub(crate) fn resolve(
    cases: &[Signature],
    concretes: &[&ConcreteType],
    operands: &[Access],
) -> Resolution {
    let applicable: Vec<(usize, Vec<Rank>)> = cases
        .iter()
        .enumerate()
        .filter(|(_, sig)| sig.len() == concretes.len())
        .filter_map(|(index, sig)| {
            let ranks = sig
                .iter()
                .zip(concretes)
                .zip(operands)
                .map(|((param, concrete), access)| rank(param, concrete, *access))
                .collect::<Option<Vec<Rank>>>()?;
            Some((index, ranks))
        })
        .collect();

    if applicable.is_empty() {
        return Resolution::Missing;
    }

    // Candidates no other applicable case beats.
    let minimal: Vec<usize> = applicable
        .iter()
        .filter(|(i, ranks)| {
            !applicable
                .iter()
                .any(|(j, other)| i != j && dominates(other, ranks))
        })
        .map(|(i, _)| *i)
        .collect();

    // Dominance is a partial order, so a single minimal case beats all others.
    if minimal.len() == 1 {
        Resolution::Selected(minimal[0])
    } else {
        Resolution::Ambiguous(minimal)
    }
}

fn dominates(a: &[Rank], b: &[Rank]) -> bool {
    compare(a, b) == Some(Ordering::Less)
}
