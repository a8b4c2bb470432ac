//! Overload sets: independently typed closures merged into one callable.
//!
//! An overload resolves exactly like a visitor: each closure is a case, the
//! most specific applicable case wins and equally specific ones are an
//! ambiguity error. Tables for overloads store case indices and are keyed by
//! the ordered list of case signatures, so every overload with the same
//! signatures on the same hierarchies shares one table. Each overload also
//! keeps the tables it resolved, so repeated calls skip the registry.
//!
//! The result type is a [`Returns`] family indexed by the operand lifetime:
//! [`Overload`] returns an owned `R`, [`OverloadRef`] returns `&'o T`
//! borrowed from the dispatched object.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::dispatch::registry::{HandlerId, TableKey};
use crate::dispatch::resolve::{Param, Signature};
use crate::dispatch::table::{build_double, build_single, CaseSet, DispatchTable};
use crate::dispatch::{Access, Callable, Callable2, Erased, Operand, Registry};
use crate::hierarchy::{Base, ConcreteType, Hierarchy};
use crate::types::DispatchError;

const HANDLER: &str = "Overload";

/// Result type of an overload for an operand borrowed for `'o`.
pub trait Returns {
    type Output<'o>;
}

/// Results that do not borrow from the operand.
#[derive(Debug)]
pub struct Owned<R>(PhantomData<fn() -> R>);

impl<R> Returns for Owned<R> {
    type Output<'o> = R;
}

/// Results borrowed from the operand.
#[derive(Debug)]
pub struct Borrowed<T: ?Sized>(PhantomData<fn() -> Box<T>>);

impl<T: ?Sized + 'static> Returns for Borrowed<T> {
    type Output<'o> = &'o T;
}

/// Overload set with owned results.
pub type Overload<'a, H, R, A = ()> = OverloadSet<'a, H, Owned<R>, A>;

/// Overload set whose cases return a reference into the operand.
pub type OverloadRef<'a, H, T, A = ()> = OverloadSet<'a, H, Borrowed<T>, A>;

/// Pair overload set with owned results.
pub type Overload2<'a, H1, H2, R, A = ()> = OverloadSet2<'a, H1, H2, Owned<R>, A>;

/// Pair overload set whose cases return a reference into the operands.
pub type Overload2Ref<'a, H1, H2, T, A = ()> = OverloadSet2<'a, H1, H2, Borrowed<T>, A>;

type CaseFn<'a, K, A> = Box<
    dyn for<'o> Fn(&'static ConcreteType, Erased<'o>, A) -> Option<<K as Returns>::Output<'o>>
        + 'a,
>;

type CaseFn2<'a, K, A> = Box<
    dyn for<'o> Fn(
            &'static ConcreteType,
            Erased<'o>,
            &'static ConcreteType,
            Erased<'o>,
            A,
        ) -> Option<<K as Returns>::Output<'o>>
        + 'a,
>;

fn erase_case<'a, K, A, G>(g: G) -> CaseFn<'a, K, A>
where
    K: Returns,
    G: for<'o> Fn(&'static ConcreteType, Erased<'o>, A) -> Option<K::Output<'o>> + 'a,
{
    Box::new(g)
}

fn erase_case2<'a, K, A, G>(g: G) -> CaseFn2<'a, K, A>
where
    K: Returns,
    G: for<'o> Fn(
            &'static ConcreteType,
            Erased<'o>,
            &'static ConcreteType,
            Erased<'o>,
            A,
        ) -> Option<K::Output<'o>>
        + 'a,
{
    Box::new(g)
}

type IndexTable = DispatchTable<TypeId, (usize, &'static ConcreteType)>;

type PairIndexTable =
    DispatchTable<(TypeId, TypeId), (usize, &'static ConcreteType, &'static ConcreteType)>;

/// A table resolved by one overload, tagged with its registry's id.
type Resolved<T> = OnceCell<(u64, Arc<T>)>;

fn resolved<T>(
    cell: &Resolved<T>,
    registry: &Registry,
    resolve: impl FnOnce() -> Result<Arc<T>, DispatchError>,
) -> Result<Arc<T>, DispatchError> {
    if let Some((id, table)) = cell.get() {
        if *id == registry.id() {
            return Ok(Arc::clone(table));
        }
    }
    let table = resolve()?;
    // The first registry keeps the slot; others resolve through their cache.
    let _ = cell.set((registry.id(), Arc::clone(&table)));
    Ok(table)
}

/// Closures over one hierarchy, dispatched on the runtime type of the
/// operand. Usually named through [`Overload`] or [`OverloadRef`].
///
/// ```
/// use hierarchy_dispatch::{hierarchy, Dispatcher, Dynamic, Overload, OverloadRef};
///
/// trait Shape: Dynamic {}
/// struct Square(f64);
/// struct Circle(f64);
/// impl Shape for Square {}
/// impl Shape for Circle {}
///
/// hierarchy! { struct Shapes: dyn Shape { Square, Circle } }
///
/// let area = Overload::<Shapes, f64>::new()
///     .case(|s: &Square| s.0 * s.0)
///     .otherwise(|_| 0.0);
///
/// let circle: &dyn Shape = &Circle(1.0);
/// assert_eq!(Dispatcher::<Shapes>::visit(&area, circle), Ok(0.0));
/// let square: &dyn Shape = &Square(3.0);
/// assert_eq!(Dispatcher::<Shapes>::matching(square).with(area), Ok(9.0));
///
/// let scaled = Overload::<Shapes, f64, f64>::new()
///     .case_with(|s: &Square, scale| s.0 * scale)
///     .otherwise_with(|_, _| 0.0);
/// assert_eq!(Dispatcher::<Shapes>::visit_with(&scaled, square, 2.0), Ok(6.0));
///
/// let side = OverloadRef::<Shapes, f64>::new()
///     .case(|s: &Square| &s.0)
///     .case(|c: &Circle| &c.0);
/// assert_eq!(Dispatcher::<Shapes>::visit(&side, square), Ok(&3.0));
/// ```
pub struct OverloadSet<'a, H, K: Returns, A = ()> {
    cases: Vec<(Param, CaseFn<'a, K, A>)>,
    tables: [Resolved<IndexTable>; 2],
    _hierarchy: PhantomData<fn() -> H>,
}

impl<'a, H: Hierarchy, K: Returns, A> OverloadSet<'a, H, K, A> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            tables: Default::default(),
            _hierarchy: PhantomData,
        }
    }

    /// A case taking the operand as `&T` and the extra arguments.
    pub fn case_with<T, F>(mut self, f: F) -> Self
    where
        T: ?Sized + 'static,
        F: for<'o> Fn(&'o T, A) -> K::Output<'o> + 'a,
    {
        let call = erase_case::<K, A, _>(move |concrete, operand, args| {
            let target = operand.narrow(concrete.upcast::<T>()?)?;
            Some(f(target, args))
        });
        self.cases.push((Param::shared::<T>(), call));
        self
    }

    /// A case taking the operand as `&mut T`; selected only for `&mut`
    /// operands.
    pub fn case_mut_with<T, F>(mut self, f: F) -> Self
    where
        T: ?Sized + 'static,
        F: for<'o> Fn(&'o mut T, A) -> K::Output<'o> + 'a,
    {
        let call = erase_case::<K, A, _>(move |concrete, operand, args| {
            let target = operand.narrow_mut(concrete.upcast::<T>()?)?;
            Some(f(target, args))
        });
        self.cases.push((Param::exclusive::<T>(), call));
        self
    }

    pub fn otherwise_with<F>(self, f: F) -> Self
    where
        F: for<'o> Fn(&'o Base<H>, A) -> K::Output<'o> + 'a,
    {
        self.case_with::<Base<H>, F>(f)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    fn signatures(&self) -> Vec<Signature> {
        self.cases.iter().map(|(param, _)| vec![*param]).collect()
    }

    fn table(&self, registry: &Registry, access: Access) -> Result<Arc<IndexTable>, DispatchError> {
        resolved(&self.tables[access.index()], registry, || {
            let signatures = self.signatures();
            let key = TableKey::single::<H>(HandlerId::Cases(signatures.clone()), access);
            registry.table(key, |config| {
                let set = CaseSet {
                    handler: HANDLER,
                    signatures: &signatures,
                    policy: config.missing_case,
                };
                build_single(&set, H::descriptor()?, access, |index, concrete| {
                    Some((index, concrete))
                })
            })
        })
    }
}

impl<'a, H: Hierarchy, K: Returns> OverloadSet<'a, H, K> {
    /// A case taking the operand as `&T`.
    pub fn case<T, F>(self, f: F) -> Self
    where
        T: ?Sized + 'static,
        F: for<'o> Fn(&'o T) -> K::Output<'o> + 'a,
    {
        self.case_with::<T, _>(move |target, ()| f(target))
    }

    pub fn case_mut<T, F>(self, f: F) -> Self
    where
        T: ?Sized + 'static,
        F: for<'o> Fn(&'o mut T) -> K::Output<'o> + 'a,
    {
        self.case_mut_with::<T, _>(move |target, ()| f(target))
    }

    /// A case on the base type.
    pub fn otherwise<F>(self, f: F) -> Self
    where
        F: for<'o> Fn(&'o Base<H>) -> K::Output<'o> + 'a,
    {
        self.case::<Base<H>, F>(f)
    }
}

impl<H: Hierarchy, K: Returns, A> Default for OverloadSet<'_, H, K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, K: Returns, A> fmt::Debug for OverloadSet<'_, H, K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.cases.iter().map(|(p, _)| (p.target, p.access)))
            .finish()
    }
}

impl<'o, H: Hierarchy, K: Returns, A> Callable<'o> for OverloadSet<'_, H, K, A> {
    type Hierarchy = H;
    type Args = A;
    type Output = K::Output<'o>;
    type Error = DispatchError;

    fn call<O>(&self, registry: &Registry, obj: O, args: A) -> Result<K::Output<'o>, DispatchError>
    where
        O: Operand<'o, Base<H>>,
    {
        let table = self.table(registry, O::ACCESS)?;
        let operand = obj.erase();
        let type_name = operand.type_name();
        let Some(&(index, concrete)) = table.get(&operand.concrete_id()) else {
            trace!(handler = HANDLER, type_name, "no dispatch table entry");
            return Err(DispatchError::unhandled(type_name));
        };
        self.cases
            .get(index)
            .and_then(|(_, call)| call(concrete, operand, args))
            .ok_or_else(|| DispatchError::unhandled(type_name))
    }
}

/// Closures over a pair of hierarchies, dispatched on the runtime types of
/// both operands. Usually named through [`Overload2`] or [`Overload2Ref`].
///
/// The method name spells the qualification of the two parameters, as in
/// [`BiCases`](crate::BiCases).
pub struct OverloadSet2<'a, H1, H2, K: Returns, A = ()> {
    cases: Vec<(Signature, CaseFn2<'a, K, A>)>,
    tables: [Resolved<PairIndexTable>; 4],
    _hierarchies: PhantomData<fn() -> (H1, H2)>,
}

impl<'a, H1: Hierarchy, H2: Hierarchy, K: Returns, A> OverloadSet2<'a, H1, H2, K, A> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            tables: Default::default(),
            _hierarchies: PhantomData,
        }
    }

    pub fn case_with<T1, T2, F>(mut self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o T1, &'o T2, A) -> K::Output<'o> + 'a,
    {
        let call = erase_case2::<K, A, _>(move |a, x, b, y, args| {
            let x = x.narrow(a.upcast::<T1>()?)?;
            let y = y.narrow(b.upcast::<T2>()?)?;
            Some(f(x, y, args))
        });
        self.cases
            .push((vec![Param::shared::<T1>(), Param::shared::<T2>()], call));
        self
    }

    pub fn case_ref_mut_with<T1, T2, F>(mut self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o T1, &'o mut T2, A) -> K::Output<'o> + 'a,
    {
        let call = erase_case2::<K, A, _>(move |a, x, b, y, args| {
            let x = x.narrow(a.upcast::<T1>()?)?;
            let y = y.narrow_mut(b.upcast::<T2>()?)?;
            Some(f(x, y, args))
        });
        self.cases
            .push((vec![Param::shared::<T1>(), Param::exclusive::<T2>()], call));
        self
    }

    pub fn case_mut_ref_with<T1, T2, F>(mut self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o mut T1, &'o T2, A) -> K::Output<'o> + 'a,
    {
        let call = erase_case2::<K, A, _>(move |a, x, b, y, args| {
            let x = x.narrow_mut(a.upcast::<T1>()?)?;
            let y = y.narrow(b.upcast::<T2>()?)?;
            Some(f(x, y, args))
        });
        self.cases
            .push((vec![Param::exclusive::<T1>(), Param::shared::<T2>()], call));
        self
    }

    pub fn case_mut_with<T1, T2, F>(mut self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o mut T1, &'o mut T2, A) -> K::Output<'o> + 'a,
    {
        let call = erase_case2::<K, A, _>(move |a, x, b, y, args| {
            let x = x.narrow_mut(a.upcast::<T1>()?)?;
            let y = y.narrow_mut(b.upcast::<T2>()?)?;
            Some(f(x, y, args))
        });
        self.cases
            .push((vec![Param::exclusive::<T1>(), Param::exclusive::<T2>()], call));
        self
    }

    pub fn otherwise_with<F>(self, f: F) -> Self
    where
        F: for<'o> Fn(&'o Base<H1>, &'o Base<H2>, A) -> K::Output<'o> + 'a,
    {
        self.case_with::<Base<H1>, Base<H2>, F>(f)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    fn signatures(&self) -> Vec<Signature> {
        self.cases.iter().map(|(sig, _)| sig.clone()).collect()
    }

    fn table(
        &self,
        registry: &Registry,
        access: [Access; 2],
    ) -> Result<Arc<PairIndexTable>, DispatchError> {
        let slot = access[0].index() * 2 + access[1].index();
        resolved(&self.tables[slot], registry, || {
            let signatures = self.signatures();
            let key = TableKey::double::<H1, H2>(HandlerId::Cases(signatures.clone()), access);
            registry.table(key, |config| {
                let set = CaseSet {
                    handler: HANDLER,
                    signatures: &signatures,
                    policy: config.missing_case,
                };
                build_double(
                    &set,
                    H1::descriptor()?,
                    H2::descriptor()?,
                    access,
                    |index, a, b| Some((index, a, b)),
                )
            })
        })
    }
}

impl<'a, H1: Hierarchy, H2: Hierarchy, K: Returns> OverloadSet2<'a, H1, H2, K> {
    pub fn case<T1, T2, F>(self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o T1, &'o T2) -> K::Output<'o> + 'a,
    {
        self.case_with::<T1, T2, _>(move |x, y, ()| f(x, y))
    }

    pub fn case_ref_mut<T1, T2, F>(self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o T1, &'o mut T2) -> K::Output<'o> + 'a,
    {
        self.case_ref_mut_with::<T1, T2, _>(move |x, y, ()| f(x, y))
    }

    pub fn case_mut_ref<T1, T2, F>(self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o mut T1, &'o T2) -> K::Output<'o> + 'a,
    {
        self.case_mut_ref_with::<T1, T2, _>(move |x, y, ()| f(x, y))
    }

    pub fn case_mut<T1, T2, F>(self, f: F) -> Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: for<'o> Fn(&'o mut T1, &'o mut T2) -> K::Output<'o> + 'a,
    {
        self.case_mut_with::<T1, T2, _>(move |x, y, ()| f(x, y))
    }

    /// A case on both base types.
    pub fn otherwise<F>(self, f: F) -> Self
    where
        F: for<'o> Fn(&'o Base<H1>, &'o Base<H2>) -> K::Output<'o> + 'a,
    {
        self.case::<Base<H1>, Base<H2>, F>(f)
    }
}

impl<H1: Hierarchy, H2: Hierarchy, K: Returns, A> Default for OverloadSet2<'_, H1, H2, K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H1, H2, K: Returns, A> fmt::Debug for OverloadSet2<'_, H1, H2, K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.cases.iter().map(|(sig, _)| {
                sig.iter()
                    .map(|p| (p.target, p.access))
                    .collect::<Vec<_>>()
            }))
            .finish()
    }
}

impl<'o, H1, H2, K, A> Callable2<'o> for OverloadSet2<'_, H1, H2, K, A>
where
    H1: Hierarchy,
    H2: Hierarchy,
    K: Returns,
{
    type First = H1;
    type Second = H2;
    type Args = A;
    type Output = K::Output<'o>;
    type Error = DispatchError;

    fn call<X, Y>(
        &self,
        registry: &Registry,
        first: X,
        second: Y,
        args: A,
    ) -> Result<K::Output<'o>, DispatchError>
    where
        X: Operand<'o, Base<H1>>,
        Y: Operand<'o, Base<H2>>,
    {
        let table = self.table(registry, [X::ACCESS, Y::ACCESS])?;
        let first = first.erase();
        let second = second.erase();
        let names = (first.type_name(), second.type_name());
        let Some(&(index, a, b)) = table.get(&(first.concrete_id(), second.concrete_id())) else {
            trace!(
                handler = HANDLER,
                first = names.0,
                second = names.1,
                "no dispatch table entry"
            );
            return Err(DispatchError::unhandled_pair(names.0, names.1));
        };
        self.cases
            .get(index)
            .and_then(|(_, call)| call(a, first, b, second, args))
            .ok_or_else(|| DispatchError::unhandled_pair(names.0, names.1))
    }
}
