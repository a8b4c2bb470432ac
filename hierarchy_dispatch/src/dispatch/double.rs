//! Double dispatch: select a case by the runtime types of two operands.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::hierarchy::{Base, ConcreteType, ErasedUpcast, Hierarchy};
use crate::types::{short_type_name, DispatchError};

use super::registry::{HandlerId, TableKey};
use super::resolve::{Param, Signature};
use super::table::{build_double, CaseSet, DispatchTable};
use super::{Access, Erased, Operand, Registry, RegistryConfig};

/// Result of one two-operand visitor case.
pub type BiVisitResult<'o, V> = Result<<V as BiVisitor>::Output<'o>, <V as BiVisitor>::Error>;

/// A case bound to one ordered pair of concrete types.
pub(crate) trait BiThunk<V: BiVisitor>: Send + Sync {
    fn call<'o>(
        &self,
        visitor: &V,
        first: Erased<'o>,
        second: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<BiVisitResult<'o, V>>;
}

type BoxedBiThunk<V> = Box<dyn BiThunk<V>>;

/// Upcasts of both operands plus the case, for one qualification pattern.
struct PairCase<T1: ?Sized + 'static, T2: ?Sized + 'static, F> {
    first: &'static dyn ErasedUpcast<T1>,
    second: &'static dyn ErasedUpcast<T2>,
    case: F,
}

impl<V, T1, T2> BiThunk<V>
    for PairCase<T1, T2, for<'o> fn(&V, &'o T1, &'o T2, V::Args<'o>) -> BiVisitResult<'o, V>>
where
    V: BiVisitor,
    T1: ?Sized + 'static,
    T2: ?Sized + 'static,
{
    fn call<'o>(
        &self,
        visitor: &V,
        first: Erased<'o>,
        second: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<BiVisitResult<'o, V>> {
        let x = first.narrow(self.first)?;
        let y = second.narrow(self.second)?;
        Some((self.case)(visitor, x, y, args))
    }
}

impl<V, T1, T2> BiThunk<V>
    for PairCase<T1, T2, for<'o> fn(&V, &'o T1, &'o mut T2, V::Args<'o>) -> BiVisitResult<'o, V>>
where
    V: BiVisitor,
    T1: ?Sized + 'static,
    T2: ?Sized + 'static,
{
    fn call<'o>(
        &self,
        visitor: &V,
        first: Erased<'o>,
        second: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<BiVisitResult<'o, V>> {
        let x = first.narrow(self.first)?;
        let y = second.narrow_mut(self.second)?;
        Some((self.case)(visitor, x, y, args))
    }
}

impl<V, T1, T2> BiThunk<V>
    for PairCase<T1, T2, for<'o> fn(&V, &'o mut T1, &'o T2, V::Args<'o>) -> BiVisitResult<'o, V>>
where
    V: BiVisitor,
    T1: ?Sized + 'static,
    T2: ?Sized + 'static,
{
    fn call<'o>(
        &self,
        visitor: &V,
        first: Erased<'o>,
        second: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<BiVisitResult<'o, V>> {
        let x = first.narrow_mut(self.first)?;
        let y = second.narrow(self.second)?;
        Some((self.case)(visitor, x, y, args))
    }
}

impl<V, T1, T2> BiThunk<V>
    for PairCase<
        T1,
        T2,
        for<'o> fn(&V, &'o mut T1, &'o mut T2, V::Args<'o>) -> BiVisitResult<'o, V>,
    >
where
    V: BiVisitor,
    T1: ?Sized + 'static,
    T2: ?Sized + 'static,
{
    fn call<'o>(
        &self,
        visitor: &V,
        first: Erased<'o>,
        second: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<BiVisitResult<'o, V>> {
        let x = first.narrow_mut(self.first)?;
        let y = second.narrow_mut(self.second)?;
        Some((self.case)(visitor, x, y, args))
    }
}

/// Something a [`Dispatcher2`] can call with operands borrowed for `'o`:
/// a [`BiVisitor`] or an [`Overload2`](crate::Overload2).
pub trait Callable2<'o> {
    type First: Hierarchy;
    type Second: Hierarchy;
    type Args;
    type Output;
    type Error: From<DispatchError>;

    fn call<A, B>(
        &self,
        registry: &Registry,
        first: A,
        second: B,
        args: Self::Args,
    ) -> Result<Self::Output, Self::Error>
    where
        A: Operand<'o, Base<Self::First>>,
        B: Operand<'o, Base<Self::Second>>;
}

/// A handler type whose cases are dispatched on a pair of hierarchies.
///
/// Each case names a type of the first hierarchy's lineage and one of the
/// second's. For every ordered pair of concrete types the most specific
/// applicable case is selected once, when the table is built.
pub trait BiVisitor: Sized + 'static {
    type First: Hierarchy;
    type Second: Hierarchy;
    type Args<'o>;
    type Output<'o>;
    type Error: From<DispatchError> + 'static;

    fn cases(cases: &mut BiCases<Self>);

    fn visit<'o, A, B>(&self, first: A, second: B) -> BiVisitResult<'o, Self>
    where
        Self: BiVisitor<Args<'o> = ()>,
        A: Operand<'o, Base<Self::First>>,
        B: Operand<'o, Base<Self::Second>>,
    {
        Registry::with_current(|registry| bi_visit_dispatch(self, registry, first, second, ()))
    }

    fn visit_with<'o, A, B>(&self, first: A, second: B, args: Self::Args<'o>) -> BiVisitResult<'o, Self>
    where
        A: Operand<'o, Base<Self::First>>,
        B: Operand<'o, Base<Self::Second>>,
    {
        Registry::with_current(|registry| bi_visit_dispatch(self, registry, first, second, args))
    }

    /// Dispatch through `registry`, which stays current for nested
    /// dispatches on this thread.
    fn visit_in<'o, A, B>(
        &self,
        registry: &Registry,
        first: A,
        second: B,
        args: Self::Args<'o>,
    ) -> BiVisitResult<'o, Self>
    where
        A: Operand<'o, Base<Self::First>>,
        B: Operand<'o, Base<Self::Second>>,
    {
        let _scope = registry.enter();
        bi_visit_dispatch(self, registry, first, second, args)
    }
}

impl<'o, V: BiVisitor> Callable2<'o> for V {
    type First = V::First;
    type Second = V::Second;
    type Args = V::Args<'o>;
    type Output = V::Output<'o>;
    type Error = V::Error;

    fn call<A, B>(
        &self,
        registry: &Registry,
        first: A,
        second: B,
        args: V::Args<'o>,
    ) -> BiVisitResult<'o, V>
    where
        A: Operand<'o, Base<V::First>>,
        B: Operand<'o, Base<V::Second>>,
    {
        bi_visit_dispatch(self, registry, first, second, args)
    }
}

fn bi_visit_dispatch<'o, V, A, B>(
    visitor: &V,
    registry: &Registry,
    first: A,
    second: B,
    args: V::Args<'o>,
) -> BiVisitResult<'o, V>
where
    V: BiVisitor,
    A: Operand<'o, Base<V::First>>,
    B: Operand<'o, Base<V::Second>>,
{
    let access = [A::ACCESS, B::ACCESS];
    let key = TableKey::double::<V::First, V::Second>(HandlerId::Type(TypeId::of::<V>()), access);
    let table = registry.table(key, |config| build_bi_visitor_table::<V>(access, config))?;

    let first = first.erase();
    let second = second.erase();
    let names = (first.type_name(), second.type_name());
    match table.get(&(first.concrete_id(), second.concrete_id())) {
        Some(thunk) => thunk
            .call(visitor, first, second, args)
            .unwrap_or_else(|| Err(DispatchError::unhandled_pair(names.0, names.1).into())),
        None => {
            trace!(
                handler = std::any::type_name::<V>(),
                first = names.0,
                second = names.1,
                "no dispatch table entry"
            );
            Err(DispatchError::unhandled_pair(names.0, names.1).into())
        }
    }
}

fn build_bi_visitor_table<V: BiVisitor>(
    access: [Access; 2],
    config: &RegistryConfig,
) -> Result<DispatchTable<(TypeId, TypeId), BoxedBiThunk<V>>, DispatchError> {
    let first = <V::First as Hierarchy>::descriptor()?;
    let second = <V::Second as Hierarchy>::descriptor()?;
    let mut cases = BiCases::new();
    V::cases(&mut cases);

    let handler = short_type_name(std::any::type_name::<V>());
    let signatures: Vec<Signature> = cases.entries.iter().map(|e| e.params.to_vec()).collect();
    let set = CaseSet {
        handler: &handler,
        signatures: &signatures,
        policy: config.missing_case,
    };
    build_double(&set, first, second, access, |index, a, b| {
        cases.entries.get(index).and_then(|entry| (entry.bind)(a, b))
    })
}

struct BiCaseEntry<V: BiVisitor> {
    params: [Param; 2],
    bind: Box<dyn Fn(&'static ConcreteType, &'static ConcreteType) -> Option<BoxedBiThunk<V>>>,
}

/// The case list of a [`BiVisitor`].
///
/// The method name spells the qualification of the two parameters:
/// `on` (`&`, `&`), `on_ref_mut` (`&`, `&mut`), `on_mut_ref` (`&mut`, `&`)
/// and `on_mut` (`&mut`, `&mut`).
pub struct BiCases<V: BiVisitor> {
    entries: Vec<BiCaseEntry<V>>,
}

impl<V: BiVisitor> BiCases<V> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn on<T1, T2>(
        &mut self,
        case: for<'o> fn(&V, &'o T1, &'o T2, V::Args<'o>) -> BiVisitResult<'o, V>,
    ) -> &mut Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
    {
        self.pair::<T1, T2, _>([Param::shared::<T1>(), Param::shared::<T2>()], case)
    }

    pub fn on_ref_mut<T1, T2>(
        &mut self,
        case: for<'o> fn(&V, &'o T1, &'o mut T2, V::Args<'o>) -> BiVisitResult<'o, V>,
    ) -> &mut Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
    {
        self.pair::<T1, T2, _>([Param::shared::<T1>(), Param::exclusive::<T2>()], case)
    }

    pub fn on_mut_ref<T1, T2>(
        &mut self,
        case: for<'o> fn(&V, &'o mut T1, &'o T2, V::Args<'o>) -> BiVisitResult<'o, V>,
    ) -> &mut Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
    {
        self.pair::<T1, T2, _>([Param::exclusive::<T1>(), Param::shared::<T2>()], case)
    }

    pub fn on_mut<T1, T2>(
        &mut self,
        case: for<'o> fn(&V, &'o mut T1, &'o mut T2, V::Args<'o>) -> BiVisitResult<'o, V>,
    ) -> &mut Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
    {
        self.pair::<T1, T2, _>([Param::exclusive::<T1>(), Param::exclusive::<T2>()], case)
    }

    /// A case on both base types: the fallback for every pair.
    pub fn otherwise(
        &mut self,
        case: for<'o> fn(
            &V,
            &'o Base<V::First>,
            &'o Base<V::Second>,
            V::Args<'o>,
        ) -> BiVisitResult<'o, V>,
    ) -> &mut Self {
        self.on::<Base<V::First>, Base<V::Second>>(case)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pair<T1, T2, F>(&mut self, params: [Param; 2], case: F) -> &mut Self
    where
        T1: ?Sized + 'static,
        T2: ?Sized + 'static,
        F: Copy + 'static,
        PairCase<T1, T2, F>: BiThunk<V>,
    {
        self.entries.push(BiCaseEntry {
            params,
            bind: Box::new(move |a: &'static ConcreteType, b: &'static ConcreteType| {
                let thunk = PairCase {
                    first: a.upcast::<T1>()?,
                    second: b.upcast::<T2>()?,
                    case,
                };
                Some(Box::new(thunk) as BoxedBiThunk<V>)
            }),
        });
        self
    }
}

impl<V: BiVisitor> fmt::Debug for BiCases<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.params.map(|p| (p.target, p.access))))
            .finish()
    }
}

/// Entry point for double dispatch on hierarchies `H1` and `H2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher2<H1, H2>(PhantomData<fn() -> (H1, H2)>);

impl<H1: Hierarchy, H2: Hierarchy> Dispatcher2<H1, H2> {
    pub fn visit<'o, C, A, B>(callable: &C, first: A, second: B) -> Result<C::Output, C::Error>
    where
        C: Callable2<'o, First = H1, Second = H2, Args = ()>,
        A: Operand<'o, H1::Base>,
        B: Operand<'o, H2::Base>,
    {
        Registry::with_current(|registry| callable.call(registry, first, second, ()))
    }

    pub fn visit_with<'o, C, A, B>(
        callable: &C,
        first: A,
        second: B,
        args: C::Args,
    ) -> Result<C::Output, C::Error>
    where
        C: Callable2<'o, First = H1, Second = H2>,
        A: Operand<'o, H1::Base>,
        B: Operand<'o, H2::Base>,
    {
        Registry::with_current(|registry| callable.call(registry, first, second, args))
    }

    pub fn visit_in<'o, C, A, B>(
        registry: &Registry,
        callable: &C,
        first: A,
        second: B,
        args: C::Args,
    ) -> Result<C::Output, C::Error>
    where
        C: Callable2<'o, First = H1, Second = H2>,
        A: Operand<'o, H1::Base>,
        B: Operand<'o, H2::Base>,
    {
        let _scope = registry.enter();
        callable.call(registry, first, second, args)
    }

    /// Start a match on a pair; finish it with [`Match2::with`].
    pub fn matching<'o, A, B>(first: A, second: B) -> Match2<'o, H1, H2, A, B>
    where
        A: Operand<'o, H1::Base>,
        B: Operand<'o, H2::Base>,
    {
        Match2 {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

/// A pending double dispatch, see [`Dispatcher2::matching`].
pub struct Match2<'o, H1, H2, A, B> {
    first: A,
    second: B,
    _marker: PhantomData<(fn() -> (H1, H2), &'o ())>,
}

impl<'o, H1, H2, A, B> Match2<'o, H1, H2, A, B>
where
    H1: Hierarchy,
    H2: Hierarchy,
    A: Operand<'o, H1::Base>,
    B: Operand<'o, H2::Base>,
{
    pub fn with<C>(self, callable: C) -> Result<C::Output, C::Error>
    where
        C: Callable2<'o, First = H1, Second = H2, Args = ()>,
    {
        let (first, second) = (self.first, self.second);
        Registry::with_current(|registry| callable.call(registry, first, second, ()))
    }

    pub fn with_in<C>(self, registry: &Registry, callable: C) -> Result<C::Output, C::Error>
    where
        C: Callable2<'o, First = H1, Second = H2, Args = ()>,
    {
        let _scope = registry.enter();
        callable.call(registry, self.first, self.second, ())
    }
}

impl<H1, H2, A, B> fmt::Debug for Match2<'_, H1, H2, A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match2")
            .field("first", &std::any::type_name::<H1>())
            .field("second", &std::any::type_name::<H2>())
            .finish_non_exhaustive()
    }
}
