//! Single dispatch: select a case by the runtime type of one operand.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::hierarchy::{Base, ConcreteType, ErasedUpcast, Hierarchy};
use crate::types::{short_type_name, DispatchError};

use super::registry::{HandlerId, TableKey};
use super::resolve::{Param, Signature};
use super::table::{build_single, CaseSet, DispatchTable};
use super::{Access, Erased, Operand, Registry, RegistryConfig};

/// Result of one visitor case for an operand borrowed for `'o`.
pub type VisitResult<'o, V> = Result<<V as Visitor>::Output<'o>, <V as Visitor>::Error>;

/// A case bound to one concrete type.
pub(crate) trait Thunk<V: Visitor>: Send + Sync {
    /// Narrow the operand and call the case. `None` only if the operand is
    /// not of the concrete type the thunk was bound to.
    fn call<'o>(
        &self,
        visitor: &V,
        operand: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<VisitResult<'o, V>>;
}

type BoxedThunk<V> = Box<dyn Thunk<V>>;

struct SharedCase<V: Visitor, T: ?Sized + 'static> {
    upcast: &'static dyn ErasedUpcast<T>,
    case: for<'o> fn(&V, &'o T, V::Args<'o>) -> VisitResult<'o, V>,
}

impl<V: Visitor, T: ?Sized + 'static> Thunk<V> for SharedCase<V, T> {
    fn call<'o>(
        &self,
        visitor: &V,
        operand: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<VisitResult<'o, V>> {
        let target = operand.narrow(self.upcast)?;
        Some((self.case)(visitor, target, args))
    }
}

struct ExclusiveCase<V: Visitor, T: ?Sized + 'static> {
    upcast: &'static dyn ErasedUpcast<T>,
    case: for<'o> fn(&V, &'o mut T, V::Args<'o>) -> VisitResult<'o, V>,
}

impl<V: Visitor, T: ?Sized + 'static> Thunk<V> for ExclusiveCase<V, T> {
    fn call<'o>(
        &self,
        visitor: &V,
        operand: Erased<'o>,
        args: V::Args<'o>,
    ) -> Option<VisitResult<'o, V>> {
        let target = operand.narrow_mut(self.upcast)?;
        Some((self.case)(visitor, target, args))
    }
}

/// Something a [`Dispatcher`] can call with an operand borrowed for `'o`:
/// a [`Visitor`] or an [`Overload`](crate::Overload).
pub trait Callable<'o> {
    type Hierarchy: Hierarchy;
    type Args;
    type Output;
    type Error: From<DispatchError>;

    fn call<O>(
        &self,
        registry: &Registry,
        obj: O,
        args: Self::Args,
    ) -> Result<Self::Output, Self::Error>
    where
        O: Operand<'o, Base<Self::Hierarchy>>;
}

/// A handler type whose cases are dispatched on one hierarchy.
///
/// Cases are plain functions registered in [`Visitor::cases`]. Each takes
/// the visitor, the narrowed operand and the extra arguments (moved in, `()`
/// when there are none). A case for an intermediate ancestor or for the base
/// catches every concrete type without a more specific case.
///
/// `Args` and `Output` are parameterized by the lifetime of the operand, so
/// extra arguments may borrow from the caller and results may borrow from
/// the dispatched object.
///
/// ```
/// use hierarchy_dispatch::{hierarchy, Cases, DispatchError, Dynamic, Visitor};
///
/// trait Shape: Dynamic {}
/// struct Square;
/// struct Circle;
/// impl Shape for Square {}
/// impl Shape for Circle {}
///
/// hierarchy! { struct Shapes: dyn Shape { Square, Circle } }
///
/// struct Namer;
///
/// impl Namer {
///     fn square(&self, _: &Square, _: ()) -> Result<String, DispatchError> {
///         Ok("square".to_string())
///     }
///
///     fn shape(&self, _: &dyn Shape, _: ()) -> Result<String, DispatchError> {
///         Ok("some shape".to_string())
///     }
/// }
///
/// impl Visitor for Namer {
///     type Hierarchy = Shapes;
///     type Args<'o> = ();
///     type Output<'o> = String;
///     type Error = DispatchError;
///
///     fn cases(cases: &mut Cases<Self>) {
///         cases.on(Self::square).otherwise(Self::shape);
///     }
/// }
///
/// let square: &dyn Shape = &Square;
/// let circle: &dyn Shape = &Circle;
/// assert_eq!(Namer.visit(square).unwrap(), "square");
/// assert_eq!(Namer.visit(circle).unwrap(), "some shape");
/// ```
pub trait Visitor: Sized + 'static {
    type Hierarchy: Hierarchy;
    /// Extra arguments passed to every case.
    type Args<'o>;
    type Output<'o>;
    type Error: From<DispatchError> + 'static;

    fn cases(cases: &mut Cases<Self>);

    fn visit<'o, O>(&self, obj: O) -> VisitResult<'o, Self>
    where
        Self: Visitor<Args<'o> = ()>,
        O: Operand<'o, Base<Self::Hierarchy>>,
    {
        Registry::with_current(|registry| visit_dispatch(self, registry, obj, ()))
    }

    fn visit_with<'o, O>(&self, obj: O, args: Self::Args<'o>) -> VisitResult<'o, Self>
    where
        O: Operand<'o, Base<Self::Hierarchy>>,
    {
        Registry::with_current(|registry| visit_dispatch(self, registry, obj, args))
    }

    /// Dispatch through `registry`. Nested dispatches made by the cases on
    /// this thread, `self.visit(..)` included, use `registry` as well.
    fn visit_in<'o, O>(
        &self,
        registry: &Registry,
        obj: O,
        args: Self::Args<'o>,
    ) -> VisitResult<'o, Self>
    where
        O: Operand<'o, Base<Self::Hierarchy>>,
    {
        let _scope = registry.enter();
        visit_dispatch(self, registry, obj, args)
    }
}

impl<'o, V: Visitor> Callable<'o> for V {
    type Hierarchy = V::Hierarchy;
    type Args = V::Args<'o>;
    type Output = V::Output<'o>;
    type Error = V::Error;

    fn call<O>(&self, registry: &Registry, obj: O, args: V::Args<'o>) -> VisitResult<'o, V>
    where
        O: Operand<'o, Base<V::Hierarchy>>,
    {
        visit_dispatch(self, registry, obj, args)
    }
}

fn visit_dispatch<'o, V, O>(
    visitor: &V,
    registry: &Registry,
    obj: O,
    args: V::Args<'o>,
) -> VisitResult<'o, V>
where
    V: Visitor,
    O: Operand<'o, Base<V::Hierarchy>>,
{
    let key = TableKey::single::<V::Hierarchy>(HandlerId::Type(TypeId::of::<V>()), O::ACCESS);
    let table = registry.table(key, |config| build_visitor_table::<V>(O::ACCESS, config))?;

    let operand = obj.erase();
    let type_name = operand.type_name();
    match table.get(&operand.concrete_id()) {
        Some(thunk) => thunk
            .call(visitor, operand, args)
            .unwrap_or_else(|| Err(DispatchError::unhandled(type_name).into())),
        None => {
            trace!(
                handler = std::any::type_name::<V>(),
                type_name,
                "no dispatch table entry"
            );
            Err(DispatchError::unhandled(type_name).into())
        }
    }
}

fn build_visitor_table<V: Visitor>(
    access: Access,
    config: &RegistryConfig,
) -> Result<DispatchTable<TypeId, BoxedThunk<V>>, DispatchError> {
    let descriptor = <V::Hierarchy as Hierarchy>::descriptor()?;
    let mut cases = Cases::new();
    V::cases(&mut cases);

    let handler = short_type_name(std::any::type_name::<V>());
    let signatures: Vec<Signature> = cases.entries.iter().map(|e| vec![e.param]).collect();
    let set = CaseSet {
        handler: &handler,
        signatures: &signatures,
        policy: config.missing_case,
    };
    build_single(&set, descriptor, access, |index, concrete| {
        cases.entries.get(index).and_then(|entry| (entry.bind)(concrete))
    })
}

struct CaseEntry<V: Visitor> {
    param: Param,
    bind: Box<dyn Fn(&'static ConcreteType) -> Option<BoxedThunk<V>>>,
}

/// The case list of a [`Visitor`].
pub struct Cases<V: Visitor> {
    entries: Vec<CaseEntry<V>>,
}

impl<V: Visitor> Cases<V> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A case taking the operand by shared reference.
    pub fn on<T: ?Sized + 'static>(
        &mut self,
        case: for<'o> fn(&V, &'o T, V::Args<'o>) -> VisitResult<'o, V>,
    ) -> &mut Self {
        self.push(Param::shared::<T>(), move |concrete| {
            let upcast = concrete.upcast::<T>()?;
            Some(Box::new(SharedCase { upcast, case }) as BoxedThunk<V>)
        })
    }

    /// A case taking the operand by exclusive reference. Only reachable
    /// when the operand is passed as `&mut`.
    pub fn on_mut<T: ?Sized + 'static>(
        &mut self,
        case: for<'o> fn(&V, &'o mut T, V::Args<'o>) -> VisitResult<'o, V>,
    ) -> &mut Self {
        self.push(Param::exclusive::<T>(), move |concrete| {
            let upcast = concrete.upcast::<T>()?;
            Some(Box::new(ExclusiveCase { upcast, case }) as BoxedThunk<V>)
        })
    }

    /// A case on the base type: the fallback for every concrete type.
    pub fn otherwise(
        &mut self,
        case: for<'o> fn(&V, &'o Base<V::Hierarchy>, V::Args<'o>) -> VisitResult<'o, V>,
    ) -> &mut Self {
        self.on::<Base<V::Hierarchy>>(case)
    }

    pub fn otherwise_mut(
        &mut self,
        case: for<'o> fn(&V, &'o mut Base<V::Hierarchy>, V::Args<'o>) -> VisitResult<'o, V>,
    ) -> &mut Self {
        self.on_mut::<Base<V::Hierarchy>>(case)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(
        &mut self,
        param: Param,
        bind: impl Fn(&'static ConcreteType) -> Option<BoxedThunk<V>> + 'static,
    ) -> &mut Self {
        self.entries.push(CaseEntry {
            param,
            bind: Box::new(bind),
        });
        self
    }
}

impl<V: Visitor> fmt::Debug for Cases<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.param.target, e.param.access)))
            .finish()
    }
}

/// Entry point for single dispatch on hierarchy `H`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher<H>(PhantomData<fn() -> H>);

impl<H: Hierarchy> Dispatcher<H> {
    pub fn visit<'o, C, O>(callable: &C, obj: O) -> Result<C::Output, C::Error>
    where
        C: Callable<'o, Hierarchy = H, Args = ()>,
        O: Operand<'o, H::Base>,
    {
        Registry::with_current(|registry| callable.call(registry, obj, ()))
    }

    pub fn visit_with<'o, C, O>(callable: &C, obj: O, args: C::Args) -> Result<C::Output, C::Error>
    where
        C: Callable<'o, Hierarchy = H>,
        O: Operand<'o, H::Base>,
    {
        Registry::with_current(|registry| callable.call(registry, obj, args))
    }

    /// Dispatch through `registry`, which stays current for nested
    /// dispatches on this thread.
    pub fn visit_in<'o, C, O>(
        registry: &Registry,
        callable: &C,
        obj: O,
        args: C::Args,
    ) -> Result<C::Output, C::Error>
    where
        C: Callable<'o, Hierarchy = H>,
        O: Operand<'o, H::Base>,
    {
        let _scope = registry.enter();
        callable.call(registry, obj, args)
    }

    /// Start a match on `obj`; finish it with [`Match::with`].
    pub fn matching<'o, O>(obj: O) -> Match<'o, H, O>
    where
        O: Operand<'o, H::Base>,
    {
        Match {
            obj,
            _marker: PhantomData,
        }
    }
}

/// A pending single dispatch, see [`Dispatcher::matching`].
pub struct Match<'o, H, O> {
    obj: O,
    _marker: PhantomData<(fn() -> H, &'o ())>,
}

impl<'o, H: Hierarchy, O: Operand<'o, H::Base>> Match<'o, H, O> {
    /// Dispatch to `callable`, usually an [`Overload`](crate::Overload).
    pub fn with<C>(self, callable: C) -> Result<C::Output, C::Error>
    where
        C: Callable<'o, Hierarchy = H, Args = ()>,
    {
        let obj = self.obj;
        Registry::with_current(|registry| callable.call(registry, obj, ()))
    }

    pub fn with_in<C>(self, registry: &Registry, callable: C) -> Result<C::Output, C::Error>
    where
        C: Callable<'o, Hierarchy = H, Args = ()>,
    {
        let _scope = registry.enter();
        callable.call(registry, self.obj, ())
    }
}

impl<H, O> fmt::Debug for Match<'_, H, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("hierarchy", &std::any::type_name::<H>())
            .finish_non_exhaustive()
    }
}
