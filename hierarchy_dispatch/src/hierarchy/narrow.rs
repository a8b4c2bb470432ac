//! Type-erased narrowing from a concrete object to one of its lineage types.

use std::any::Any;
use std::fmt;

use crate::types::TypeTag;

/// Narrowing of an erased object to `&T` / `&mut T`.
///
/// Implemented by [`Upcast`] for one concrete type; the descriptor stores it
/// behind `dyn Any` so lookups stay keyed by the target type alone.
pub(crate) trait ErasedUpcast<T: ?Sized>: Send + Sync {
    fn narrow<'a>(&self, any: &'a dyn Any) -> Option<&'a T>;
    fn narrow_mut<'a>(&self, any: &'a mut dyn Any) -> Option<&'a mut T>;
}

/// Coercions from the concrete type `C` to the lineage type `T`.
pub(crate) struct Upcast<C, T: ?Sized> {
    shared: fn(&C) -> &T,
    exclusive: fn(&mut C) -> &mut T,
}

impl<C: 'static, T: ?Sized + 'static> ErasedUpcast<T> for Upcast<C, T> {
    fn narrow<'a>(&self, any: &'a dyn Any) -> Option<&'a T> {
        any.downcast_ref::<C>().map(self.shared)
    }

    fn narrow_mut<'a>(&self, any: &'a mut dyn Any) -> Option<&'a mut T> {
        any.downcast_mut::<C>().map(self.exclusive)
    }
}

/// One entry of a concrete type's lineage.
pub(crate) struct LineageStep {
    target: TypeTag,
    // Box<dyn ErasedUpcast<T>> for `target`
    upcast: Box<dyn Any + Send + Sync>,
}

impl LineageStep {
    pub(crate) fn new<C: 'static, T: ?Sized + 'static>(
        shared: fn(&C) -> &T,
        exclusive: fn(&mut C) -> &mut T,
    ) -> Self {
        let upcast: Box<dyn ErasedUpcast<T>> = Box::new(Upcast { shared, exclusive });
        Self {
            target: TypeTag::of::<T>(),
            upcast: Box::new(upcast),
        }
    }

    pub(crate) fn target(&self) -> TypeTag {
        self.target
    }

    pub(crate) fn upcast<T: ?Sized + 'static>(&self) -> Option<&dyn ErasedUpcast<T>> {
        self.upcast
            .downcast_ref::<Box<dyn ErasedUpcast<T>>>()
            .map(|upcast| upcast.as_ref())
    }
}

impl fmt::Debug for LineageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineageStep({})", self.target.short_name())
    }
}

pub(crate) fn identity<C>(c: &C) -> &C {
    c
}

pub(crate) fn identity_mut<C>(c: &mut C) -> &mut C {
    c
}
