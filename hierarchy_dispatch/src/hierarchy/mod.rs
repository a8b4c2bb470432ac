//! Closed hierarchies: a base trait plus the fixed list of concrete types
//! that implement it.
//!
//! # Module Organization
//!
//! - `mod.rs`: Hierarchy, HierarchyDescriptor and their builders
//! - `narrow.rs`: type-erased narrowing along a concrete type's lineage
//! - `macros.rs`: the `hierarchy!` declaration macro
//!
//! A concrete type's *lineage* lists every type an object of that type can be
//! viewed as: the concrete type itself at depth 0, then the intermediate
//! ancestors declared for it (most derived first), then the base last.
//! Dispatch resolution prefers the case whose parameter type sits at the
//! smallest depth.

mod macros;
mod narrow;

#[cfg(test)]
mod tests;

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use crate::types::{DispatchError, Dynamic, TypeSeq, TypeTag};

pub(crate) use narrow::ErasedUpcast;
use narrow::{identity, identity_mut, LineageStep};

/// A closed polymorphic hierarchy.
///
/// Implemented by the marker types that [`hierarchy!`](crate::hierarchy!)
/// declares. The descriptor is built on first use and lives for the rest of
/// the process; a malformed declaration is reported on every call.
pub trait Hierarchy: 'static {
    /// The base trait object type, e.g. `dyn Shape`.
    type Base: ?Sized + Dynamic;

    fn descriptor() -> Result<&'static HierarchyDescriptor, DispatchError>;
}

/// Base type of a hierarchy.
pub type Base<H> = <H as Hierarchy>::Base;

/// Runtime description of a closed hierarchy.
#[derive(Debug)]
pub struct HierarchyDescriptor {
    base: TypeTag,
    concretes: Vec<ConcreteType>,
}

impl HierarchyDescriptor {
    pub fn builder<B: ?Sized + 'static>() -> HierarchyBuilder<B> {
        HierarchyBuilder {
            concretes: Vec::new(),
            _base: PhantomData,
        }
    }

    pub fn base(&self) -> TypeTag {
        self.base
    }

    /// Concrete types in declaration order.
    pub fn concretes(&self) -> &[ConcreteType] {
        &self.concretes
    }

    pub fn concrete_tags(&self) -> TypeSeq {
        self.concretes.iter().map(ConcreteType::tag).collect()
    }

    pub fn len(&self) -> usize {
        self.concretes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concretes.is_empty()
    }

    /// The concrete type with the given runtime identity.
    pub fn find(&self, id: TypeId) -> Option<&ConcreteType> {
        self.concretes.iter().find(|c| c.tag.id() == id)
    }

    pub fn summary(&self) -> HierarchySummary {
        HierarchySummary {
            base: self.base,
            concretes: self.concrete_tags(),
        }
    }
}

/// Serializable view of a descriptor, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchySummary {
    pub base: TypeTag,
    pub concretes: TypeSeq,
}

/// One concrete type of a hierarchy together with its lineage.
pub struct ConcreteType {
    tag: TypeTag,
    lineage: Vec<LineageStep>,
}

impl ConcreteType {
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The lineage as tags: the concrete type first and the base last.
    pub fn lineage(&self) -> TypeSeq {
        self.lineage.iter().map(LineageStep::target).collect()
    }

    /// Position of `target` in the lineage, if the concrete type can be
    /// narrowed to it.
    pub fn depth_of(&self, target: &TypeTag) -> Option<usize> {
        self.lineage.iter().position(|step| step.target() == *target)
    }

    /// View an erased object of this concrete type as `&T`.
    ///
    /// `None` when `T` is not in the lineage or `any` holds another type.
    pub fn narrow<'a, T: ?Sized + 'static>(&self, any: &'a dyn Any) -> Option<&'a T> {
        self.upcast::<T>()?.narrow(any)
    }

    pub fn narrow_mut<'a, T: ?Sized + 'static>(&self, any: &'a mut dyn Any) -> Option<&'a mut T> {
        self.upcast::<T>()?.narrow_mut(any)
    }

    pub(crate) fn upcast<T: ?Sized + 'static>(&self) -> Option<&dyn ErasedUpcast<T>> {
        let target = TypeTag::of::<T>();
        self.lineage
            .iter()
            .find(|step| step.target() == target)
            .and_then(LineageStep::upcast::<T>)
    }
}

impl fmt::Debug for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteType")
            .field("tag", &self.tag)
            .field("lineage", &self.lineage)
            .finish()
    }
}

/// Collects the concrete types of a hierarchy with base `B`.
pub struct HierarchyBuilder<B: ?Sized> {
    concretes: Vec<ConcreteType>,
    _base: PhantomData<fn() -> Box<B>>,
}

impl<B: ?Sized + 'static> HierarchyBuilder<B> {
    pub fn concrete<C: 'static>(mut self, concrete: ConcreteBuilder<C, B>) -> Self {
        self.concretes.push(concrete.finish());
        self
    }

    /// Finish the descriptor, rejecting a concrete type listed twice.
    pub fn build(self) -> Result<HierarchyDescriptor, DispatchError> {
        let base = TypeTag::of::<B>();
        let tags: TypeSeq = self.concretes.iter().map(ConcreteType::tag).collect();
        if let Some(duplicate) = tags.first_duplicate() {
            return Err(DispatchError::MalformedHierarchy {
                base: base.name(),
                duplicate: duplicate.name(),
            });
        }
        Ok(HierarchyDescriptor {
            base,
            concretes: self.concretes,
        })
    }
}

impl<B: ?Sized> fmt::Debug for HierarchyBuilder<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchyBuilder")
            .field("concretes", &self.concretes)
            .finish()
    }
}

/// Lineage of one concrete type `C` of a hierarchy with base `B`.
///
/// The coercions are plain function pointers; `|c| c` is enough at every
/// step because the compiler inserts the unsizing coercion:
///
/// ```
/// use hierarchy_dispatch::{ConcreteBuilder, HierarchyDescriptor};
///
/// trait Node: hierarchy_dispatch::Dynamic {}
/// trait Binary: Node {}
/// struct Add;
/// impl Node for Add {}
/// impl Binary for Add {}
///
/// let descriptor = HierarchyDescriptor::builder::<dyn Node>()
///     .concrete(ConcreteBuilder::<Add, dyn Node>::new(|c| c, |c| c).ancestor::<dyn Binary>(|c| c, |c| c))
///     .build()
///     .unwrap();
/// let add = &descriptor.concretes()[0];
/// let names: Vec<String> = add.lineage().iter().map(|t| t.short_name()).collect();
/// assert_eq!(names, ["Add", "dyn Binary", "dyn Node"]);
/// ```
pub struct ConcreteBuilder<C, B: ?Sized> {
    ancestors: Vec<LineageStep>,
    base: LineageStep,
    _marker: PhantomData<fn(&C) -> &B>,
}

impl<C: 'static, B: ?Sized + 'static> ConcreteBuilder<C, B> {
    /// Start a lineage with the coercion from `C` to the base.
    pub fn new(shared: fn(&C) -> &B, exclusive: fn(&mut C) -> &mut B) -> Self {
        Self {
            ancestors: Vec::new(),
            base: LineageStep::new(shared, exclusive),
            _marker: PhantomData,
        }
    }

    /// Declare an intermediate ancestor. Call in most-derived-first order.
    pub fn ancestor<T: ?Sized + 'static>(
        mut self,
        shared: fn(&C) -> &T,
        exclusive: fn(&mut C) -> &mut T,
    ) -> Self {
        self.ancestors.push(LineageStep::new(shared, exclusive));
        self
    }

    fn finish(self) -> ConcreteType {
        let mut lineage = Vec::with_capacity(self.ancestors.len() + 2);
        lineage.push(LineageStep::new::<C, C>(identity, identity_mut));
        lineage.extend(self.ancestors);
        lineage.push(self.base);
        ConcreteType {
            tag: TypeTag::of::<C>(),
            lineage,
        }
    }
}

impl<C, B: ?Sized> fmt::Debug for ConcreteBuilder<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteBuilder")
            .field("ancestors", &self.ancestors)
            .field("base", &self.base)
            .finish()
    }
}
