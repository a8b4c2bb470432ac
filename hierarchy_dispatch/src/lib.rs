//! Runtime multiple dispatch over closed trait-object hierarchies.
//!
//! A hierarchy is a base trait plus the complete list of its concrete types,
//! declared once with [`hierarchy!`]. Handlers are either [`Visitor`] /
//! [`BiVisitor`] types, whose cases are plain functions, or ad hoc
//! [`Overload`] / [`Overload2`] sets of closures. Every call reads the runtime
//! type of its operands and jumps through a table built on first use:
//!
//! - the most specific applicable case wins, following the lineage declared
//!   for each concrete type (self, intermediate ancestors, base)
//! - `&mut` operands reach both `&` and `&mut` cases, `&` operands only `&`
//!   cases
//! - a concrete type no case accepts, or accepts ambiguously, fails the table
//!   build with [`DispatchError::MissingCase`] or
//!   [`DispatchError::AmbiguousCase`]
//!
//! Extra arguments may borrow from the caller and results may borrow from the
//! dispatched object: visitors declare `Args<'o>` and `Output<'o>`, overloads
//! returning references use [`OverloadRef`] / [`Overload2Ref`].
//!
//! Tables live in a [`Registry`]. A dispatch without an explicit one uses
//! [`Registry::current`]: the registry entered by the enclosing `visit_in` /
//! `with_in` on this thread, else [`Registry::global`].

// Library code reports failures through DispatchError, never by panicking.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod dispatch;
pub mod hierarchy;
mod overload;
pub mod types;

pub use dispatch::{
    Access, BiCases, BiVisitResult, BiVisitor, Callable, Callable2, Cases, ConfigError,
    DispatchTable, Dispatcher, Dispatcher2, Erased, Match, Match2, MissingCasePolicy, Operand,
    Registry, RegistryConfig, RegistryStats, VisitResult, Visitor,
};
pub use hierarchy::{
    Base, ConcreteBuilder, ConcreteType, Hierarchy, HierarchyBuilder, HierarchyDescriptor,
    HierarchySummary,
};
pub use overload::{
    Borrowed, Overload, Overload2, Overload2Ref, OverloadRef, OverloadSet, OverloadSet2, Owned,
    Returns,
};
pub use types::{DispatchError, DispatchResult, Dynamic, TypeSeq, TypeTag};

/// Everything needed to declare a hierarchy and dispatch on it.
///
/// # Example
/// ```
/// use hierarchy_dispatch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::hierarchy;
    pub use crate::{
        BiCases, BiVisitResult, BiVisitor, Cases, DispatchError, Dispatcher, Dispatcher2,
        Dynamic, Hierarchy, Overload, Overload2, Overload2Ref, OverloadRef, VisitResult, Visitor,
    };
}
