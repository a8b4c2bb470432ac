//! Table-driven single and double dispatch.
//!
//! # Module Organization
//!
//! - `mod.rs`: operand qualification (Access, Operand, Erased)
//! - `resolve.rs`: specificity ranking of case signatures
//! - `table.rs`: DispatchTable and the single/double table builders
//! - `config.rs`: RegistryConfig and the missing-case policy
//! - `registry.rs`: Registry, the memoizing store of built tables
//! - `single.rs`: Visitor, Cases, Dispatcher and Match (one operand)
//! - `double.rs`: BiVisitor, BiCases, Dispatcher2 and Match2 (two operands)
//!
//! A call erases its operands to `dyn Any`, reads their runtime `TypeId`s and
//! looks the key up in a table built for the callable, the hierarchies and the
//! qualification of the operands. Tables are built on first use and kept by
//! the [`Registry`].

mod config;
mod double;
pub(crate) mod registry;
pub(crate) mod resolve;
mod single;
pub(crate) mod table;

use std::any::{Any, TypeId};

use serde::Serialize;

use crate::hierarchy::ErasedUpcast;
use crate::types::Dynamic;

pub use config::{ConfigError, MissingCasePolicy, RegistryConfig};
pub use double::{BiCases, BiVisitResult, BiVisitor, Callable2, Dispatcher2, Match2};
pub use registry::{Registry, RegistryStats};
pub use single::{Callable, Cases, Dispatcher, Match, VisitResult, Visitor};
pub use table::DispatchTable;

/// How a case, or an operand, accesses the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// `&T`
    Shared,
    /// `&mut T`
    Exclusive,
}

impl Access {
    /// Position of a qualification pattern among the tables of one handler.
    pub(crate) fn index(self) -> usize {
        match self {
            Access::Shared => 0,
            Access::Exclusive => 1,
        }
    }
}

/// A reference to a hierarchy member, as passed to a dispatcher.
///
/// `&B` dispatches through the shared tables and `&mut B` through the
/// exclusive ones, so the qualification is picked at the call site.
pub trait Operand<'a, B: ?Sized> {
    const ACCESS: Access;

    fn erase(self) -> Erased<'a>;
}

impl<'a, B: ?Sized + Dynamic> Operand<'a, B> for &'a B {
    const ACCESS: Access = Access::Shared;

    fn erase(self) -> Erased<'a> {
        Erased {
            type_name: <B as Dynamic>::type_name(self),
            object: ErasedRef::Shared(<B as Dynamic>::as_any(self)),
        }
    }
}

impl<'a, B: ?Sized + Dynamic> Operand<'a, B> for &'a mut B {
    const ACCESS: Access = Access::Exclusive;

    fn erase(self) -> Erased<'a> {
        Erased {
            type_name: <B as Dynamic>::type_name(self),
            object: ErasedRef::Exclusive(<B as Dynamic>::as_any_mut(self)),
        }
    }
}

/// An operand with its static type erased.
#[derive(Debug)]
pub struct Erased<'a> {
    type_name: &'static str,
    object: ErasedRef<'a>,
}

#[derive(Debug)]
enum ErasedRef<'a> {
    Shared(&'a dyn Any),
    Exclusive(&'a mut dyn Any),
}

impl<'a> Erased<'a> {
    pub fn access(&self) -> Access {
        match self.object {
            ErasedRef::Shared(_) => Access::Shared,
            ErasedRef::Exclusive(_) => Access::Exclusive,
        }
    }

    /// `TypeId` of the concrete object.
    pub fn concrete_id(&self) -> TypeId {
        match &self.object {
            ErasedRef::Shared(any) => (**any).type_id(),
            ErasedRef::Exclusive(any) => (**any).type_id(),
        }
    }

    /// Name of the concrete object's type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn narrow<T: ?Sized>(self, upcast: &dyn ErasedUpcast<T>) -> Option<&'a T> {
        match self.object {
            ErasedRef::Shared(any) => upcast.narrow(any),
            ErasedRef::Exclusive(any) => upcast.narrow(any),
        }
    }

    pub(crate) fn narrow_mut<T: ?Sized>(self, upcast: &dyn ErasedUpcast<T>) -> Option<&'a mut T> {
        match self.object {
            ErasedRef::Shared(_) => None,
            ErasedRef::Exclusive(any) => upcast.narrow_mut(any),
        }
    }
}
