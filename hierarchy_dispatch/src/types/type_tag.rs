//! Runtime type identity for dispatch keys.
//!
//! `TypeTag` pairs a `TypeId` with the compiler's name for the type. Only the
//! `TypeId` takes part in equality and hashing; the name is for diagnostics.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// Identity of one Rust type, usable as a table key.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag for `T`. Trait objects are fine: `TypeTag::of::<dyn Shape>()`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified name as reported by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name with module paths stripped (`app::shapes::Square` -> `Square`).
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.short_name())
    }
}

/// Strip module paths from every path segment of a type name, keeping
/// generic arguments and `dyn` prefixes intact.
///
/// ```
/// use hierarchy_dispatch::types::short_type_name;
///
/// assert_eq!(short_type_name("app::shapes::Square"), "Square");
/// assert_eq!(short_type_name("dyn app::shapes::Shape"), "dyn Shape");
/// assert_eq!(short_type_name("alloc::vec::Vec<app::Node>"), "Vec<Node>");
/// ```
pub fn short_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segment = String::new();
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            segment.push(ch);
        } else {
            push_last_segment(&mut out, &segment);
            segment.clear();
            out.push(ch);
        }
    }
    push_last_segment(&mut out, &segment);
    out
}

fn push_last_segment(out: &mut String, path: &str) {
    out.push_str(path.rsplit("::").next().unwrap_or(path));
}

/// Runtime type information for the object behind a trait object.
///
/// Blanket-implemented for every `'static` type. A hierarchy's base trait
/// declares it as a supertrait so `&dyn Base` can report and expose its
/// concrete type:
///
/// ```
/// use hierarchy_dispatch::Dynamic;
///
/// trait Shape: Dynamic {}
/// struct Square;
/// impl Shape for Square {}
///
/// let shape: &dyn Shape = &Square;
/// assert!(shape.as_any().is::<Square>());
/// assert!(shape.type_name().ends_with("Square"));
/// ```
pub trait Dynamic: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> Dynamic for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}
