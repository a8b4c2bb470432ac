//! Type identity, type sequences and the dispatch error taxonomy.
//!
//! # Module Organization
//!
//! - `type_tag.rs`: TypeTag (runtime identity) and the Dynamic trait
//! - `type_seq.rs`: TypeSeq, the finite-sequence algebra (product, uniqueness, ...)
//! - `dispatch_error.rs`: DispatchError for declaration and dispatch failures

mod dispatch_error;
mod type_seq;
mod type_tag;


pub use dispatch_error::{DispatchError, DispatchResult};
pub use type_seq::TypeSeq;
pub use type_tag::{short_type_name, Dynamic, TypeTag};
