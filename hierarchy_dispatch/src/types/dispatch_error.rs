//! Error types for dispatch.

use thiserror::Error;

/// Error types for dispatch.
///
/// `UnhandledType` and `UnhandledTypePair` are raised per call; the other
/// variants are raised while a hierarchy or a dispatch table is built and are
/// reported again by every call that needs that table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The runtime type of the object is not a declared concrete type.
    #[error("unhandled type ({type_name})")]
    UnhandledType { type_name: &'static str },

    /// The runtime type pair is not a declared concrete pair.
    #[error("unhandled type ({first}, {second})")]
    UnhandledTypePair {
        first: &'static str,
        second: &'static str,
    },

    /// A hierarchy lists the same concrete type twice.
    #[error("malformed hierarchy {base}: concrete type {duplicate} is declared more than once")]
    MalformedHierarchy {
        base: &'static str,
        duplicate: &'static str,
    },

    /// No case of the handler accepts a declared concrete combination.
    #[error("no case of {handler} accepts ({})", .types.join(", "))]
    MissingCase {
        handler: String,
        types: Vec<&'static str>,
    },

    /// Several cases accept a combination with equal specificity.
    #[error("{}", format_ambiguous(.handler, .types, .candidates))]
    AmbiguousCase {
        handler: String,
        types: Vec<&'static str>,
        candidates: Vec<Vec<&'static str>>,
    },

    /// A registry slot holds a table of another type than the one requested.
    #[error("dispatch table has an unexpected type (expected {expected})")]
    TableTypeMismatch { expected: &'static str },
}

impl DispatchError {
    pub fn unhandled(type_name: &'static str) -> Self {
        DispatchError::UnhandledType { type_name }
    }

    pub fn unhandled_pair(first: &'static str, second: &'static str) -> Self {
        DispatchError::UnhandledTypePair { first, second }
    }

    /// True for the per-call variants.
    pub fn is_unhandled(&self) -> bool {
        matches!(
            self,
            DispatchError::UnhandledType { .. } | DispatchError::UnhandledTypePair { .. }
        )
    }
}

fn format_ambiguous(
    handler: &str,
    types: &[&'static str],
    candidates: &[Vec<&'static str>],
) -> String {
    let mut msg = format!(
        "{}({}) is ambiguous. Candidates:\n",
        handler,
        types.join(", ")
    );
    for sig in candidates {
        msg.push_str(&format!("  {}({})\n", handler, sig.join(", ")));
    }
    msg
}

/// Result type alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
