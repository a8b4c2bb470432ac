//! The `hierarchy!` declaration macro.

/// Declare a closed hierarchy.
///
/// Expands to a unit marker struct implementing
/// [`Hierarchy`](crate::Hierarchy). Each entry names a concrete type;
/// intermediate ancestors of an entry follow it in brackets, most derived
/// first. The descriptor is built once, on first use.
///
/// # Example
/// ```
/// use hierarchy_dispatch::{hierarchy, Dynamic, Hierarchy};
///
/// trait Expr: Dynamic {}
/// trait Binary: Expr {}
///
/// struct Num(i64);
/// struct Add(Box<dyn Expr>, Box<dyn Expr>);
/// impl Expr for Num {}
/// impl Expr for Add {}
/// impl Binary for Add {}
///
/// hierarchy! {
///     /// Arithmetic expressions.
///     struct ExprHierarchy: dyn Expr {
///         Num,
///         Add: [dyn Binary],
///     }
/// }
///
/// let descriptor = ExprHierarchy::descriptor().unwrap();
/// assert_eq!(descriptor.len(), 2);
/// assert_eq!(descriptor.concretes()[1].lineage().len(), 3);
/// ```
#[macro_export]
macro_rules! hierarchy {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $base:ty {
            $($concrete:ty $(: [$($ancestor:ty),+ $(,)?])?),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::Hierarchy for $name {
            type Base = $base;

            fn descriptor() -> ::core::result::Result<
                &'static $crate::HierarchyDescriptor,
                $crate::DispatchError,
            > {
                static DESCRIPTOR: ::std::sync::OnceLock<
                    ::core::result::Result<$crate::HierarchyDescriptor, $crate::DispatchError>,
                > = ::std::sync::OnceLock::new();
                DESCRIPTOR
                    .get_or_init(|| {
                        $crate::HierarchyDescriptor::builder::<$base>()
                            $(
                                .concrete(
                                    $crate::ConcreteBuilder::<$concrete, $base>::new(|c| c, |c| c)
                                        $($(.ancestor::<$ancestor>(|c| c, |c| c))+)?
                                )
                            )+
                            .build()
                    })
                    .as_ref()
                    .map_err(::core::clone::Clone::clone)
            }
        }
    };
}
