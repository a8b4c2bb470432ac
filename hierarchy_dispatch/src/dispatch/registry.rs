//! The registry: built dispatch tables, memoized per key.
//!
//! Each key maps to an init-once cell. The map shard lock is held only to
//! fetch or insert the cell, so a table build (which runs user code) never
//! blocks unrelated keys, and concurrent first uses of one key build it once.
//!
//! Dispatches without an explicit registry use the *current* one: the
//! innermost registry entered by a `visit_in`/`with_in` call on this thread,
//! or [`Registry::global`] outside of any.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use serde::Serialize;
use tracing::error;

use crate::types::DispatchError;

use super::resolve::Signature;
use super::{Access, RegistryConfig};

type Table = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Result<Table, DispatchError>>>;

/// Identity of the handler a table is built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HandlerId {
    /// A visitor type. It also fixes the extra argument and output types.
    Type(TypeId),
    /// An overload, identified by its ordered case signatures.
    Cases(Vec<Signature>),
}

/// The hierarchies dispatched on and the qualification of each operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Operands {
    Single(TypeId, Access),
    Double([TypeId; 2], [Access; 2]),
}

/// Everything a table depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TableKey {
    pub(crate) handler: HandlerId,
    pub(crate) operands: Operands,
}

impl TableKey {
    pub(crate) fn single<H: 'static>(handler: HandlerId, access: Access) -> Self {
        Self {
            handler,
            operands: Operands::Single(TypeId::of::<H>(), access),
        }
    }

    pub(crate) fn double<H1: 'static, H2: 'static>(handler: HandlerId, access: [Access; 2]) -> Self {
        Self {
            handler,
            operands: Operands::Double([TypeId::of::<H1>(), TypeId::of::<H2>()], access),
        }
    }
}

/// Counters describing a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Keys with a cached table (or a cached build failure).
    pub tables: usize,
    /// Table constructions performed so far.
    pub builds: usize,
}

/// Store of built dispatch tables.
///
/// A `Registry` is a handle: clones share the same tables. Dispatch goes
/// through [`Registry::global`] unless a private configuration or an
/// isolated cache is needed:
///
/// ```
/// use hierarchy_dispatch::{MissingCasePolicy, Registry, RegistryConfig};
///
/// let registry = Registry::with_config(RegistryConfig::new(MissingCasePolicy::Skip));
/// assert_eq!(registry.config().missing_case, MissingCasePolicy::Skip);
/// assert_eq!(registry.stats().builds, 0);
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<Tables>,
}

#[derive(Debug)]
struct Tables {
    id: u64,
    config: RegistryConfig,
    slots: DashMap<TableKey, Slot>,
    builds: AtomicUsize,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

static GLOBAL: Lazy<Registry> = Lazy::new(|| Registry::with_config(RegistryConfig::from_env()));

thread_local! {
    /// Registries entered on this thread, innermost last.
    static SCOPES: RefCell<Vec<Registry>> = const { RefCell::new(Vec::new()) };
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(Tables {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                config,
                slots: DashMap::new(),
                builds: AtomicUsize::new(0),
            }),
        }
    }

    /// The process-wide registry, configured from the environment on first
    /// use (see [`RegistryConfig::from_env`]).
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// The registry a dispatch without an explicit one uses on this thread.
    pub fn current() -> Registry {
        Self::with_current(Registry::clone)
    }

    pub(crate) fn with_current<R>(f: impl FnOnce(&Registry) -> R) -> R {
        // Cloned out so `f` may enter further registries.
        let entered = SCOPES.with(|scopes| scopes.borrow().last().cloned());
        match entered {
            Some(registry) => f(&registry),
            None => f(Registry::global()),
        }
    }

    /// Make this the current registry until the returned scope is dropped.
    pub(crate) fn enter(&self) -> Scope {
        SCOPES.with(|scopes| scopes.borrow_mut().push(self.clone()));
        Scope {
            _thread: PhantomData,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            tables: self.inner.slots.len(),
            builds: self.inner.builds.load(Ordering::Relaxed),
        }
    }

    /// Unique per registry for the life of the process; clones share it.
    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// The table for `key`, building it with `build` on first use.
    ///
    /// A failed build is cached as well and reported to every later caller.
    pub(crate) fn table<T, F>(&self, key: TableKey, build: F) -> Result<Arc<T>, DispatchError>
    where
        T: Any + Send + Sync,
        F: FnOnce(&RegistryConfig) -> Result<T, DispatchError>,
    {
        let slot = self.slot(key);
        let cached = slot.get_or_init(|| {
            self.inner.builds.fetch_add(1, Ordering::Relaxed);
            build(&self.inner.config).map(|table| Arc::new(table) as Table)
        });
        match cached {
            Ok(table) => Arc::clone(table).downcast::<T>().map_err(|_| {
                let expected = std::any::type_name::<T>();
                error!(expected, "cached dispatch table has an unexpected type");
                DispatchError::TableTypeMismatch { expected }
            }),
            Err(err) => Err(err.clone()),
        }
    }

    fn slot(&self, key: TableKey) -> Slot {
        if let Some(slot) = self.inner.slots.get(&key) {
            return Arc::clone(slot.value());
        }
        let slot = self.inner.slots.entry(key).or_default();
        Arc::clone(slot.value())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`Registry::enter`].
#[derive(Debug)]
pub(crate) struct Scope {
    // Pops this thread's stack, so it must stay on this thread.
    _thread: PhantomData<*const ()>,
}

impl Drop for Scope {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MissingCasePolicy;
    use std::sync::Barrier;
    use std::thread;

    fn key<H: 'static>() -> TableKey {
        TableKey::single::<H>(HandlerId::Type(TypeId::of::<u8>()), Access::Shared)
    }

    #[test]
    fn test_table_built_once_per_key() {
        let registry = Registry::new();
        let first = registry.table(key::<()>(), |_| Ok(vec![1, 2, 3])).unwrap();
        let second = registry
            .table(key::<()>(), |_| -> Result<Vec<i32>, DispatchError> {
                panic!("table rebuilt")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.stats(), RegistryStats { tables: 1, builds: 1 });

        registry.table(key::<u32>(), |_| Ok(vec![4])).unwrap();
        assert_eq!(registry.stats(), RegistryStats { tables: 2, builds: 2 });
    }

    #[test]
    fn test_keys_differ_by_access_and_arity() {
        let handler = HandlerId::Type(TypeId::of::<u8>());
        let shared = TableKey::single::<u16>(handler.clone(), Access::Shared);
        let exclusive = TableKey::single::<u16>(handler.clone(), Access::Exclusive);
        let pair = TableKey::double::<u16, u16>(handler.clone(), [Access::Shared; 2]);
        let swapped = TableKey::double::<u16, u32>(handler.clone(), [Access::Shared; 2]);
        let reversed = TableKey::double::<u32, u16>(handler, [Access::Shared; 2]);
        assert_ne!(shared, exclusive);
        assert_ne!(shared, pair);
        assert_ne!(swapped, reversed);
    }

    #[test]
    fn test_build_failure_is_memoized() {
        let registry = Registry::new();
        let err = registry
            .table(key::<()>(), |_| -> Result<Vec<i32>, DispatchError> {
                Err(DispatchError::unhandled("Nothing"))
            })
            .unwrap_err();
        let again = registry.table(key::<()>(), |_| Ok(vec![1])).unwrap_err();
        assert_eq!(err, again);
        assert_eq!(registry.stats().builds, 1);
    }

    #[test]
    fn test_table_of_another_type_is_an_error() {
        let registry = Registry::new();
        registry.table(key::<()>(), |_| Ok(vec![1_u8])).unwrap();
        let err = registry
            .table(key::<()>(), |_| Ok(String::from("other")))
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::TableTypeMismatch {
                expected: std::any::type_name::<String>()
            }
        );
        assert_eq!(registry.stats().builds, 1);
    }

    #[test]
    fn test_build_sees_registry_config() {
        let registry = Registry::with_config(RegistryConfig::new(MissingCasePolicy::Skip));
        let policy = registry
            .table(key::<()>(), |config| Ok(config.missing_case))
            .unwrap();
        assert_eq!(*policy, MissingCasePolicy::Skip);
    }

    #[test]
    fn test_clones_share_tables() {
        let registry = Registry::new();
        let handle = registry.clone();
        handle.table(key::<()>(), |_| Ok(1_u8)).unwrap();
        assert_eq!(registry.stats().builds, 1);
        assert_eq!(registry.id(), handle.id());
        assert_ne!(registry.id(), Registry::new().id());
    }

    #[test]
    fn test_entered_registry_is_current_until_scope_ends() {
        let outer = Registry::new();
        let inner = Registry::new();
        assert_eq!(Registry::current().id(), Registry::global().id());
        {
            let _outer = outer.enter();
            assert_eq!(Registry::current().id(), outer.id());
            {
                let _inner = inner.enter();
                assert_eq!(Registry::current().id(), inner.id());
            }
            assert_eq!(Registry::current().id(), outer.id());
        }
        assert_eq!(Registry::current().id(), Registry::global().id());
    }

    #[test]
    fn test_scopes_are_per_thread() {
        let registry = Registry::new();
        let _scope = registry.enter();
        let seen = thread::spawn(|| Registry::current().id()).join().unwrap();
        assert_eq!(seen, Registry::global().id());
        assert_eq!(Registry::current().id(), registry.id());
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let registry = Registry::new();
        let barrier = Barrier::new(8);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    let table = registry
                        .table(key::<()>(), |_| {
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(42_u64)
                        })
                        .unwrap();
                    assert_eq!(*table, 42);
                });
            }
        });
        assert_eq!(registry.stats(), RegistryStats { tables: 1, builds: 1 });
    }

    #[test]
    fn test_stats_serialize() {
        let stats = RegistryStats { tables: 3, builds: 4 };
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            serde_json::json!({ "tables": 3, "builds": 4 })
        );
    }
}
