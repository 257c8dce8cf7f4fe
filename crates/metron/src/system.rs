//! Resolver construction and the process-wide unit system.
//!
//! [`UnitResolver`] couples the generic expression engine (with the unit
//! operator set registered) to a frozen [`Dictionary`]; it resolves
//! expressions without caching. [`UnitSystem`] adds the concurrent
//! expression cache and is the normal public entry point. A process-wide
//! active system exists as a single atomically swappable container so
//! reconfiguration presents a consistent view; the free functions at the
//! bottom of this module operate on it.

use std::{
    cell::RefCell,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;

use crate::{
    cache::ExpressionCache,
    config::{UnitConfig, default_config},
    dictionary::Dictionary,
    error::UnitResult,
    resolve::{Arity, ExpressionResolver, Scratch},
    units::{Unit, UnitAlgebra, UnitInfo},
};

thread_local! {
    /// Per-thread scratch for unit resolution; reset by the engine after
    /// every call.
    static SCRATCH: RefCell<Scratch<UnitInfo>> = RefCell::new(Scratch::new());
}

/// An immutable unit resolver: the expression engine plus the frozen
/// dictionary built from one configuration.
///
/// `resolve` performs no caching; it is what dictionary construction runs
/// on, and what callers managing their own memoisation want. Most callers
/// want [`UnitSystem`] instead.
#[derive(Debug)]
pub struct UnitResolver {
    engine: ExpressionResolver,
    dictionary: Dictionary,
}

impl UnitResolver {
    pub fn from_config(config: &UnitConfig) -> UnitResult<Self> {
        config.validate()?;
        let engine = unit_engine()?;
        let dictionary = Dictionary::build(&engine, config)?;
        Ok(Self { engine, dictionary })
    }

    /// Resolves an expression to its canonical form, reusing this thread's
    /// scratch stacks.
    pub fn resolve(&self, expression: &str) -> UnitResult<UnitInfo> {
        let algebra = UnitAlgebra::new(&self.dictionary);
        SCRATCH.with(|cell| match cell.try_borrow_mut() {
            Ok(mut scratch) => self.engine.resolve_with(&algebra, expression, &mut scratch),
            // Re-entrant call on this thread: fall back to fresh stacks.
            Err(_) => self.engine.resolve(&algebra, expression),
        })
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }
}

/// The unit operator set: unary sign, exponentiation above scaling above
/// addition, and `pow` as the function spelling of `^`.
fn unit_engine() -> UnitResult<ExpressionResolver> {
    let mut engine = ExpressionResolver::new();
    engine.add_unary('+')?;
    engine.add_unary('-')?;
    engine.add_binary('^', 4, true)?;
    engine.add_binary('*', 3, false)?;
    engine.add_binary('/', 3, false)?;
    engine.add_binary('+', 2, false)?;
    engine.add_binary('-', 2, false)?;
    engine.add_function("pow", Arity::Exact(2))?;
    Ok(engine)
}

/// A resolver paired with its expression cache.
pub struct UnitSystem {
    resolver: UnitResolver,
    cache: ExpressionCache,
}

impl UnitSystem {
    pub fn from_config(config: &UnitConfig) -> UnitResult<Self> {
        let resolver = UnitResolver::from_config(config)?;
        let cache = ExpressionCache::new(
            config.sliding_expiration(),
            config.high_memory_pressure_threshold,
            config.high_memory_pressure_clear_percentage,
        );
        Ok(Self { resolver, cache })
    }

    /// Builds a system from the embedded default catalog.
    pub fn with_defaults() -> Self {
        // The embedded catalog is validated by the test suite; failing to
        // build from it is a packaging bug.
        Self::from_config(default_config()).expect("embedded default unit catalog must build")
    }

    /// Resolves `text` through the cache; the normal entry point.
    pub fn unit(&self, text: &str) -> UnitResult<Unit> {
        self.cache.lookup_or_resolve(text, |expression| self.resolver.resolve(expression))
    }

    pub fn resolver(&self) -> &UnitResolver {
        &self.resolver
    }

    /// One expiration pass over the cache, to be invoked by the host's
    /// periodic memory-pressure collaborator. Never fails.
    pub fn on_expiration_tick(&self, memory_pressure_percent: u8) {
        self.cache.expiration_tick(memory_pressure_percent);
    }

    /// Number of currently cached expressions.
    pub fn cached_expressions(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

static ACTIVE: LazyLock<RwLock<Arc<UnitSystem>>> = LazyLock::new(|| RwLock::new(Arc::new(UnitSystem::with_defaults())));

/// The currently configured process-wide system.
///
/// The returned handle stays valid across a concurrent [`configure`]; it
/// simply keeps resolving against the configuration it was taken under.
pub fn active() -> Arc<UnitSystem> {
    ACTIVE.read().clone()
}

/// Atomically replaces the active resolver and cache.
pub fn configure(config: &UnitConfig) -> UnitResult<()> {
    let system = Arc::new(UnitSystem::from_config(config)?);
    *ACTIVE.write() = system;
    log::debug!("unit system reconfigured; expression cache cleared");
    Ok(())
}

/// Resolves `text` against the active system's cache.
pub fn unit(text: &str) -> UnitResult<Unit> {
    active().unit(text)
}

/// Drives one expiration pass on the active system's cache.
pub fn on_expiration_tick(memory_pressure_percent: u8) {
    active().on_expiration_tick(memory_pressure_percent);
}
