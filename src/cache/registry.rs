//! Type Registry Module
//!
//! Maps declared type names back to concrete decoders. Types are registered
//! explicitly by the application; decoders are built lazily on first lookup
//! and kept for the life of the registry.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Decodes value text into the registered concrete type.
pub type Decoder = Arc<dyn Fn(&str) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

fn build_decoder<T>() -> Decoder
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    Arc::new(|text: &str| {
        let value: T = serde_json::from_str(text)?;
        Ok(Box::new(value) as Box<dyn Any + Send + Sync>)
    })
}

// == Type Name Guard ==
/// Rejects type names that cannot be resolved back on read.
///
/// Tuples, arrays, slices, references and closures have no stable name a
/// reader could register, so they are refused before anything is written.
/// Named types declared inside a closure or async body carry a
/// `{{closure}}` path segment but are still nameable.
pub fn validate_type_name(name: &str) -> Result<()> {
    let unnameable = name.is_empty()
        || name.starts_with('(')
        || name.starts_with('[')
        || name.starts_with('&')
        || name.ends_with("{{closure}}");

    if unnameable {
        return Err(CacheError::UnnameableType(name.to_string()));
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct Registration {
    type_id: TypeId,
    build: fn() -> Decoder,
}

// == Type Registry ==
/// Registry of cacheable types keyed by stable type name.
///
/// Share one registry through `Arc` between every store that reads the same
/// records.
#[derive(Default)]
pub struct TypeRegistry {
    /// Registered name -> decoder factory
    registrations: DashMap<String, Registration>,
    /// Concrete type -> registered name, used at write time
    names: DashMap<TypeId, String>,
    /// Resolved decoders, append-only
    decoders: DashMap<String, Decoder>,
    /// Number of decoder builds performed
    resolutions: AtomicU64,
}

impl TypeRegistry {
    // == Constructor ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Registers `T` under `name`.
    ///
    /// Registering the same type under the same name again is a no-op.
    /// Binding a name already taken by another type is rejected.
    pub fn register<T>(&self, name: &str) -> Result<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        validate_type_name(name)?;
        let type_id = TypeId::of::<T>();

        match self.registrations.entry(name.to_string()) {
            Entry::Occupied(existing) if existing.get().type_id == type_id => return Ok(()),
            Entry::Occupied(_) => {
                return Err(CacheError::InvalidRequest(format!(
                    "Type name already registered for another type: {}",
                    name
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration {
                    type_id,
                    build: build_decoder::<T>,
                });
            }
        }

        self.names.entry(type_id).or_insert_with(|| name.to_string());
        debug!(type_name = name, "registered cacheable type");
        Ok(())
    }

    /// Registers `T` under its compiler-provided type name.
    pub fn register_default<T>(&self) -> Result<()>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.register::<T>(std::any::type_name::<T>())
    }

    // == Declared Name ==
    /// Name recorded in the entry state when a `T` is written.
    pub fn declared_name<T: 'static>(&self) -> String {
        self.names
            .get(&TypeId::of::<T>())
            .map(|name| name.value().clone())
            .unwrap_or_else(|| std::any::type_name::<T>().to_string())
    }

    // == Resolve ==
    /// Returns the decoder for `type_name`, building it on first use.
    ///
    /// Concurrent first lookups of the same name keep a single decoder.
    pub fn resolve(&self, type_name: &str) -> Result<Decoder> {
        if let Some(decoder) = self.decoders.get(type_name) {
            return Ok(decoder.value().clone());
        }

        let build = match self.registrations.get(type_name) {
            Some(registration) => registration.build,
            None => {
                warn!(type_name, "cached type is not registered");
                return Err(CacheError::TypeNotFound(type_name.to_string()));
            }
        };

        let decoder = self
            .decoders
            .entry(type_name.to_string())
            .or_insert_with(|| {
                self.resolutions.fetch_add(1, Ordering::Relaxed);
                debug!(type_name, "built decoder for cached type");
                build()
            })
            .value()
            .clone();
        Ok(decoder)
    }

    /// Returns true if `type_name` is registered.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registrations.contains_key(type_name)
    }

    // == Check Declared ==
    /// Checks that `type_name` would resolve back to `T` on read.
    ///
    /// A registered name must be bound to `T`; an unregistered name must be
    /// the name `T` is declared under.
    pub fn check_declared<T: 'static>(&self, type_name: &str) -> Result<()> {
        let matches = if self.is_registered(type_name) {
            self.registrations
                .get(type_name)
                .is_some_and(|registration| registration.type_id == TypeId::of::<T>())
        } else {
            type_name == self.declared_name::<T>()
        };

        if !matches {
            return Err(CacheError::TypeMismatch {
                expected: type_name.to_string(),
                found: std::any::type_name::<T>().to_string(),
            });
        }
        Ok(())
    }

    /// Number of decoders built so far.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("registered", &self.registrations.len())
            .field("resolved", &self.decoders.len())
            .finish()
    }
}

// == Cached Value ==
/// A value decoded from the cache together with its declared type name.
pub struct CachedValue {
    type_name: String,
    value: Box<dyn Any + Send + Sync>,
}

impl CachedValue {
    pub(crate) fn new(type_name: String, value: Box<dyn Any + Send + Sync>) -> Self {
        Self { type_name, value }
    }

    /// Declared type name recorded at write time.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the concrete value out, failing if it is not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T> {
        let CachedValue { type_name, value } = self;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CacheError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: type_name,
            })
    }
}

impl fmt::Debug for CachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
