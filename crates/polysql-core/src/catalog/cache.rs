// SPDX-License-Identifier: Apache-2.0

//! Shared, build-once storage for type catalogs

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::{DatabaseTypes, NativeType};
use crate::error::EngineResult;

#[derive(Default)]
struct CacheState {
    by_type: HashMap<TypeId, Arc<DatabaseTypes>>,
    by_engine: HashMap<&'static str, Arc<DatabaseTypes>>,
}

/// Catalogs keyed by native type enumeration and by engine identifier.
///
/// A failed build is not cached; the next call builds again and reports
/// the same error.
#[derive(Default)]
pub struct TypeCatalogCache {
    inner: Mutex<CacheState>,
}

static GLOBAL: OnceLock<TypeCatalogCache> = OnceLock::new();

impl TypeCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance used by the bundled dialects.
    pub fn global() -> &'static TypeCatalogCache {
        GLOBAL.get_or_init(TypeCatalogCache::new)
    }

    /// Returns the catalog for `E`, building it on first use.
    pub fn get_or_build<E: NativeType>(&self) -> EngineResult<Arc<DatabaseTypes>> {
        let mut state = self.inner.lock();
        if let Some(types) = state.by_type.get(&TypeId::of::<E>()) {
            return Ok(Arc::clone(types));
        }

        let types = Arc::new(DatabaseTypes::build::<E>()?);
        state.by_type.insert(TypeId::of::<E>(), Arc::clone(&types));
        state.by_engine.insert(E::ENGINE, Arc::clone(&types));
        Ok(types)
    }

    /// Catalog already built for a logical engine identifier.
    pub fn by_engine(&self, engine: &str) -> Option<Arc<DatabaseTypes>> {
        self.inner.lock().by_engine.get(engine).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.by_type.clear();
        state.by_engine.clear();
    }
}
