//! Process-lifetime cache of loaded catalogs and mappings.
//!
//! A [`DocumentCache`] is owned by the caller. It loads the ecosystem catalog
//! on first use and each mapping the first time it is asked for, then hands
//! out shared references for the rest of the run. Nothing is ever evicted.
//! Two threads racing on the same first load both fetch; the documents are
//! identical, so whichever copy is stored is kept.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::ecosystems::Ecosystems;
use crate::mapping::Mapping;
use crate::source::{DEFAULT_ECOSYSTEMS_URL, DocumentSource};
use crate::{DepmapError, Result};

/// Cache of an ecosystem catalog and the mappings loaded through it.
#[derive(Debug)]
pub struct DocumentCache {
    catalog_source: DocumentSource,
    catalog: OnceLock<Arc<Ecosystems>>,
    mappings: RwLock<HashMap<String, Arc<Mapping>>>,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(DocumentSource::parse(DEFAULT_ECOSYSTEMS_URL))
    }
}

impl DocumentCache {
    /// A cache whose catalog is read from `catalog_source`.
    pub fn new(catalog_source: DocumentSource) -> Self {
        Self {
            catalog_source,
            catalog: OnceLock::new(),
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// A cache seeded with an already-loaded catalog.
    pub fn with_catalog(catalog: Ecosystems) -> Self {
        let cache = Self::new(DocumentSource::parse(DEFAULT_ECOSYSTEMS_URL));
        let _ = cache.catalog.set(Arc::new(catalog));
        cache
    }

    /// The ecosystem catalog, loaded on first call.
    pub fn ecosystems(&self) -> Result<Arc<Ecosystems>> {
        if let Some(catalog) = self.catalog.get() {
            debug!("ecosystem catalog cache hit");
            return Ok(Arc::clone(catalog));
        }
        let loaded = Arc::new(Ecosystems::load(&self.catalog_source)?);
        Ok(Arc::clone(self.catalog.get_or_init(|| loaded)))
    }

    /// The mapping for a catalog ecosystem.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::NotFound`] listing the catalog's ecosystems when
    /// `name` is not one of them.
    pub fn mapping_for_ecosystem(&self, name: &str) -> Result<Arc<Mapping>> {
        let catalog = self.ecosystems()?;
        let source = catalog.mapping_source(name)?;
        self.cached(format!("ecosystem:{name}"), || Mapping::load(&source))
    }

    /// The mapping at `source`, keyed by its location.
    pub fn mapping_from(&self, source: &DocumentSource) -> Result<Arc<Mapping>> {
        self.cached(format!("source:{source}"), || Mapping::load(source))
    }

    /// The first catalog ecosystem whose mapping declares `package_manager`.
    ///
    /// ## Errors
    ///
    /// Returns [`DepmapError::NotFound`] when no ecosystem declares it. The
    /// error lists every package manager seen in the catalog.
    pub fn find_ecosystem_for_package_manager(&self, package_manager: &str) -> Result<String> {
        let catalog = self.ecosystems()?;
        let mut seen: Vec<String> = Vec::new();

        for name in catalog.names() {
            let mapping = self.mapping_for_ecosystem(name)?;
            if mapping.package_manager_names().any(|pm| pm == package_manager) {
                debug!(package_manager, ecosystem = name, "found ecosystem for package manager");
                return Ok(name.to_string());
            }
            for pm in mapping.package_manager_names() {
                if !seen.iter().any(|s| s == pm) {
                    seen.push(pm.to_string());
                }
            }
        }

        Err(DepmapError::NotFound {
            kind: "package manager",
            name: package_manager.to_string(),
            available: seen,
        })
    }

    /// Number of mappings loaded so far.
    pub fn loaded_mappings(&self) -> usize {
        self.read_mappings().len()
    }

    fn cached(
        &self,
        key: String,
        load: impl FnOnce() -> Result<Mapping>,
    ) -> Result<Arc<Mapping>> {
        if let Some(mapping) = self.read_mappings().get(&key).cloned() {
            debug!(%key, "mapping cache hit");
            return Ok(mapping);
        }

        let mapping = Arc::new(load()?);
        self.write_mappings().insert(key, Arc::clone(&mapping));
        Ok(mapping)
    }

    // Entries are inserted whole, so a poisoned map is still consistent.
    fn read_mappings(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Mapping>>> {
        self.mappings.read().unwrap_or_else(|poisoned| {
            warn!("mapping cache lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_mappings(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Mapping>>> {
        self.mappings.write().unwrap_or_else(|poisoned| {
            warn!("mapping cache lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}
