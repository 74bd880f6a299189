//! Module loaders per device kind, fed by a Thingpedia client
//!
//! The registry owns the manifests it fetched, so it also decides when a
//! cached module is stale: [`refresh`](ModuleRegistry::refresh) swaps the
//! manifest and clears the loader cache only for a higher version.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use thingpedia_core::{InstallHooks, Manifest, ModuleLoader, ResolvedModule, SynthesisError};

use crate::client::{ClientError, ThingpediaClient};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to fetch device code: {0}")]
    Client(#[from] ClientError),

    #[error("Failed to load device module: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Requested {requested} but the server returned {found}")]
    KindMismatch { requested: String, found: String },
}

type LoaderCell = Arc<OnceCell<Arc<ModuleLoader>>>;

pub struct ModuleRegistry {
    client: Arc<dyn ThingpediaClient>,
    hooks: Arc<InstallHooks>,
    loaders: Mutex<HashMap<String, LoaderCell>>,
}

impl ModuleRegistry {
    pub fn new(client: Arc<dyn ThingpediaClient>) -> Self {
        Self::with_hooks(client, Arc::new(InstallHooks::default()))
    }

    pub fn with_hooks(client: Arc<dyn ThingpediaClient>, hooks: Arc<InstallHooks>) -> Self {
        Self {
            client,
            hooks,
            loaders: Mutex::new(HashMap::new()),
        }
    }

    async fn fetch_manifest(&self, kind: &str) -> Result<Manifest, RegistryError> {
        let code = self.client.get_device_code(kind).await?;
        let manifest = Manifest::from_source(&code).map_err(ClientError::from)?;
        if manifest.kind() != kind {
            return Err(RegistryError::KindMismatch {
                requested: kind.to_string(),
                found: manifest.kind().to_string(),
            });
        }
        Ok(manifest)
    }

    /// The loader for `kind`, fetching its manifest on first use
    ///
    /// Concurrent first requests for the same kind share one fetch. A
    /// failed fetch is not remembered.
    pub async fn loader(&self, kind: &str) -> Result<Arc<ModuleLoader>, RegistryError> {
        let cell = {
            let mut loaders = self.loaders.lock().await;
            Arc::clone(loaders.entry(kind.to_string()).or_default())
        };
        let result = cell
            .get_or_try_init(|| async {
                let manifest = self.fetch_manifest(kind).await?;
                info!(kind = %kind, version = manifest.version(), "Fetched device manifest");
                Ok::<_, RegistryError>(Arc::new(ModuleLoader::with_hooks(
                    manifest,
                    Arc::clone(&self.hooks),
                )))
            })
            .await;

        match result {
            Ok(loader) => Ok(Arc::clone(loader)),
            Err(e) => {
                // drop the empty cell unless another caller has since filled or replaced it
                let mut loaders = self.loaders.lock().await;
                if loaders
                    .get(kind)
                    .is_some_and(|c| Arc::ptr_eq(c, &cell) && !c.initialized())
                {
                    loaders.remove(kind);
                }
                Err(e)
            }
        }
    }

    /// Resolve the module for `kind`
    pub async fn get_module(&self, kind: &str) -> Result<Arc<ResolvedModule>, RegistryError> {
        let loader = self.loader(kind).await?;
        Ok(loader.get_module().await?)
    }

    /// Refetch the manifest of a loaded kind
    ///
    /// Returns `true` when a newer version replaced the old one and the
    /// cached module was dropped. Kinds never loaded are left alone.
    pub async fn refresh(&self, kind: &str) -> Result<bool, RegistryError> {
        let cell = self.loaders.lock().await.get(kind).cloned();
        let Some(loader) = cell.as_ref().and_then(|c| c.get()) else {
            debug!(kind = %kind, "Refresh requested for a kind that is not loaded");
            return Ok(false);
        };

        let manifest = self.fetch_manifest(kind).await?;
        let current = loader.version().await;
        let fetched = manifest.version();
        if fetched <= current {
            debug!(kind = %kind, current, fetched, "Device manifest is up to date");
            return Ok(false);
        }

        loader.set_manifest(manifest).await;
        loader.clear_cache().await;
        info!(kind = %kind, from = current, to = fetched, "Upgraded device manifest");
        Ok(true)
    }

    /// Forget the loader of `kind`; returns whether one existed
    pub async fn remove(&self, kind: &str) -> bool {
        self.loaders.lock().await.remove(kind).is_some()
    }

    pub async fn kinds(&self) -> Vec<String> {
        let loaders = self.loaders.lock().await;
        let mut kinds: Vec<_> = loaders
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(kind, _)| kind.clone())
            .collect();
        kinds.sort();
        kinds
    }
}
