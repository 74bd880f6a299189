//! Per-kind module cache
//!
//! A [`ModuleLoader`] is bound to one device kind. The first
//! [`get_module`](ModuleLoader::get_module) resolves the config strategy and
//! synthesizes the module; later calls share that result until
//! [`clear_cache`](ModuleLoader::clear_cache). Callers that arrive while a
//! synthesis is in flight await the same shared future instead of starting
//! another one.
//!
//! The loader never compares manifest versions itself. Whoever replaces the
//! manifest with [`set_manifest`](ModuleLoader::set_manifest) decides whether
//! to clear the cache.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ConfigStrategy;
use crate::manifest::Manifest;
use crate::module::{synthesize, InstallHooks, ResolvedModule, SynthesisError};

type PendingModule = Shared<BoxFuture<'static, Result<Arc<ResolvedModule>, SynthesisError>>>;

pub struct ModuleLoader {
    kind: String,
    manifest: RwLock<Arc<Manifest>>,
    hooks: Arc<InstallHooks>,
    /// In-flight or finished synthesis; empty after a failure or a clear
    slot: Mutex<Option<PendingModule>>,
}

impl ModuleLoader {
    /// Create a loader using the default install hooks
    pub fn new(manifest: Manifest) -> Self {
        Self::with_hooks(manifest, Arc::new(InstallHooks::default()))
    }

    pub fn with_hooks(manifest: Manifest, hooks: Arc<InstallHooks>) -> Self {
        Self {
            kind: manifest.kind().to_string(),
            manifest: RwLock::new(Arc::new(manifest)),
            hooks,
            slot: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.kind
    }

    pub async fn manifest(&self) -> Arc<Manifest> {
        self.manifest.read().await.clone()
    }

    pub async fn version(&self) -> u64 {
        self.manifest.read().await.version()
    }

    /// Resolve the config strategy of the current manifest
    pub async fn config(&self) -> Result<ConfigStrategy, SynthesisError> {
        ConfigStrategy::resolve(self.manifest.read().await.config_mixin())
    }

    /// Replace the bound manifest without touching the cache
    ///
    /// A manifest for a different kind is ignored.
    pub async fn set_manifest(&self, manifest: Manifest) {
        if manifest.kind() != self.kind {
            warn!(
                kind = %self.kind,
                other = %manifest.kind(),
                "Ignoring manifest for a different kind"
            );
            return;
        }
        debug!(kind = %self.kind, version = manifest.version(), "Replacing manifest");
        *self.manifest.write().await = Arc::new(manifest);
    }

    /// Drop the cached module; the next `get_module` synthesizes again
    pub async fn clear_cache(&self) {
        if self.slot.lock().await.take().is_some() {
            debug!(kind = %self.kind, "Cleared cached module");
        }
    }

    /// Whether a synthesis is pending or finished
    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Get the module for this kind, synthesizing it on first use
    pub async fn get_module(&self) -> Result<Arc<ResolvedModule>, SynthesisError> {
        let pending = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let manifest = self.manifest.read().await.clone();
                    let hooks = Arc::clone(&self.hooks);
                    debug!(
                        kind = %self.kind,
                        version = manifest.version(),
                        "Synthesizing device module"
                    );
                    let pending = async move {
                        let strategy = ConfigStrategy::resolve(manifest.config_mixin())?;
                        synthesize(manifest, strategy, &hooks).map(Arc::new)
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;
        match &result {
            Ok(module) => {
                info!(
                    kind = %self.kind,
                    version = module.version(),
                    strategy = %module.strategy().kind(),
                    "Device module ready"
                );
            }
            Err(e) => {
                // Leave the slot empty so the next call retries, unless it
                // was already cleared or replaced by someone else.
                let mut slot = self.slot.lock().await;
                if slot.as_ref().is_some_and(|p| p.ptr_eq(&pending)) {
                    *slot = None;
                }
                warn!(kind = %self.kind, error = %e, "Device module synthesis failed");
            }
        }
        result
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("kind", &self.kind)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
