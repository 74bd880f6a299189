//! Module synthesis: turning a manifest plus a config strategy into a
//! device type that can be instantiated from persisted state.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigStrategy, StrategyKind};
use crate::manifest::{DeviceMetadata, Manifest};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("Mixin {mixin}: argument {argument} must be a {expected}, found {found}")]
    MixinArgument {
        mixin: String,
        argument: String,
        expected: String,
        found: String,
    },
    #[error("Install hook for {strategy} failed on {kind}: {message}")]
    InstallHook {
        kind: String,
        strategy: StrategyKind,
        message: String,
    },
}

/// Persisted device state, as stored by the engine
pub type DeviceState = serde_json::Map<String, serde_json::Value>;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Whether a device can currently be used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Unknown,
    Unavailable,
    #[default]
    Available,
    OwnerUnavailable,
}

/// Configuration entry points a strategy wires onto a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigMethod {
    RunOAuth2,
    LoadFromOAuth2,
    LoadFromForm,
    LoadInteractively,
    LoadFromDiscovery,
    CompleteDiscovery,
}

/// A synthesized device type bound to one manifest version
#[derive(Debug)]
pub struct ResolvedModule {
    manifest: Arc<Manifest>,
    metadata: DeviceMetadata,
    version: u64,
    strategy: ConfigStrategy,
    state_fields: Vec<String>,
    config_methods: Vec<ConfigMethod>,
    availability: Availability,
}

impl ResolvedModule {
    pub fn kind(&self) -> &str {
        self.manifest.kind()
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    pub fn metadata(&self) -> &DeviceMetadata {
        &self.metadata
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn strategy(&self) -> &ConfigStrategy {
        &self.strategy
    }

    /// State keys mapped, in order, onto the instance's parameter list
    pub fn state_fields(&self) -> &[String] {
        &self.state_fields
    }

    pub fn config_methods(&self) -> &[ConfigMethod] {
        &self.config_methods
    }

    pub fn has_config_method(&self, method: ConfigMethod) -> bool {
        self.config_methods.contains(&method)
    }

    pub fn add_config_method(&mut self, method: ConfigMethod) {
        if !self.config_methods.contains(&method) {
            self.config_methods.push(method);
        }
    }

    /// Availability reported by every instance of this module
    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn set_availability(&mut self, availability: Availability) {
        self.availability = availability;
    }

    /// Build a device from persisted state
    pub fn instantiate(self: &Arc<Self>, state: DeviceState) -> GenericDevice {
        let params = self
            .state_fields
            .iter()
            .map(|field| state.get(field).cloned().unwrap_or(serde_json::Value::Null))
            .collect();
        GenericDevice {
            module: Arc::clone(self),
            state,
            params,
        }
    }
}

/// A device instance created from a [`ResolvedModule`]
#[derive(Debug, Clone)]
pub struct GenericDevice {
    module: Arc<ResolvedModule>,
    state: DeviceState,
    params: Vec<serde_json::Value>,
}

impl GenericDevice {
    pub fn kind(&self) -> &str {
        self.module.kind()
    }

    pub fn module(&self) -> &Arc<ResolvedModule> {
        &self.module
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// `params[i]` is `state[state_fields[i]]`, or null when the state lacks it
    pub fn params(&self) -> &[serde_json::Value] {
        &self.params
    }

    pub fn check_available(&self) -> Availability {
        self.module.availability()
    }
}

/// Strategy-specific decoration applied once to each synthesized module
pub trait InstallHook: Send + Sync {
    fn install(&self, module: &mut ResolvedModule) -> Result<(), HookError>;
}

impl<F> InstallHook for F
where
    F: Fn(&mut ResolvedModule) -> Result<(), HookError> + Send + Sync,
{
    fn install(&self, module: &mut ResolvedModule) -> Result<(), HookError> {
        self(module)
    }
}

struct OAuth2Hook;

impl InstallHook for OAuth2Hook {
    fn install(&self, module: &mut ResolvedModule) -> Result<(), HookError> {
        module.add_config_method(ConfigMethod::RunOAuth2);
        module.add_config_method(ConfigMethod::LoadFromOAuth2);
        Ok(())
    }
}

struct FormHook;

impl InstallHook for FormHook {
    fn install(&self, module: &mut ResolvedModule) -> Result<(), HookError> {
        module.add_config_method(ConfigMethod::LoadFromForm);
        Ok(())
    }
}

struct InteractiveHook;

impl InstallHook for InteractiveHook {
    fn install(&self, module: &mut ResolvedModule) -> Result<(), HookError> {
        module.add_config_method(ConfigMethod::LoadInteractively);
        Ok(())
    }
}

struct DiscoveryHook;

impl InstallHook for DiscoveryHook {
    fn install(&self, module: &mut ResolvedModule) -> Result<(), HookError> {
        match module.strategy() {
            ConfigStrategy::Discovery {
                discovery_type: Some(_),
            } => {
                module.add_config_method(ConfigMethod::LoadFromDiscovery);
                module.add_config_method(ConfigMethod::CompleteDiscovery);
                Ok(())
            }
            _ => Err("discovery mixin requires a discoveryType argument".into()),
        }
    }
}

/// Install hooks by strategy
#[derive(Clone)]
pub struct InstallHooks {
    hooks: BTreeMap<StrategyKind, Arc<dyn InstallHook>>,
}

impl InstallHooks {
    /// No hooks at all; modules are synthesized without decoration
    pub fn empty() -> Self {
        Self {
            hooks: BTreeMap::new(),
        }
    }

    /// Replace the hook for a strategy
    pub fn register(&mut self, kind: StrategyKind, hook: impl InstallHook + 'static) {
        self.hooks.insert(kind, Arc::new(hook));
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&Arc<dyn InstallHook>> {
        self.hooks.get(&kind)
    }
}

impl Default for InstallHooks {
    fn default() -> Self {
        let mut hooks = Self::empty();
        hooks.register(StrategyKind::OAuth2, OAuth2Hook);
        hooks.register(StrategyKind::Form, FormHook);
        hooks.register(StrategyKind::Interactive, InteractiveHook);
        hooks.register(StrategyKind::Discovery, DiscoveryHook);
        hooks
    }
}

impl fmt::Debug for InstallHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

/// Build a device type for `manifest` bound to `strategy`
///
/// The strategy's install hook, if one is registered and the strategy is
/// not `None`, runs exactly once on the new module.
pub fn synthesize(
    manifest: Arc<Manifest>,
    strategy: ConfigStrategy,
    hooks: &InstallHooks,
) -> Result<ResolvedModule, SynthesisError> {
    let mut module = ResolvedModule {
        metadata: DeviceMetadata::new(&manifest, &strategy),
        version: manifest.version(),
        state_fields: strategy.state_fields(),
        manifest,
        strategy,
        config_methods: Vec::new(),
        availability: Availability::Available,
    };

    let kind = module.strategy.kind();
    if kind != StrategyKind::None {
        if let Some(hook) = hooks.get(kind) {
            hook.install(&mut module)
                .map_err(|e| SynthesisError::InstallHook {
                    kind: module.kind().to_string(),
                    strategy: kind,
                    message: e.to_string(),
                })?;
        }
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClassDef;
    use crate::config::FormParam;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manifest(kind: &str) -> Arc<Manifest> {
        Arc::new(Manifest::new(ClassDef::new(kind)))
    }

    fn state(value: serde_json::Value) -> DeviceState {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("state must be an object"),
        }
    }

    #[test]
    fn test_none_strategy() {
        let module = synthesize(manifest("com.example"), ConfigStrategy::None, &InstallHooks::default())
            .unwrap();
        assert_eq!(module.kind(), "com.example");
        assert_eq!(module.version(), 0);
        assert!(module.state_fields().is_empty());
        assert!(module.config_methods().is_empty());
        assert_eq!(module.metadata().auth_type, StrategyKind::None);

        let device = Arc::new(module).instantiate(state(json!({"kind": "com.example"})));
        assert!(device.params().is_empty());
        assert_eq!(device.check_available(), Availability::Available);
    }

    #[test]
    fn test_params_follow_state_fields() {
        let strategy = ConfigStrategy::Form {
            params: vec![
                FormParam {
                    name: "url".to_string(),
                    type_: "String".to_string(),
                },
                FormParam {
                    name: "password".to_string(),
                    type_: "Password".to_string(),
                },
            ],
        };
        let module = Arc::new(
            synthesize(manifest("com.example.form"), strategy, &InstallHooks::default()).unwrap(),
        );
        assert!(module.has_config_method(ConfigMethod::LoadFromForm));

        let device = module.instantiate(state(json!({
            "kind": "com.example.form",
            "password": "hunter2",
            "url": "https://example.com",
        })));
        assert_eq!(
            device.params(),
            &[json!("https://example.com"), json!("hunter2")]
        );

        let partial = module.instantiate(state(json!({"url": "x"})));
        assert_eq!(partial.params(), &[json!("x"), serde_json::Value::Null]);
    }

    #[test]
    fn test_oauth2_hook() {
        let strategy = ConfigStrategy::OAuth2 {
            profile: vec!["id_str".to_string()],
        };
        let module = synthesize(manifest("com.twitter"), strategy, &InstallHooks::default()).unwrap();
        assert_eq!(
            module.config_methods(),
            &[ConfigMethod::RunOAuth2, ConfigMethod::LoadFromOAuth2]
        );
        assert_eq!(module.state_fields(), &["id_str".to_string()]);
    }

    #[test]
    fn test_hook_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut hooks = InstallHooks::empty();
        hooks.register(
            StrategyKind::Interactive,
            move |module: &mut ResolvedModule| -> Result<(), HookError> {
                counter.fetch_add(1, Ordering::SeqCst);
                module.set_availability(Availability::Unknown);
                Ok(())
            },
        );

        let module = synthesize(manifest("com.example"), ConfigStrategy::Interactive, &hooks).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::new(module).instantiate(DeviceState::new()).check_available(), Availability::Unknown);

        synthesize(manifest("com.example"), ConfigStrategy::None, &hooks).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_failure() {
        let strategy = ConfigStrategy::Discovery {
            discovery_type: None,
        };
        let err = synthesize(manifest("com.example.ble"), strategy, &InstallHooks::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::InstallHook {
                strategy: StrategyKind::Discovery,
                ..
            }
        ));

        let strategy = ConfigStrategy::Discovery {
            discovery_type: Some("bluetooth".to_string()),
        };
        let module = synthesize(manifest("com.example.ble"), strategy, &InstallHooks::default())
            .unwrap();
        assert!(module.has_config_method(ConfigMethod::CompleteDiscovery));
    }
}
