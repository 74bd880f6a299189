//! Config mixin resolution
//!
//! A manifest declares how its device is configured with
//! `import config from @<mixin>(...)`. Resolution classifies the mixin into
//! one of a closed set of strategies and extracts the state fields the
//! strategy binds. Unrecognized mixins degrade to [`ConfigStrategy::None`],
//! so manifests using newer mixins still load.

use serde::Serialize;
use std::fmt;

use crate::ast::{ImportStmt, Value};
use crate::module::SynthesisError;

pub const OAUTH2_MIXIN: &str = "org.thingpedia.config.oauth2";
pub const FORM_MIXIN: &str = "org.thingpedia.config.form";
pub const INTERACTIVE_MIXIN: &str = "org.thingpedia.config.interactive";
pub const DISCOVERY_MIXIN: &str = "org.thingpedia.config.discovery";

/// Strategy tag, without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    None,
    OAuth2,
    Form,
    Interactive,
    Discovery,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::None => "none",
            StrategyKind::OAuth2 => "oauth2",
            StrategyKind::Form => "form",
            StrategyKind::Interactive => "interactive",
            StrategyKind::Discovery => "discovery",
        };
        write!(f, "{}", s)
    }
}

/// A form field declared through `params=makeArgMap(name:Type, ...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormParam {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
}

/// How a device is configured, with the parameters the strategy extracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStrategy {
    None,
    OAuth2 {
        /// Profile fields stored in the device state, in declared order
        profile: Vec<String>,
    },
    Form {
        params: Vec<FormParam>,
    },
    Interactive,
    Discovery {
        discovery_type: Option<String>,
    },
}

impl ConfigStrategy {
    /// Classify a config mixin declaration
    ///
    /// Fails only when a recognized mixin carries an argument of the wrong
    /// shape (`params` that is not an argument map, `profile` that is not a
    /// list of strings, `discoveryType` that is not a string). Absent
    /// arguments yield empty parameters.
    pub fn resolve(mixin: Option<&ImportStmt>) -> Result<Self, SynthesisError> {
        let Some(mixin) = mixin else {
            return Ok(ConfigStrategy::None);
        };

        match mixin.module.as_str() {
            OAUTH2_MIXIN => {
                let profile = match mixin.arg("profile") {
                    None => Vec::new(),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s.clone()),
                            other => Err(shape_error(mixin, "profile", "list of strings", other)),
                        })
                        .collect::<Result<_, _>>()?,
                    Some(other) => {
                        return Err(shape_error(mixin, "profile", "list of strings", other))
                    }
                };
                Ok(ConfigStrategy::OAuth2 { profile })
            }
            FORM_MIXIN => {
                let params = match mixin.arg("params") {
                    None => Vec::new(),
                    Some(Value::ArgMap(entries)) => entries
                        .iter()
                        .map(|(name, type_)| FormParam {
                            name: name.clone(),
                            type_: type_.clone(),
                        })
                        .collect(),
                    Some(other) => return Err(shape_error(mixin, "params", "argument map", other)),
                };
                Ok(ConfigStrategy::Form { params })
            }
            INTERACTIVE_MIXIN => Ok(ConfigStrategy::Interactive),
            DISCOVERY_MIXIN => {
                let discovery_type = match mixin.arg("discoveryType") {
                    None => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => {
                        return Err(shape_error(mixin, "discoveryType", "string", other))
                    }
                };
                Ok(ConfigStrategy::Discovery { discovery_type })
            }
            _ => Ok(ConfigStrategy::None),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            ConfigStrategy::None => StrategyKind::None,
            ConfigStrategy::OAuth2 { .. } => StrategyKind::OAuth2,
            ConfigStrategy::Form { .. } => StrategyKind::Form,
            ConfigStrategy::Interactive => StrategyKind::Interactive,
            ConfigStrategy::Discovery { .. } => StrategyKind::Discovery,
        }
    }

    /// Names of the state fields the device constructor binds, in order
    pub fn state_fields(&self) -> Vec<String> {
        match self {
            ConfigStrategy::OAuth2 { profile } => profile.clone(),
            ConfigStrategy::Form { params } => params.iter().map(|p| p.name.clone()).collect(),
            _ => Vec::new(),
        }
    }
}

fn shape_error(mixin: &ImportStmt, arg: &str, expected: &str, found: &Value) -> SynthesisError {
    SynthesisError::MixinArgument {
        mixin: mixin.module.clone(),
        argument: arg.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn mixin(module: &str, args: Vec<(&str, Value)>) -> ImportStmt {
        ImportStmt {
            facet: "config".to_string(),
            module: module.to_string(),
            args: args.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[test]
    fn test_absent_mixin_is_none() {
        let first = ConfigStrategy::resolve(None).unwrap();
        let second = ConfigStrategy::resolve(None).unwrap();
        assert_eq!(first, ConfigStrategy::None);
        assert_eq!(first, second);
        assert!(first.state_fields().is_empty());
    }

    #[test]
    fn test_form_params_are_argmap_keys() {
        let decl = mixin(
            FORM_MIXIN,
            vec![(
                "params",
                Value::ArgMap(vec![
                    ("b".to_string(), "Password".to_string()),
                    ("a".to_string(), "String".to_string()),
                ]),
            )],
        );
        let strategy = ConfigStrategy::resolve(Some(&decl)).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Form);
        let fields: BTreeSet<String> = strategy.state_fields().into_iter().collect();
        assert_eq!(fields, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_missing_arguments_are_empty() {
        let form = ConfigStrategy::resolve(Some(&mixin(FORM_MIXIN, vec![]))).unwrap();
        assert_eq!(form, ConfigStrategy::Form { params: vec![] });

        let oauth = ConfigStrategy::resolve(Some(&mixin(OAUTH2_MIXIN, vec![]))).unwrap();
        assert_eq!(oauth, ConfigStrategy::OAuth2 { profile: vec![] });
    }

    #[test]
    fn test_oauth2_profile_order() {
        let decl = mixin(
            OAUTH2_MIXIN,
            vec![
                ("client_id", Value::String("xyz".to_string())),
                (
                    "profile",
                    Value::Array(vec![
                        Value::String("screen_name".to_string()),
                        Value::String("id_str".to_string()),
                    ]),
                ),
            ],
        );
        let strategy = ConfigStrategy::resolve(Some(&decl)).unwrap();
        assert_eq!(strategy.state_fields(), vec!["screen_name", "id_str"]);
    }

    #[test]
    fn test_interactive_and_discovery() {
        let interactive = ConfigStrategy::resolve(Some(&mixin(INTERACTIVE_MIXIN, vec![]))).unwrap();
        assert_eq!(interactive, ConfigStrategy::Interactive);

        let decl = mixin(
            DISCOVERY_MIXIN,
            vec![("discoveryType", Value::String("bluetooth".to_string()))],
        );
        let discovery = ConfigStrategy::resolve(Some(&decl)).unwrap();
        assert_eq!(
            discovery,
            ConfigStrategy::Discovery {
                discovery_type: Some("bluetooth".to_string())
            }
        );
        assert!(discovery.state_fields().is_empty());
    }

    #[test]
    fn test_unknown_mixins_degrade_to_none() {
        for module in [
            "org.thingpedia.config.custom_oauth",
            "org.thingpedia.config.basic_auth",
            "org.thingpedia.config.form.v2",
            "",
        ] {
            let decl = mixin(module, vec![("params", Value::Number(1.0))]);
            assert_eq!(ConfigStrategy::resolve(Some(&decl)).unwrap(), ConfigStrategy::None);
        }
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let decl = mixin(FORM_MIXIN, vec![("params", Value::String("url".to_string()))]);
        assert_eq!(
            ConfigStrategy::resolve(Some(&decl)),
            Err(SynthesisError::MixinArgument {
                mixin: FORM_MIXIN.to_string(),
                argument: "params".to_string(),
                expected: "argument map".to_string(),
                found: "string".to_string(),
            })
        );

        let decl = mixin(
            OAUTH2_MIXIN,
            vec![("profile", Value::Array(vec![Value::Number(1.0)]))],
        );
        assert!(ConfigStrategy::resolve(Some(&decl)).is_err());
    }
}
