//! Device class manifests
//!
//! [`Manifest`] wraps one parsed class and exposes what the loader needs:
//! the device kind, the `#[version]` annotation, and the config mixin.
//! [`ManifestBundle`] holds every class of a schema document.

use serde::{Deserialize, Serialize};

use crate::ast::{ClassDef, ImportStmt, Library, Value};
use crate::config::{ConfigStrategy, StrategyKind};
use crate::grammar::{self, ParseError};
use crate::print::SerializeError;

/// One device class manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    class: ClassDef,
}

impl Manifest {
    pub fn new(class: ClassDef) -> Self {
        Self { class }
    }

    /// Parse the source of a single class
    pub fn from_source(source: &str) -> Result<Self, ParseError> {
        grammar::parse_class(source).map(Self::new)
    }

    pub fn kind(&self) -> &str {
        &self.class.kind
    }

    /// The `#[version=N]` annotation; 0 when absent or not a non-negative integer
    pub fn version(&self) -> u64 {
        match self.class.annotations.get("version") {
            Some(Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => *n as u64,
            _ => 0,
        }
    }

    /// The `import config from @...` declaration, if any
    pub fn config_mixin(&self) -> Option<&ImportStmt> {
        self.class.import("config")
    }

    /// The module named by `import loader from @...`, if any
    pub fn loader_module(&self) -> Option<&str> {
        self.class.import("loader").map(|i| i.module.as_str())
    }

    pub fn class(&self) -> &ClassDef {
        &self.class
    }

    pub fn into_class(self) -> ClassDef {
        self.class
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.class.metadata.get(key).and_then(Value::as_str)
    }

    /// A string-valued implementation annotation (`#[key="..."]`)
    pub fn annotation_str(&self, key: &str) -> Option<&str> {
        self.class.annotations.get(key).and_then(Value::as_str)
    }

    /// Display name: `#_[name]`, or the kind
    pub fn name(&self) -> &str {
        self.metadata_str("name").unwrap_or(&self.class.kind)
    }

    pub fn description(&self) -> &str {
        self.metadata_str("description").unwrap_or("")
    }

    /// `#_[canonical]` as a string or its `default` entry, else the kind split on dots
    pub fn canonical(&self) -> String {
        match self.class.metadata.get("canonical") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(entries)) => entries
                .iter()
                .find(|(k, _)| k == "default")
                .and_then(|(_, v)| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.class.kind.replace('.', " ")),
            _ => self.class.kind.replace('.', " "),
        }
    }

    pub fn category(&self) -> DeviceCategory {
        self.annotation_str("category")
            .and_then(DeviceCategory::parse)
            .unwrap_or_default()
    }

    pub fn subcategory(&self) -> &str {
        self.annotation_str("subcategory").unwrap_or("")
    }

    pub fn prettyprint(&self) -> Result<String, SerializeError> {
        self.class.prettyprint()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    #[default]
    Data,
    Online,
    Physical,
    System,
}

impl DeviceCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "data" => Some(Self::Data),
            "online" => Some(Self::Online),
            "physical" => Some(Self::Physical),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// A configuration field shown to the user for form-configured devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub type_: String,
}

impl FormField {
    /// Password-typed parameters get a password field, everything else text
    pub fn from_param(name: &str, type_: &str) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            type_: if type_ == "Password" { "password" } else { "text" }.to_string(),
        }
    }
}

/// Display metadata derived from a manifest and its config strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceMetadata {
    pub kind: String,
    pub name: String,
    pub description: String,
    pub canonical: String,
    pub category: DeviceCategory,
    pub subcategory: String,
    /// Parent classes from the `extends` clause
    pub types: Vec<String>,
    pub auth_type: StrategyKind,
    pub fields: Vec<FormField>,
}

impl DeviceMetadata {
    pub fn new(manifest: &Manifest, strategy: &ConfigStrategy) -> Self {
        let fields = match strategy {
            ConfigStrategy::Form { params } => params
                .iter()
                .map(|p| FormField::from_param(&p.name, &p.type_))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            kind: manifest.kind().to_string(),
            name: manifest.name().to_string(),
            description: manifest.description().to_string(),
            canonical: manifest.canonical(),
            category: manifest.category(),
            subcategory: manifest.subcategory().to_string(),
            types: manifest.class().extends.clone(),
            auth_type: strategy.kind(),
            fields,
        }
    }
}

/// Every class of a schema document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestBundle {
    manifests: Vec<Manifest>,
}

impl ManifestBundle {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let library = grammar::parse(source)?;
        Ok(Self::from_library(library))
    }

    pub fn from_library(library: Library) -> Self {
        Self {
            manifests: library.classes.into_iter().map(Manifest::new).collect(),
        }
    }

    /// Keep only the requested kinds; an empty filter keeps everything
    pub fn retain_kinds(&mut self, kinds: &[String]) {
        if kinds.is_empty() {
            return;
        }
        self.manifests.retain(|m| kinds.iter().any(|k| k == m.kind()));
    }

    pub fn find(&self, kind: &str) -> Option<&Manifest> {
        self.manifests.iter().find(|m| m.kind() == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.manifests.iter().map(Manifest::kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.iter()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    pub fn prettyprint(&self) -> Result<String, SerializeError> {
        Library {
            classes: self.manifests.iter().map(|m| m.class().clone()).collect(),
            datasets: Vec::new(),
        }
        .prettyprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormParam;

    const BUNDLE: &str = r#"
class @com.twitter
#_[name="Twitter Account"]
#_[canonical={default="twitter", base=["twitter account"]}]
#[version=4]
#[category="online"]
#[subcategory="social_network"] {
  import loader from @org.thingpedia.v2();
  import config from @org.thingpedia.config.oauth2(profile=["id_str"]);
}

class @com.weather extends @org.thingpedia.weather {
  import loader from @org.thingpedia.v2();
}

class @com.broken #[version="seven"] {
}
"#;

    #[test]
    fn test_accessors() {
        let bundle = ManifestBundle::parse(BUNDLE).unwrap();
        assert_eq!(bundle.len(), 3);

        let twitter = bundle.find("com.twitter").unwrap();
        assert_eq!(twitter.version(), 4);
        assert_eq!(twitter.name(), "Twitter Account");
        assert_eq!(twitter.canonical(), "twitter");
        assert_eq!(twitter.category(), DeviceCategory::Online);
        assert_eq!(twitter.subcategory(), "social_network");
        assert_eq!(twitter.loader_module(), Some("org.thingpedia.v2"));
        assert_eq!(
            twitter.config_mixin().map(|m| m.module.as_str()),
            Some("org.thingpedia.config.oauth2")
        );

        let weather = bundle.find("com.weather").unwrap();
        assert_eq!(weather.version(), 0);
        assert_eq!(weather.name(), "com.weather");
        assert_eq!(weather.canonical(), "com weather");
        assert_eq!(weather.category(), DeviceCategory::Data);
        assert!(weather.config_mixin().is_none());

        assert_eq!(bundle.find("com.broken").unwrap().version(), 0);
        assert!(bundle.find("com.missing").is_none());
    }

    #[test]
    fn test_retain_kinds() {
        let mut bundle = ManifestBundle::parse(BUNDLE).unwrap();
        bundle.retain_kinds(&[]);
        assert_eq!(bundle.len(), 3);

        bundle.retain_kinds(&["com.weather".to_string(), "com.unknown".to_string()]);
        assert_eq!(bundle.kinds().collect::<Vec<_>>(), vec!["com.weather"]);

        let reparsed = ManifestBundle::parse(&bundle.prettyprint().unwrap()).unwrap();
        assert_eq!(reparsed, bundle);
    }

    #[test]
    fn test_metadata() {
        let bundle = ManifestBundle::parse(BUNDLE).unwrap();
        let weather = bundle.find("com.weather").unwrap();
        let strategy = ConfigStrategy::Form {
            params: vec![
                FormParam {
                    name: "username".to_string(),
                    type_: "String".to_string(),
                },
                FormParam {
                    name: "password".to_string(),
                    type_: "Password".to_string(),
                },
            ],
        };
        let metadata = DeviceMetadata::new(weather, &strategy);
        assert_eq!(metadata.kind, "com.weather");
        assert_eq!(metadata.types, vec!["org.thingpedia.weather"]);
        assert_eq!(metadata.auth_type, StrategyKind::Form);
        assert_eq!(metadata.fields[0].type_, "text");
        assert_eq!(metadata.fields[1].type_, "password");
    }
}
