//! Records exchanged with a Thingpedia service

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use thingpedia_core::{ConfigStrategy, DeviceCategory, FormField, Manifest};

/// One entry of the device list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListRecord {
    pub name: String,
    pub description: String,
    pub primary_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_tracker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub category: DeviceCategory,
    #[serde(default)]
    pub subcategory: String,
}

impl DeviceListRecord {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let annotation = |key: &str| manifest.annotation_str(key).map(str::to_string);
        Self {
            name: manifest.name().to_string(),
            description: manifest.description().to_string(),
            primary_kind: manifest.kind().to_string(),
            website: annotation("website"),
            repository: annotation("repository"),
            issue_tracker: annotation("issue_tracker"),
            license: annotation("license"),
            category: manifest.category(),
            subcategory: manifest.subcategory().to_string(),
        }
    }
}

/// How the user configures one device, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceFactory {
    None {
        category: DeviceCategory,
        kind: String,
        text: String,
    },
    #[serde(rename = "oauth2")]
    OAuth2 {
        category: DeviceCategory,
        kind: String,
        text: String,
    },
    Interactive {
        category: DeviceCategory,
        kind: String,
        text: String,
    },
    Discovery {
        category: DeviceCategory,
        kind: String,
        text: String,
        #[serde(rename = "discoveryType")]
        discovery_type: String,
    },
    Form {
        category: DeviceCategory,
        kind: String,
        text: String,
        fields: Vec<FormField>,
    },
}

impl DeviceFactory {
    /// Build the factory for a manifest from its resolved config strategy
    pub fn new(manifest: &Manifest, strategy: &ConfigStrategy) -> Self {
        let category = manifest.category();
        let kind = manifest.kind().to_string();
        let text = manifest.name().to_string();
        match strategy {
            ConfigStrategy::None => Self::None { category, kind, text },
            ConfigStrategy::OAuth2 { .. } => Self::OAuth2 { category, kind, text },
            ConfigStrategy::Interactive => Self::Interactive { category, kind, text },
            ConfigStrategy::Discovery { discovery_type } => Self::Discovery {
                category,
                kind,
                text,
                discovery_type: discovery_type.clone().unwrap_or_default(),
            },
            ConfigStrategy::Form { params } => Self::Form {
                category,
                kind,
                text,
                fields: params
                    .iter()
                    .map(|p| FormField::from_param(&p.name, &p.type_))
                    .collect(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::None { kind, .. }
            | Self::OAuth2 { kind, .. }
            | Self::Interactive { kind, .. }
            | Self::Discovery { kind, .. }
            | Self::Form { kind, .. } => kind,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::None { text, .. }
            | Self::OAuth2 { text, .. }
            | Self::Interactive { text, .. }
            | Self::Discovery { text, .. }
            | Self::Form { text, .. } => text,
        }
    }
}

/// A choice between several concrete devices implementing an abstract class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleDeviceFactory {
    /// Always `"multiple"`
    #[serde(rename = "type")]
    pub type_: String,
    pub text: String,
    pub choices: Vec<DeviceFactory>,
}

impl MultipleDeviceFactory {
    pub fn new(text: impl Into<String>, choices: Vec<DeviceFactory>) -> Self {
        Self {
            type_: "multiple".to_string(),
            text: text.into(),
            choices,
        }
    }
}

/// Result of a device setup lookup for one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSetup {
    Multiple(MultipleDeviceFactory),
    Single(DeviceFactory),
}

/// Setup information per requested kind; `None` for kinds nobody implements
pub type DeviceSetupMap = BTreeMap<String, Option<DeviceSetup>>;

/// One entity value returned by an entity lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
    pub canonical: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLookupMeta {
    pub name: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_well_known: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub has_ner_support: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLookupResult {
    pub meta: EntityLookupMeta,
    pub data: Vec<EntityRecord>,
}

/// An entity type declared by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeRecord {
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_well_known: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub has_ner_support: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtype_of: Vec<String>,
}

/// Position hint for location lookups
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub display: String,
    pub canonical: String,
    pub rank: i64,
    pub importance: f64,
    #[serde(default)]
    pub address: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNameRecord {
    pub kind: String,
    pub kind_canonical: String,
}

/// The service encodes some booleans as 0/1
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use thingpedia_core::FormParam;

    #[test]
    fn test_factory_tagging() {
        let manifest = Manifest::from_source(
            r#"class @com.bing #_[name="Bing Search"] #[category="data"] {}"#,
        )
        .unwrap();
        let strategy = ConfigStrategy::Form {
            params: vec![FormParam {
                name: "api_key".to_string(),
                type_: "Password".to_string(),
            }],
        };

        let factory = DeviceFactory::new(&manifest, &strategy);
        let json = serde_json::to_value(&factory).unwrap();
        assert_eq!(json["type"], "form");
        assert_eq!(json["kind"], "com.bing");
        assert_eq!(json["text"], "Bing Search");
        assert_eq!(json["category"], "data");
        assert_eq!(json["fields"][0]["type"], "password");

        let back: DeviceFactory = serde_json::from_value(json).unwrap();
        assert_eq!(back, factory);
    }

    #[test]
    fn test_discovery_factory_field_name() {
        let json = serde_json::json!({
            "type": "discovery",
            "category": "physical",
            "kind": "com.lg.tv",
            "text": "LG TV",
            "discoveryType": "upnp"
        });
        let factory: DeviceFactory = serde_json::from_value(json).unwrap();
        assert!(matches!(
            &factory,
            DeviceFactory::Discovery { discovery_type, .. } if discovery_type == "upnp"
        ));
        assert_eq!(factory.kind(), "com.lg.tv");
    }

    #[test]
    fn test_setup_untagged() {
        let single: DeviceSetup = serde_json::from_value(serde_json::json!({
            "type": "oauth2",
            "category": "online",
            "kind": "com.twitter",
            "text": "Twitter"
        }))
        .unwrap();
        assert!(matches!(single, DeviceSetup::Single(DeviceFactory::OAuth2 { .. })));

        let multiple: DeviceSetup = serde_json::from_value(serde_json::json!({
            "type": "multiple",
            "text": "light bulb",
            "choices": []
        }))
        .unwrap();
        assert!(matches!(multiple, DeviceSetup::Multiple(m) if m.text == "light bulb"));
    }

    #[test]
    fn test_numeric_flags() {
        let record: EntityTypeRecord = serde_json::from_value(serde_json::json!({
            "type": "tt:stock_id",
            "name": "Company Stock ID",
            "is_well_known": 0,
            "has_ner_support": 1
        }))
        .unwrap();
        assert!(!record.is_well_known);
        assert!(record.has_ner_support);
        assert!(record.subtype_of.is_empty());
    }
}
