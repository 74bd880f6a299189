//! Command implementations
//!
//! Each command returns its output as text so `main` only has to print it.

use anyhow::{Context, Result};
use serde::Serialize;

use thingpedia_client::{ModuleRegistry, ThingpediaClient};
use thingpedia_core::{
    ConfigMethod, DeviceMetadata, ManifestBundle, ResolvedModule, StrategyKind,
};

/// JSON view of a resolved module
#[derive(Debug, Serialize)]
pub struct ModuleSummary<'a> {
    pub kind: &'a str,
    pub version: u64,
    pub strategy: StrategyKind,
    pub state_fields: &'a [String],
    pub config_methods: &'a [ConfigMethod],
    pub metadata: &'a DeviceMetadata,
}

impl<'a> From<&'a ResolvedModule> for ModuleSummary<'a> {
    fn from(module: &'a ResolvedModule) -> Self {
        Self {
            kind: module.kind(),
            version: module.version(),
            strategy: module.strategy().kind(),
            state_fields: module.state_fields(),
            config_methods: module.config_methods(),
            metadata: module.metadata(),
        }
    }
}

pub async fn device_code(client: &dyn ThingpediaClient, kind: &str) -> Result<String> {
    client
        .get_device_code(kind)
        .await
        .with_context(|| format!("Failed to get device code for {}", kind))
}

/// The manifest bundle restricted to `kinds`, whatever the client returned
pub async fn schemas(client: &dyn ThingpediaClient, kinds: &[String]) -> Result<String> {
    let source = client
        .get_schemas(kinds, true)
        .await
        .context("Failed to get schemas")?;
    let mut bundle = ManifestBundle::parse(&source).context("Invalid schema document")?;
    bundle.retain_kinds(kinds);
    Ok(bundle.prettyprint()?)
}

pub async fn examples(client: &dyn ThingpediaClient, kinds: &[String]) -> Result<String> {
    client
        .get_examples_by_kinds(kinds)
        .await
        .context("Failed to get examples")
}

pub async fn module(registry: &ModuleRegistry, kind: &str) -> Result<String> {
    let module = registry
        .get_module(kind)
        .await
        .with_context(|| format!("Failed to load module for {}", kind))?;
    Ok(serde_json::to_string_pretty(&ModuleSummary::from(module.as_ref()))?)
}

pub async fn factories(client: &dyn ThingpediaClient, kind: &str) -> Result<String> {
    let setup = client
        .get_device_setup(&[kind.to_string()])
        .await
        .with_context(|| format!("Failed to get device setup for {}", kind))?;
    Ok(serde_json::to_string_pretty(&setup)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use thingpedia_client::{FileClient, FileClientOptions};
    use thingpedia_core::parse_dataset;

    const THINGPEDIA: &str = r#"
class @com.twitter #_[name="Twitter"] #[version=2] #[category="online"] {
  import loader from @org.thingpedia.v2();
  import config from @org.thingpedia.config.oauth2(profile=["id_str"]);
  monitorable list query timeline(out text : String);
}

class @com.weather #[version=1] {
  import loader from @org.thingpedia.v2();
  query current(out temperature : Measure(C));
}
"#;

    const DATASET: &str = r#"dataset @everything language "en" {
  query := @com.twitter.timeline() #[id=1];
  program := @com.twitter.timeline() => @com.weather.current() #[id=2];
  query := @com.weather.current() #[id=3];
}"#;

    fn client(dir: &std::path::Path) -> Arc<FileClient> {
        let thingpedia = dir.join("thingpedia.tt");
        let dataset = dir.join("dataset.tt");
        std::fs::write(&thingpedia, THINGPEDIA).unwrap();
        std::fs::write(&dataset, DATASET).unwrap();
        Arc::new(FileClient::new(FileClientOptions {
            locale: "en-US".to_string(),
            thingpedia,
            entities: None,
            dataset: Some(dataset),
        }))
    }

    #[tokio::test]
    async fn test_schemas_filters_locally() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path());

        let output = schemas(client.as_ref(), &["com.weather".to_string()]).await.unwrap();
        let bundle = ManifestBundle::parse(&output).unwrap();
        assert_eq!(bundle.kinds().collect::<Vec<_>>(), vec!["com.weather"]);

        let output = schemas(client.as_ref(), &[]).await.unwrap();
        assert_eq!(ManifestBundle::parse(&output).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_examples_and_device_code() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path());

        let output = examples(
            client.as_ref(),
            &["com.weather".to_string(), "com.twitter".to_string()],
        )
        .await
        .unwrap();
        let ids: Vec<_> = parse_dataset(&output)
            .unwrap()
            .examples
            .iter()
            .filter_map(|e| e.id())
            .collect();
        assert_eq!(ids, vec![3, 1]);

        assert!(device_code(client.as_ref(), "com.twitter")
            .await
            .unwrap()
            .contains("class @com.twitter"));
        assert!(device_code(client.as_ref(), "com.nothing").await.is_err());
    }

    #[tokio::test]
    async fn test_module_summary() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModuleRegistry::new(client(dir.path()));

        let output = module(&registry, "com.twitter").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["kind"], "com.twitter");
        assert_eq!(json["version"], 2);
        assert_eq!(json["strategy"], "oauth2");
        assert_eq!(json["state_fields"], serde_json::json!(["id_str"]));
        assert_eq!(json["metadata"]["category"], "online");
    }

    #[tokio::test]
    async fn test_factories() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path());

        let output = factories(client.as_ref(), "com.weather").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["com.weather"]["type"], "none");
        assert_eq!(json["com.weather"]["text"], "com.weather");
    }
}
