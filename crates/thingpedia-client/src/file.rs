//! File-backed Thingpedia client
//!
//! Serves manifests, entity types and examples from local files. The
//! files are read and parsed once, on the first call that needs them.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use thingpedia_core::{
    grammar, ConfigStrategy, Dataset, DeviceCategory, ExampleIndex, Library, Manifest,
    ManifestBundle,
};

use crate::client::{ClientError, ThingpediaClient};
use crate::types::{
    DeviceFactory, DeviceListRecord, DeviceNameRecord, DeviceSetup, DeviceSetupMap,
    EntityLookupResult, EntityTypeRecord, LocationInput, LocationRecord, MultipleDeviceFactory,
};

/// Name prefix of keyword search datasets
pub const BY_KEY_PREFIX: &str = "org.thingpedia.dynamic.by_key";

/// Paths of the files backing a [`FileClient`]
#[derive(Debug, Clone)]
pub struct FileClientOptions {
    pub locale: String,
    /// Manifest bundle source
    pub thingpedia: PathBuf,
    /// Entity types as `{"data": [...]}`
    pub entities: Option<PathBuf>,
    /// Example dataset source
    pub dataset: Option<PathBuf>,
}

#[derive(Deserialize)]
struct EntityFile {
    data: Vec<EntityTypeRecord>,
}

/// Everything read from disk, parsed
struct Loaded {
    source: String,
    bundle: ManifestBundle,
    entities: Vec<EntityTypeRecord>,
    dataset_source: Option<String>,
    dataset: Option<Dataset>,
    index: ExampleIndex,
}

pub struct FileClient {
    options: FileClientOptions,
    loaded: OnceCell<Loaded>,
}

impl FileClient {
    pub fn new(options: FileClientOptions) -> Self {
        Self {
            options,
            loaded: OnceCell::new(),
        }
    }

    async fn ensure_loaded(&self) -> Result<&Loaded, ClientError> {
        self.loaded.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<Loaded, ClientError> {
        let source = tokio::fs::read_to_string(&self.options.thingpedia).await?;
        let bundle = ManifestBundle::parse(&source)?;

        let entities = match &self.options.entities {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                serde_json::from_str::<EntityFile>(&raw)?.data
            }
            None => Vec::new(),
        };

        let (dataset_source, dataset) = match &self.options.dataset {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                let dataset = grammar::parse_dataset(&raw)?;
                (Some(raw), Some(dataset))
            }
            None => (None, None),
        };
        let index = dataset.as_ref().map(ExampleIndex::build).unwrap_or_default();

        info!(
            path = %self.options.thingpedia.display(),
            devices = bundle.len(),
            entities = entities.len(),
            examples = dataset.as_ref().map_or(0, |d| d.examples.len()),
            "Loaded Thingpedia files"
        );

        Ok(Loaded {
            source,
            bundle,
            entities,
            dataset_source,
            dataset,
            index,
        })
    }

    /// Concrete manifests paired with their resolved config strategy
    fn configurable<'a>(
        loaded: &'a Loaded,
        category: Option<&'a str>,
    ) -> impl Iterator<Item = Result<(&'a Manifest, ConfigStrategy), ClientError>> + 'a {
        loaded
            .bundle
            .iter()
            .filter(|m| !m.class().is_abstract)
            .filter(move |m| in_category(m, category))
            .map(|m| -> Result<_, ClientError> {
                Ok((m, ConfigStrategy::resolve(m.config_mixin())?))
            })
    }
}

/// Unknown category names match nothing
fn in_category(manifest: &Manifest, category: Option<&str>) -> bool {
    category.map_or(true, |c| DeviceCategory::parse(c) == Some(manifest.category()))
}

fn by_key_name(key: &str) -> String {
    let sanitized: String = key
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        BY_KEY_PREFIX.to_string()
    } else {
        format!("{}.{}", BY_KEY_PREFIX, sanitized)
    }
}

fn print_dataset(dataset: Dataset) -> Result<String, ClientError> {
    Ok(Library {
        classes: Vec::new(),
        datasets: vec![dataset],
    }
    .prettyprint()?)
}

#[async_trait]
impl ThingpediaClient for FileClient {
    fn locale(&self) -> &str {
        &self.options.locale
    }

    async fn get_module_location(&self, _kind: &str) -> Result<String, ClientError> {
        Err(ClientError::Unsupported("get_module_location"))
    }

    async fn get_device_code(&self, kind: &str) -> Result<String, ClientError> {
        let loaded = self.ensure_loaded().await?;
        let manifest = loaded
            .bundle
            .find(kind)
            .ok_or_else(|| ClientError::NotFound(kind.to_string()))?;
        Ok(manifest.prettyprint()?)
    }

    async fn get_schemas(
        &self,
        kinds: &[String],
        _with_metadata: bool,
    ) -> Result<String, ClientError> {
        let loaded = self.ensure_loaded().await?;
        debug!(requested = kinds.len(), "Returning the full manifest bundle");
        Ok(loaded.source.clone())
    }

    async fn get_device_list(
        &self,
        category: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<DeviceListRecord>, ClientError> {
        let loaded = self.ensure_loaded().await?;
        Ok(loaded
            .bundle
            .iter()
            .filter(|m| !m.class().is_abstract)
            .filter(|m| in_category(m, category))
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .map(DeviceListRecord::from_manifest)
            .collect())
    }

    async fn search_device(&self, query: &str) -> Result<Vec<DeviceListRecord>, ClientError> {
        let loaded = self.ensure_loaded().await?;
        let query = query.to_lowercase();
        Ok(loaded
            .bundle
            .iter()
            .filter(|m| !m.class().is_abstract)
            .filter(|m| {
                [m.kind(), m.name(), m.description(), m.canonical().as_str()]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .map(DeviceListRecord::from_manifest)
            .collect())
    }

    async fn get_device_factories(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<DeviceFactory>, ClientError> {
        let loaded = self.ensure_loaded().await?;
        Self::configurable(loaded, category)
            .map(|entry| entry.map(|(m, strategy)| DeviceFactory::new(m, &strategy)))
            .collect()
    }

    async fn get_device_setup(&self, kinds: &[String]) -> Result<DeviceSetupMap, ClientError> {
        let loaded = self.ensure_loaded().await?;
        let mut setup = BTreeMap::new();

        for kind in kinds {
            let entry = match loaded.bundle.find(kind) {
                Some(m) if !m.class().is_abstract => {
                    let strategy = ConfigStrategy::resolve(m.config_mixin())?;
                    Some(DeviceSetup::Single(DeviceFactory::new(m, &strategy)))
                }
                found => {
                    let choices = Self::configurable(loaded, None)
                        .filter(|entry| {
                            entry
                                .as_ref()
                                .map_or(true, |(m, _)| m.class().extends.iter().any(|e| e == kind))
                        })
                        .map(|entry| entry.map(|(m, strategy)| DeviceFactory::new(m, &strategy)))
                        .collect::<Result<Vec<_>, _>>()?;
                    if choices.is_empty() {
                        None
                    } else {
                        let text = found
                            .map(Manifest::canonical)
                            .unwrap_or_else(|| kind.replace('.', " "));
                        Some(DeviceSetup::Multiple(MultipleDeviceFactory::new(text, choices)))
                    }
                }
            };
            setup.insert(kind.clone(), entry);
        }
        Ok(setup)
    }

    async fn get_kind_by_discovery(
        &self,
        public_data: &serde_json::Value,
    ) -> Result<String, ClientError> {
        let loaded = self.ensure_loaded().await?;
        let wanted = public_data.get("kind").and_then(|v| v.as_str());
        for entry in Self::configurable(loaded, None) {
            let (manifest, strategy) = entry?;
            if let ConfigStrategy::Discovery { discovery_type } = &strategy {
                if wanted.is_some() && discovery_type.as_deref() == wanted {
                    return Ok(manifest.kind().to_string());
                }
            }
        }
        Err(ClientError::NotFound(public_data.to_string()))
    }

    async fn get_examples_by_key(&self, key: &str) -> Result<String, ClientError> {
        let loaded = self.ensure_loaded().await?;
        let needle = key.to_lowercase();
        let examples = loaded
            .dataset
            .iter()
            .flat_map(|d| d.examples.iter())
            .filter(|e| {
                e.utterances()
                    .iter()
                    .any(|u| u.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        print_dataset(Dataset::new(by_key_name(key), "en", examples))
    }

    async fn get_examples_by_kinds(&self, kinds: &[String]) -> Result<String, ClientError> {
        let loaded = self.ensure_loaded().await?;
        Ok(loaded.index.regenerate(kinds)?)
    }

    async fn click_example(&self, example_id: i64) -> Result<(), ClientError> {
        debug!(example_id, "Ignoring example click");
        Ok(())
    }

    async fn lookup_entity(
        &self,
        _entity_type: &str,
        _search_term: &str,
    ) -> Result<EntityLookupResult, ClientError> {
        Err(ClientError::Unsupported("lookup_entity"))
    }

    async fn lookup_location(
        &self,
        _search_term: &str,
        _around: Option<LocationInput>,
    ) -> Result<Vec<LocationRecord>, ClientError> {
        Err(ClientError::Unsupported("lookup_location"))
    }

    async fn get_all_examples(&self) -> Result<String, ClientError> {
        let loaded = self.ensure_loaded().await?;
        loaded
            .dataset_source
            .clone()
            .ok_or_else(|| ClientError::NotFound("example dataset".to_string()))
    }

    async fn get_all_device_names(&self) -> Result<Vec<DeviceNameRecord>, ClientError> {
        let loaded = self.ensure_loaded().await?;
        Ok(loaded
            .bundle
            .iter()
            .map(|m| DeviceNameRecord {
                kind: m.kind().to_string(),
                kind_canonical: m.canonical(),
            })
            .collect())
    }

    async fn get_all_entity_types(&self) -> Result<Vec<EntityTypeRecord>, ClientError> {
        Ok(self.ensure_loaded().await?.entities.clone())
    }
}
