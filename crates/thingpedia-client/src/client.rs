//! The Thingpedia client interface
//!
//! Every transport (remote HTTP service, local file fixture) implements
//! [`ThingpediaClient`]. Manifest and dataset operations return DSL source
//! text; the caller parses it.

use async_trait::async_trait;
use thiserror::Error;

use thingpedia_core::{ParseError, SerializeError, SynthesisError};

use crate::types::{
    DeviceFactory, DeviceListRecord, DeviceNameRecord, DeviceSetupMap, EntityLookupResult,
    EntityTypeRecord, LocationInput, LocationRecord,
};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse Thingpedia source: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to serialize Thingpedia source: {0}")]
    Serialize(#[from] SerializeError),

    #[error("Invalid device configuration: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid Thingpedia URL: {0}")]
    InvalidUrl(String),

    #[error("Thingpedia server error: {0}")]
    Server(String),

    #[error("Operation not supported by this client: {0}")]
    Unsupported(&'static str),
}

#[async_trait]
pub trait ThingpediaClient: Send + Sync {
    /// Locale tag sent with every request (e.g. `en-US`)
    fn locale(&self) -> &str;

    /// Where the code package for a device kind can be downloaded
    async fn get_module_location(&self, kind: &str) -> Result<String, ClientError>;

    /// Source of one device class; `NotFound` for unknown kinds
    async fn get_device_code(&self, kind: &str) -> Result<String, ClientError>;

    /// Source of a manifest bundle
    ///
    /// Implementations may ignore `kinds` and return every manifest they
    /// know; callers must filter the result themselves.
    async fn get_schemas(&self, kinds: &[String], with_metadata: bool)
        -> Result<String, ClientError>;

    /// One page of the device list, optionally restricted to a category
    async fn get_device_list(
        &self,
        category: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<DeviceListRecord>, ClientError>;

    async fn search_device(&self, query: &str) -> Result<Vec<DeviceListRecord>, ClientError>;

    /// Factories of every configurable device, optionally restricted to a category
    async fn get_device_factories(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<DeviceFactory>, ClientError>;

    /// How to set up each of `kinds`, resolving abstract classes to their implementors
    async fn get_device_setup(&self, kinds: &[String]) -> Result<DeviceSetupMap, ClientError>;

    /// Map a discovery descriptor to the kind handling it
    async fn get_kind_by_discovery(
        &self,
        public_data: &serde_json::Value,
    ) -> Result<String, ClientError>;

    /// Dataset source of the examples matching a keyword
    async fn get_examples_by_key(&self, key: &str) -> Result<String, ClientError>;

    /// Dataset source of the examples for the given kinds, in request order
    async fn get_examples_by_kinds(&self, kinds: &[String]) -> Result<String, ClientError>;

    /// Record that the user picked an example
    async fn click_example(&self, example_id: i64) -> Result<(), ClientError>;

    async fn lookup_entity(
        &self,
        entity_type: &str,
        search_term: &str,
    ) -> Result<EntityLookupResult, ClientError>;

    async fn lookup_location(
        &self,
        search_term: &str,
        around: Option<LocationInput>,
    ) -> Result<Vec<LocationRecord>, ClientError>;

    /// Source of the full example dataset
    async fn get_all_examples(&self) -> Result<String, ClientError>;

    async fn get_all_device_names(&self) -> Result<Vec<DeviceNameRecord>, ClientError>;

    async fn get_all_entity_types(&self) -> Result<Vec<EntityTypeRecord>, ClientError>;
}
