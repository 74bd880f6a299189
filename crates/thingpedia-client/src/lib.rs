//! Thingpedia Client - Access to manifests, examples and entities
//!
//! This crate provides:
//! - The [`ThingpediaClient`] interface and its record types
//! - A file-backed client for local development and tests
//! - An HTTP client for the Thingpedia v3 REST API
//! - A registry of module loaders keyed by device kind

pub mod client;
pub mod file;
pub mod http;
pub mod registry;
pub mod types;

pub use client::{ClientError, ThingpediaClient};
pub use file::{FileClient, FileClientOptions};
pub use http::{HttpClient, DEFAULT_TIMEOUT, THINGPEDIA_URL};
pub use registry::{ModuleRegistry, RegistryError};
pub use types::{
    DeviceFactory, DeviceListRecord, DeviceNameRecord, DeviceSetup, DeviceSetupMap,
    EntityLookupMeta, EntityLookupResult, EntityRecord, EntityTypeRecord, LocationInput,
    LocationRecord, MultipleDeviceFactory,
};
