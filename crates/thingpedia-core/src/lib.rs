//! Thingpedia Core - Manifest loading and example indexing
//!
//! This crate provides the client-side runtime pieces of Thingpedia:
//! - Parsing and printing of class manifests and example datasets
//! - Config mixin resolution (none, OAuth2, form, interactive, discovery)
//! - Synthesis of device modules and a per-kind module cache
//! - Indexing of example programs by the single device they use

pub mod ast;
pub mod config;
pub mod dataset;
pub mod grammar;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod print;

pub use ast::{ClassDef, Dataset, Example, ImportStmt, Library, Selector, Value};
pub use config::{ConfigStrategy, FormParam, StrategyKind};
pub use dataset::{extract_device_kinds, ExampleIndex};
pub use grammar::{parse, parse_class, parse_dataset, ParseError};
pub use loader::ModuleLoader;
pub use manifest::{DeviceCategory, DeviceMetadata, FormField, Manifest, ManifestBundle};
pub use module::{
    synthesize, Availability, ConfigMethod, DeviceState, GenericDevice, HookError, InstallHook,
    InstallHooks, ResolvedModule, SynthesisError,
};
pub use print::SerializeError;
