//! Per-device example index
//!
//! Examples are indexed under a device kind only when their primitives
//! reference exactly one device. Examples with no device primitive, or with
//! primitives from several devices, stay in the full dataset but are never
//! returned by a per-device lookup.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::ast::{Dataset, Example, Library};
use crate::print::SerializeError;

/// Name prefix of regenerated per-kind datasets
pub const BY_KINDS_PREFIX: &str = "org.thingpedia.dynamic.by_kinds";

/// Locale tag of regenerated datasets
pub const REGENERATED_LANGUAGE: &str = "en";

/// Distinct device kinds referenced by an example's primitives
pub fn extract_device_kinds(example: &Example) -> BTreeSet<String> {
    example
        .iterate_primitives()
        .filter_map(|invocation| invocation.selector.kind())
        .map(str::to_string)
        .collect()
}

/// Deterministic dataset name for a list of kinds
pub fn by_kinds_name(kinds: &[String]) -> String {
    if kinds.is_empty() {
        BY_KINDS_PREFIX.to_string()
    } else {
        format!("{}.{}", BY_KINDS_PREFIX, kinds.join("__"))
    }
}

/// Examples bucketed by the single device kind they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExampleIndex {
    buckets: BTreeMap<String, Vec<Example>>,
}

impl ExampleIndex {
    pub fn build(dataset: &Dataset) -> Self {
        let mut buckets: BTreeMap<String, Vec<Example>> = BTreeMap::new();
        let mut skipped = 0usize;

        for example in &dataset.examples {
            let kinds = extract_device_kinds(example);
            if kinds.len() != 1 {
                skipped += 1;
                continue;
            }
            if let Some(kind) = kinds.into_iter().next() {
                buckets.entry(kind).or_default().push(example.clone());
            }
        }

        debug!(
            dataset = %dataset.name,
            examples = dataset.examples.len(),
            devices = buckets.len(),
            skipped,
            "Indexed examples by device"
        );
        Self { buckets }
    }

    /// Examples for one kind, in dataset order; empty for unknown kinds
    pub fn bucket(&self, kind: &str) -> &[Example] {
        self.buckets.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Number of indexed examples across all buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Concatenate the buckets of `kinds`, in the order given
    ///
    /// Repeated kinds contribute their bucket again; unknown kinds
    /// contribute nothing.
    pub fn dataset_for(&self, kinds: &[String]) -> Dataset {
        let examples = kinds
            .iter()
            .flat_map(|kind| self.bucket(kind).iter().cloned())
            .collect();
        Dataset::new(by_kinds_name(kinds), REGENERATED_LANGUAGE, examples)
    }

    /// Serialize the dataset for `kinds` back to source text
    pub fn regenerate(&self, kinds: &[String]) -> Result<String, SerializeError> {
        Library {
            classes: Vec::new(),
            datasets: vec![self.dataset_for(kinds)],
        }
        .prettyprint()
    }
}
