//! Text exposition (format 0.0.4) and series filtering.

use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::HashSet;

use crate::errors::{ExporterError, Result};

pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const HISTOGRAM_SUFFIXES: [&str; 3] = ["_bucket", "_sum", "_count"];

/// Set of series names a client asked for. Empty selects everything.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    names: HashSet<String>,
}

impl NameFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .filter(|n: &String| !n.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// A histogram also matches by any of its sample names.
    pub fn matches(&self, family: &MetricFamily) -> bool {
        if self.names.is_empty() || self.names.contains(family.get_name()) {
            return true;
        }
        family.get_field_type() == MetricType::HISTOGRAM
            && HISTOGRAM_SUFFIXES
                .iter()
                .any(|suffix| self.names.contains(&format!("{}{}", family.get_name(), suffix)))
    }

    pub fn apply(&self, families: Vec<MetricFamily>) -> Vec<MetricFamily> {
        if self.is_empty() {
            return families;
        }
        families.into_iter().filter(|f| self.matches(f)).collect()
    }
}

pub fn encode_text(families: &[MetricFamily]) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(families, &mut buffer)
        .map_err(|e| ExporterError::encoding(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ExporterError::encoding(format!("Metrics output is not UTF-8: {}", e)))
}
