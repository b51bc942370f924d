//! Access record to fixed-width numeric feature vector.
//!
//! The column order is part of the model contract: a model fitted on vectors
//! from one [`FeatureExtractor`] must only ever score vectors with the same
//! layout, which is why the layout lives in a single constant.

pub mod entropy;

use crate::config::EngineConfig;
use crate::parser::{AccessRecord, ParsedLine};
use entropy::shannon_entropy;
use rayon::prelude::*;
use serde::Serialize;

pub const FEATURE_COUNT: usize = 8;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "method_id",
    "status",
    "response_size",
    "path_length",
    "query_length",
    "path_entropy",
    "user_agent_entropy",
    "suspicious_token",
];

/// One record's features, in [`FEATURE_NAMES`] order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    #[must_use]
    pub const fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Method id used for methods missing from the mapping
pub const UNKNOWN_METHOD_ID: i32 = -1;

/// Turns parsed records into feature vectors
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    /// Upper-cased method names
    method_ids: Vec<(String, i32)>,
    /// Lower-cased attack signatures
    suspicious_tokens: Vec<String>,
}

impl FeatureExtractor {
    #[must_use]
    pub fn new(method_ids: &[(String, i32)], suspicious_tokens: &[String]) -> Self {
        Self {
            method_ids: method_ids
                .iter()
                .map(|(method, id)| (method.to_uppercase(), *id))
                .collect(),
            // An empty signature would match every path
            suspicious_tokens: suspicious_tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.method_ids, &config.suspicious_tokens)
    }

    #[must_use]
    pub fn method_id(&self, method: &str) -> i32 {
        let method = method.to_uppercase();
        self.method_ids
            .iter()
            .find(|(name, _)| *name == method)
            .map_or(UNKNOWN_METHOD_ID, |(_, id)| *id)
    }

    /// True if the lower-cased path contains any attack signature
    #[must_use]
    pub fn is_suspicious_path(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.suspicious_tokens
            .iter()
            .any(|token| path.contains(token.as_str()))
    }

    #[must_use]
    pub fn extract(&self, record: &AccessRecord) -> FeatureVector {
        let query_length = record.query().map_or(0, |q| q.chars().count());

        FeatureVector([
            f64::from(self.method_id(&record.method)),
            f64::from(record.status),
            record.size as f64,
            record.path.chars().count() as f64,
            query_length as f64,
            shannon_entropy(&record.path),
            shannon_entropy(&record.user_agent),
            if self.is_suspicious_path(&record.path) {
                1.0
            } else {
                0.0
            },
        ])
    }

    /// Extract every line's features, preserving order
    #[must_use]
    pub fn extract_all(&self, lines: &[ParsedLine]) -> Vec<FeatureVector> {
        lines
            .par_iter()
            .map(|line| self.extract(&line.record))
            .collect()
    }
}
