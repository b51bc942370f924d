use crate::features::FeatureVector;
use serde::Serialize;
use std::fmt;

/// Which family a fitted model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Recursive-partitioning outlier model, always present
    Structural,
    /// Encode/decode model scored by reconstruction error, optional
    Reconstruction,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural => write!(f, "isolation-forest"),
            Self::Reconstruction => write!(f, "autoencoder"),
        }
    }
}

/// Trait for fitted anomaly models
///
/// Implementations are read-only once fitted, so one model can score many
/// rows from several threads.
pub trait ScoreModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// One score per row, in row order. Higher = more anomalous, whatever
    /// the model's native convention is.
    fn score(&self, rows: &[FeatureVector]) -> Vec<f64>;
}
