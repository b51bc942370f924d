//! Baseline training and ensemble scoring.

use crate::anomaly::isolation::IsolationForest;
use crate::anomaly::model::{ModelKind, ScoreModel};
use crate::config::{AutoencoderParams, EngineConfig, ReconstructionMode};
use crate::error::Result;
use crate::features::FeatureVector;

/// Models fitted on the normal corpus.
///
/// The structural slot is always filled; the reconstruction slot is empty
/// whenever that model could not be built, which is an ordinary state.
pub struct Baseline {
    structural: Box<dyn ScoreModel>,
    reconstruction: Option<Box<dyn ScoreModel>>,
    training_rows: usize,
}

/// Raw per-model scores for one candidate corpus, aligned by row
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleScores {
    pub structural: Vec<f64>,
    pub reconstruction: Option<Vec<f64>>,
}

impl EnsembleScores {
    #[must_use]
    pub fn models(&self) -> Vec<ModelKind> {
        let mut models = vec![ModelKind::Structural];
        if self.reconstruction.is_some() {
            models.push(ModelKind::Reconstruction);
        }
        models
    }
}

impl Baseline {
    /// Fit every available model on the baseline rows
    pub fn train(rows: &[FeatureVector], config: &EngineConfig) -> Result<Self> {
        let structural = IsolationForest::fit(rows, &config.forest)?;

        let reconstruction = match config.reconstruction {
            ReconstructionMode::Disabled => {
                tracing::debug!("Reconstruction model disabled by configuration");
                None
            }
            ReconstructionMode::Auto => train_reconstruction(rows, &config.autoencoder),
        };

        tracing::info!(
            "Trained baseline on {} rows (reconstruction model {})",
            rows.len(),
            if reconstruction.is_some() {
                "available"
            } else {
                "unavailable"
            }
        );

        Ok(Self {
            structural: Box::new(structural),
            reconstruction,
            training_rows: rows.len(),
        })
    }

    /// Assemble a baseline from already fitted models
    #[must_use]
    pub const fn from_models(
        structural: Box<dyn ScoreModel>,
        reconstruction: Option<Box<dyn ScoreModel>>,
        training_rows: usize,
    ) -> Self {
        Self {
            structural,
            reconstruction,
            training_rows,
        }
    }

    #[must_use]
    pub const fn training_rows(&self) -> usize {
        self.training_rows
    }

    #[must_use]
    pub const fn has_reconstruction(&self) -> bool {
        self.reconstruction.is_some()
    }

    /// Score candidate rows with every model in the ensemble.
    ///
    /// A reconstruction model that returns nothing, or anything non-finite,
    /// is treated as if it were not there.
    #[must_use]
    pub fn score(&self, rows: &[FeatureVector]) -> EnsembleScores {
        let (structural, reconstruction) = rayon::join(
            || self.structural.score(rows),
            || self.reconstruction.as_ref().map(|model| model.score(rows)),
        );

        let reconstruction = reconstruction.filter(|scores| {
            let usable = !scores.is_empty() && scores.iter().all(|s| s.is_finite());
            if !usable {
                tracing::debug!("Reconstruction model produced no usable scores, skipping it");
            }
            usable
        });

        EnsembleScores {
            structural,
            reconstruction,
        }
    }
}

#[cfg(feature = "autoencoder")]
fn train_reconstruction(
    rows: &[FeatureVector],
    params: &AutoencoderParams,
) -> Option<Box<dyn ScoreModel>> {
    use crate::anomaly::autoencoder::Autoencoder;

    Autoencoder::fit(rows, params).map(|model| Box::new(model) as Box<dyn ScoreModel>)
}

#[cfg(not(feature = "autoencoder"))]
fn train_reconstruction(
    _rows: &[FeatureVector],
    _params: &AutoencoderParams,
) -> Option<Box<dyn ScoreModel>> {
    tracing::debug!("Built without the autoencoder feature");
    None
}
