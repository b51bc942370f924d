#[cfg(feature = "autoencoder")]
pub mod autoencoder;
pub mod combine;
pub mod ensemble;
pub mod evidence;
pub mod isolation;
pub mod model;

pub use combine::{calibrate, Calibration};
pub use ensemble::{Baseline, EnsembleScores};
pub use evidence::EvidenceAnnotator;
pub use model::{ModelKind, ScoreModel};
