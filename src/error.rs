//! Fatal error types for a scoring run.
//!
//! Anything recoverable (short baseline, bad threshold value, missing
//! reconstruction model) is reported as a [`crate::pipeline::RunWarning`]
//! instead and never ends up here.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The candidate corpus yielded no parseable access-log lines
    #[error("no candidate lines parsed; check the log format")]
    EmptyCandidateCorpus,

    /// A model was asked to fit on zero feature vectors
    #[error("cannot fit a model on an empty training set")]
    EmptyTrainingSet,
}

pub type Result<T> = std::result::Result<T, EngineError>;
