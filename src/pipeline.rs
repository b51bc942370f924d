// Logwarden - GPL-3.0-or-later
// This file is part of Logwarden.
//
// Copyright (C) 2025 The Logwarden Contributors
//
// Logwarden is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Logwarden is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Logwarden.  If not, see <https://www.gnu.org/licenses/>.

//! End-to-end scoring run.
//!
//! raw lines -> parser -> features -> baseline (normal corpus) -> ensemble
//! scores (candidate corpus) -> calibration -> evidence -> [`RunReport`].
//!
//! Either the whole candidate corpus is scored, or the run fails with an
//! [`EngineError`]; partial results are never returned.

use crate::anomaly::{calibrate, Baseline, EvidenceAnnotator, ModelKind};
use crate::config::{resolve_threshold, EngineConfig, DEFAULT_THRESHOLD_Z};
use crate::error::{EngineError, Result};
use crate::features::FeatureExtractor;
use crate::parser::parse_corpus;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

/// One candidate line after scoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    /// Position among the successfully parsed candidate lines
    pub index: usize,
    pub line: String,
    /// Composite anomaly score
    pub score: f64,
    pub zscore: f64,
    pub flagged: bool,
    /// Matched suspicious tokens, comma-joined, empty if none
    pub reason_tokens: String,
}

impl ScoredRecord {
    pub fn evidence(&self) -> impl Iterator<Item = &str> {
        self.reason_tokens.split(',').filter(|t| !t.is_empty())
    }
}

/// Conditions that weaken a run without stopping it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// No normal lines parsed; the candidate corpus served as its own baseline
    EmptyNormalCorpus,
    /// The normal corpus is below the configured floor
    LowConfidenceBaseline { lines: usize, minimum: usize },
    /// A supplied threshold was unusable and the default was applied
    ThresholdFallback { raw: String, applied: f64 },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyNormalCorpus => write!(
                f,
                "no normal lines parsed; scoring the candidate corpus against itself"
            ),
            Self::LowConfidenceBaseline { lines, minimum } => write!(
                f,
                "only {lines} normal lines (want at least {minimum}); results are low confidence"
            ),
            Self::ThresholdFallback { raw, applied } => {
                write!(f, "invalid threshold {raw:?}, using {applied}")
            }
        }
    }
}

/// Everything a completed run produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub rows: Vec<ScoredRecord>,
    pub warnings: Vec<RunWarning>,
    pub models: Vec<ModelKind>,
    pub threshold_z: f64,
    pub training_rows: usize,
}

impl RunReport {
    pub fn flagged(&self) -> impl Iterator<Item = &ScoredRecord> {
        self.rows.iter().filter(|row| row.flagged)
    }

    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.flagged().count()
    }
}

/// A configured scoring run
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EngineConfig,
    extractor: FeatureExtractor,
    annotator: EvidenceAnnotator,
    warnings: Vec<RunWarning>,
}

impl Pipeline {
    #[must_use]
    pub fn new(mut config: EngineConfig) -> Self {
        let mut warnings = Vec::new();
        if !config.threshold_z.is_finite() {
            warnings.push(RunWarning::ThresholdFallback {
                raw: config.threshold_z.to_string(),
                applied: DEFAULT_THRESHOLD_Z,
            });
            config.threshold_z = DEFAULT_THRESHOLD_Z;
        }

        Self {
            extractor: FeatureExtractor::from_config(&config),
            annotator: EvidenceAnnotator::from_config(&config),
            config,
            warnings,
        }
    }

    /// Apply a threshold handed over by an external store.
    ///
    /// `None` keeps the configured threshold. A value that cannot be parsed
    /// falls back to the default and leaves a warning on every report.
    #[must_use]
    pub fn with_threshold_override(mut self, raw: Option<&str>) -> Self {
        if raw.is_none() {
            return self;
        }

        let resolution = resolve_threshold(raw);
        self.config.threshold_z = resolution.threshold_z;
        if let Some(raw) = resolution.rejected {
            self.warnings.push(RunWarning::ThresholdFallback {
                raw,
                applied: resolution.threshold_z,
            });
        }
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Train on `normal`, score `candidate`.
    pub fn run<N, C, S, T>(&self, normal: N, candidate: C) -> Result<RunReport>
    where
        N: IntoIterator<Item = S>,
        C: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let start = std::time::Instant::now();
        let mut warnings = self.warnings.clone();

        let normal = parse_corpus(normal);
        let candidate = parse_corpus(candidate);
        tracing::info!(
            "Parsed {} normal and {} candidate lines",
            normal.len(),
            candidate.len()
        );

        if candidate.is_empty() {
            tracing::error!("No candidate lines parsed; check log format");
            return Err(EngineError::EmptyCandidateCorpus);
        }

        let candidate_features = self.extractor.extract_all(&candidate);
        let normal_features = self.extractor.extract_all(&normal);

        let training = if normal_features.is_empty() {
            tracing::warn!("Normal corpus is empty, fitting on the candidate corpus");
            warnings.push(RunWarning::EmptyNormalCorpus);
            &candidate_features
        } else {
            if normal_features.len() < self.config.min_training_lines {
                tracing::warn!(
                    "Not enough training data: {} normal lines, want at least {}",
                    normal_features.len(),
                    self.config.min_training_lines
                );
                warnings.push(RunWarning::LowConfidenceBaseline {
                    lines: normal_features.len(),
                    minimum: self.config.min_training_lines,
                });
            }
            &normal_features
        };

        let baseline = Baseline::train(training, &self.config)?;
        let scores = baseline.score(&candidate_features);
        let calibration = calibrate(
            &scores.structural,
            scores.reconstruction.as_deref(),
            self.config.threshold_z,
        );

        let evidence: Vec<String> = candidate
            .par_iter()
            .map(|line| self.annotator.annotate(&line.raw))
            .collect();

        let rows: Vec<ScoredRecord> = candidate
            .into_iter()
            .zip(evidence)
            .enumerate()
            .map(|(index, (line, reason_tokens))| ScoredRecord {
                index,
                line: line.raw,
                score: calibration.composite[index],
                zscore: calibration.zscores[index],
                flagged: calibration.flags[index],
                reason_tokens,
            })
            .collect();

        tracing::info!(
            "Flagged {} of {} lines as anomalous (threshold_z={}) in {:?}",
            calibration.flagged_count(),
            rows.len(),
            self.config.threshold_z,
            start.elapsed()
        );

        Ok(RunReport {
            rows,
            warnings,
            models: scores.models(),
            threshold_z: self.config.threshold_z,
            training_rows: baseline.training_rows(),
        })
    }
}

/// Score `candidate` against `normal` with the given configuration
pub fn run<N, C, S, T>(normal: N, candidate: C, config: &EngineConfig) -> Result<RunReport>
where
    N: IntoIterator<Item = S>,
    C: IntoIterator<Item = T>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    Pipeline::new(config.clone()).run(normal, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconstructionMode;

    const UNIFORM: &str = r#"192.168.0.5 - - [10/Oct/2025:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 1024 "-" "Mozilla/5.0 (X11; Linux x86_64)""#;
    const INJECTION: &str = r#"203.0.113.9 - - [10/Oct/2025:13:56:02 +0000] "GET /search.php?q=1%20UNION/**/SELECT%20username,password%20FROM%20users HTTP/1.1" 200 87 "-" "sqlmap/1.7.2""#;

    fn normal_corpus(n: usize) -> Vec<&'static str> {
        vec![UNIFORM; n]
    }

    fn candidate_corpus() -> Vec<&'static str> {
        let mut lines = vec![UNIFORM; 9];
        lines.push(INJECTION);
        lines
    }

    fn configs() -> Vec<EngineConfig> {
        vec![
            EngineConfig::default(),
            EngineConfig {
                reconstruction: ReconstructionMode::Disabled,
                ..EngineConfig::default()
            },
        ]
    }

    #[test]
    fn test_injection_is_flagged() {
        for config in configs() {
            let report = run(normal_corpus(50), candidate_corpus(), &config).expect("run");
            assert_eq!(report.rows.len(), 10);
            assert!(report.warnings.is_empty(), "{:?}", report.warnings);

            let injection = &report.rows[9];
            let uniform = &report.rows[0];
            assert_eq!(injection.line, INJECTION);
            assert!(injection.score > uniform.score, "{report:?}");
            assert!(injection.flagged);
            assert!(!uniform.flagged);

            let evidence: Vec<&str> = injection.evidence().collect();
            assert!(evidence.contains(&"union"));
            assert!(evidence.contains(&"select"));
            assert_eq!(uniform.reason_tokens, "");
            assert_eq!(report.flagged_count(), 1);
        }
    }

    #[test]
    fn test_two_line_candidate_ranks_injection_higher() {
        // With two rows the z-scores are always -1 and +1, below the default
        // threshold, but the composite ordering still holds.
        for config in configs() {
            let report = run(normal_corpus(50), [UNIFORM, INJECTION], &config).expect("run");
            assert!(report.rows[1].score > report.rows[0].score);
            assert!(!report.rows[0].flagged);
            assert!(report.rows[1].zscore > report.rows[0].zscore);
            assert!(report.rows[1].evidence().any(|t| t == "union"));
        }
    }

    #[test]
    fn test_empty_candidate_is_fatal() {
        let result = run(
            normal_corpus(50),
            ["not a log line", "", "still not"],
            &EngineConfig::default(),
        );
        assert_eq!(result, Err(EngineError::EmptyCandidateCorpus));

        let result = run(normal_corpus(50), Vec::<String>::new(), &EngineConfig::default());
        assert_eq!(result, Err(EngineError::EmptyCandidateCorpus));
    }

    #[test]
    fn test_small_baseline_warns() {
        let report = run(normal_corpus(3), candidate_corpus(), &EngineConfig::default())
            .expect("low-confidence run still completes");
        assert_eq!(report.rows.len(), 10);
        assert_eq!(
            report.warnings,
            vec![RunWarning::LowConfidenceBaseline {
                lines: 3,
                minimum: 10
            }]
        );
    }

    #[test]
    fn test_empty_normal_corpus_warns() {
        let report = run(
            Vec::<String>::new(),
            candidate_corpus(),
            &EngineConfig::default(),
        )
        .expect("run without baseline");
        assert_eq!(report.warnings, vec![RunWarning::EmptyNormalCorpus]);
        assert_eq!(report.training_rows, 10);
        assert_eq!(report.rows.len(), 10);
    }

    #[test]
    fn test_malformed_candidate_lines_are_dropped() {
        let mut candidate = candidate_corpus();
        candidate.insert(3, "garbage");
        let report = run(normal_corpus(50), candidate, &EngineConfig::default()).expect("run");
        assert_eq!(report.rows.len(), 10);
        assert!(report.rows.iter().enumerate().all(|(i, r)| r.index == i));
    }

    #[test]
    fn test_single_model_scores_pass_through() {
        let config = EngineConfig {
            reconstruction: ReconstructionMode::Disabled,
            ..EngineConfig::default()
        };
        let report = run(normal_corpus(50), candidate_corpus(), &config).expect("run");

        let extractor = FeatureExtractor::from_config(&config);
        let normal = extractor.extract_all(&parse_corpus(normal_corpus(50)));
        let candidate = extractor.extract_all(&parse_corpus(candidate_corpus()));
        let baseline = Baseline::train(&normal, &config).expect("train");
        let raw = baseline.score(&candidate);

        assert_eq!(raw.reconstruction, None);
        assert_eq!(report.rows.len(), raw.structural.len());
        for (row, structural) in report.rows.iter().zip(&raw.structural) {
            assert_eq!(row.score.to_bits(), structural.to_bits());
        }
    }

    #[test]
    fn test_near_duplicate_ranks_between_duplicate_and_injection() {
        let config = EngineConfig {
            reconstruction: ReconstructionMode::Disabled,
            ..EngineConfig::default()
        };
        let size_variant = UNIFORM.replace(" 200 1024 ", " 200 1025 ");
        let mut candidate: Vec<&str> = vec![UNIFORM; 8];
        candidate.push(&size_variant);
        candidate.push(INJECTION);

        let report = run(normal_corpus(50), candidate, &config).expect("run");
        let (duplicate, variant, injection) = (&report.rows[0], &report.rows[8], &report.rows[9]);
        assert!(variant.score > duplicate.score, "{report:?}");
        assert!(injection.score > variant.score, "{report:?}");
        assert!(injection.flagged);
    }

    #[test]
    fn test_single_model_run_is_reproducible() {
        let config = EngineConfig {
            reconstruction: ReconstructionMode::Disabled,
            ..EngineConfig::default()
        };
        let a = run(normal_corpus(50), candidate_corpus(), &config).expect("run");
        let b = run(normal_corpus(50), candidate_corpus(), &config).expect("run");
        assert_eq!(a.models, vec![ModelKind::Structural]);
        for (x, y) in a.rows.iter().zip(&b.rows) {
            assert_eq!(x.score.to_bits(), y.score.to_bits());
            assert_eq!(x.zscore.to_bits(), y.zscore.to_bits());
        }
    }

    #[test]
    fn test_threshold_override() {
        let pipeline = Pipeline::new(EngineConfig::default()).with_threshold_override(Some("10"));
        let report = pipeline
            .run(normal_corpus(50), candidate_corpus())
            .expect("run");
        assert!((report.threshold_z - 10.0).abs() < f64::EPSILON);
        assert_eq!(report.flagged_count(), 0);
        assert!(report.warnings.is_empty());

        let pipeline = Pipeline::new(EngineConfig::default()).with_threshold_override(Some("abc"));
        let report = pipeline
            .run(normal_corpus(50), candidate_corpus())
            .expect("run");
        assert!((report.threshold_z - 1.5).abs() < f64::EPSILON);
        assert_eq!(
            report.warnings,
            vec![RunWarning::ThresholdFallback {
                raw: "abc".to_string(),
                applied: 1.5
            }]
        );
        assert_eq!(report.flagged_count(), 1);
    }

    #[test]
    fn test_non_finite_config_threshold_falls_back() {
        let config = EngineConfig {
            threshold_z: f64::NAN,
            ..EngineConfig::default()
        };
        let pipeline = Pipeline::new(config);
        assert!((pipeline.config().threshold_z - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evidence_independent_of_flag() {
        // Path-traversal marker in the user agent only; the path-based
        // feature never sees it, the evidence scan does.
        let sneaky = UNIFORM.replace("Mozilla/5.0 (X11; Linux x86_64)", "../../ua");
        let mut candidate: Vec<&str> = candidate_corpus();
        candidate.push(&sneaky);
        let report = run(normal_corpus(50), candidate, &EngineConfig::default()).expect("run");
        let row = &report.rows[10];
        assert_eq!(row.reason_tokens, "../");
        let annotator = EvidenceAnnotator::from_config(&EngineConfig::default());
        for row in &report.rows {
            assert_eq!(row.reason_tokens, annotator.annotate(&row.line));
        }
    }
}
