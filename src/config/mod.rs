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

//! Engine configuration.
//!
//! Everything the scoring pipeline needs is passed in explicitly through
//! [`EngineConfig`]; nothing in the library reads the environment. Where the
//! values come from (a JSON file, a CLI flag, a secret store) is up to the
//! caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Flagging threshold used when no valid value is supplied
pub const DEFAULT_THRESHOLD_Z: f64 = 1.5;

/// Baselines smaller than this still train, but the run carries a warning
pub const DEFAULT_MIN_TRAINING_LINES: usize = 10;

/// Attack-signature substrings, matched against lower-cased text
pub const DEFAULT_SUSPICIOUS_TOKENS: [&str; 13] = [
    "union",
    "select",
    "drop",
    "sleep(",
    "' or '1'='1",
    "%27",
    "../",
    ";--",
    "xp_cmdshell",
    "<script",
    "benchmark(",
    "load_file",
    "outfile",
];

pub const DEFAULT_METHOD_IDS: [(&str, i32); 7] = [
    ("GET", 0),
    ("POST", 1),
    ("PUT", 2),
    ("DELETE", 3),
    ("PATCH", 4),
    ("HEAD", 5),
    ("OPTIONS", 6),
];

/// Whether the reconstruction-error model should be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionMode {
    /// Train it when the build supports it, skip silently otherwise
    #[default]
    Auto,
    Disabled,
}

/// Isolation forest hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Upper bound on the per-tree subsample; the forest uses min(this, n)
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Autoencoder training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for AutoencoderParams {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 1e-3,
            seed: 42,
        }
    }
}

/// Complete configuration for one scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub threshold_z: f64,
    /// Ordered; evidence is reported in this order
    pub suspicious_tokens: Vec<String>,
    /// HTTP method to categorical id, matched case-insensitively
    pub method_ids: Vec<(String, i32)>,
    pub reconstruction: ReconstructionMode,
    pub forest: ForestParams,
    pub autoencoder: AutoencoderParams,
    pub min_training_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold_z: DEFAULT_THRESHOLD_Z,
            suspicious_tokens: DEFAULT_SUSPICIOUS_TOKENS
                .iter()
                .map(ToString::to_string)
                .collect(),
            method_ids: DEFAULT_METHOD_IDS
                .iter()
                .map(|(method, id)| ((*method).to_string(), *id))
                .collect(),
            reconstruction: ReconstructionMode::default(),
            forest: ForestParams::default(),
            autoencoder: AutoencoderParams::default(),
            min_training_lines: DEFAULT_MIN_TRAINING_LINES,
        }
    }
}

impl EngineConfig {
    /// Get the path to the user config file
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("logwarden").join("config.json"))
    }

    /// Load config from disk, returning defaults if missing or unreadable
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No config found at {path:?}, using defaults");
            return Self::default();
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to read config {path:?}: {e}; using defaults");
                return Self::default();
            }
        };

        serde_json::from_str::<Self>(&contents).map_or_else(
            |e| {
                tracing::warn!("Failed to parse config {path:?}: {e}; using defaults");
                Self::default()
            },
            |config| {
                tracing::info!(
                    "Loaded config from {path:?} ({} suspicious tokens, threshold_z={})",
                    config.suspicious_tokens.len(),
                    config.threshold_z
                );
                config.sanitized()
            },
        )
    }

    /// Save config to disk as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {e}"))?;

        tracing::info!("Saved config to {path:?}");
        Ok(())
    }

    /// Replace an unusable threshold with the default
    fn sanitized(mut self) -> Self {
        if !self.threshold_z.is_finite() {
            tracing::warn!(
                "Config threshold_z {} is not finite, using {DEFAULT_THRESHOLD_Z}",
                self.threshold_z
            );
            self.threshold_z = DEFAULT_THRESHOLD_Z;
        }
        self
    }
}

/// Outcome of interpreting an externally supplied threshold value
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResolution {
    pub threshold_z: f64,
    /// The supplied value that could not be used, if any
    pub rejected: Option<String>,
}

/// Interpret a threshold value handed over by the caller's secret or config store.
///
/// Missing values quietly resolve to the default. Values that are present but
/// not a finite number also resolve to the default, and are reported back in
/// `rejected` so the run can carry a warning.
#[must_use]
pub fn resolve_threshold(raw: Option<&str>) -> ThresholdResolution {
    let Some(raw) = raw else {
        return ThresholdResolution {
            threshold_z: DEFAULT_THRESHOLD_Z,
            rejected: None,
        };
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => ThresholdResolution {
            threshold_z: value,
            rejected: None,
        },
        _ => {
            tracing::warn!("Ignoring invalid threshold {raw:?}, using {DEFAULT_THRESHOLD_Z}");
            ThresholdResolution {
                threshold_z: DEFAULT_THRESHOLD_Z,
                rejected: Some(raw.to_string()),
            }
        }
    }
}
