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

//! Access-log anomaly scoring.
//!
//! Parses web access logs into fixed-width feature vectors, fits an outlier
//! ensemble on a normal corpus and scores a candidate corpus against it.
//! See [`pipeline::run`] for the entry point.

pub mod anomaly;
pub mod config;
pub mod error;
pub mod features;
pub mod parser;
pub mod pipeline;
pub mod report;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use pipeline::{run, Pipeline, RunReport, RunWarning, ScoredRecord};
