//! Text renderings of a run for the command-line front end.

use crate::pipeline::{RunReport, ScoredRecord};
use std::io::{self, Write};

pub const CSV_HEADER: [&str; 5] = ["line", "anomaly_score", "zscore", "flag", "reason_tokens"];

pub fn write_csv<W: Write>(rows: &[ScoredRecord], writer: W) -> io::Result<()> {
    let mut out = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);
    out.write_record(CSV_HEADER)?;
    for row in rows {
        let score = format!("{:.6}", row.score);
        let zscore = format!("{:.3}", row.zscore);
        out.write_record([
            row.line.as_str(),
            score.as_str(),
            zscore.as_str(),
            if row.flagged { "1" } else { "0" },
            row.reason_tokens.as_str(),
        ])?;
    }
    out.flush()
}

pub fn write_json<W: Write>(report: &RunReport, mut writer: W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()
}

/// One-line run summary; the threshold always keeps its decimal point
#[must_use]
pub fn summary(report: &RunReport) -> String {
    format!(
        "Flagged {} of {} lines as anomalous (threshold_z={:?}).",
        report.flagged_count(),
        report.rows.len(),
        report.threshold_z
    )
}
