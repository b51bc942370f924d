//! Score normalisation, model combination and threshold calibration.

/// Population mean and standard deviation. A zero (or undefined) deviation
/// is reported as 1.0 so callers can divide by it unconditionally.
#[must_use]
pub fn mean_and_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stdev = variance.sqrt();

    if stdev > 0.0 && stdev.is_finite() {
        (mean, stdev)
    } else {
        (mean, 1.0)
    }
}

/// (value - mean) / population stdev for every value
#[must_use]
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let (mean, stdev) = mean_and_stdev(values);
    values.iter().map(|v| (v - mean) / stdev).collect()
}

/// Combine the structural scores with the optional reconstruction scores.
///
/// With one model the raw scores pass through untouched. With two, each is
/// standardised on its own and the results are averaged. A second sequence
/// that is empty or not aligned with the first counts as absent.
#[must_use]
pub fn combine(primary: &[f64], secondary: Option<&[f64]>) -> Vec<f64> {
    let secondary = match secondary {
        Some(scores) if !scores.is_empty() && scores.len() == primary.len() => scores,
        Some(scores) if !scores.is_empty() => {
            tracing::warn!(
                "Ignoring secondary scores: {} values for {} records",
                scores.len(),
                primary.len()
            );
            return primary.to_vec();
        }
        _ => return primary.to_vec(),
    };

    let a = standardize(primary);
    let b = standardize(secondary);
    a.iter().zip(&b).map(|(x, y)| (x + y) / 2.0).collect()
}

/// A record is flagged when its z-score reaches the threshold
#[must_use]
pub fn flag(zscores: &[f64], threshold: f64) -> Vec<bool> {
    zscores.iter().map(|z| *z >= threshold).collect()
}

/// Composite scores plus their calibrated z-scores and flags
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub composite: Vec<f64>,
    pub zscores: Vec<f64>,
    pub flags: Vec<bool>,
}

impl Calibration {
    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.flags.iter().filter(|f| **f).count()
    }
}

#[must_use]
pub fn calibrate(primary: &[f64], secondary: Option<&[f64]>, threshold: f64) -> Calibration {
    let composite = combine(primary, secondary);
    let zscores = standardize(&composite);
    let flags = flag(&zscores, threshold);
    Calibration {
        composite,
        zscores,
        flags,
    }
}
