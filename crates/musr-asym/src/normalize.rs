use musr_core::constants::TAU_MU_US;
use musr_core::errors::{ErrorInfo, MusrError};

fn normalization_error(code: &str, message: &str, points: usize) -> MusrError {
    MusrError::Normalization(ErrorInfo::new(code, message).with_context("points", points))
}

/// Initial counting rate `enn0` of the decay envelope.
///
/// Fits `combined ≈ enn0 * x + c` with `x[i] = exp(-time[i] / τµ)` by ordinary
/// least squares and returns the slope. The fit is linear in `x`, not a
/// log-linear fit of the counts.
pub fn estimate_rate(time: &[f64], combined: &[f64]) -> Result<f64, MusrError> {
    let points = time.len().min(combined.len());
    if points < 2 {
        return Err(normalization_error(
            "too-few-points",
            "normalization needs at least two bins",
            points,
        ));
    }
    let x: Vec<f64> = time[..points]
        .iter()
        .map(|t| (-t / TAU_MU_US).exp())
        .collect();
    let y = &combined[..points];

    let n = points as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        sxx += dx * dx;
        sxy += dx * (yi - y_mean);
    }
    if !(sxx.is_finite() && sxx > 0.0) {
        return Err(normalization_error(
            "degenerate-design",
            "decay envelope has no spread over the time axis",
            points,
        ));
    }
    let slope = sxy / sxx;
    if !slope.is_finite() || slope == 0.0 {
        return Err(MusrError::Normalization(
            ErrorInfo::new("zero-rate", "estimated initial rate is zero or not finite")
                .with_context("points", points)
                .with_context("slope", slope),
        ));
    }
    Ok(slope)
}
