//! Descriptive statistics used by the integrity pass.

/// Quantile `p` (0..=1) of an already sorted slice, by linear interpolation.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// First quartile, median and third quartile. `None` for an empty slice.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some((
        quantile_sorted(&sorted, 0.25),
        quantile_sorted(&sorted, 0.5),
        quantile_sorted(&sorted, 0.75),
    ))
}

/// Tukey fences `[Q1 − 1.5·IQR, Q3 + 1.5·IQR]`.
pub fn iqr_fences(values: &[f64]) -> Option<(f64, f64)> {
    let (q1, _, q3) = quartiles(values)?;
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Number of values outside the IQR fences.
pub fn count_outliers(values: &[f64]) -> usize {
    let Some((lo, hi)) = iqr_fences(values) else {
        return 0;
    };
    values.iter().filter(|v| **v < lo || **v > hi).count()
}
