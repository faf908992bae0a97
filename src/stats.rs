//! Order statistics over small numeric sequences.
//!
//! Callers pass owned buffers; the functions sort in place.

/// Median of `values`. Empty input returns 0.
pub fn median(values: &mut [f32]) -> f32 {
    percentile(values, 50.0)
}

/// Percentile `p ∈ [0, 100]` with linear interpolation between adjacent
/// order statistics. Empty input returns 0.
pub fn percentile(values: &mut [f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (values.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return values[lo];
    }
    let frac = rank - lo as f32;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// Population variance. Empty input returns 0.
pub fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n
}
