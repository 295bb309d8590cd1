// src/params/sweep.rs

//! Value generators for parameter sweeps.

/// `num_vals` values spaced geometrically by `factor`, centred on
/// `middle_val`.
pub fn sweep_mult(middle_val: f64, factor: f64, num_vals: usize) -> Vec<f64> {
    let start = middle_val * (1.0 / factor).powf((num_vals as f64 * 0.5).floor());
    (0..num_vals)
        .map(|i| start * factor.powi(i as i32))
        .collect()
}

/// Like [`sweep_mult`] but only the values at or above `low_val`.
pub fn sweep_mult_low(low_val: f64, factor: f64, num_vals: usize) -> Vec<f64> {
    sweep_mult(low_val, factor, num_vals * 2)
        .into_iter()
        .filter(|x| *x >= low_val)
        .collect()
}

/// Inclusive float range with a small tolerance on the upper bound.
pub fn frange(bottom: f64, top: f64, delta: f64) -> Vec<f64> {
    let mut out = Vec::new();
    if delta <= 0.0 {
        return out;
    }
    let mut x = bottom;
    while x <= top + 1e-13 {
        out.push(x);
        x += delta;
    }
    out
}
