//! Statistics helpers shared by the analysis stages
//!
//! These are the fixed computations the pipeline needs (rank
//! correlation, percentiles, Gini, streaks), not a general inference
//! library. P-values use a normal approximation to the t distribution,
//! which is adequate at the sample sizes this pipeline sees (n > 30).

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator); 0.0 if fewer than 2 values
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Percentile with linear interpolation, p in [0, 1]
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (v.len() as f64 - 1.0) * p.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return v.get(lo).copied();
    }
    let frac = rank - lo as f64;
    Some(v[lo] * (1.0 - frac) + v[hi] * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 0.5)
}

/// Fractional ranks with ties averaged (1-based)
fn ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[idx[j + 1]] == values[idx[i]] {
            j += 1;
        }
        // Average rank across the tie group
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            out[idx[k]] = avg;
        }
        i = j + 1;
    }
    out
}

/// Spearman rank correlation with a two-sided p-value.
/// Returns None if fewer than 3 pairs or either input is constant.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    if n != y.len() || n < 3 {
        return None;
    }
    let rx = ranks(x);
    let ry = ranks(y);

    let mx = mean(&rx);
    let my = mean(&ry);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        let dx = rx[i] - mx;
        let dy = ry[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());

    // t-statistic, normal approximation for the p-value
    let r_clamped = r.clamp(-0.999_999, 0.999_999);
    let t = r_clamped * ((n as f64 - 2.0) / (1.0 - r_clamped * r_clamped)).sqrt();
    let p = 2.0 * normal_sf(t.abs());
    Some((r, p))
}

/// Standard normal survival function P(Z > z)
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Complementary error function, Abramowitz & Stegun 7.1.26
/// (max absolute error ~1.5e-7)
fn erfc(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let erf = 1.0 - poly * (-x * x).exp();
    if sign < 0.0 {
        1.0 + erf
    } else {
        1.0 - erf
    }
}

/// One-tailed z statistic for an observed proportion against a null rate
pub fn proportion_z(observed: f64, null_rate: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let var = null_rate * (1.0 - null_rate) / n as f64;
    if var <= 0.0 {
        return 0.0;
    }
    (observed - null_rate) / var.sqrt()
}

/// Gini coefficient over non-negative values (0 = equal, 1 = one holder)
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    2.0 * weighted / (n as f64 * total) - (n as f64 + 1.0) / n as f64
}

/// Longest run of `true` in a sequence
pub fn longest_run(flags: impl IntoIterator<Item = bool>) -> usize {
    let mut best = 0usize;
    let mut current = 0usize;
    for f in flags {
        if f {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Tercile index (0, 1, 2) for a rank position within n items
pub fn tercile_of(rank: usize, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    (rank * 3 / n).min(2)
}
