//! Small vector helpers shared across modules.

/// Component-wise `a + b`.
#[inline(always)]
pub fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Component-wise `a - b`.
#[inline(always)]
pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Unweighted centroid of a set of points. Empty input gives the origin.
#[inline]
pub fn compute_centroid(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let n = points.len() as f64;
    let mut sum = [0.0; 3];
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// Mass-weighted center of a set of points.
///
/// Falls back to the plain centroid when the masses are missing, mismatched
/// in length, or sum to zero (e.g. a kind built without mass data).
pub fn center_of_mass(points: &[[f64; 3]], masses: &[f64]) -> [f64; 3] {
    let total: f64 = masses.iter().sum();
    if masses.len() != points.len() || total <= 0.0 {
        return compute_centroid(points);
    }
    let mut sum = [0.0; 3];
    for (p, &m) in points.iter().zip(masses) {
        sum[0] += m * p[0];
        sum[1] += m * p[1];
        sum[2] += m * p[2];
    }
    [sum[0] / total, sum[1] / total, sum[2] / total]
}
