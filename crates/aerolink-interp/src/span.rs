//! Clamped piecewise-linear interpolation along one span.
//!
//! A span is a list of non-decreasing stations with one 3-vector sample
//! per station. Queries below the first station return the first sample,
//! queries past the last return the last sample, and a query exactly on a
//! station returns that station's sample bit for bit.

/// Straight-line distance of every node in `positions` from `origin`,
/// appended to `out`.
pub fn distances_from(origin: [f64; 3], positions: &[f64], out: &mut Vec<f64>) {
    out.extend(positions.chunks_exact(3).map(|p| {
        let d = [p[0] - origin[0], p[1] - origin[1], p[2] - origin[2]];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }));
}

/// Interpolate `values` (three components per station) at `s`.
///
/// # Panics
///
/// Panics if `stations` is empty or `values` is shorter than
/// `3 * stations.len()`.
pub fn interpolate_clamped(stations: &[f64], values: &[f64], s: f64) -> [f64; 3] {
    let sample = |j: usize| [values[3 * j], values[3 * j + 1], values[3 * j + 2]];
    let last = stations.len() - 1;
    if s <= stations[0] {
        return sample(0);
    }
    if s >= stations[last] {
        return sample(last);
    }
    // stations[j] <= s < stations[j + 1], so the segment has positive length.
    let mut j = 0;
    while stations[j + 1] <= s {
        j += 1;
    }
    if stations[j] == s {
        return sample(j);
    }
    let t = (s - stations[j]) / (stations[j + 1] - stations[j]);
    let (a, b) = (sample(j), sample(j + 1));
    [
        (1.0 - t) * a[0] + t * b[0],
        (1.0 - t) * a[1] + t * b[1],
        (1.0 - t) * a[2] + t * b[2],
    ]
}
