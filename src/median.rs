//! Window medians for the autocorrelation smoothing paths.
//!
//! Two conventions coexist deliberately. The normalization curves use the
//! historical convention of the upstream processing chain (kept so converted
//! data stays comparable with archives produced by it); the commit-time
//! cross-term filter uses the plain centered median.

/// Historical window median: sort, then for odd lengths average the elements
/// at positions `n/2 - 1` and `n/2`, for even lengths take the element at
/// `(n+1)/2 - 1`.
pub(crate) fn legacy_median(window: &[f64]) -> f64 {
    debug_assert!(!window.is_empty());
    let mut sorted = window.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 1 {
        sorted[0]
    } else if n % 2 == 1 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[(n + 1) / 2 - 1]
    }
}

/// Centered median of an odd-length window.
pub(crate) fn central_median(window: &[f32]) -> f32 {
    debug_assert!(window.len() % 2 == 1);
    let mut sorted = window.to_vec();
    sorted.sort_by(f32::total_cmp);
    sorted[sorted.len() / 2]
}
