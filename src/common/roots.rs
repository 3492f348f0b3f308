//! Bracketing root finders used by the condensation solvers.

/// Maximum bisection iterations; enough to exhaust f64 precision on any bracket.
const MAX_ITER: usize = 200;

/// Bisection on [lo, hi] where `f(lo)` and `f(hi)` have opposite signs.
///
/// Stops when the bracket is narrower than `tol` (absolute) or can no longer
/// be split. Returns the midpoint of the final bracket.
pub fn bisect<F: Fn(f64) -> f64>(f: F, mut lo: f64, mut hi: f64, tol: f64) -> f64 {
    let mut f_lo = f(lo);
    for _ in 0..MAX_ITER {
        let mid = 0.5 * (lo + hi);
        if (hi - lo).abs() <= tol || mid == lo || mid == hi {
            break;
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if (f_mid < 0.0) == (f_lo < 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Bisection in log space for strictly positive brackets spanning many decades.
///
/// `rel_tol` bounds the relative width of the final bracket.
pub fn bisect_geometric<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64, rel_tol: f64) -> f64 {
    bisect(|ln_x| f(ln_x.exp()), lo.ln(), hi.ln(), rel_tol).exp()
}
