//! Scalar functions of one variable used to describe dry aerosol spectra.
//!
//! Spectra are expressed as number density per unit ln(r_d) per kg of dry air
//! and evaluated at ln(r_d).

use std::f64::consts::PI;
use std::sync::Arc;

/// A pure real function of one real argument.
pub trait UnaryFunction: Send + Sync {
    fn funval(&self, x: f64) -> f64;
}

impl<F> UnaryFunction for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn funval(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Lognormal mode: dN/dln r = N / (√(2π) ln σ) · exp(−(ln r − ln r_m)² / (2 ln² σ))
#[derive(Debug, Clone, Copy)]
pub struct Lognormal {
    pub mean_r_m: f64,
    pub gstdev: f64,
    pub n_tot: f64,
}

impl UnaryFunction for Lognormal {
    fn funval(&self, ln_r: f64) -> f64 {
        let ln_s = self.gstdev.ln();
        let z = (ln_r - self.mean_r_m.ln()) / ln_s;
        self.n_tot / ((2.0 * PI).sqrt() * ln_s) * (-0.5 * z * z).exp()
    }
}

/// Exponential-in-volume spectrum, n(v) = n₀/v₀ exp(−v/v₀), expressed per ln r.
///
/// Source: Shima et al., Q J R Meteorol Soc 2009 (Golovin test case)
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    /// Radius of the mean volume v₀ (m)
    pub r0_m: f64,
    pub n0: f64,
}

impl UnaryFunction for Exponential {
    fn funval(&self, ln_r: f64) -> f64 {
        // dN/dln r = 3 v n(v)
        let x = (3.0 * (ln_r - self.r0_m.ln())).exp();
        3.0 * self.n0 * x * (-x).exp()
    }
}

/// Constant value regardless of argument
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl UnaryFunction for Constant {
    fn funval(&self, _x: f64) -> f64 {
        self.0
    }
}

/// Sum of modes (multimodal spectra)
#[derive(Clone, Default)]
pub struct Sum(pub Vec<Arc<dyn UnaryFunction>>);

impl UnaryFunction for Sum {
    fn funval(&self, x: f64) -> f64 {
        self.0.iter().map(|f| f.funval(x)).sum()
    }
}

impl std::fmt::Debug for Sum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sum({} modes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trapezoidal integral over ln r
    fn integrate(f: &dyn UnaryFunction, lo: f64, hi: f64, n: usize) -> f64 {
        let h = (hi - lo) / n as f64;
        (0..=n)
            .map(|i| {
                let w = if i == 0 || i == n { 0.5 } else { 1.0 };
                w * f.funval(lo + i as f64 * h)
            })
            .sum::<f64>()
            * h
    }

    #[test]
    fn test_lognormal_integrates_to_total() {
        let mode = Lognormal {
            mean_r_m: 0.04e-6,
            gstdev: 1.4,
            n_tot: 60e6,
        };
        let total = integrate(&mode, (1e-9f64).ln(), (1e-5f64).ln(), 4000);
        assert!((total - 60e6).abs() / 60e6 < 1e-6);
    }

    #[test]
    fn test_exponential_integrates_to_total() {
        let spec = Exponential {
            r0_m: 30.084e-6,
            n0: 1e8,
        };
        let total = integrate(&spec, (1e-8f64).ln(), (1e-3f64).ln(), 20000);
        assert!((total - 1e8).abs() / 1e8 < 1e-4, "total = {}", total);
    }

    #[test]
    fn test_sum_and_closures() {
        let sum = Sum(vec![Arc::new(Constant(1.0)), Arc::new(|x: f64| 2.0 * x)]);
        assert_eq!(sum.funval(3.0), 7.0);
    }
}
