//! Thermodynamic constants and saturation formulae with constant heat capacities.
//!
//! Latent heats vary linearly with temperature (Kirchhoff's law with constant
//! c_p of vapour, liquid and ice). Saturation vapour pressures follow from
//! integrating Clausius-Clapeyron with those latent heats, anchored at the
//! triple point.
//!
//! Reference: Bohren & Albrecht, Atmospheric Thermodynamics, 1998, ch. 5
//! Reference: Chen & Lamb, J Atmos Sci 1994 (inherent growth ratio)

/// Triple point temperature (K)
pub const T_TRI_K: f64 = 273.16;
/// Triple point pressure (Pa)
pub const P_TRI_PA: f64 = 611.73;
/// Melting point at standard pressure (K)
pub const T_0_K: f64 = 273.15;

/// Specific gas constant of dry air (J/kg/K)
pub const R_D: f64 = 287.04;
/// Specific gas constant of water vapour (J/kg/K)
pub const R_V: f64 = 461.5;
/// R_d / R_v
pub const EPS: f64 = R_D / R_V;

/// Heat capacity of dry air at constant pressure (J/kg/K)
pub const C_PD: f64 = 1005.0;
/// Heat capacity of water vapour at constant pressure (J/kg/K)
pub const C_PV: f64 = 1850.0;
/// Heat capacity of liquid water (J/kg/K)
pub const C_PW: f64 = 4218.0;
/// Heat capacity of ice (J/kg/K)
pub const C_PI: f64 = 2114.0;

/// Latent heat of vaporization at the triple point (J/kg)
pub const L_TRI: f64 = 2.5e6;
/// Latent heat of sublimation at the triple point (J/kg)
pub const L_TRI_S: f64 = 2.834e6;

/// Bulk density of liquid water (kg/m³)
pub const RHO_W: f64 = 1000.0;
/// Bulk density of ice (kg/m³)
pub const RHO_I: f64 = 916.8;

/// Reference pressure for potential temperature (Pa)
pub const P_1000_PA: f64 = 1.0e5;
/// Gravitational acceleration (m/s²)
pub const G: f64 = 9.81;

/// Thermodynamic-constants provider used by the microphysics kernels.
///
/// All methods are pure functions of temperature (or constants). The engine
/// uses [`ConstCp`]; tests and host models may substitute their own.
pub trait Thermodynamics: Send + Sync {
    /// Latent heat of vaporization (J/kg)
    fn l_v(&self, T_K: f64) -> f64;
    /// Latent heat of sublimation (J/kg)
    fn l_s(&self, T_K: f64) -> f64;
    /// Latent heat of fusion (J/kg)
    fn l_f(&self, T_K: f64) -> f64 {
        self.l_s(T_K) - self.l_v(T_K)
    }
    /// Saturation vapour pressure over liquid water (Pa)
    fn p_vs(&self, T_K: f64) -> f64;
    /// Saturation vapour pressure over ice (Pa)
    fn p_vsi(&self, T_K: f64) -> f64;
    /// Bulk ice density (kg/m³)
    fn rho_i(&self) -> f64 {
        RHO_I
    }
    /// Specific gas constant of water vapour (J/kg/K)
    fn R_v(&self) -> f64 {
        R_V
    }
    /// Habit parameter selecting the deposition-density regime
    fn lambda(&self, T_K: f64) -> f64;
    /// Deposition-density relaxation scale of Chen & Lamb
    fn gamma(&self, T_K: f64) -> f64;
}

/// Constant-heat-capacity thermodynamics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstCp;

impl ConstCp {
    fn p_sat(T_K: f64, l_tri: f64, c_condensed: f64) -> f64 {
        let dc = c_condensed - C_PV;
        P_TRI_PA
            * ((l_tri + dc * T_TRI_K) / R_V * (1.0 / T_TRI_K - 1.0 / T_K)
                - dc / R_V * (T_K / T_TRI_K).ln())
            .exp()
    }
}

impl Thermodynamics for ConstCp {
    fn l_v(&self, T_K: f64) -> f64 {
        L_TRI + (C_PV - C_PW) * (T_K - T_TRI_K)
    }

    fn l_s(&self, T_K: f64) -> f64 {
        L_TRI_S + (C_PV - C_PI) * (T_K - T_TRI_K)
    }

    fn p_vs(&self, T_K: f64) -> f64 {
        Self::p_sat(T_K, L_TRI, C_PW)
    }

    fn p_vsi(&self, T_K: f64) -> f64 {
        Self::p_sat(T_K, L_TRI_S, C_PI)
    }

    fn lambda(&self, T_K: f64) -> f64 {
        inherent_growth_ratio(T_K)
    }

    fn gamma(&self, T_K: f64) -> f64 {
        inherent_growth_ratio(T_K)
    }
}

/// Inherent growth ratio Γ(T) (dimensionless), tabulated against temperature in °C.
///
/// Γ < 1: plate-like growth, Γ > 1: columnar growth.
const GROWTH_RATIO_TABLE: [(f64, f64); 15] = [
    (-40.0, 1.10),
    (-30.0, 1.20),
    (-25.0, 1.15),
    (-22.0, 1.00),
    (-20.0, 0.80),
    (-18.0, 0.55),
    (-15.0, 0.30),
    (-12.0, 0.55),
    (-10.0, 0.95),
    (-8.0, 1.35),
    (-6.0, 1.70),
    (-5.0, 1.45),
    (-4.0, 1.05),
    (-2.0, 0.80),
    (0.0, 0.95),
];

/// Inherent growth ratio of Chen & Lamb (1994), piecewise linear in
/// temperature and held constant outside the tabulated range.
pub fn inherent_growth_ratio(T_K: f64) -> f64 {
    let t_c = T_K - T_0_K;
    let first = GROWTH_RATIO_TABLE[0];
    let last = GROWTH_RATIO_TABLE[GROWTH_RATIO_TABLE.len() - 1];
    if t_c <= first.0 {
        return first.1;
    }
    if t_c >= last.0 {
        return last.1;
    }
    GROWTH_RATIO_TABLE
        .windows(2)
        .find(|w| t_c >= w[0].0 && t_c <= w[1].0)
        .map(|w| {
            let (t0, g0) = w[0];
            let (t1, g1) = w[1];
            g0 + (g1 - g0) * (t_c - t0) / (t1 - t0)
        })
        .unwrap_or(last.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_point_pressures_agree() {
        let th = ConstCp;
        assert!((th.p_vs(T_TRI_K) - P_TRI_PA).abs() < 1e-9);
        assert!((th.p_vsi(T_TRI_K) - P_TRI_PA).abs() < 1e-9);
    }

    #[test]
    fn test_p_vs_magnitude() {
        // ~2339 Pa at 20 °C
        let p = ConstCp.p_vs(293.15);
        assert!((p - 2339.0).abs() / 2339.0 < 0.02, "p_vs(20C) = {}", p);
    }

    #[test]
    fn test_ice_saturation_below_liquid_when_cold() {
        let th = ConstCp;
        for T in [230.0, 250.0, 265.0, 272.0] {
            assert!(th.p_vsi(T) < th.p_vs(T), "p_vsi >= p_vs at {} K", T);
        }
    }

    #[test]
    fn test_latent_heats() {
        let th = ConstCp;
        assert!((th.l_s(T_TRI_K) - L_TRI_S).abs() < 1e-6);
        let l_f = th.l_f(T_TRI_K);
        assert!((l_f - 3.34e5).abs() < 1e3, "l_f = {}", l_f);
        // l_v decreases with temperature
        assert!(th.l_v(300.0) < th.l_v(260.0));
    }

    #[test]
    fn test_growth_ratio_habits() {
        // Columns near -6 °C, plates near -15 °C
        assert!(inherent_growth_ratio(T_0_K - 6.0) > 1.0);
        assert!(inherent_growth_ratio(T_0_K - 15.0) < 1.0);
        // Clamped outside the table
        assert_eq!(inherent_growth_ratio(200.0), 1.10);
        assert_eq!(inherent_growth_ratio(300.0), 0.95);
        // Interpolation midpoint
        let mid = inherent_growth_ratio(T_0_K - 7.0);
        assert!((mid - 1.525).abs() < 1e-9);
    }
}
