//! Per-output-step summary of a driver run, for logging and export.

use serde::{Deserialize, Serialize};

use crate::common::const_cp::{ConstCp, Thermodynamics};
use crate::common::moist_air::vapour_pressure;
use crate::common::theta_dry;
use crate::error::EngineError;
use crate::particles::{AmbientFields, ParticlesProto};

/// Smallest wet radius counted as a cloud droplet (m)
pub const CLOUD_R_MIN_M: f64 = 1e-6;

/// Record of cell 0 at one output time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Simulation time (s)
    pub time_sec: f64,
    /// Parcel height (m); 0 for box runs
    pub z_m: f64,
    pub T_K: f64,
    pub RH: f64,
    pub RH_i: f64,
    pub th_K: f64,
    pub rv: f64,
    /// Liquid particles per kg of dry air
    pub wet_mom0_per_kg: f64,
    /// Third moment of the liquid wet radius (m³/kg)
    pub wet_mom3_m3_per_kg: f64,
    /// Droplets with r ≥ 1 µm per kg of dry air
    pub cloud_conc_per_kg: f64,
    /// Ice mass mixing ratio (kg/kg)
    pub ice_mass_kg_per_kg: f64,
    pub n_sd: usize,
}

impl RunMetrics {
    /// Query the engine diagnostics for cell 0
    pub fn collect(
        engine: &mut dyn ParticlesProto,
        ambient: &AmbientFields,
        time_sec: f64,
        z_m: f64,
    ) -> Result<Self, EngineError> {
        let (th, rv, rhod) = (ambient.th[0], ambient.rv[0], ambient.rhod[0]);
        let T = theta_dry::T(th, rhod);
        let p_v = vapour_pressure(rhod, rv, T);

        engine.diag_wet_rng(0.0, f64::INFINITY)?;
        engine.diag_wet_mom(0)?;
        let wet_mom0_per_kg = engine.outbuf()[0];
        engine.diag_wet_mom(3)?;
        let wet_mom3_m3_per_kg = engine.outbuf()[0];

        engine.diag_wet_rng(CLOUD_R_MIN_M, f64::INFINITY)?;
        engine.diag_wet_mom(0)?;
        let cloud_conc_per_kg = engine.outbuf()[0];

        engine.diag_ice_mass()?;
        let ice_mass_kg_per_kg = engine.outbuf()[0];

        Ok(Self {
            time_sec,
            z_m,
            T_K: T,
            RH: p_v / ConstCp.p_vs(T),
            RH_i: p_v / ConstCp.p_vsi(T),
            th_K: th,
            rv,
            wet_mom0_per_kg,
            wet_mom3_m3_per_kg,
            cloud_conc_per_kg,
            ice_mass_kg_per_kg,
            n_sd: engine.n_sd(),
        })
    }

    /// Liquid water mixing ratio implied by the third moment (kg/kg)
    pub fn liquid_water_kg_per_kg(&self) -> f64 {
        4.0 / 3.0 * std::f64::consts::PI * crate::common::const_cp::RHO_W * self.wet_mom3_m3_per_kg
    }
}
