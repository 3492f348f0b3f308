//! Run configuration for the box and parcel drivers.
//!
//! Loaded from JSON; missing files or parse failures fall back to the
//! built-in defaults of the selected mode.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::options::{Backend, DryDistros, Opts, OptsInit};
use crate::common::{
    Exponential, FreezingModel, InpType, Kernel, Lognormal, Sum, UnaryFunction,
};
use crate::error::EngineError;

/// Which driver to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Single well-mixed volume; coalescence only
    Box,
    /// Adiabatic parcel rising at constant speed
    Parcel,
}

/// Serializable description of a dry spectrum mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistroSpec {
    Lognormal {
        mean_r_m: f64,
        gstdev: f64,
        n_tot: f64,
    },
    Exponential {
        r0_m: f64,
        n0: f64,
    },
}

impl DistroSpec {
    pub fn build(&self) -> Arc<dyn UnaryFunction> {
        match *self {
            DistroSpec::Lognormal {
                mean_r_m,
                gstdev,
                n_tot,
            } => Arc::new(Lognormal {
                mean_r_m,
                gstdev,
                n_tot,
            }),
            DistroSpec::Exponential { r0_m, n0 } => Arc::new(Exponential { r0_m, n0 }),
        }
    }
}

/// Spectrum of one aerosol species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSpec {
    pub kappa: f64,
    pub modes: Vec<DistroSpec>,
}

/// Driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub backend: Backend,

    /// Timestep (s)
    pub dt_sec: f64,
    pub n_steps: usize,
    /// Write a record every this many steps
    pub output_every: usize,

    /// Initial dry potential temperature (K)
    pub th_K: f64,
    /// Initial water vapour mixing ratio (kg/kg)
    pub rv: f64,
    /// Initial dry-air density (kg/m³)
    pub rhod: f64,

    /// Parcel ascent speed (m/s)
    pub w_m_per_s: f64,
    /// Box volume (m³)
    pub dv_m3: f64,

    pub spectra: Vec<SpectrumSpec>,
    pub sd_conc: usize,
    pub n_sd_max: usize,
    pub rng_seed: u64,
    pub kernel: Kernel,

    pub freezing: FreezingModel,
    pub inp_type: InpType,
    pub rd_insol_m: f64,

    pub opts: Opts,

    /// Directory for CSV/JSON output
    pub output_dir: String,
    /// Width parameter of the mass-density estimator
    pub spectrum_sig0: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::parcel()
    }
}

impl RunConfig {
    /// Rising parcel with bimodal ammonium-sulfate-like aerosol.
    pub fn parcel() -> Self {
        let dt_sec = 0.1;
        let w_m_per_s = 2.0;
        let z_max_m = 200.0;
        Self {
            mode: RunMode::Parcel,
            backend: Backend::Serial,
            dt_sec,
            n_steps: (z_max_m / (w_m_per_s * dt_sec)).round() as usize,
            output_every: 10,
            th_K: 292.0,
            rv: 0.008,
            rhod: 1.1,
            w_m_per_s,
            dv_m3: 1.0,
            spectra: vec![SpectrumSpec {
                kappa: 0.61,
                modes: vec![
                    DistroSpec::Lognormal {
                        mean_r_m: 0.03e-6,
                        gstdev: 1.28,
                        n_tot: 1000.0e6,
                    },
                    DistroSpec::Lognormal {
                        mean_r_m: 0.14e-6,
                        gstdev: 1.75,
                        n_tot: 50.0e6,
                    },
                ],
            }],
            sd_conc: 2000,
            n_sd_max: 2000,
            rng_seed: 44,
            kernel: Kernel::default(),
            freezing: FreezingModel::Singular,
            inp_type: InpType::Mineral,
            rd_insol_m: 0.5e-6,
            opts: Opts {
                adve: false,
                sedi: false,
                coal: false,
                ..Opts::default()
            },
            output_dir: "output".into(),
            spectrum_sig0: 0.62,
        }
    }

    /// Golovin-kernel box test.
    ///
    /// Source: Shima et al., Q J R Meteorol Soc 2009, sec. 5.1.4
    pub fn box_model() -> Self {
        Self {
            mode: RunMode::Box,
            backend: Backend::Serial,
            dt_sec: 1.0,
            n_steps: 1800,
            output_every: 600,
            th_K: 300.0,
            rv: 0.01,
            rhod: 1.0,
            w_m_per_s: 0.0,
            dv_m3: 100.0,
            spectra: vec![SpectrumSpec {
                kappa: 1e-10,
                modes: vec![DistroSpec::Exponential {
                    r0_m: 30.084e-6,
                    n0: 1.25 * 2f64.powi(23),
                }],
            }],
            sd_conc: 100_000,
            n_sd_max: 100_000,
            rng_seed: 44,
            kernel: Kernel::Golovin { b: 1500.0 },
            freezing: FreezingModel::Singular,
            inp_type: InpType::Mineral,
            rd_insol_m: 0.0,
            opts: Opts {
                adve: false,
                sedi: false,
                cond: false,
                coal: true,
                ..Opts::default()
            },
            output_dir: "output".into(),
            spectrum_sig0: 0.62,
        }
    }

    /// Load from a JSON file, falling back to `fallback` on any failure
    pub fn load_or<P: AsRef<Path>>(path: P, fallback: Self) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(cfg) => {
                    log::info!("Loaded run configuration from {:?}", path.as_ref());
                    cfg
                }
                Err(e) => {
                    log::warn!("Failed to parse run configuration: {}, using defaults", e);
                    fallback
                }
            },
            Err(_) => {
                log::warn!(
                    "Run configuration {:?} not found, using defaults",
                    path.as_ref()
                );
                fallback
            }
        }
    }

    /// Load from a JSON file or return the parcel defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_or(path, Self::default())
    }

    /// Engine construction options for this run
    pub fn opts_init(&self) -> Result<OptsInit, EngineError> {
        let mut dry_distros = DryDistros::new();
        for spec in &self.spectra {
            let spectrum: Arc<dyn UnaryFunction> = match spec.modes.as_slice() {
                [single] => single.build(),
                modes => Arc::new(Sum(modes.iter().map(DistroSpec::build).collect())),
            };
            dry_distros.insert(spec.kappa, spectrum)?;
        }

        let edge_m = match self.mode {
            RunMode::Box => self.dv_m3.cbrt(),
            RunMode::Parcel => 1.0,
        };
        Ok(OptsInit {
            dx_m: edge_m,
            dy_m: edge_m,
            dz_m: edge_m,
            dt_sec: self.dt_sec,
            dry_distros,
            sd_conc: self.sd_conc,
            n_sd_max: self.n_sd_max,
            rng_seed: self.rng_seed,
            kernel: self.kernel,
            freezing: self.freezing,
            inp_type: self.inp_type.clone(),
            rd_insol_m: self.rd_insol_m,
            ..OptsInit::default()
        })
    }
}
