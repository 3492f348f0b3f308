//! Options consumed by the particle engine.
//!
//! [`OptsInit`] is fixed at construction (grid, spectra, RNG seed, process
//! parametrizations); [`Opts`] is passed to every step and toggles processes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{FreezingModel, InpType, Kernel, TerminalVelocity, UnaryFunction};
use crate::error::EngineError;

/// Execution backend of the particle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Serial,
    /// Thread pool (rayon)
    MultiCore,
    /// Device offload; recognised but not built
    Accelerator,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Backend::Serial),
            "multicore" | "multi_core" | "openmp" => Ok(Backend::MultiCore),
            "accelerator" | "cuda" => Ok(Backend::Accelerator),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Serial => "serial",
            Backend::MultiCore => "multicore",
            Backend::Accelerator => "accelerator",
        };
        write!(f, "{name}")
    }
}

/// Dry aerosol spectra keyed by hygroscopicity κ.
///
/// Each function gives number per unit ln(r_d) per kg of dry air, evaluated
/// at ln(r_d). κ values are unique.
#[derive(Clone, Default)]
pub struct DryDistros(Vec<(f64, Arc<dyn UnaryFunction>)>);

impl DryDistros {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spectrum for `kappa`
    pub fn insert(
        &mut self,
        kappa: f64,
        spectrum: Arc<dyn UnaryFunction>,
    ) -> Result<(), EngineError> {
        if !(kappa >= 0.0) || !kappa.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "dry_distros: kappa = {kappa} (must be finite and >= 0)"
            )));
        }
        if self.0.iter().any(|(k, _)| *k == kappa) {
            return Err(EngineError::InvalidInput(format!(
                "dry_distros: duplicate kappa = {kappa}"
            )));
        }
        self.0.push((kappa, spectrum));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, kappa: f64, spectrum: Arc<dyn UnaryFunction>) -> Result<Self, EngineError> {
        self.insert(kappa, spectrum)?;
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &dyn UnaryFunction)> {
        self.0.iter().map(|(k, f)| (*k, f.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DryDistros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|(k, _)| k)).finish()
    }
}

/// A monodisperse population of dry particles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrySize {
    pub kappa: f64,
    /// Dry radius (m)
    pub rd_m: f64,
    /// Number concentration per kg of dry air
    pub conc_per_kg: f64,
    /// Super-droplets per cell representing this population
    pub sd_count: usize,
}

/// Radius interval [lo, hi) used to request moments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusRange {
    pub lo_m: f64,
    pub hi_m: f64,
}

impl RadiusRange {
    pub fn new(lo_m: f64, hi_m: f64) -> Self {
        Self { lo_m, hi_m }
    }

    /// The whole positive axis
    pub fn all() -> Self {
        Self {
            lo_m: 0.0,
            hi_m: f64::INFINITY,
        }
    }
}

/// Construction-time options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptsInit {
    /// Cells along x, y, z (0 = dimension absent)
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Cell extents (m)
    pub dx_m: f64,
    pub dy_m: f64,
    pub dz_m: f64,

    /// Timestep (s)
    pub dt_sec: f64,

    #[serde(skip)]
    pub dry_distros: DryDistros,
    pub dry_sizes: Vec<DrySize>,

    /// Super-droplets per cell per spectrum
    pub sd_conc: usize,
    /// Upper bound on the ensemble size
    pub n_sd_max: usize,
    pub rng_seed: u64,

    pub kernel: Kernel,
    pub terminal_velocity: TerminalVelocity,

    pub freezing: FreezingModel,
    pub inp_type: InpType,
    /// Radius of the insoluble core carried by every particle (m)
    pub rd_insol_m: f64,

    /// Cap on RH used to equilibrate wet radii at init
    pub rh_max: f64,

    /// Condensation and coalescence substeps per step
    pub sstp_cond: u32,
    pub sstp_coal: u32,
}

impl Default for OptsInit {
    fn default() -> Self {
        Self {
            nx: 0,
            ny: 0,
            nz: 0,
            dx_m: 1.0,
            dy_m: 1.0,
            dz_m: 1.0,
            dt_sec: 1.0,
            dry_distros: DryDistros::default(),
            dry_sizes: Vec::new(),
            sd_conc: 64,
            n_sd_max: 10_000_000,
            rng_seed: 44,
            kernel: Kernel::default(),
            terminal_velocity: TerminalVelocity::default(),
            freezing: FreezingModel::default(),
            inp_type: InpType::default(),
            rd_insol_m: 0.5e-6,
            rh_max: 0.95,
            sstp_cond: 1,
            sstp_coal: 1,
        }
    }
}

impl OptsInit {
    /// Number of spatial dimensions (0 for box and parcel runs)
    pub fn n_dims(&self) -> usize {
        [self.nx, self.ny, self.nz].iter().filter(|&&n| n > 0).count()
    }

    pub fn n_cell(&self) -> usize {
        self.nx.max(1) * self.ny.max(1) * self.nz.max(1)
    }

    /// Cell volume (m³); absent dimensions contribute their nominal extent
    pub fn dv(&self) -> f64 {
        self.dx_m * self.dy_m * self.dz_m
    }

    /// Domain extent along each axis (m); 0 for absent dimensions
    pub fn domain_m(&self) -> [f64; 3] {
        [
            self.nx as f64 * self.dx_m,
            self.ny as f64 * self.dy_m,
            self.nz as f64 * self.dz_m,
        ]
    }

    /// Linear cell index, x-major with z fastest
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.ny.max(1) + j) * self.nz.max(1) + k
    }

    /// Inverse of [`cell_index`](Self::cell_index)
    pub fn cell_ijk(&self, cell: usize) -> (usize, usize, usize) {
        let nz = self.nz.max(1);
        let ny = self.ny.max(1);
        (cell / (ny * nz), (cell / nz) % ny, cell % nz)
    }

    /// Check invariants that must hold before building an engine
    pub fn validate(&self) -> Result<(), EngineError> {
        let bad = |msg: String| Err(EngineError::InvalidInput(format!("opts_init: {msg}")));
        if !(self.dt_sec > 0.0) {
            return bad(format!("dt = {} s (must be > 0)", self.dt_sec));
        }
        if !(self.dx_m > 0.0 && self.dy_m > 0.0 && self.dz_m > 0.0) {
            return bad(format!(
                "cell size {} x {} x {} m (must be > 0)",
                self.dx_m, self.dy_m, self.dz_m
            ));
        }
        if self.dry_distros.is_empty() && self.dry_sizes.is_empty() {
            return bad("no dry spectrum given".into());
        }
        if !self.dry_distros.is_empty() && self.sd_conc == 0 {
            return bad("sd_conc = 0 with dry_distros given".into());
        }
        if self.dry_sizes.iter().any(|s| !(s.rd_m > 0.0) || s.conc_per_kg < 0.0) {
            return bad("dry_sizes entries need rd > 0 and concentration >= 0".into());
        }
        if !(self.rd_insol_m >= 0.0) {
            return bad(format!("rd_insol = {} m", self.rd_insol_m));
        }
        if !(self.rh_max > 0.0 && self.rh_max < 1.0) {
            return bad(format!("rh_max = {} (must be in (0, 1))", self.rh_max));
        }
        if self.sstp_cond == 0 || self.sstp_coal == 0 {
            return bad("substep counts must be >= 1".into());
        }
        if let Kernel::Golovin { b } = self.kernel {
            if !(b >= 0.0) {
                return bad(format!("Golovin b = {b}"));
            }
        }
        Ok(())
    }
}

/// Per-step options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Opts {
    pub adve: bool,
    pub sedi: bool,
    pub rcyc: bool,
    pub cond: bool,
    pub chem: bool,
    pub coal: bool,
    /// Freezing and melting
    pub ice_nucl: bool,

    /// Requested moments of the dry and wet spectra per radius range
    pub out_dry: Vec<(RadiusRange, Vec<i32>)>,
    pub out_wet: Vec<(RadiusRange, Vec<i32>)>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            adve: true,
            sedi: true,
            rcyc: false,
            cond: true,
            chem: false,
            coal: true,
            ice_nucl: false,
            out_dry: Vec::new(),
            out_wet: Vec::new(),
        }
    }
}

impl Opts {
    /// All processes switched off
    pub fn none() -> Self {
        Self {
            adve: false,
            sedi: false,
            rcyc: false,
            cond: false,
            chem: false,
            coal: false,
            ice_nucl: false,
            out_dry: Vec::new(),
            out_wet: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Constant;

    #[test]
    fn test_duplicate_kappa_rejected() {
        let mut d = DryDistros::new();
        d.insert(0.61, Arc::new(Constant(1.0))).unwrap();
        assert!(d.insert(0.61, Arc::new(Constant(2.0))).is_err());
        assert!(d.insert(-1.0, Arc::new(Constant(2.0))).is_err());
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn test_grid_helpers() {
        let o = OptsInit {
            nx: 4,
            nz: 3,
            dx_m: 10.0,
            dz_m: 5.0,
            ..OptsInit::default()
        };
        assert_eq!(o.n_dims(), 2);
        assert_eq!(o.n_cell(), 12);
        assert_eq!(o.dv(), 50.0);
        for cell in 0..o.n_cell() {
            let (i, j, k) = o.cell_ijk(cell);
            assert_eq!(o.cell_index(i, j, k), cell);
        }
        assert_eq!(OptsInit::default().n_cell(), 1);
        assert_eq!(OptsInit::default().n_dims(), 0);
    }

    #[test]
    fn test_validate() {
        let mut o = OptsInit::default();
        assert!(o.validate().is_err(), "no spectrum");
        o.dry_distros.insert(0.61, Arc::new(Constant(1e8))).unwrap();
        assert!(o.validate().is_ok());
        o.rh_max = 1.0;
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_opts_defaults_and_serde() {
        let o: Opts = serde_json::from_str(r#"{"ice_nucl": true}"#).unwrap();
        assert!(o.ice_nucl && o.cond && o.coal && o.sedi && o.adve);
        assert!(!o.rcyc && !o.chem);
        let b: Backend = serde_json::from_str("\"multi_core\"").unwrap();
        assert_eq!(b, Backend::MultiCore);
        assert_eq!("multicore".parse::<Backend>().unwrap(), Backend::MultiCore);
        assert!("gpu2".parse::<Backend>().is_err());
    }
}
