//! JSON snapshot of the particle ensemble.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::particles::ParticlesProto;

/// Attributes written to a snapshot
pub const SNAPSHOT_ATTRS: [&str; 13] = [
    "n", "rd3", "kpa", "rw2", "rd2_insol", "T_freeze", "ice_a", "ice_c", "ice_rho", "x", "y", "z",
    "cell",
];

/// Full ensemble export structure
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleExport {
    /// Export timestamp
    pub exported_at: String,
    /// Export version for compatibility
    pub version: &'static str,
    pub time_sec: f64,
    pub n_sd: usize,
    /// Attribute name to per-particle values
    pub attributes: BTreeMap<&'static str, Vec<Option<f64>>>,
}

/// Collect every attribute of the ensemble; non-finite values become `null`
pub fn ensemble_snapshot(engine: &dyn ParticlesProto, time_sec: f64) -> Result<EnsembleExport> {
    let mut attributes = BTreeMap::new();
    for name in SNAPSHOT_ATTRS {
        let values = engine
            .get_attr(name)?
            .into_iter()
            .map(|v| v.is_finite().then_some(v))
            .collect();
        attributes.insert(name, values);
    }
    Ok(EnsembleExport {
        exported_at: Local::now().to_rfc3339(),
        version: "1.0.0",
        time_sec,
        n_sd: engine.n_sd(),
        attributes,
    })
}

/// Write a snapshot to `dir/ensemble_YYYYMMDD_HHMMSS.json` and return its path
pub fn export_ensemble_json<P: AsRef<Path>>(
    engine: &dyn ParticlesProto,
    time_sec: f64,
    dir: P,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating export directory {}", dir.display()))?;
    let path = dir.join(format!(
        "ensemble_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    export_ensemble_json_to(engine, time_sec, &path)?;
    Ok(path)
}

/// Write a snapshot to a specific file
pub fn export_ensemble_json_to(engine: &dyn ParticlesProto, time_sec: f64, path: &Path) -> Result<()> {
    let export = ensemble_snapshot(engine, time_sec)?;
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &export)?;
    log::info!("JSON ensemble exported: {}", path.display());
    Ok(())
}
