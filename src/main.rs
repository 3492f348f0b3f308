//! superdroplet - Entry point
//!
//! Box and parcel drivers for the particle engine.
//!
//! CLI Usage:
//!   cargo run                          # Rising parcel with default aerosol
//!   cargo run -- --box                 # Golovin-kernel coalescence box
//!   cargo run -- --config run.json -n 500 --backend multicore --export

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use superdroplet::{
    export::{self, CsvExporter},
    factory,
    state::{Parcel, RunMetrics},
    AmbientFields, Backend, ParticlesProto, RunConfig, RunMode,
};

/// Command-line options
struct Args {
    mode: Option<RunMode>,
    config: Option<PathBuf>,
    steps: Option<usize>,
    backend: Option<Backend>,
    export: bool,
}

/// Parse CLI arguments
fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        mode: None,
        config: None,
        steps: None,
        backend: None,
        export: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--box" => parsed.mode = Some(RunMode::Box),
            "--parcel" => parsed.mode = Some(RunMode::Parcel),
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).context("--config needs a file")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "-n" | "--steps" => {
                i += 1;
                let n = args.get(i).context("--steps needs a number")?;
                parsed.steps = Some(n.parse().with_context(|| format!("bad step count {n:?}"))?);
            }
            "-b" | "--backend" => {
                i += 1;
                let b = args.get(i).context("--backend needs a name")?;
                parsed.backend = Some(b.parse().map_err(anyhow::Error::msg)?);
            }
            "-e" | "--export" => parsed.export = true,
            "--help" | "-h" => {
                println!("superdroplet");
                println!();
                println!("Usage: superdroplet [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --box              Coalescence box run");
                println!("  --parcel           Rising parcel run (default)");
                println!("  -c, --config FILE  JSON run configuration");
                println!("  -n, --steps N      Number of timesteps");
                println!("  -b, --backend B    serial | multicore | accelerator");
                println!("  -e, --export       Write CSV time series, spectra and a JSON snapshot");
                println!("  --help, -h         Show this help");
                std::process::exit(0);
            }
            other => log::warn!("Ignoring unknown argument {:?}", other),
        }
        i += 1;
    }

    Ok(parsed)
}

/// Build the run configuration from defaults, file and flags
fn run_config(args: &Args) -> RunConfig {
    let fallback = match args.mode {
        Some(RunMode::Box) => RunConfig::box_model(),
        _ => RunConfig::parcel(),
    };
    let mut cfg = match &args.config {
        Some(path) => RunConfig::load_or(path, fallback),
        None => fallback,
    };
    if let Some(mode) = args.mode {
        cfg.mode = mode;
    }
    if let Some(steps) = args.steps {
        cfg.n_steps = steps;
    }
    if let Some(backend) = args.backend {
        cfg.backend = backend;
    }
    cfg
}

/// Optional CSV output of a run
struct Output {
    series: Option<CsvExporter>,
    spectra: Option<csv::Writer<std::fs::File>>,
}

impl Output {
    fn new(cfg: &RunConfig, enabled: bool, prefix: &str) -> Result<Self> {
        if !enabled {
            return Ok(Self {
                series: None,
                spectra: None,
            });
        }
        let series = CsvExporter::new(&cfg.output_dir, prefix)?;
        let spectra_path = series.path().with_file_name(format!(
            "{}_spectra_{}.csv",
            prefix,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        let spectra = csv::Writer::from_path(&spectra_path)
            .with_context(|| format!("creating {}", spectra_path.display()))?;
        Ok(Self {
            series: Some(series),
            spectra: Some(spectra),
        })
    }

    fn record(
        &mut self,
        cfg: &RunConfig,
        engine: &mut dyn ParticlesProto,
        metrics: &RunMetrics,
    ) -> Result<()> {
        if let Some(series) = &mut self.series {
            series.record(metrics)?;
        }
        if let Some(spectra) = &mut self.spectra {
            let rows = export::spectrum_rows(
                engine,
                &export::default_bin_edges(150),
                cfg.spectrum_sig0,
                metrics.time_sec,
            )?;
            export::write_spectrum_csv(spectra, &rows)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if let Some(series) = self.series {
            series.finish()?;
        }
        if let Some(mut spectra) = self.spectra {
            spectra.flush()?;
        }
        Ok(())
    }
}

fn log_metrics(step: usize, m: &RunMetrics) {
    log::info!(
        "step {:5} | t = {:7.1} s | z = {:6.1} m | T = {:6.2} K | RH = {:.4} | RH_i = {:.4} | N_cloud = {:.3e}/kg | q_l = {:.3e} | q_i = {:.3e} | n_sd = {}",
        step,
        m.time_sec,
        m.z_m,
        m.T_K,
        m.RH,
        m.RH_i,
        m.cloud_conc_per_kg,
        m.liquid_water_kg_per_kg(),
        m.ice_mass_kg_per_kg,
        m.n_sd
    );
}

/// Adiabatic parcel: ascend, sync, condense, close the step
fn run_parcel(cfg: &RunConfig, export_enabled: bool) -> Result<()> {
    let mut engine = factory(cfg.backend, cfg.opts_init()?)?;
    let mut parcel = Parcel::new(cfg.th_K, cfg.rv, cfg.rhod, cfg.w_m_per_s);
    engine.init(&parcel.ambient).context("initializing parcel ensemble")?;
    log::info!("Parcel initialized with {} super-droplets", engine.n_sd());

    let mut out = Output::new(cfg, export_enabled, "parcel")?;
    let m = RunMetrics::collect(engine.as_mut(), &parcel.ambient, 0.0, parcel.z_m)?;
    log_metrics(0, &m);
    out.record(cfg, engine.as_mut(), &m)?;

    for step in 1..=cfg.n_steps {
        parcel.ascend(cfg.dt_sec);
        engine.sync_in(&parcel.ambient)?;
        let AmbientFields { th, rv, .. } = &mut parcel.ambient;
        engine.step_cond(&cfg.opts, th, rv)?;
        engine.step_async(&cfg.opts)?;

        if step % cfg.output_every.max(1) == 0 {
            let time_sec = step as f64 * cfg.dt_sec;
            let m = RunMetrics::collect(engine.as_mut(), &parcel.ambient, time_sec, parcel.z_m)?;
            log_metrics(step, &m);
            out.record(cfg, engine.as_mut(), &m)?;
        }
    }

    if export_enabled {
        export::export_ensemble_json(engine.as_ref(), cfg.n_steps as f64 * cfg.dt_sec, &cfg.output_dir)?;
    }
    out.finish()
}

/// Single well-mixed box: the host fields never change apart from feedback
fn run_box(cfg: &RunConfig, export_enabled: bool) -> Result<()> {
    let mut engine = factory(cfg.backend, cfg.opts_init()?)?;
    let mut ambient = AmbientFields::uniform(1, cfg.th_K, cfg.rv, cfg.rhod);
    engine.init(&ambient).context("initializing box ensemble")?;
    log::info!("Box initialized with {} super-droplets", engine.n_sd());

    let mut out = Output::new(cfg, export_enabled, "box")?;
    let m = RunMetrics::collect(engine.as_mut(), &ambient, 0.0, 0.0)?;
    log_metrics(0, &m);
    out.record(cfg, engine.as_mut(), &m)?;

    for step in 1..=cfg.n_steps {
        engine.step_sync(&cfg.opts, &mut ambient)?;
        engine.step_async(&cfg.opts)?;

        if step % cfg.output_every.max(1) == 0 {
            let m = RunMetrics::collect(engine.as_mut(), &ambient, step as f64 * cfg.dt_sec, 0.0)?;
            log_metrics(step, &m);
            out.record(cfg, engine.as_mut(), &m)?;
        }
    }

    if export_enabled {
        export::export_ensemble_json(engine.as_ref(), cfg.n_steps as f64 * cfg.dt_sec, &cfg.output_dir)?;
    }
    out.finish()
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let cfg = run_config(&args);

    log::info!(
        "superdroplet starting: {:?} run, {} steps of {} s on {} backend",
        cfg.mode,
        cfg.n_steps,
        cfg.dt_sec,
        cfg.backend
    );
    let start = Instant::now();

    match cfg.mode {
        RunMode::Parcel => run_parcel(&cfg, args.export)?,
        RunMode::Box => run_box(&cfg, args.export)?,
    }

    log::info!("Run finished in {:.2?}", start.elapsed());
    Ok(())
}
