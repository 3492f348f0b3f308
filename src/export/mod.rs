//! Export of run output: CSV time series and spectra, JSON ensemble snapshots.

mod csv_export;
mod json_export;

pub use csv_export::{default_bin_edges, spectrum_rows, write_spectrum_csv, CsvExporter, SpectrumRow};
pub use json_export::{
    ensemble_snapshot, export_ensemble_json, export_ensemble_json_to, EnsembleExport, SNAPSHOT_ATTRS,
};
