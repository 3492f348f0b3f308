//! Execution backends for per-particle work.
//!
//! An executor only decides how an index range is mapped; all random draws
//! and per-cell accumulation stay serial in the engine.

use rayon::prelude::*;

use crate::config::Backend;

/// Data-parallel map over particle indices.
pub trait Executor: Send + Sync + 'static {
    const BACKEND: Backend;

    fn map<T, F>(n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync;

    fn try_map<T, Er, F>(n: usize, f: F) -> Result<Vec<T>, Er>
    where
        T: Send,
        Er: Send,
        F: Fn(usize) -> Result<T, Er> + Send + Sync;
}

/// Single-threaded iteration
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

/// Rayon thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiCore;

impl Executor for Serial {
    const BACKEND: Backend = Backend::Serial;

    fn map<T, F>(n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        (0..n).map(f).collect()
    }

    fn try_map<T, Er, F>(n: usize, f: F) -> Result<Vec<T>, Er>
    where
        T: Send,
        Er: Send,
        F: Fn(usize) -> Result<T, Er> + Send + Sync,
    {
        (0..n).map(f).collect()
    }
}

impl Executor for MultiCore {
    const BACKEND: Backend = Backend::MultiCore;

    fn map<T, F>(n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        (0..n).into_par_iter().map(f).collect()
    }

    fn try_map<T, Er, F>(n: usize, f: F) -> Result<Vec<T>, Er>
    where
        T: Send,
        Er: Send,
        F: Fn(usize) -> Result<T, Er> + Send + Sync,
    {
        (0..n).into_par_iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backends_agree_on_order() {
        let s = Serial::map(1000, |i| (i as f64).sqrt());
        let m = MultiCore::map(1000, |i| (i as f64).sqrt());
        assert_eq!(s, m);
    }

    #[test]
    fn test_try_map_propagates_error() {
        let r: Result<Vec<usize>, String> =
            MultiCore::try_map(100, |i| if i == 57 { Err(format!("bad {i}")) } else { Ok(i) });
        assert_eq!(r, Err("bad 57".to_string()));
        let ok: Result<Vec<usize>, String> = Serial::try_map(3, Ok);
        assert_eq!(ok, Ok(vec![0, 1, 2]));
    }
}
