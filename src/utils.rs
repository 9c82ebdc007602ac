//! Utility functions for the dinoq crate

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{Error, Result};

/// Initialize logging for binaries, info level by default.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    env_logger::builder()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init()
}

/// Build a standard RNG, seeded for reproducibility when a seed is given.
///
/// # Examples
///
/// ```
/// use dinoq::utils::build_rng;
///
/// let _seeded = build_rng(Some(42));
/// let _entropy = build_rng(None);
/// ```
pub fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Arithmetic mean of a slice, `0.0` when empty.
///
/// # Examples
///
/// ```
/// use dinoq::utils::mean;
///
/// assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
/// assert_eq!(mean(&[]), 0.0);
/// ```
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Write data to a file atomically (write to temp, sync, then rename).
///
/// The temp file is created in the same directory so the rename stays on
/// one filesystem. A crash mid-write leaves any previous file at `path`
/// untouched.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().map_err(|source| Error::Io {
            operation: "resolve current directory for atomic write".to_string(),
            source,
        })?,
    };

    let temp_name = format!(
        ".tmp_{}_{}",
        std::process::id(),
        path.file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
    );
    let temp_path = parent.join(&temp_name);

    let mut file = File::create(&temp_path).map_err(|source| Error::Io {
        operation: format!("create temp file {temp_path:?}"),
        source,
    })?;
    file.write_all(data).map_err(|source| Error::Io {
        operation: format!("write temp file {temp_path:?}"),
        source,
    })?;
    file.sync_all().map_err(|source| Error::Io {
        operation: format!("sync temp file {temp_path:?}"),
        source,
    })?;

    fs::rename(&temp_path, path).map_err(|source| Error::Io {
        operation: format!("rename {temp_path:?} to {path:?}"),
        source,
    })?;

    Ok(())
}
