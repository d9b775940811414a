//! Database files on disk.
//!
//! Files hold the serialized image produced by `export`, which is the
//! regular `SQLite` file format.

use std::io::ErrorKind;
use std::path::Path;

use eyre::{Result, WrapErr};
use sqflite_core::Bridge;

/// Reads the database image at `path`. A missing file yields an empty image,
/// which opens as a fresh database.
pub fn load(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded database");
            Ok(bytes)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no database file, starting empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e).wrap_err_with(|| format!("failed to read {}", path.display())),
    }
}

/// Writes the open database of `bridge` to `path`.
pub fn save(bridge: &Bridge, path: &Path) -> Result<()> {
    let image = bridge
        .export()
        .wrap_err("failed to export database")?;
    std::fs::write(path, &image)
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = image.len(), "saved database");
    Ok(())
}
