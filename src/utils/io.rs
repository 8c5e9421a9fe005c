//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read a whole file as UTF-8, reporting failures as `internal.io_error`.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_error(e, operation, path))
}

/// Replace `path` with `content` via a sibling `.tmp` file and a rename.
///
/// Missing parent directories are created. Readers see either the old or
/// the new content, never a partial write.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let (Some(parent), Some(filename)) = (path.parent(), path.file_name()) else {
        return Err(Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        ));
    };

    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|e| io_error(e, operation, parent))?;
    }

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));
    fs::write(&tmp_path, content).map_err(|e| io_error(e, operation, &tmp_path))?;
    fs::rename(&tmp_path, path).map_err(|e| io_error(e, operation, path))?;

    Ok(())
}

fn io_error(err: std::io::Error, operation: &str, path: &Path) -> Error {
    Error::internal_io(
        err.to_string(),
        Some(format!("{} ({})", operation, path.display())),
    )
}
