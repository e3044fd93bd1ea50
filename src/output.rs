//! Writing result files.

use std::path::Path;

use tracing::debug;

use crate::error::DocforgeError;

/// Write `bytes` to `path` via a sibling temp file and a rename, so a reader
/// never sees a half-written document. Parent directories are created.
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), DocforgeError> {
    let path = path.as_ref();
    let write_err = |e| DocforgeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Read an input file, mapping a missing file to [`DocforgeError::FileNotFound`].
pub async fn read_input(path: impl AsRef<Path>) -> Result<Vec<u8>, DocforgeError> {
    let path = path.as_ref();
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DocforgeError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            DocforgeError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}
