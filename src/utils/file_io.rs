//! Best-effort scratch cleanup. Nothing here fails: a missing directory means
//! there is nothing to clean, anything else is logged and skipped.

use std::io;
use std::path::Path;

use tracing::debug;
use tracing::warn;

/// Removes every regular file directly inside `dir` whose extension is
/// `extension`. Subdirectories are not descended into.
///
/// Returns the number of files removed.
pub async fn remove_files_with_extension(
    dir: &Path,
    extension: &str,
) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{:?} does not exist, nothing to clean", dir);
            return 0;
        }
        Err(e) => {
            warn!("failed to list {:?}: {}", dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("failed to list {:?}: {}", dir, e);
                break;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => {}
            _ => continue,
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("removed {:?}", path);
                removed += 1;
            }
            Err(e) => warn!("failed to remove {:?}: {}", path, e),
        }
    }
    removed
}

/// Removes everything inside `dir`, keeping `dir` itself.
///
/// Returns the number of top-level entries removed.
pub async fn clear_dir(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{:?} does not exist, nothing to clean", dir);
            return 0;
        }
        Err(e) => {
            warn!("failed to list {:?}: {}", dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("failed to list {:?}: {}", dir, e);
                break;
            }
        };
        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!("failed to remove {:?}: {}", path, e),
        }
    }
    removed
}
