use std::path::{Component, Path, PathBuf};

use roomdrop_protocol::constants::MAX_CHUNK_SIZE;

use crate::TransferError;

/// Validates that a peer-supplied file name is a single plain path component.
///
/// Rejects:
/// - Empty names
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Any directory separator
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    let path = Path::new(name);

    if path.is_absolute() {
        return Err(TransferError::InvalidName(format!(
            "absolute path not allowed: {name}"
        )));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        (Some(Component::ParentDir), _) => {
            return Err(TransferError::InvalidName(format!(
                "parent directory traversal not allowed: {name}"
            )));
        }
        (Some(Component::Prefix(_)), _) => {
            return Err(TransferError::InvalidName(format!(
                "path prefix not allowed: {name}"
            )));
        }
        _ => {
            return Err(TransferError::InvalidName(format!(
                "directories not allowed: {name}"
            )));
        }
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "directories not allowed: {name}"
        )));
    }

    Ok(())
}

/// Checks that a declared size and chunk count describe a file this node
/// can receive.
///
/// The size must not exceed `max_size`. An empty file has no chunks and
/// any other file has at least one. Every chunk carries at least one byte
/// and no more than [`MAX_CHUNK_SIZE`].
pub fn validate_layout(size: u64, total_chunks: u32, max_size: u64) -> Result<(), TransferError> {
    if size > max_size {
        return Err(TransferError::TooLarge {
            size,
            max: max_size,
        });
    }
    let invalid = TransferError::InvalidChunkCount { size, total_chunks };
    if (size == 0) != (total_chunks == 0) || u64::from(total_chunks) > size {
        return Err(invalid);
    }
    if total_chunks > 0 && size.div_ceil(u64::from(total_chunks)) > MAX_CHUNK_SIZE as u64 {
        return Err(invalid);
    }
    Ok(())
}

/// Returns `dir/name`, or `dir/stem (n).ext` with the lowest free `n` if
/// that path already exists.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1u32..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
