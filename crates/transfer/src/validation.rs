//! Mapping of peer-supplied file names onto a local root.

use std::path::{Component, Path, PathBuf};

use crate::TransferError;

/// How a peer-supplied name may be anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// The name must already be relative.
    Relative,
    /// A leading `/` or drive prefix is dropped.
    Rerooted,
}

/// Reduces `name` to its normal components.
///
/// `..` is always refused, so the result never climbs above wherever it is
/// joined. A name with no normal component names no file.
fn confine(name: &str, anchor: Anchor) -> Result<PathBuf, TransferError> {
    let refuse = |reason: &str| TransferError::InvalidPath(format!("{reason}: {name:?}"));

    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(refuse("parent directory traversal not allowed")),
            Component::Prefix(_) | Component::RootDir if anchor == Anchor::Relative => {
                return Err(refuse("absolute path not allowed"));
            }
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(refuse("path names no file"));
    }
    Ok(relative)
}

/// Places an uploaded file name under `root`.
///
/// The name must be relative: absolute paths, Windows prefixes (`C:`,
/// `\\server`) and `..` are rejected. `.` components are dropped.
pub fn resolve_upload_path(root: &Path, name: &str) -> Result<PathBuf, TransferError> {
    Ok(root.join(confine(name, Anchor::Relative)?))
}

/// Places a requested download path under `root`.
///
/// Leading `/` and drive prefixes are dropped, so `/a/b.txt` resolves to
/// `root/a/b.txt`. Any `..` component is rejected.
pub fn resolve_download_path(root: &Path, requested: &str) -> Result<PathBuf, TransferError> {
    Ok(root.join(confine(requested, Anchor::Rerooted)?))
}
