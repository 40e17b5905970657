//! Path canonicalization.
//!
//! Catalog paths are compared after canonicalization: relative paths are
//! joined onto the working directory, `.` and `..` are resolved, duplicate
//! and trailing separators disappear. Existence and symlinks are never
//! checked, so a path that no longer exists still canonicalizes and symlinks
//! are left as written.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Returns the absolute, normalized form of `path`.
///
/// A relative path stays relative only when the working directory cannot be
/// read.
pub fn canonicalize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_relative() {
        if let Ok(cwd) = env::current_dir() {
            return normalize(&cwd.join(path));
        }
    }
    normalize(path)
}

/// Resolves `.` and `..` and drops redundant separators without touching the
/// working directory.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(name) => out.push(name),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// True when `path` equals `folder` or lies anywhere beneath it.
///
/// Matching is per component, so `/data/xx` is not under `/data/x`.
pub fn is_same_or_under(path: &Path, folder: &Path) -> bool {
    canonicalize(path).starts_with(canonicalize(folder))
}

/// True when `path` lies strictly beneath `folder`.
pub fn is_under(path: &Path, folder: &Path) -> bool {
    let path = canonicalize(path);
    let folder = canonicalize(folder);
    path != folder && path.starts_with(&folder)
}

/// Final component of `path` as a string, or empty when there is none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
