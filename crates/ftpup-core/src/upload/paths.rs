//! Path resolution: local root folders and remote destinations.
//!
//! Local paths are compared as strings after lexical normalization, so a
//! relative root of `/repo/di` is accepted for a root folder of
//! `/repo/dist`. Remote paths always use `/`.

use crate::upload::error::{UploadError, UploadResult};
use crate::upload::types::{UploadConfig, UploadRequest};
use log::debug;
use std::path::{Component, Path, PathBuf};

/// Join a relative path onto `base`; absolute paths pass through unchanged.
pub fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        let joined = normalize_local(&base.join(path));
        debug!(
            "Relative file path: {} resolving to: {}",
            path.display(),
            joined.display()
        );
        joined
    }
}

/// Lexically drop `.` components, fold `..` and trailing separators.
pub fn normalize_local(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve and validate the folder (or single file) to upload from.
pub fn resolve_root_folder(raw: &str, base: &Path) -> UploadResult<PathBuf> {
    let root = normalize_local(&make_absolute(Path::new(raw.trim()), base));
    if !root.exists() {
        return Err(UploadError::configuration(format!(
            "The specified root folder: {} does not exist.",
            root.display()
        ))
        .with_path(root.to_string_lossy()));
    }
    Ok(root)
}

/// Resolve the folder that remote paths are computed relative to.
///
/// Defaults to the parent of `root_folder`.
pub fn resolve_relative_root(
    raw: Option<&str>,
    root_folder: &Path,
    base: &Path,
) -> UploadResult<PathBuf> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => {
            let parent = root_folder
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root_folder.to_path_buf());
            debug!(
                "relativeRootFolder not set, defaulting to: {}",
                parent.display()
            );
            return Ok(parent);
        }
    };

    let relative_root = normalize_local(&make_absolute(Path::new(raw), base));
    let shown = relative_root.to_string_lossy().into_owned();
    if !relative_root.exists() {
        return Err(UploadError::configuration(format!(
            "The specified relative root folder: {} does not exist.",
            shown
        ))
        .with_path(shown));
    }
    if !relative_root.is_dir() {
        return Err(UploadError::configuration(format!(
            "The specified relative root folder: {} is not a folder.",
            shown
        ))
        .with_path(shown));
    }
    if !root_folder.to_string_lossy().starts_with(shown.as_str()) {
        return Err(UploadError::configuration(format!(
            "The specified root folder: {} is not within the specified relative root folder: {}",
            root_folder.display(),
            shown
        ))
        .with_path(shown));
    }
    Ok(relative_root)
}

/// Validate a request into an immutable run configuration.
pub fn resolve_config(request: &UploadRequest) -> UploadResult<UploadConfig> {
    if request.root_folder.trim().is_empty() {
        return Err(UploadError::configuration("Input required: rootFolder"));
    }
    let root_folder = resolve_root_folder(&request.root_folder, &request.base_directory)?;
    let relative_root_folder = resolve_relative_root(
        request.relative_root_folder.as_deref(),
        &root_folder,
        &request.base_directory,
    )?;

    Ok(UploadConfig {
        connection: request.connection.clone(),
        root_folder,
        relative_root_folder,
        file_patterns: request
            .file_patterns
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        remote_path: request.remote_path.trim().to_string(),
    })
}

/// `remote_base` joined with the part of `local` below `relative_root`.
pub fn remote_path_for(local: &Path, relative_root: &Path, remote_base: &str) -> String {
    let local = local.to_string_lossy();
    let relative_root = relative_root.to_string_lossy();
    let rest = local
        .strip_prefix(relative_root.as_ref())
        .unwrap_or(local.as_ref());
    normalize_remote(&format!("{}/{}", remote_base, rest))
}

/// POSIX-normalize a remote path: `/` separators, no `.`, `..` folded,
/// no duplicate or trailing slash.
pub fn normalize_remote(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if !absolute => segments.push(".."),
                _ => {}
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Remote parent directory (`dirname`).
pub fn remote_parent(path: &str) -> String {
    let path = normalize_remote(path);
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => ".".to_string(),
    }
}
