//! File discovery: recursive listing + glob matching.
//!
//! Patterns follow shell globbing with "matchBase": a pattern without a
//! separator is tested against the basename of every candidate, one with
//! a separator against the whole absolute path. `*` never crosses a
//! separator, `**` spans directories, dot-files need a literal dot,
//! `{a,b}` alternatives are expanded, a leading `!` negates a pattern and
//! a leading `#` makes the line a comment.

use crate::upload::error::{UploadError, UploadResult};
use crate::upload::paths;
use crate::upload::types::{FileEntry, UploadConfig};
use glob::{MatchOptions, Pattern};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Matching is case-insensitive where the filesystem is.
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

/// A compiled pattern line.
struct FilePattern {
    source: String,
    alternatives: Vec<Pattern>,
    match_base: bool,
    negated: bool,
}

impl FilePattern {
    fn compile(raw: &str) -> UploadResult<Option<Self>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let normalized = normalize_pattern(body);
        debug!("normalizedPattern= {}", normalized);

        let alternatives = expand_braces(&normalized)
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    UploadError::configuration(format!("Invalid file pattern '{}': {}", raw, e))
                        .with_path(raw)
                })
            })
            .collect::<UploadResult<Vec<_>>>()?;

        Ok(Some(Self {
            source: trimmed.to_string(),
            match_base: !normalized.contains('/'),
            alternatives,
            negated,
        }))
    }

    fn matches(&self, candidate: &Path, options: MatchOptions) -> bool {
        let subject = if self.match_base {
            candidate
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            to_slashes(&candidate.to_string_lossy())
        };
        let hit = self
            .alternatives
            .iter()
            .any(|p| p.matches_with(&subject, options));
        hit != self.negated
    }
}

/// Every file and directory under `root`, the root itself included.
pub fn list_candidates(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(paths::normalize_local(e.path())),
            Err(e) => {
                warn!("Skipping unreadable path while listing {}: {}", root.display(), e);
                None
            }
        })
        .collect()
}

/// Apply `patterns` under `root` and return the sorted, de-duplicated matches.
///
/// A root that is a regular file is returned on its own and the patterns
/// are not consulted.
pub fn find_matching_paths(root: &Path, patterns: &[String]) -> UploadResult<Vec<PathBuf>> {
    debug!("Searching for files to upload");

    if root.is_file() {
        info!("{} is a file. Ignoring all file patterns", root.display());
        return Ok(vec![root.to_path_buf()]);
    }

    let compiled = patterns
        .iter()
        .map(|p| FilePattern::compile(p))
        .collect::<UploadResult<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    debug!(
        "using: {} filePatterns: {:?} to search for files.",
        compiled.len(),
        patterns
    );
    if compiled.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = list_candidates(root);
    debug!("Candidates found for match: {}", candidates.len());

    let options = match_options();
    // Ordered by display string; the value keeps names that are not UTF-8 intact.
    let mut matched: BTreeMap<String, PathBuf> = BTreeMap::new();
    for (i, pattern) in compiled.iter().enumerate() {
        debug!("searching for files, pattern[{}]: {}", i, pattern.source);
        for candidate in &candidates {
            if pattern.matches(candidate, options) {
                let key = candidate.to_string_lossy().into_owned();
                if !matched.contains_key(&key) {
                    debug!("adding file: {}", candidate.display());
                    matched.insert(key, candidate.clone());
                }
            }
        }
    }

    Ok(matched.into_values().collect())
}

/// Match files for `config` and derive each one's remote destination.
pub fn find_files(config: &UploadConfig) -> UploadResult<Vec<FileEntry>> {
    let matches = find_matching_paths(&config.root_folder, &config.file_patterns)?;
    matches
        .into_iter()
        .map(|local| {
            let meta = std::fs::metadata(&local).map_err(|e| {
                UploadError::configuration(format!(
                    "Unable to read {}: {}",
                    local.display(),
                    e
                ))
                .with_path(local.to_string_lossy())
            })?;
            let remote_path =
                paths::remote_path_for(&local, &config.relative_root_folder, &config.remote_path);
            if remote_path.contains(['\r', '\n']) {
                return Err(UploadError::configuration(format!(
                    "Unable to upload {}: file name contains a line break",
                    local.display()
                ))
                .with_path(local.to_string_lossy()));
            }
            Ok(FileEntry {
                local_path: local,
                remote_path,
                is_directory: meta.is_dir(),
            })
        })
        .collect()
}

/// Canonicalize separators and drop `.`/empty segments from a pattern.
pub fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim();
    let pattern = if cfg!(windows) {
        pattern.replace('\\', "/")
    } else {
        pattern.to_string()
    };
    let absolute = pattern.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for seg in pattern.split('/') {
        match seg {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." && last != "**" => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn to_slashes(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

/// Expand `{a,b}` alternatives the way shells do, outermost group first.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let bytes = pattern.as_bytes();
    let mut open = None;
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let start = open.unwrap_or(0);
                    let inner = &pattern[start + 1..i];
                    let parts = split_top_level(inner);
                    if parts.len() < 2 {
                        // `{x}` is literal.
                        continue;
                    }
                    let prefix = &pattern[..start];
                    let suffix = &pattern[i + 1..];
                    return parts
                        .iter()
                        .flat_map(|part| expand_braces(&format!("{}{}{}", prefix, part, suffix)))
                        .collect();
                }
            }
            _ => {}
        }
    }
    vec![pattern.to_string()]
}

fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[last..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::Builder::new().prefix("matcher").tempdir().unwrap();
        let root = dir.path().join("dist");
        fs::create_dir_all(root.join("sub/deep")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("index.html"), b"<html/>").unwrap();
        fs::write(root.join("sub/b.txt"), b"b").unwrap();
        fs::write(root.join("sub/deep/c.js"), b"c").unwrap();
        fs::write(root.join(".hidden/secret.txt"), b"s").unwrap();
        (dir, root)
    }

    fn names(root: &Path, found: &[PathBuf]) -> Vec<String> {
        found
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn single_file_root_ignores_patterns() {
        let (_dir, root) = tree();
        let file = root.join("a.txt");
        let found = find_matching_paths(&file, &["*.nothing".into()]).unwrap();
        assert_eq!(found, vec![file.clone()]);
        let found = find_matching_paths(&file, &[]).unwrap();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn recursive_pattern_with_match_base() {
        let (_dir, root) = tree();
        let found = find_matching_paths(&root, &["*.txt".into()]).unwrap();
        // Only the basename is tested, so dot-directories do not hide files.
        assert_eq!(
            names(&root, &found),
            vec![".hidden/secret.txt", "a.txt", "sub/b.txt"]
        );
    }

    #[test]
    fn double_star_pattern() {
        let (_dir, root) = tree();
        let found = find_matching_paths(&root, &["**/*.txt".into()]).unwrap();
        assert_eq!(names(&root, &found), vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn union_is_sorted_and_deduplicated() {
        let (_dir, root) = tree();
        let patterns = vec!["*.js".into(), "**/*.txt".into(), "*.txt".into(), "".into()];
        let first = find_matching_paths(&root, &patterns).unwrap();
        assert_eq!(
            names(&root, &first),
            vec![".hidden/secret.txt", "a.txt", "sub/b.txt", "sub/deep/c.js"]
        );
        let second = find_matching_paths(&root, &patterns).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn directories_are_candidates() {
        let (_dir, root) = tree();
        let found = find_matching_paths(&root, &["sub".into()]).unwrap();
        assert_eq!(names(&root, &found), vec!["sub"]);
    }

    #[test]
    fn empty_patterns_and_no_matches() {
        let (_dir, root) = tree();
        assert!(find_matching_paths(&root, &[]).unwrap().is_empty());
        assert!(find_matching_paths(&root, &["*.zip".into()]).unwrap().is_empty());
        assert!(find_matching_paths(&root, &["# just a comment".into()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn braces_and_negation() {
        let (_dir, root) = tree();
        let found = find_matching_paths(&root, &["*.{js,html}".into()]).unwrap();
        assert_eq!(names(&root, &found), vec!["index.html", "sub/deep/c.js"]);

        let found = find_matching_paths(&root, &["!*.txt".into()]).unwrap();
        let names = names(&root, &found);
        assert!(names.contains(&"index.html".to_string()));
        assert!(!names.contains(&"a.txt".to_string()));
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let (_dir, root) = tree();
        let err = find_matching_paths(&root, &["[".into()]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn entries_carry_remote_paths() {
        let (dir, root) = tree();
        let config = UploadConfig {
            connection: Default::default(),
            root_folder: root.clone(),
            relative_root_folder: dir.path().to_path_buf(),
            file_patterns: vec!["**/*.txt".into(), "deep".into()],
            remote_path: "/site".into(),
        };
        let entries = find_files(&config).unwrap();
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.remote_path.as_str(), e.is_directory))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/site/dist/a.txt", false),
                ("/site/dist/sub/b.txt", false),
                ("/site/dist/sub/deep", true),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn names_that_are_not_utf8_survive_matching() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, root) = tree();
        let odd = root.join(OsStr::from_bytes(b"bad\xff.bin"));
        fs::write(&odd, b"x").unwrap();

        let found = find_matching_paths(&root, &["*.bin".into()]).unwrap();
        assert_eq!(found, vec![odd.clone()]);
        assert!(found[0].exists());

        let config = UploadConfig {
            connection: Default::default(),
            root_folder: root.clone(),
            relative_root_folder: dir.path().to_path_buf(),
            file_patterns: vec!["*".into()],
            remote_path: "/site".into(),
        };
        let entries = find_files(&config).unwrap();
        assert!(entries.iter().any(|e| e.local_path == odd && !e.is_directory));
    }

    #[cfg(unix)]
    #[test]
    fn line_breaks_in_file_names_are_rejected() {
        let (dir, root) = tree();
        let nasty = root.join("x\r\nDELE index.html");
        fs::write(&nasty, b"x").unwrap();

        let config = UploadConfig {
            connection: Default::default(),
            root_folder: root.clone(),
            relative_root_folder: dir.path().to_path_buf(),
            file_patterns: vec!["x*".into()],
            remote_path: "/site".into(),
        };
        let err = find_files(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.message.contains("line break"));
        assert_eq!(err.path.as_deref(), Some(nasty.to_string_lossy().as_ref()));
    }

    #[test]
    fn pattern_normalization() {
        assert_eq!(normalize_pattern("./**//*.txt"), "**/*.txt");
        assert_eq!(normalize_pattern("/repo/./dist/../out/*"), "/repo/out/*");
        assert_eq!(normalize_pattern(" *.txt "), "*.txt");
    }

    #[test]
    fn brace_expansion() {
        assert_eq!(expand_braces("*.{js,css}"), vec!["*.js", "*.css"]);
        assert_eq!(
            expand_braces("{a,b}/{c,d}"),
            vec!["a/c", "a/d", "b/c", "b/d"]
        );
        assert_eq!(expand_braces("x{y}z"), vec!["x{y}z"]);
        assert_eq!(expand_braces("{a,{b,c}}"), vec!["a", "b", "c"]);
    }
}
