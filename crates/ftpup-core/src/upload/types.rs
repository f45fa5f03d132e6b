//! Configuration, file entries and the run report.

use crate::upload::paths;
use ftpup_ftp::FtpConnectionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Raw, unvalidated inputs as handed over by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub connection: FtpConnectionConfig,
    pub root_folder: String,
    #[serde(default)]
    pub relative_root_folder: Option<String>,
    #[serde(default)]
    pub file_patterns: Vec<String>,
    pub remote_path: String,
    /// Directory relative paths are resolved against.
    pub base_directory: PathBuf,
}

/// Validated configuration for one run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    pub connection: FtpConnectionConfig,
    /// Absolute and existing; may name a single file.
    pub root_folder: PathBuf,
    /// Absolute directory; a string prefix of `root_folder`.
    pub relative_root_folder: PathBuf,
    pub file_patterns: Vec<String>,
    pub remote_path: String,
}

/// One matched local path and where it goes on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub local_path: PathBuf,
    pub remote_path: String,
    pub is_directory: bool,
}

impl FileEntry {
    /// Remote directory that must exist before this entry lands.
    pub fn remote_directory(&self) -> String {
        if self.is_directory {
            self.remote_path.clone()
        } else {
            paths::remote_parent(&self.remote_path)
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub host: String,
    pub remote_path: String,
    pub directories_created: usize,
    pub files_uploaded: usize,
    pub bytes_uploaded: u64,
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ftp upload successful\nhost: {}\npath: {}\n directories created: {}\n files uploaded: {}",
            self.host, self.remote_path, self.directories_created, self.files_uploaded
        )
    }
}
