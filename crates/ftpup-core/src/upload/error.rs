//! Error type for an upload run.

use ftpup_ftp::FtpError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single terminal error of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadError {
    pub kind: UploadErrorKind,
    pub message: String,
    /// Local or remote path the error is about, if any.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// Bad inputs. Raised before any connection is attempted.
    Configuration,
    /// Connect, directory creation or upload failed.
    Transport,
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self {
            kind: UploadErrorKind::Configuration,
            message: msg.into(),
            path: None,
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self {
            kind: UploadErrorKind::Transport,
            message: msg.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn connect_failed(host: &str, cause: &FtpError) -> Self {
        Self::transport(format!(
            "Unable to connect to ftp host: {} due to error: {}",
            host, cause
        ))
        .with_path(host)
    }

    pub fn directory_failed(dir: &str, cause: &FtpError) -> Self {
        Self::transport(format!(
            "Unable to create remote directory: {} due to error: {}",
            dir, cause
        ))
        .with_path(dir)
    }

    pub fn upload_failed(file: &str, cause: &FtpError) -> Self {
        Self::transport(format!(
            "Unable to upload file: {} due to error: {}",
            file, cause
        ))
        .with_path(file)
    }

    pub fn is_configuration(&self) -> bool {
        self.kind == UploadErrorKind::Configuration
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UploadError {}
