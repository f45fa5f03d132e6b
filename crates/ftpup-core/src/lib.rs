//! Core of the FTP upload task: path resolution, file matching and the
//! upload orchestrator.

pub mod upload;

pub use upload::{run_upload, upload_config, UploadError, UploadReport, UploadRequest};
