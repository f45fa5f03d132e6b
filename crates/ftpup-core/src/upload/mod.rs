//! # Upload
//!
//! Publish a local folder to an FTP server.
//!
//! ## Modules
//!
//! - **types**: requests, validated configuration, file entries and the report
//! - **error**: the run's terminal error
//! - **paths**: local root resolution and remote path mapping
//! - **matcher**: glob matching of files under the root folder
//! - **session**: the FTP operations the orchestrator relies on
//! - **orchestrator**: concurrent directory creation and uploads

pub mod error;
pub mod matcher;
pub mod orchestrator;
pub mod paths;
pub mod session;
pub mod types;

pub use error::{UploadError, UploadErrorKind, UploadResult};
pub use orchestrator::{RunState, UploadOrchestrator};
pub use session::{FtpConnector, SessionConnector, UploadSession};
pub use types::*;

use log::info;

/// Resolve `request`, match files and upload them through `connector`.
///
/// Configuration errors are returned before any connection is opened.
pub async fn run_upload<C: SessionConnector>(
    request: &UploadRequest,
    connector: C,
) -> UploadResult<UploadReport> {
    let config = paths::resolve_config(request)?;
    upload_config(&config, connector).await
}

/// Upload according to an already validated configuration.
pub async fn upload_config<C: SessionConnector>(
    config: &UploadConfig,
    connector: C,
) -> UploadResult<UploadReport> {
    let entries = matcher::find_files(config)?;
    info!(
        "Uploading {} entries from {} to {}:{}",
        entries.len(),
        config.root_folder.display(),
        config.connection.host,
        config.remote_path
    );
    UploadOrchestrator::new(connector).run(config, entries).await
}
