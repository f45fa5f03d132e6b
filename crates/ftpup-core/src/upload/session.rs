//! The narrow view of an FTP session the orchestrator works against.

use async_trait::async_trait;
use ftpup_ftp::{FtpClient, FtpConnectionConfig, FtpResult};
use std::path::Path;

/// Operations issued during an upload run.
#[async_trait]
pub trait UploadSession: Send + 'static {
    /// Create `remote_dir` and any missing parents; existing is fine.
    async fn create_directory(&mut self, remote_dir: &str) -> FtpResult<()>;

    /// Store `local` at `remote`, returning the bytes sent.
    async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64>;

    /// End the session.
    async fn close(&mut self) -> FtpResult<()>;
}

/// Opens the one session a run uses.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    type Session: UploadSession;

    async fn connect(&self, config: &FtpConnectionConfig) -> FtpResult<Self::Session>;
}

#[async_trait]
impl UploadSession for FtpClient {
    async fn create_directory(&mut self, remote_dir: &str) -> FtpResult<()> {
        self.mkdir_all(remote_dir).await
    }

    async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64> {
        self.upload(local, remote).await
    }

    async fn close(&mut self) -> FtpResult<()> {
        self.quit().await
    }
}

/// Connects real FTP/FTPS sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

#[async_trait]
impl SessionConnector for FtpConnector {
    type Session = FtpClient;

    async fn connect(&self, config: &FtpConnectionConfig) -> FtpResult<FtpClient> {
        FtpClient::connect(config.clone()).await
    }
}
