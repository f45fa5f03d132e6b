//! Stateful FTP client: owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → optional AUTH TLS → authenticate → FEAT →
//! `TYPE I` → PWD (home directory). After that the client only needs
//! to create directories, store files and quit.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls;
use crate::ftp::transfer::{self, DataStream, PassiveMode};
use crate::ftp::types::*;
use chrono::Utc;
use log::{debug, info};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio_rustls::TlsConnector;
use uuid::Uuid;

/// Chunk size for streaming uploads (64 KiB).
const UPLOAD_CHUNK: usize = 65_536;

/// A connected FTP client session.
pub struct FtpClient {
    pub config: FtpConnectionConfig,
    pub info: FtpSessionInfo,
    pub features: ServerFeatures,
    codec: Option<FtpCodec>,
    tls: Option<TlsConnector>,
}

impl FtpClient {
    /// Establish and authenticate a new session.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        if config.host.is_empty() {
            return Err(FtpError::invalid_config("Host must not be empty"));
        }

        let session_id = Uuid::new_v4().to_string();
        let (mut codec, banner) = connection::connect(&config).await?;
        debug!("FTP {} banner: {}", config.address(), banner.text());

        // ── Explicit FTPS: AUTH TLS ──────────────────────────────
        let mut tls = None;
        if config.security.is_secure() {
            let resp = codec.execute("AUTH TLS").await?;
            if resp.code != 234 {
                return Err(FtpError::tls_failed(format!(
                    "AUTH TLS rejected: {}",
                    resp.text()
                )));
            }
            let connector = tls::build_tls_connector(config.accept_invalid_certs)?;
            let tcp = codec.into_plain_tcp()?;
            let stream = tls::handshake(&connector, &config.host, tcp, "Control channel").await?;
            codec = FtpCodec::from_tls(stream);
            codec.expect_ok("PBSZ 0").await?;
            codec.expect_ok("PROT P").await?;
            tls = Some(connector);
        }

        // ── Authenticate ─────────────────────────────────────────
        let user_resp = codec.execute(&format!("USER {}", config.username)).await?;
        if user_resp.code == 331 {
            let pass_resp = codec.execute(&format!("PASS {}", config.password)).await?;
            if pass_resp.code / 100 != 2 {
                return Err(FtpError::auth_failed(format!(
                    "Login failed: {}",
                    pass_resp.text()
                ))
                .with_code(pass_resp.code));
            }
        } else if user_resp.code / 100 != 2 {
            return Err(FtpError::auth_failed(format!(
                "USER rejected: {}",
                user_resp.text()
            ))
            .with_code(user_resp.code));
        }

        // ── FEAT ─────────────────────────────────────────────────
        let features = match codec.execute("FEAT").await {
            Ok(r) if r.code / 100 == 2 => ServerFeatures::from_feat_reply(&r),
            _ => ServerFeatures::default(),
        };
        if features.utf8 {
            let _ = codec.execute("OPTS UTF8 ON").await;
        }

        codec.expect_ok("TYPE I").await?;
        let home = match codec.expect_ok("PWD").await {
            Ok(r) => parse_quoted_path(&r.text()).unwrap_or_else(|| "/".into()),
            Err(_) => "/".into(),
        };

        info!(
            "FTP session {} connected to {} as {} (tls: {})",
            session_id,
            config.address(),
            config.username,
            tls.is_some()
        );

        let info = FtpSessionInfo {
            id: session_id,
            host: config.host.clone(),
            home_directory: home,
            connected_at: Utc::now(),
            bytes_uploaded: 0,
            files_stored: 0,
        };

        Ok(Self {
            config,
            info,
            features,
            codec: Some(codec),
            tls,
        })
    }

    fn codec(&mut self) -> FtpResult<&mut FtpCodec> {
        self.codec
            .as_mut()
            .ok_or_else(|| FtpError::disconnected("Session already closed"))
    }

    /// Resolve a remote path against the login directory.
    pub fn absolute_remote(&self, path: &str) -> String {
        if path.starts_with('/') {
            path.to_string()
        } else {
            join_remote(&self.info.home_directory, path)
        }
    }

    // ─── MKD ─────────────────────────────────────────────────────

    /// Create a directory and all missing parents.
    ///
    /// FTP has no `mkdir -p`, so every component is probed with CWD and
    /// created with MKD when the probe fails. Existing directories are
    /// not an error. The working directory is restored afterwards.
    pub async fn mkdir_all(&mut self, path: &str) -> FtpResult<()> {
        let target = self.absolute_remote(path);
        let home = self.info.home_directory.clone();
        let codec = self.codec()?;

        let mut current = String::from("/");
        for component in target.split('/').filter(|c| !c.is_empty() && *c != ".") {
            current = join_remote(&current, component);

            let cwd = codec.execute(&format!("CWD {}", current)).await?;
            if cwd.code / 100 == 2 {
                continue;
            }
            let mkd = codec.execute(&format!("MKD {}", current)).await?;
            if mkd.code / 100 == 2 {
                debug!("Created remote directory {}", current);
                continue;
            }
            // Lost a race with another client, or the server hides the
            // directory from CWD until it exists: re-probe before failing.
            let recheck = codec.execute(&format!("CWD {}", current)).await?;
            if recheck.code / 100 != 2 {
                return Err(FtpError::from_reply(mkd.code, &mkd.text()));
            }
        }

        codec.expect_ok(&format!("CWD {}", home)).await?;
        Ok(())
    }

    // ─── STOR ────────────────────────────────────────────────────

    /// Upload a local file to `remote_path`, replacing any existing file.
    ///
    /// Returns the number of bytes sent.
    pub async fn upload(&mut self, local_path: &Path, remote_path: &str) -> FtpResult<u64> {
        let target = self.absolute_remote(remote_path);
        let mut file = fs::File::open(local_path).await.map_err(|e| {
            FtpError::io_error(format!("Cannot open {}: {}", local_path.display(), e))
        })?;

        let mut ds = self.open_data_channel().await?;
        let codec = self.codec()?;
        let resp = codec.execute(&format!("STOR {}", target)).await?;
        if !resp.is_preliminary() && resp.code / 100 != 2 {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let mut buf = vec![0u8; UPLOAD_CHUNK];
        let mut sent = 0u64;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            ds.write_all(&buf[..n]).await?;
            sent += n as u64;
        }
        ds.finish().await?;

        // 226 Transfer complete
        if resp.is_preliminary() {
            let done = codec.read_response().await?;
            if done.code / 100 != 2 {
                return Err(FtpError::from_reply(done.code, &done.text()));
            }
        }

        self.info.bytes_uploaded += sent;
        self.info.files_stored += 1;
        debug!("Stored {} ({} bytes)", target, sent);
        Ok(sent)
    }

    async fn open_data_channel(&mut self) -> FtpResult<DataStream> {
        let mode = if self.config.prefer_epsv && self.features.epsv {
            PassiveMode::Epsv
        } else {
            PassiveMode::Pasv
        };
        let host = self.config.host.clone();
        let timeout = Duration::from_secs(self.config.data_timeout_sec);
        let tls = self.tls.clone();
        let codec = self.codec()?;
        transfer::open_data_channel(codec, mode, &host, tls.as_ref(), timeout).await
    }

    // ─── QUIT ────────────────────────────────────────────────────

    /// Gracefully close the session. Safe to call more than once.
    pub async fn quit(&mut self) -> FtpResult<()> {
        if let Some(mut codec) = self.codec.take() {
            let _ = codec.execute("QUIT").await;
            info!(
                "FTP session {} closed: {}",
                self.info.id,
                self.info.summary(Utc::now())
            );
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.codec.is_some()
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Join two remote path fragments with exactly one `/` between them.
fn join_remote(base: &str, rest: &str) -> String {
    let rest = rest.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{}{}", base, rest)
    } else {
        format!("{}/{}", base, rest)
    }
}

/// Parse `257 "/some/path" ...` into the path string.
fn parse_quoted_path(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let end = text[start + 1..].find('"')?;
    Some(text[start + 1..start + 1 + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_path() {
        assert_eq!(
            parse_quoted_path("257 \"/home/deploy\" is current directory").as_deref(),
            Some("/home/deploy")
        );
        assert_eq!(parse_quoted_path("257 no quotes"), None);
    }

    #[test]
    fn remote_join() {
        assert_eq!(join_remote("/", "site"), "/site");
        assert_eq!(join_remote("/home/u", "site/a"), "/home/u/site/a");
        assert_eq!(join_remote("/home/u/", "/site"), "/home/u/site");
    }
}
