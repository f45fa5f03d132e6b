//! Shared types for the FTP crate.

use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// ─── Connection / Session ────────────────────────────────────────────

/// Security mode for the control channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FtpSecurityMode {
    /// Plain-text FTP.
    #[default]
    None,
    /// Explicit FTPS: starts plain then upgrades via AUTH TLS.
    Explicit,
}

impl FtpSecurityMode {
    pub fn is_secure(self) -> bool {
        self == Self::Explicit
    }
}

/// Configuration for a single FTP connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub security: FtpSecurityMode,
    /// Use EPSV when the server advertises it, PASV otherwise.
    #[serde(default = "default_true")]
    pub prefer_epsv: bool,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Data-channel timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    /// Accept self-signed / untrusted certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_port() -> u16 {
    21
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_data_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: "anonymous".into(),
            password: "anonymous@".into(),
            security: FtpSecurityMode::None,
            prefer_epsv: true,
            connect_timeout_sec: default_connect_timeout(),
            data_timeout_sec: default_data_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl FtpConnectionConfig {
    /// Build a config from a service endpoint URL such as
    /// `ftps://ftp.example.com:2121/`.
    ///
    /// The `ftps` scheme selects explicit FTPS; anything else is plain FTP.
    pub fn from_endpoint_url(
        endpoint: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> FtpResult<Self> {
        let url = Url::parse(endpoint.trim())
            .map_err(|e| FtpError::invalid_config(format!("Invalid endpoint URL '{}': {}", endpoint, e)))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FtpError::invalid_config(format!("Endpoint URL '{}' has no host", endpoint)))?
            .to_string();
        let security = if url.scheme() == "ftps" {
            FtpSecurityMode::Explicit
        } else {
            FtpSecurityMode::None
        };
        Ok(Self {
            host,
            port: url.port().unwrap_or_else(default_port),
            username: username.into(),
            password: password.into(),
            security,
            ..Self::default()
        })
    }

    /// `host:port` form used for the TCP connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bookkeeping for a connected FTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpSessionInfo {
    pub id: String,
    pub host: String,
    /// Working directory right after login; relative remote paths resolve here.
    pub home_directory: String,
    pub connected_at: DateTime<Utc>,
    pub bytes_uploaded: u64,
    pub files_stored: u64,
}

impl FtpSessionInfo {
    /// One-line summary logged when the session ends.
    pub fn summary(&self, now: DateTime<Utc>) -> String {
        let elapsed = (now - self.connected_at).num_milliseconds().max(0) as f64 / 1000.0;
        format!(
            "{} files, {} bytes in {:.1}s",
            self.files_stored, self.bytes_uploaded, elapsed
        )
    }
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP reply (may be multi-line).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full reply text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 1xx–3xx.
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    /// 1xx.
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 3xx.
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

// ─── Server Capabilities ─────────────────────────────────────────────

/// The subset of the FEAT reply the uploader cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFeatures {
    pub epsv: bool,
    pub utf8: bool,
    pub raw_features: Vec<String>,
}

impl ServerFeatures {
    /// Parse a `211-Features:` multi-line reply.
    pub fn from_feat_reply(resp: &FtpResponse) -> Self {
        let raw: Vec<String> = resp
            .lines
            .iter()
            .skip(1)
            .filter(|l| !l.starts_with("211"))
            .map(|l| l.trim().to_uppercase())
            .collect();
        let has = |feat: &str| raw.iter().any(|l| l.starts_with(feat));
        Self {
            epsv: has("EPSV"),
            utf8: has("UTF8"),
            raw_features: raw,
        }
    }
}
