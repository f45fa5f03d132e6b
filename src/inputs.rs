//! Task inputs as provided by the pipeline agent.
//!
//! The agent exposes task inputs as `INPUT_<NAME>` environment variables
//! and service endpoints as `ENDPOINT_URL_<id>`, `ENDPOINT_AUTH_<id>` and
//! `ENDPOINT_DATA_<id>_<KEY>`.

use ftpup_core::upload::{UploadError, UploadRequest, UploadResult};
use ftpup_ftp::FtpConnectionConfig;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// `ENDPOINT_AUTH_<id>` payload.
#[derive(Debug, Default, Deserialize)]
pub struct EndpointAuth {
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub scheme: Option<String>,
}

/// Everything the task reads from its environment.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub server_endpoint: String,
    pub endpoint_url: String,
    pub username: String,
    pub password: String,
    pub accept_untrusted_certs: bool,
    pub root_folder: String,
    pub relative_root_folder: Option<String>,
    pub file_patterns: Vec<String>,
    pub remote_path: String,
    pub base_directory: PathBuf,
}

fn input_var(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

impl PipelineInputs {
    pub fn from_env() -> UploadResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read inputs through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> UploadResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(&input_var(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            optional(name)
                .ok_or_else(|| UploadError::configuration(format!("Input required: {}", name)))
        };

        let server_endpoint = required("serverEndpoint")?;
        let endpoint_url = lookup(&format!("ENDPOINT_URL_{}", server_endpoint))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                UploadError::configuration(format!(
                    "Endpoint not present: {}",
                    server_endpoint
                ))
            })?;

        let auth = match lookup(&format!("ENDPOINT_AUTH_{}", server_endpoint)) {
            Some(raw) => serde_json::from_str::<EndpointAuth>(&raw).map_err(|e| {
                UploadError::configuration(format!(
                    "Invalid authorization for endpoint {}: {}",
                    server_endpoint, e
                ))
            })?,
            None => EndpointAuth::default(),
        };
        debug!(
            "endpoint {} auth scheme: {}",
            server_endpoint,
            auth.scheme.as_deref().unwrap_or("none")
        );

        let accept_untrusted_certs = lookup(&format!(
            "ENDPOINT_DATA_{}_ACCEPTUNTRUSTEDCERTS",
            server_endpoint
        ))
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);

        let root_folder = required("rootFolder")?;
        let relative_root_folder = optional("relativeRootFolder");
        let file_patterns: Vec<String> = required("filePatterns")?
            .lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        let remote_path = required("remotePath")?;

        let base_directory = match lookup("BUILD_SOURCESDIRECTORY").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().map_err(|e| {
                UploadError::configuration(format!("Cannot determine working directory: {}", e))
            })?,
        };

        Ok(Self {
            server_endpoint,
            endpoint_url,
            username: auth.parameters.get("username").cloned().unwrap_or_default(),
            password: auth.parameters.get("password").cloned().unwrap_or_default(),
            accept_untrusted_certs,
            root_folder,
            relative_root_folder,
            file_patterns,
            remote_path,
            base_directory,
        })
    }

    /// Build the upload request; an empty username logs in anonymously.
    pub fn into_request(self) -> UploadResult<UploadRequest> {
        let defaults = FtpConnectionConfig::default();
        let (username, password) = if self.username.is_empty() {
            (defaults.username, defaults.password)
        } else {
            (self.username, self.password)
        };

        let mut connection =
            FtpConnectionConfig::from_endpoint_url(&self.endpoint_url, username, password)
                .map_err(|e| UploadError::configuration(e.message))?;
        connection.accept_invalid_certs = self.accept_untrusted_certs;
        debug!("ftp host: {}:{}", connection.host, connection.port);

        Ok(UploadRequest {
            connection,
            root_folder: self.root_folder,
            relative_root_folder: self.relative_root_folder,
            file_patterns: self.file_patterns,
            remote_path: self.remote_path,
            base_directory: self.base_directory,
        })
    }
}
