//! Data-channel management for uploads.
//!
//! Passive modes only:
//! - **PASV**: `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
//! - **EPSV**: `229 Entering Extended Passive Mode (|||port|)`, always
//!   connecting back to the control host
//!
//! Under FTPS (PROT P) the socket is TLS-wrapped before use.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::tls;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

/// Plain or TLS-wrapped data socket.
pub enum DataStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl DataStream {
    pub async fn write_all(&mut self, buf: &[u8]) -> FtpResult<()> {
        match self {
            Self::Plain(s) => s.write_all(buf).await?,
            Self::Tls(s) => s.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush and close our side so the server sees end-of-file.
    pub async fn finish(self) -> FtpResult<()> {
        match self {
            Self::Plain(mut s) => {
                s.flush().await?;
                s.shutdown().await?;
            }
            Self::Tls(mut s) => {
                s.flush().await?;
                s.shutdown().await?;
            }
        }
        Ok(())
    }
}

/// How the data connection is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassiveMode {
    Pasv,
    Epsv,
}

/// Request a passive data port and connect to it.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: PassiveMode,
    host: &str,
    tls: Option<&TlsConnector>,
    data_timeout: Duration,
) -> FtpResult<DataStream> {
    let addr = match mode {
        PassiveMode::Pasv => {
            let resp = codec.expect_ok("PASV").await?;
            parse_pasv_response(&resp.text())?.to_string()
        }
        PassiveMode::Epsv => {
            let resp = codec.expect_ok("EPSV").await?;
            let port = parse_epsv_response(&resp.text())?;
            format_host_port(host, port)
        }
    };

    let tcp = timeout(data_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel(format!("Data connect to {} timed out", addr)))?
        .map_err(|e| FtpError::data_channel(format!("Data connect to {}: {}", addr, e)))?;

    match tls {
        Some(connector) => {
            let stream = tls::handshake(connector, host, tcp, "Data channel").await?;
            Ok(DataStream::Tls(Box::new(stream)))
        }
        None => Ok(DataStream::Plain(tcp)),
    }
}

fn format_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 reply.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    static PASV: OnceLock<Regex> = OnceLock::new();
    let re = PASV.get_or_init(|| {
        Regex::new(r"(\d+),\s*(\d+),\s*(\d+),\s*(\d+),\s*(\d+),\s*(\d+)").expect("static regex")
    });
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = u16::from(nums[4]) * 256 + u16::from(nums[5]);
    Ok(SocketAddr::new(ip, port))
}

fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    static EPSV: OnceLock<Regex> = OnceLock::new();
    let re = EPSV.get_or_init(|| Regex::new(r"\|\|\|(\d+)\|").expect("static regex"));
    let caps = re
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}
