//! # ftpup-ftp: FTP/FTPS upload client
//!
//! Implements the part of the FTP protocol (RFC 959) a deployment
//! upload needs, plus:
//! - **RFC 4217**: explicit FTPS via AUTH TLS, PBSZ/PROT
//! - **RFC 2428**: EPSV data channels
//! - **RFC 2389**: FEAT negotiation
//!
//! Architecture:
//! - `types`: config, session info, reply and feature types
//! - `error`: FTP-specific error type
//! - `protocol`: command/reply codec on the control channel
//! - `connection`: TCP connect + banner
//! - `tls`: rustls connector shared by control and data channels
//! - `transfer`: passive data channels (PASV/EPSV)
//! - `client`: login, recursive MKD, STOR, QUIT

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod tls;
pub mod transfer;
pub mod client;

pub use client::FtpClient;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use types::*;
