//! **ftpup-ftp**: the FTP/FTPS client used by the uploader.

pub mod ftp;

pub use ftp::*;
