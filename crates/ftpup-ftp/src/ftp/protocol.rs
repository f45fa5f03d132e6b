//! Control-channel codec (RFC 959 §4).
//!
//! Sends CRLF-terminated commands and reads single- and multi-line
//! replies over either a plain or a TLS-wrapped socket.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Longest reply line accepted from the server, terminator included.
pub const MAX_REPLY_LINE: u64 = 8 * 1024;

/// Most lines accepted in one multi-line reply.
pub const MAX_REPLY_LINES: usize = 4096;

/// Plain or TLS control socket, buffered for line reads.
pub enum ControlStream {
    Plain(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

/// The FTP command/reply codec.
pub struct FtpCodec {
    stream: ControlStream,
}

impl FtpCodec {
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            stream: ControlStream::Plain(BufReader::new(stream)),
        }
    }

    pub fn from_tls(stream: TlsStream<TcpStream>) -> Self {
        Self {
            stream: ControlStream::Tls(Box::new(BufReader::new(stream))),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.stream, ControlStream::Tls(_))
    }

    /// Hand back the raw socket for an AUTH TLS upgrade.
    pub fn into_plain_tcp(self) -> FtpResult<TcpStream> {
        match self.stream {
            ControlStream::Plain(r) => Ok(r.into_inner()),
            ControlStream::Tls(_) => Err(FtpError::protocol_error(
                "Cannot upgrade: connection is already TLS",
            )),
        }
    }

    /// Send a raw FTP command (CRLF is appended here).
    ///
    /// A command containing CR or LF is refused: it would reach the server
    /// as more than one command.
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        if cmd.contains(['\r', '\n']) {
            let verb = cmd.split_whitespace().next().unwrap_or("");
            return Err(FtpError::protocol_error(format!(
                "Refusing to send {} command containing a line break",
                verb
            )));
        }
        let line = format!("{}\r\n", cmd);
        match &mut self.stream {
            ControlStream::Plain(r) => {
                r.get_mut().write_all(line.as_bytes()).await?;
                r.get_mut().flush().await?;
            }
            ControlStream::Tls(r) => {
                r.get_mut().write_all(line.as_bytes()).await?;
                r.get_mut().flush().await?;
            }
        }
        if cmd.starts_with("PASS ") {
            log::trace!(">>> PASS ****");
        } else {
            log::trace!(">>> {}", cmd);
        }
        Ok(())
    }

    async fn read_line_raw(&mut self) -> FtpResult<String> {
        let mut buf = Vec::new();
        let n = match &mut self.stream {
            ControlStream::Plain(r) => read_capped_line(r, &mut buf).await?,
            ControlStream::Tls(r) => read_capped_line(&mut **r, &mut buf).await?,
        };
        if n == 0 {
            return Err(FtpError::disconnected("Server closed connection"));
        }
        if !buf.ends_with(b"\n") && n as u64 >= MAX_REPLY_LINE {
            return Err(FtpError::protocol_error(format!(
                "Reply line exceeds {} bytes",
                MAX_REPLY_LINE
            )));
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read a complete reply.
    ///
    /// Multi-line replies start with `NNN-` and end with a line that
    /// starts with `NNN `:
    /// ```text
    /// 211-Features:
    ///  EPSV
    /// 211 End
    /// ```
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let first = self.read_line_raw().await?;
        let code = parse_code(&first)?;
        let mut lines = vec![first.clone()];

        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{} ", code);
            loop {
                if lines.len() >= MAX_REPLY_LINES {
                    return Err(FtpError::protocol_error(format!(
                        "Reply {} exceeds {} lines",
                        code, MAX_REPLY_LINES
                    )));
                }
                let next = self.read_line_raw().await?;
                let done = next.starts_with(&terminator) || next == code.to_string();
                lines.push(next);
                if done {
                    break;
                }
            }
        }

        let resp = FtpResponse { code, lines };
        log::trace!("<<< {}", resp.lines.last().map(String::as_str).unwrap_or(""));
        Ok(resp)
    }

    /// Send a command and return the reply.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Send a command and require a 2xx reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if resp.code / 100 != 2 {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }
}

async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    AsyncReadExt::take(reader, MAX_REPLY_LINE)
        .read_until(b'\n', buf)
        .await
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (100..600).contains(c))
        .ok_or_else(|| FtpError::protocol_error(format!("Invalid reply code in: '{}'", line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn codec_with_server(script: Vec<u8>) -> (FtpCodec, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&script).await.unwrap();
            sock.shutdown().await.unwrap();
            let mut received = Vec::new();
            sock.read_to_end(&mut received).await.unwrap();
            received
        });
        let tcp = TcpStream::connect(addr).await.unwrap();
        (FtpCodec::from_tcp(tcp), server)
    }

    #[test]
    fn reply_codes() {
        assert_eq!(parse_code("257 \"/site\" created").unwrap(), 257);
        assert!(parse_code("ab").is_err());
        assert!(parse_code("xyz hello").is_err());
        assert!(parse_code("999 nope").is_err());
    }

    #[tokio::test]
    async fn reads_multi_line_reply() {
        let (mut codec, _server) =
            codec_with_server(b"220-Welcome\r\n220-second line\r\n220 ready\r\n".to_vec()).await;
        let resp = codec.read_response().await.unwrap();
        assert_eq!(resp.code, 220);
        assert_eq!(resp.lines.len(), 3);
        assert_eq!(resp.text(), "220-Welcome\n220-second line\n220 ready");
    }

    #[tokio::test]
    async fn expect_ok_rejects_error_reply() {
        let (mut codec, server) = codec_with_server(b"550 No such directory\r\n".to_vec()).await;
        let err = codec.expect_ok("CWD /missing").await.unwrap_err();
        assert_eq!(err.code, Some(550));
        drop(codec);
        let sent = server.await.unwrap();
        assert_eq!(sent, b"CWD /missing\r\n");
    }

    #[tokio::test]
    async fn commands_with_line_breaks_are_never_sent() {
        let (mut codec, server) = codec_with_server(b"226 ok\r\n".to_vec()).await;
        let err = codec
            .execute("STOR /site/dist/x\r\nDELE index.html")
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ftp::error::FtpErrorKind::ProtocolError);
        assert!(err.message.contains("STOR"));
        assert!(codec.execute("MKD /site\n").await.is_err());
        drop(codec);
        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latin1_reply_is_decoded_lossily() {
        let (mut codec, _server) =
            codec_with_server(b"257 \"/caf\xe9\" created\r\n".to_vec()).await;
        let resp = codec.read_response().await.unwrap();
        assert_eq!(resp.code, 257);
        assert_eq!(resp.text(), "257 \"/caf\u{FFFD}\" created");
    }

    #[tokio::test]
    async fn endless_reply_line_is_rejected() {
        let mut script = b"220 ".to_vec();
        script.extend(std::iter::repeat(b'a').take(MAX_REPLY_LINE as usize * 2));
        let (mut codec, _server) = codec_with_server(script).await;
        let err = codec.read_response().await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::error::FtpErrorKind::ProtocolError);
        assert!(err.message.contains("exceeds"));
    }

    #[tokio::test]
    async fn eof_is_disconnect() {
        let (mut codec, _server) = codec_with_server(Vec::new()).await;
        let err = codec.read_response().await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::error::FtpErrorKind::Disconnected);
    }
}
