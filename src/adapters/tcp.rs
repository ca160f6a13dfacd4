//! TCP socket transport for SCPI instrument endpoints.
//!
//! Wraps a `tokio` TCP stream and provides line-terminated write/query
//! plus IEEE 488.2 definite-length block reads. Instruments expose this
//! endpoint as a raw socket (typically port 5025) once their network
//! server is enabled.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::adapters::{ScpiTransport, TransportError};
use crate::config::ConnectionSettings;

/// TCP transport for a socket-based SCPI instrument.
///
/// A value of this type is always connected; dropping it closes the
/// socket. The read timeout bounds every query, including the
/// intentionally long `*OPC?` block whose duration equals the sweep time.
pub struct TcpTransport {
    address: String,
    stream: BufReader<TcpStream>,
    timeout: Duration,
    write_terminator: String,
    read_terminator: u8,
}

impl TcpTransport {
    /// Open a socket to the instrument endpoint described by `settings`.
    ///
    /// Failures here are connection errors; the caller decides whether to
    /// abort, retry, or fall back.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, TransportError> {
        let address = settings.address();

        let stream = tokio::time::timeout(settings.timeout(), TcpStream::connect(&address))
            .await
            .map_err(|_| TransportError::ConnectionFailed {
                address: address.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| TransportError::ConnectionFailed {
                address: address.clone(),
                source,
            })?;

        // Commands are single short lines; coalescing them adds latency.
        stream
            .set_nodelay(true)
            .map_err(|source| TransportError::ConnectionFailed {
                address: address.clone(),
                source,
            })?;

        info!(address = %address, "connected to instrument endpoint");

        Ok(Self {
            address,
            stream: BufReader::new(stream),
            timeout: settings.timeout(),
            write_terminator: settings.write_terminator.clone(),
            read_terminator: settings.read_terminator_byte(),
        })
    }

    /// Remote endpoint this transport is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn read_line(&mut self, command: &str) -> Result<String, TransportError> {
        let mut line = Vec::new();
        let n = tokio::time::timeout(
            self.timeout,
            self.stream.read_until(self.read_terminator, &mut line),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            command: command.to_string(),
            timeout: self.timeout,
        })??;

        if n == 0 {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by instrument",
            )));
        }

        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    async fn read_block(&mut self, command: &str) -> Result<Vec<u8>, TransportError> {
        let timeout = self.timeout;
        let read = async {
            let mut marker = [0u8; 1];
            self.stream.read_exact(&mut marker).await?;
            if marker[0] != b'#' {
                return Err(TransportError::BadBlockHeader(format!(
                    "expected '#', got byte {:#04x}",
                    marker[0]
                )));
            }

            let mut digit = [0u8; 1];
            self.stream.read_exact(&mut digit).await?;
            let ndigits = (digit[0] as char).to_digit(10).ok_or_else(|| {
                TransportError::BadBlockHeader(format!(
                    "length-of-length byte '{}' is not a digit",
                    digit[0] as char
                ))
            })? as usize;
            if ndigits == 0 {
                return Err(TransportError::BadBlockHeader(
                    "indefinite-length blocks are not supported".to_string(),
                ));
            }

            let mut length_field = vec![0u8; ndigits];
            self.stream.read_exact(&mut length_field).await?;
            let length: usize = std::str::from_utf8(&length_field)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    TransportError::BadBlockHeader(format!(
                        "non-numeric length field {:?}",
                        length_field
                    ))
                })?;

            let mut payload = vec![0u8; length];
            self.stream.read_exact(&mut payload).await?;

            // Consume the line terminator that follows the block.
            let mut tail = Vec::new();
            self.stream
                .read_until(self.read_terminator, &mut tail)
                .await?;

            Ok(payload)
        };

        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| TransportError::Timeout {
                command: command.to_string(),
                timeout,
            })?
    }
}

#[async_trait]
impl ScpiTransport for TcpTransport {
    async fn write(&mut self, command: &str) -> Result<(), TransportError> {
        debug!(command, "SCPI write");
        self.stream.write_all(command.as_bytes()).await?;
        self.stream
            .write_all(self.write_terminator.as_bytes())
            .await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn query(&mut self, command: &str) -> Result<String, TransportError> {
        self.write(command).await?;
        let response = self.read_line(command).await?;
        debug!(command, response = %response, "SCPI query");
        Ok(response)
    }

    async fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, TransportError> {
        self.write(command).await?;
        let payload = self.read_block(command).await?;
        debug!(command, bytes = payload.len(), "SCPI binary query");
        Ok(payload)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn loopback_settings(port: u16) -> ConnectionSettings {
        ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 1_000,
            ..ConnectionSettings::default()
        }
    }

    async fn spawn_instrument(listener: TcpListener) {
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.split();
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match line.as_str() {
                    "SENSe:SWEep:POINts?" => writer.write_all(b"201\n").await.unwrap(),
                    "CALCulate:DATA:FDATa?" => {
                        let mut block = Vec::from(*b"#216");
                        block.extend_from_slice(&1.0f64.to_be_bytes());
                        block.extend_from_slice(&(-1.0f64).to_be_bytes());
                        block.push(b'\n');
                        writer.write_all(&block).await.unwrap();
                    }
                    // Set commands produce no response.
                    _ => {}
                }
            }
        });
    }

    #[tokio::test]
    async fn test_query_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        spawn_instrument(listener).await;

        let mut transport = TcpTransport::connect(&loopback_settings(port)).await.unwrap();
        transport.write("SENSe:SWEep:POINts 201").await.unwrap();
        let response = transport.query("SENSe:SWEep:POINts?").await.unwrap();
        assert_eq!(response, "201");
    }

    #[tokio::test]
    async fn test_binary_block_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        spawn_instrument(listener).await;

        let mut transport = TcpTransport::connect(&loopback_settings(port)).await.unwrap();
        let payload = transport.query_binary("CALCulate:DATA:FDATa?").await.unwrap();
        assert_eq!(payload.len(), 16);
        assert_eq!(payload[..8], 1.0f64.to_be_bytes());
        assert_eq!(payload[8..], (-1.0f64).to_be_bytes());
    }

    #[tokio::test]
    async fn test_query_timeout_when_instrument_is_silent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept the connection but never answer.
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut settings = loopback_settings(port);
        settings.timeout_ms = 50;
        let mut transport = TcpTransport::connect(&settings).await.unwrap();
        let err = transport.query("*OPC?").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to find a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpTransport::connect(&loopback_settings(port))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }
}
