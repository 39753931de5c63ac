//! Network transport layer for Modbus TCP
//!
//! The transport owns the socket lifecycle for exactly one request/response
//! exchange at a time: the orchestrator opens one connection per job so that
//! concurrent jobs never interleave frames on a shared socket.
//!
//! Two seams are exposed as traits: [`ModbusTransport`] is the byte-level
//! send/receive contract, and [`TransportConnector`] is the per-job
//! connection factory the orchestrator calls. Tests substitute both with
//! scripted fakes; production code uses [`TcpTransport`]/[`TcpConnector`].

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::constants::{DEFAULT_TIMEOUT_MS, MAX_MBAP_LENGTH, MBAP_HEADER_LEN};
use crate::error::{ModbusError, ModbusResult};
use crate::scan::SlaveTarget;

/// Byte-level transport contract for one Modbus TCP exchange.
pub trait ModbusTransport: Send {
    /// Write one complete request frame.
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Read one complete response frame (MBAP header plus declared body).
    fn receive(&mut self) -> impl Future<Output = ModbusResult<Vec<u8>>> + Send;

    /// Close the connection. Errors during shutdown are not interesting.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;
}

/// Factory producing a fresh transport connection for a job's target.
pub trait TransportConnector: Send + Sync {
    type Transport: ModbusTransport;

    fn connect(
        &self,
        target: &SlaveTarget,
    ) -> impl Future<Output = ModbusResult<Self::Transport>> + Send;
}

/// Modbus TCP transport over a tokio [`TcpStream`].
pub struct TcpTransport {
    stream: TcpStream,
    io_timeout: Duration,
}

impl TcpTransport {
    /// Connect to `host:port`, bounded by `connect_timeout`.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> ModbusResult<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ModbusError::timeout("connect", connect_timeout.as_millis() as u64))?
            .map_err(|e| ModbusError::connect(format!("{host}:{port}: {e}")))?;

        debug!("connected to {}:{}", host, port);
        Ok(Self { stream, io_timeout })
    }
}

impl ModbusTransport for TcpTransport {
    async fn send(&mut self, frame: &[u8]) -> ModbusResult<()> {
        timeout(self.io_timeout, self.stream.write_all(frame))
            .await
            .map_err(|_| ModbusError::timeout("send", self.io_timeout.as_millis() as u64))?
            .map_err(|e| ModbusError::send(e.to_string()))
    }

    async fn receive(&mut self) -> ModbusResult<Vec<u8>> {
        let io_timeout = self.io_timeout;
        let read = async {
            let mut frame = vec![0u8; MBAP_HEADER_LEN];
            self.stream
                .read_exact(&mut frame)
                .await
                .map_err(|e| ModbusError::receive(e.to_string()))?;

            // MBAP length counts unit id + PDU; the unit id byte is already in.
            let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
            if length == 0 || length > MAX_MBAP_LENGTH {
                return Err(ModbusError::receive(format!(
                    "invalid MBAP length field {length}"
                )));
            }

            let body_start = frame.len();
            frame.resize(body_start + length - 1, 0);
            self.stream
                .read_exact(&mut frame[body_start..])
                .await
                .map_err(|e| ModbusError::receive(e.to_string()))?;
            Ok(frame)
        };

        timeout(io_timeout, read)
            .await
            .map_err(|_| ModbusError::timeout("receive", io_timeout.as_millis() as u64))?
    }

    async fn close(&mut self) -> ModbusResult<()> {
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

/// Connector producing one [`TcpTransport`] per job.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl TcpConnector {
    /// Connector with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector with one timeout applied to connect and I/O alike.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: timeout,
            io_timeout: timeout,
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::with_timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl TransportConnector for TcpConnector {
    type Transport = TcpTransport;

    async fn connect(&self, target: &SlaveTarget) -> ModbusResult<TcpTransport> {
        TcpTransport::connect(
            &target.host,
            target.port,
            self.connect_timeout,
            self.io_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused_reports_connect_error() {
        // Bind-then-drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpTransport::connect(
            "127.0.0.1",
            port,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(ModbusError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_send_and_receive_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Canned FC03 response: txid 0x0001, 1 register with value 7.
        let response = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x07,
        ];
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(&response).await.unwrap();
        });

        let mut transport = TcpTransport::connect(
            "127.0.0.1",
            port,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let request = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01,
        ];
        transport.send(&request).await.unwrap();
        let frame = transport.receive().await.unwrap();
        assert_eq!(frame, response);

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            // Accept and hold the connection open without answering.
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::connect(
            "127.0.0.1",
            port,
            Duration::from_secs(1),
            Duration::from_millis(50),
        )
        .await
        .unwrap();

        let result = transport.receive().await;
        assert!(matches!(result, Err(ModbusError::Timeout { .. })));
    }
}
