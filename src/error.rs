//! Core error types and result handling
//!
//! The taxonomy separates three failure layers:
//! - request construction (`InvalidRange`, `ValueCountMismatch`) — caller
//!   errors, surfaced before anything is sent;
//! - protocol decode (`TruncatedFrame`, `TransactionMismatch`, ...) — a
//!   malformed or mismatched response from an otherwise reachable device;
//! - transport (`Connect`, `Send`, `Receive`, `Timeout`) — the socket layer.
//!
//! Device-reported Modbus exceptions are NOT errors: a well-formed exception
//! response is decoded into [`crate::protocol::ResponsePayload::Exception`]
//! and reported as data.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors produced by the codec, transport, and orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Address/quantity outside the per-function-code bounds.
    #[error("invalid range: {message}")]
    InvalidRange { message: String },

    /// Write payload length does not match the addressed quantity.
    #[error("value count mismatch: expected {expected} values, got {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },

    /// Response frame shorter than its declared or minimum size.
    #[error("truncated frame: need {needed} bytes, got {got}")]
    TruncatedFrame { needed: usize, got: usize },

    /// Response transaction id does not match the request.
    #[error("transaction id mismatch: sent {sent:#06x}, received {received:#06x}")]
    TransactionMismatch { sent: u16, received: u16 },

    /// Response function code is neither the request's nor its exception form.
    #[error("function code mismatch: sent {sent:#04x}, received {received:#04x}")]
    FunctionCodeMismatch { sent: u8, received: u8 },

    /// Write response echo disagrees with the request.
    #[error("write echo mismatch: {message}")]
    EchoMismatch { message: String },

    /// Read response carries a different element count than requested.
    #[error("quantity mismatch: requested {requested}, response carries {received}")]
    QuantityMismatch { requested: u16, received: u16 },

    /// TCP connection could not be established.
    #[error("connect failed: {message}")]
    Connect { message: String },

    /// Request frame could not be written to the socket.
    #[error("send failed: {message}")]
    Send { message: String },

    /// Response bytes could not be read from the socket.
    #[error("receive failed: {message}")]
    Receive { message: String },

    /// A transport operation exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Malformed top-level configuration. The only fatal error class.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    /// Create an invalid range error.
    pub fn invalid_range(message: impl Into<String>) -> Self {
        ModbusError::InvalidRange {
            message: message.into(),
        }
    }

    /// Create a write echo mismatch error.
    pub fn echo_mismatch(message: impl Into<String>) -> Self {
        ModbusError::EchoMismatch {
            message: message.into(),
        }
    }

    /// Create a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        ModbusError::Connect {
            message: message.into(),
        }
    }

    /// Create a send error.
    pub fn send(message: impl Into<String>) -> Self {
        ModbusError::Send {
            message: message.into(),
        }
    }

    /// Create a receive error.
    pub fn receive(message: impl Into<String>) -> Self {
        ModbusError::Receive {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: &'static str, timeout_ms: u64) -> Self {
        ModbusError::Timeout {
            operation,
            timeout_ms,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        ModbusError::Configuration {
            message: message.into(),
        }
    }

    /// True for socket-layer failures (connect/send/receive/timeout).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ModbusError::Connect { .. }
                | ModbusError::Send { .. }
                | ModbusError::Receive { .. }
                | ModbusError::Timeout { .. }
        )
    }

    /// True if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ModbusError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ModbusError::TransactionMismatch {
            sent: 0x0001,
            received: 0x0102,
        };
        assert_eq!(
            err.to_string(),
            "transaction id mismatch: sent 0x0001, received 0x0102"
        );

        let err = ModbusError::timeout("receive", 2000);
        assert_eq!(err.to_string(), "receive timed out after 2000ms");
    }

    #[test]
    fn test_layer_predicates() {
        assert!(ModbusError::connect("refused").is_transport());
        assert!(ModbusError::timeout("connect", 500).is_transport());
        assert!(ModbusError::timeout("connect", 500).is_timeout());
        assert!(!ModbusError::invalid_range("too many").is_transport());
        assert!(!ModbusError::receive("reset").is_timeout());
    }
}
