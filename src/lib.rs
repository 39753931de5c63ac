//! # Modscan - Concurrent Modbus TCP Query Engine
//!
//! A Modbus TCP client library and scanner for probing and operating
//! industrial devices (PLCs, SCADA endpoints). It encodes request frames for
//! the standard function codes, decodes responses including the Modbus
//! exception mechanism, and runs many request/response exchanges in parallel
//! across a set of slave ids and register ranges with per-job failure
//! isolation.
//!
//! ## Supported Function Codes
//!
//! | Code | Function |
//! |------|----------|
//! | 0x01 | Read Coils |
//! | 0x02 | Read Discrete Inputs |
//! | 0x03 | Read Holding Registers |
//! | 0x04 | Read Input Registers |
//! | 0x05 | Write Single Coil |
//! | 0x06 | Write Single Register |
//! | 0x0F | Write Multiple Coils |
//! | 0x10 | Write Multiple Registers |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modscan::{
//!     expand, read_operations, ModbusFunction, Orchestrator, RegisterRange, ScanConfig,
//!     SlaveTarget, TcpConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> modscan::ModbusResult<()> {
//!     // Sweep holding registers 0..10 on units 1-3 of one gateway.
//!     let targets: Vec<_> = (1..=3).map(|id| SlaveTarget::new("10.0.0.50", id)).collect();
//!     let operations = read_operations(
//!         ModbusFunction::ReadHoldingRegisters,
//!         RegisterRange::new(0, 10)?,
//!     )?;
//!
//!     let orchestrator = Orchestrator::new(TcpConnector::new(), ScanConfig::new());
//!     let results = orchestrator.run(expand(&targets, &operations)?).await?;
//!
//!     for result in results {
//!         println!("{}: {:?}", result.job.target, result.outcome);
//!     }
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants based on the official specification
pub mod constants;

/// Protocol definitions: function codes, operations, requests and responses
pub mod protocol;

/// Pure MBAP + PDU frame codec
pub mod frame;

/// Transaction identifier allocation
pub mod txid;

/// Network transport layer for Modbus TCP
pub mod transport;

/// Logical register address spaces (4xxxx holding, 3xxxx input, ...)
pub mod addressing;

/// Query job model and the concurrent orchestrator
pub mod scan;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use modscan::tokio) ===
pub use tokio;

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Protocol types ===
pub use protocol::{
    ExceptionCode, ModbusFunction, ModbusRequest, ModbusResponse, Operation, ResponsePayload,
    UnitId,
};

// === Codec ===
pub use frame::{decode_response, encode_request};

// === Transaction ids ===
pub use txid::TransactionAllocator;

// === Transport ===
pub use transport::{ModbusTransport, TcpConnector, TcpTransport, TransportConnector};

// === Addressing ===
pub use addressing::RegisterSpace;

// === Scanning ===
pub use scan::{
    expand, read_operations, Orchestrator, QueryJob, QueryOutcome, QueryResult, RegisterRange,
    ScanConfig, SlaveTarget,
};

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_MS, DEFAULT_WORKERS, MAX_READ_BITS, MAX_READ_REGISTERS,
    MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
