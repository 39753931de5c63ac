//! Modbus protocol definitions and message types
//!
//! The request side is modeled as a tagged [`Operation`] with one variant per
//! supported function code, so that the codec has exactly one encode and one
//! decode arm per code instead of inspecting payloads at runtime.

use std::fmt;

use crate::constants::{
    MAX_READ_BITS, MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave/unit identifier.
pub type UnitId = u8;

/// Supported Modbus function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = 0x01,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = 0x02,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 0x03,
    /// Read Input Registers (0x04)
    ReadInputRegisters = 0x04,
    /// Write Single Coil (0x05)
    WriteSingleCoil = 0x05,
    /// Write Single Register (0x06)
    WriteSingleRegister = 0x06,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = 0x0F,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = 0x10,
}

impl ModbusFunction {
    /// Convert from a raw function code.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(ModbusFunction::ReadCoils),
            0x02 => Some(ModbusFunction::ReadDiscreteInputs),
            0x03 => Some(ModbusFunction::ReadHoldingRegisters),
            0x04 => Some(ModbusFunction::ReadInputRegisters),
            0x05 => Some(ModbusFunction::WriteSingleCoil),
            0x06 => Some(ModbusFunction::WriteSingleRegister),
            0x0F => Some(ModbusFunction::WriteMultipleCoils),
            0x10 => Some(ModbusFunction::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Convert to the raw function code.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The exception form of this code (high bit set).
    pub fn exception_code(self) -> u8 {
        self.to_u8() | 0x80
    }

    /// True for FC01-FC04.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            ModbusFunction::ReadCoils
                | ModbusFunction::ReadDiscreteInputs
                | ModbusFunction::ReadHoldingRegisters
                | ModbusFunction::ReadInputRegisters
        )
    }

    /// True for FC05/06/0F/10.
    pub fn is_write(self) -> bool {
        !self.is_read()
    }

    /// True for bit-oriented codes (coils and discrete inputs).
    pub fn is_bit(self) -> bool {
        matches!(
            self,
            ModbusFunction::ReadCoils
                | ModbusFunction::ReadDiscreteInputs
                | ModbusFunction::WriteSingleCoil
                | ModbusFunction::WriteMultipleCoils
        )
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModbusFunction::ReadCoils => "Read Coils",
            ModbusFunction::ReadDiscreteInputs => "Read Discrete Inputs",
            ModbusFunction::ReadHoldingRegisters => "Read Holding Registers",
            ModbusFunction::ReadInputRegisters => "Read Input Registers",
            ModbusFunction::WriteSingleCoil => "Write Single Coil",
            ModbusFunction::WriteSingleRegister => "Write Single Register",
            ModbusFunction::WriteMultipleCoils => "Write Multiple Coils",
            ModbusFunction::WriteMultipleRegisters => "Write Multiple Registers",
        };
        write!(f, "{} (0x{:02X})", name, self.to_u8())
    }
}

/// Modbus exception codes reported by devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    /// Exception code outside the standard set, preserved as received.
    Other(u8),
}

impl ExceptionCode {
    /// Decode a raw exception code byte. Never fails; unknown codes are
    /// preserved in [`ExceptionCode::Other`].
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::ServerDeviceBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayTargetFailedToRespond,
            other => ExceptionCode::Other(other),
        }
    }

    /// The raw exception code byte.
    pub fn to_u8(self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetFailedToRespond => 0x0B,
            ExceptionCode::Other(code) => code,
        }
    }

    /// Short human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            ExceptionCode::IllegalFunction => "illegal function",
            ExceptionCode::IllegalDataAddress => "illegal data address",
            ExceptionCode::IllegalDataValue => "illegal data value",
            ExceptionCode::ServerDeviceFailure => "server device failure",
            ExceptionCode::Acknowledge => "acknowledge",
            ExceptionCode::ServerDeviceBusy => "server device busy",
            ExceptionCode::MemoryParityError => "memory parity error",
            ExceptionCode::GatewayPathUnavailable => "gateway path unavailable",
            ExceptionCode::GatewayTargetFailedToRespond => "gateway target failed to respond",
            ExceptionCode::Other(_) => "non-standard exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception 0x{:02X}: {}", self.to_u8(), self.description())
    }
}

/// One Modbus operation, tagged by function code.
///
/// For the multi-write variants the quantity is the value count, so a
/// payload/quantity disagreement is unrepresentable by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadCoils { address: u16, quantity: u16 },
    ReadDiscreteInputs { address: u16, quantity: u16 },
    ReadHoldingRegisters { address: u16, quantity: u16 },
    ReadInputRegisters { address: u16, quantity: u16 },
    WriteSingleCoil { address: u16, value: bool },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleCoils { address: u16, values: Vec<bool> },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Operation {
    /// Build a read operation for FC01-FC04.
    ///
    /// Returns `InvalidRange` for write function codes.
    pub fn read(function: ModbusFunction, address: u16, quantity: u16) -> ModbusResult<Self> {
        let op = match function {
            ModbusFunction::ReadCoils => Operation::ReadCoils { address, quantity },
            ModbusFunction::ReadDiscreteInputs => {
                Operation::ReadDiscreteInputs { address, quantity }
            }
            ModbusFunction::ReadHoldingRegisters => {
                Operation::ReadHoldingRegisters { address, quantity }
            }
            ModbusFunction::ReadInputRegisters => {
                Operation::ReadInputRegisters { address, quantity }
            }
            other => {
                return Err(ModbusError::invalid_range(format!(
                    "{other} is not a read function"
                )))
            }
        };
        Ok(op)
    }

    /// Build a coil write: FC05 for a single value, FC15 otherwise.
    pub fn write_coils(address: u16, values: Vec<bool>) -> Self {
        if values.len() == 1 {
            Operation::WriteSingleCoil {
                address,
                value: values[0],
            }
        } else {
            Operation::WriteMultipleCoils { address, values }
        }
    }

    /// Build a register write: FC06 for a single value, FC16 otherwise.
    pub fn write_registers(address: u16, values: Vec<u16>) -> Self {
        if values.len() == 1 {
            Operation::WriteSingleRegister {
                address,
                value: values[0],
            }
        } else {
            Operation::WriteMultipleRegisters { address, values }
        }
    }

    /// The function code of this operation.
    pub fn function(&self) -> ModbusFunction {
        match self {
            Operation::ReadCoils { .. } => ModbusFunction::ReadCoils,
            Operation::ReadDiscreteInputs { .. } => ModbusFunction::ReadDiscreteInputs,
            Operation::ReadHoldingRegisters { .. } => ModbusFunction::ReadHoldingRegisters,
            Operation::ReadInputRegisters { .. } => ModbusFunction::ReadInputRegisters,
            Operation::WriteSingleCoil { .. } => ModbusFunction::WriteSingleCoil,
            Operation::WriteSingleRegister { .. } => ModbusFunction::WriteSingleRegister,
            Operation::WriteMultipleCoils { .. } => ModbusFunction::WriteMultipleCoils,
            Operation::WriteMultipleRegisters { .. } => ModbusFunction::WriteMultipleRegisters,
        }
    }

    /// Starting protocol address.
    pub fn address(&self) -> u16 {
        match *self {
            Operation::ReadCoils { address, .. }
            | Operation::ReadDiscreteInputs { address, .. }
            | Operation::ReadHoldingRegisters { address, .. }
            | Operation::ReadInputRegisters { address, .. }
            | Operation::WriteSingleCoil { address, .. }
            | Operation::WriteSingleRegister { address, .. }
            | Operation::WriteMultipleCoils { address, .. }
            | Operation::WriteMultipleRegisters { address, .. } => address,
        }
    }

    /// Element count: read quantity, write value count, 1 for single writes.
    pub fn quantity(&self) -> u16 {
        match self {
            Operation::ReadCoils { quantity, .. }
            | Operation::ReadDiscreteInputs { quantity, .. }
            | Operation::ReadHoldingRegisters { quantity, .. }
            | Operation::ReadInputRegisters { quantity, .. } => *quantity,
            Operation::WriteSingleCoil { .. } | Operation::WriteSingleRegister { .. } => 1,
            Operation::WriteMultipleCoils { values, .. } => values.len() as u16,
            Operation::WriteMultipleRegisters { values, .. } => values.len() as u16,
        }
    }

    /// Validate address-space and per-function-code quantity bounds.
    ///
    /// Checked once before dispatch; the codec also calls this so that a
    /// hand-built request cannot produce an out-of-spec frame.
    pub fn validate(&self) -> ModbusResult<()> {
        let (quantity, max, what) = match self {
            Operation::ReadCoils { quantity, .. }
            | Operation::ReadDiscreteInputs { quantity, .. } => {
                (*quantity, MAX_READ_BITS, "bits per read")
            }
            Operation::ReadHoldingRegisters { quantity, .. }
            | Operation::ReadInputRegisters { quantity, .. } => {
                (*quantity, MAX_READ_REGISTERS, "registers per read")
            }
            Operation::WriteSingleCoil { .. } | Operation::WriteSingleRegister { .. } => {
                (1, 1, "values per single write")
            }
            Operation::WriteMultipleCoils { values, .. } => {
                if values.len() > u16::MAX as usize {
                    return Err(ModbusError::ValueCountMismatch {
                        expected: MAX_WRITE_COILS as usize,
                        actual: values.len(),
                    });
                }
                (values.len() as u16, MAX_WRITE_COILS, "coils per write")
            }
            Operation::WriteMultipleRegisters { values, .. } => {
                if values.len() > u16::MAX as usize {
                    return Err(ModbusError::ValueCountMismatch {
                        expected: MAX_WRITE_REGISTERS as usize,
                        actual: values.len(),
                    });
                }
                (values.len() as u16, MAX_WRITE_REGISTERS, "registers per write")
            }
        };

        if quantity == 0 {
            return Err(ModbusError::invalid_range("quantity must be at least 1"));
        }
        if quantity > max {
            return Err(ModbusError::invalid_range(format!(
                "quantity {quantity} exceeds {max} {what}"
            )));
        }
        if self.address() as u32 + quantity as u32 > 65536 {
            return Err(ModbusError::invalid_range(format!(
                "address {} + quantity {} overflows the 16-bit address space",
                self.address(),
                quantity
            )));
        }
        Ok(())
    }
}

/// A single Modbus TCP request. Protocol id is fixed to 0 by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub transaction_id: u16,
    pub unit_id: UnitId,
    pub operation: Operation,
}

impl ModbusRequest {
    /// Create a new request.
    pub fn new(transaction_id: u16, unit_id: UnitId, operation: Operation) -> Self {
        Self {
            transaction_id,
            unit_id,
            operation,
        }
    }
}

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    /// Device-reported exception (function code had the high bit set).
    Exception(ExceptionCode),
    /// FC01/FC02 payload, truncated to the requested quantity.
    Bits(Vec<bool>),
    /// FC03/FC04 payload.
    Registers(Vec<u16>),
    /// Write echo verified against the request; no data beyond the ack.
    WriteAck,
}

/// A decoded Modbus TCP response, already correlated with its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    pub transaction_id: u16,
    pub function: ModbusFunction,
    pub payload: ResponsePayload,
}

impl ModbusResponse {
    /// True if the device answered with an exception.
    pub fn is_exception(&self) -> bool {
        matches!(self.payload, ResponsePayload::Exception(_))
    }
}
