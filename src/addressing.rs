//! Logical register address spaces
//!
//! Field tools and PLC documentation address points in the classic numbered
//! spaces (coils from 1, discrete inputs from 10001, input registers from
//! 30001, holding registers from 40001), while the wire protocol is 0-based
//! within each space. This module carries the mapping and the read/write
//! function-code selection per space.

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::ModbusFunction;

/// The four Modbus register spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterSpace {
    /// Read/write 16-bit registers, logical base 40001.
    Holding,
    /// Read-only 16-bit registers, logical base 30001.
    Input,
    /// Read/write single bits, logical base 1.
    Coil,
    /// Read-only single bits, logical base 10001.
    Discrete,
}

impl RegisterSpace {
    /// Logical base of the space: the number of its first addressable point.
    pub fn base(self) -> u32 {
        match self {
            RegisterSpace::Holding => 40001,
            RegisterSpace::Input => 30001,
            RegisterSpace::Coil => 1,
            RegisterSpace::Discrete => 10001,
        }
    }

    /// Short label used in output lines (HR[40001]: ...).
    pub fn label(self) -> &'static str {
        match self {
            RegisterSpace::Holding => "HR",
            RegisterSpace::Input => "IR",
            RegisterSpace::Coil => "COIL",
            RegisterSpace::Discrete => "DI",
        }
    }

    /// True for the single-bit spaces.
    pub fn is_bit(self) -> bool {
        matches!(self, RegisterSpace::Coil | RegisterSpace::Discrete)
    }

    /// Function code used to read this space.
    pub fn read_function(self) -> ModbusFunction {
        match self {
            RegisterSpace::Holding => ModbusFunction::ReadHoldingRegisters,
            RegisterSpace::Input => ModbusFunction::ReadInputRegisters,
            RegisterSpace::Coil => ModbusFunction::ReadCoils,
            RegisterSpace::Discrete => ModbusFunction::ReadDiscreteInputs,
        }
    }

    /// Function code used to write `count` points, or `None` for the
    /// read-only spaces.
    pub fn write_function(self, count: usize) -> Option<ModbusFunction> {
        match self {
            RegisterSpace::Holding => Some(if count == 1 {
                ModbusFunction::WriteSingleRegister
            } else {
                ModbusFunction::WriteMultipleRegisters
            }),
            RegisterSpace::Coil => Some(if count == 1 {
                ModbusFunction::WriteSingleCoil
            } else {
                ModbusFunction::WriteMultipleCoils
            }),
            RegisterSpace::Input | RegisterSpace::Discrete => None,
        }
    }

    /// Map a logical address into the 0-based protocol address.
    ///
    /// Addresses below the space base or past its 65536-point extent are
    /// rejected with `InvalidRange`.
    pub fn to_protocol(self, logical: u32) -> ModbusResult<u16> {
        let base = self.base();
        if logical < base || logical - base > u16::MAX as u32 {
            return Err(ModbusError::invalid_range(format!(
                "address {} is outside the {} space ({}..={})",
                logical,
                self.label(),
                base,
                base + u16::MAX as u32
            )));
        }
        Ok((logical - base) as u16)
    }

    /// Map a 0-based protocol address back to its logical number.
    pub fn to_logical(self, protocol: u16) -> u32 {
        self.base() + protocol as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_to_protocol() {
        assert_eq!(RegisterSpace::Holding.to_protocol(40001).unwrap(), 0);
        assert_eq!(RegisterSpace::Holding.to_protocol(40010).unwrap(), 9);
        assert_eq!(RegisterSpace::Input.to_protocol(30001).unwrap(), 0);
        assert_eq!(RegisterSpace::Discrete.to_protocol(10001).unwrap(), 0);
        assert_eq!(RegisterSpace::Coil.to_protocol(1).unwrap(), 0);
        assert_eq!(RegisterSpace::Coil.to_protocol(10).unwrap(), 9);
    }

    #[test]
    fn test_below_base_is_rejected() {
        assert!(RegisterSpace::Holding.to_protocol(30001).is_err());
        assert!(RegisterSpace::Coil.to_protocol(0).is_err());
    }

    #[test]
    fn test_past_extent_is_rejected() {
        assert_eq!(
            RegisterSpace::Holding.to_protocol(40001 + 65535).unwrap(),
            0xFFFF
        );
        assert!(RegisterSpace::Holding.to_protocol(40001 + 65536).is_err());
    }

    #[test]
    fn test_round_trip() {
        for space in [
            RegisterSpace::Holding,
            RegisterSpace::Input,
            RegisterSpace::Coil,
            RegisterSpace::Discrete,
        ] {
            let logical = space.base() + 41;
            assert_eq!(
                space.to_logical(space.to_protocol(logical).unwrap()),
                logical
            );
        }
    }

    #[test]
    fn test_write_function_selection() {
        assert_eq!(
            RegisterSpace::Holding.write_function(1),
            Some(ModbusFunction::WriteSingleRegister)
        );
        assert_eq!(
            RegisterSpace::Holding.write_function(3),
            Some(ModbusFunction::WriteMultipleRegisters)
        );
        assert_eq!(
            RegisterSpace::Coil.write_function(1),
            Some(ModbusFunction::WriteSingleCoil)
        );
        assert_eq!(RegisterSpace::Input.write_function(1), None);
        assert_eq!(RegisterSpace::Discrete.write_function(2), None);
    }
}
