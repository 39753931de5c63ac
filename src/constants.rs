//! Modbus protocol constants based on the official specification
//!
//! The fundamental size limit is the 253-byte PDU inherited from the RS485
//! ADU limit of 256 bytes; the per-operation quantity limits below are
//! derived from it.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// MBAP header length for Modbus TCP.
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1) = 7 bytes.
pub const MBAP_HEADER_LEN: usize = 7;

/// Minimum parseable response frame: MBAP header plus the function code byte.
pub const MIN_FRAME_LEN: usize = MBAP_HEADER_LEN + 1;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification.
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum value of the MBAP length field (Unit ID + PDU).
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Maximum complete TCP frame: MBAP header + PDU.
pub const MAX_FRAME_SIZE: usize = MBAP_HEADER_LEN + MAX_PDU_SIZE;

/// Protocol identifier carried in every MBAP header. Always 0 for Modbus.
pub const MODBUS_PROTOCOL_ID: u16 = 0;

// ============================================================================
// Quantity Limits
// ============================================================================

/// Maximum registers per FC03/FC04 read.
///
/// Response PDU: function(1) + byte count(1) + N×2 ≤ 253 → N ≤ 125.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum registers per FC16 write.
///
/// Request PDU: function(1) + address(2) + quantity(2) + byte count(1) + N×2 ≤ 253 → N ≤ 123.
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Maximum coils/discrete inputs per FC01/FC02 read (spec value, 8 bits per byte).
pub const MAX_READ_BITS: u16 = 2000;

/// Maximum coils per FC15 write (spec value 0x7B0).
pub const MAX_WRITE_COILS: u16 = 1968;

// ============================================================================
// Defaults
// ============================================================================

/// Modbus TCP default port.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default worker pool size, sized for typical LAN fan-out.
pub const DEFAULT_WORKERS: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MBAP_HEADER_LEN, 7);
        assert_eq!(MIN_FRAME_LEN, 8);
        assert_eq!(MAX_PDU_SIZE, 253);
        assert_eq!(MAX_FRAME_SIZE, 260);
    }

    #[test]
    fn test_register_limits_fit_pdu() {
        let read_pdu = 1 + 1 + (MAX_READ_REGISTERS as usize * 2);
        assert!(read_pdu <= MAX_PDU_SIZE);

        let write_pdu = 1 + 2 + 2 + 1 + (MAX_WRITE_REGISTERS as usize * 2);
        assert!(write_pdu <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_bit_limits_fit_pdu() {
        let read_pdu = 1 + 1 + (MAX_READ_BITS as usize).div_ceil(8);
        assert!(read_pdu <= MAX_PDU_SIZE);

        let write_pdu = 1 + 2 + 2 + 1 + (MAX_WRITE_COILS as usize).div_ceil(8);
        assert!(write_pdu <= MAX_PDU_SIZE);
    }
}
