//! Modbus TCP frame codec
//!
//! Pure encode/decode of MBAP + PDU for the supported function codes.
//! Encoding produces a complete TCP frame from a [`ModbusRequest`]; decoding
//! correlates raw response bytes against the originating request and yields a
//! [`ModbusResponse`] (exception responses included) or a protocol error.
//! No I/O happens here.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::constants::{MBAP_HEADER_LEN, MIN_FRAME_LEN, MODBUS_PROTOCOL_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{
    ExceptionCode, ModbusRequest, ModbusResponse, Operation, ResponsePayload,
};

/// Encode a request into a complete Modbus TCP frame.
///
/// The MBAP length field covers the unit id plus the PDU. Fails with
/// `InvalidRange`/`ValueCountMismatch` if the operation violates its
/// per-function-code bounds; never performs I/O.
pub fn encode_request(request: &ModbusRequest) -> ModbusResult<Bytes> {
    request.operation.validate()?;

    let pdu = encode_pdu(&request.operation);
    let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + pdu.len());
    frame.put_u16(request.transaction_id);
    frame.put_u16(MODBUS_PROTOCOL_ID);
    frame.put_u16(1 + pdu.len() as u16);
    frame.put_u8(request.unit_id);
    frame.extend_from_slice(&pdu);

    debug!(
        "encoded frame: txid={:#06x} unit={} fc={:#04x} len={}",
        request.transaction_id,
        request.unit_id,
        request.operation.function().to_u8(),
        frame.len()
    );
    Ok(frame.freeze())
}

/// Encode the PDU body, one arm per function code.
fn encode_pdu(operation: &Operation) -> BytesMut {
    let mut pdu = BytesMut::with_capacity(5);
    pdu.put_u8(operation.function().to_u8());

    match operation {
        Operation::ReadCoils { address, quantity }
        | Operation::ReadDiscreteInputs { address, quantity }
        | Operation::ReadHoldingRegisters { address, quantity }
        | Operation::ReadInputRegisters { address, quantity } => {
            pdu.put_u16(*address);
            pdu.put_u16(*quantity);
        }
        Operation::WriteSingleCoil { address, value } => {
            pdu.put_u16(*address);
            pdu.put_u16(if *value { 0xFF00 } else { 0x0000 });
        }
        Operation::WriteSingleRegister { address, value } => {
            pdu.put_u16(*address);
            pdu.put_u16(*value);
        }
        Operation::WriteMultipleCoils { address, values } => {
            let packed = pack_bits(values);
            pdu.put_u16(*address);
            pdu.put_u16(values.len() as u16);
            pdu.put_u8(packed.len() as u8);
            pdu.extend_from_slice(&packed);
        }
        Operation::WriteMultipleRegisters { address, values } => {
            pdu.put_u16(*address);
            pdu.put_u16(values.len() as u16);
            pdu.put_u8((values.len() * 2) as u8);
            for &value in values {
                pdu.put_u16(value);
            }
        }
    }
    pdu
}

/// Decode a raw response frame against its originating request.
///
/// Verifies, in order: minimum length, transaction id, exception form,
/// function code, then the function-specific payload. An exception response
/// decodes successfully into [`ResponsePayload::Exception`]; every structural
/// problem is a protocol error for this exchange only.
pub fn decode_response(frame: &[u8], request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(ModbusError::TruncatedFrame {
            needed: MIN_FRAME_LEN,
            got: frame.len(),
        });
    }

    let transaction_id = u16::from_be_bytes([frame[0], frame[1]]);
    if transaction_id != request.transaction_id {
        return Err(ModbusError::TransactionMismatch {
            sent: request.transaction_id,
            received: transaction_id,
        });
    }

    let function = request.operation.function();
    let raw_function = frame[7];

    if raw_function == function.exception_code() {
        if frame.len() < MIN_FRAME_LEN + 1 {
            return Err(ModbusError::TruncatedFrame {
                needed: MIN_FRAME_LEN + 1,
                got: frame.len(),
            });
        }
        let code = ExceptionCode::from_u8(frame[8]);
        debug!("decoded exception response: fc={:#04x} {}", raw_function, code);
        return Ok(ModbusResponse {
            transaction_id,
            function,
            payload: ResponsePayload::Exception(code),
        });
    }

    if raw_function != function.to_u8() {
        return Err(ModbusError::FunctionCodeMismatch {
            sent: function.to_u8(),
            received: raw_function,
        });
    }

    let payload = match &request.operation {
        Operation::ReadCoils { quantity, .. } | Operation::ReadDiscreteInputs { quantity, .. } => {
            decode_bit_payload(&frame[8..], *quantity)?
        }
        Operation::ReadHoldingRegisters { quantity, .. }
        | Operation::ReadInputRegisters { quantity, .. } => {
            decode_register_payload(&frame[8..], *quantity)?
        }
        op @ (Operation::WriteSingleCoil { .. }
        | Operation::WriteSingleRegister { .. }
        | Operation::WriteMultipleCoils { .. }
        | Operation::WriteMultipleRegisters { .. }) => decode_write_echo(&frame[8..], op)?,
    };

    Ok(ModbusResponse {
        transaction_id,
        function,
        payload,
    })
}

/// FC01/FC02 payload: byte count, then LSB-first packed bits.
fn decode_bit_payload(body: &[u8], quantity: u16) -> ModbusResult<ResponsePayload> {
    let (byte_count, data) = split_counted_payload(body)?;

    let expected = (quantity as usize).div_ceil(8);
    if byte_count != expected {
        return Err(ModbusError::QuantityMismatch {
            requested: quantity,
            received: (byte_count * 8) as u16,
        });
    }

    let bits = unpack_bits(data, quantity as usize);
    Ok(ResponsePayload::Bits(bits))
}

/// FC03/FC04 payload: byte count, then big-endian registers.
fn decode_register_payload(body: &[u8], quantity: u16) -> ModbusResult<ResponsePayload> {
    let (byte_count, data) = split_counted_payload(body)?;

    if byte_count % 2 != 0 || (byte_count / 2) as u16 != quantity {
        return Err(ModbusError::QuantityMismatch {
            requested: quantity,
            received: (byte_count / 2) as u16,
        });
    }

    let registers = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(ResponsePayload::Registers(registers))
}

/// Split a read-response body into its byte-count prefix and payload, with
/// the payload required to match the count exactly.
fn split_counted_payload(body: &[u8]) -> ModbusResult<(usize, &[u8])> {
    let Some((&byte_count, data)) = body.split_first() else {
        return Err(ModbusError::TruncatedFrame {
            needed: MIN_FRAME_LEN + 1,
            got: MIN_FRAME_LEN,
        });
    };
    let byte_count = byte_count as usize;
    if data.len() != byte_count {
        return Err(ModbusError::TruncatedFrame {
            needed: MIN_FRAME_LEN + 1 + byte_count,
            got: MIN_FRAME_LEN + 1 + data.len(),
        });
    }
    Ok((byte_count, data))
}

/// FC05/06/0F/10: the device echoes address and value (single writes) or
/// address and quantity (multi writes); both must match the request.
fn decode_write_echo(body: &[u8], operation: &Operation) -> ModbusResult<ResponsePayload> {
    if body.len() < 4 {
        return Err(ModbusError::TruncatedFrame {
            needed: MIN_FRAME_LEN + 4,
            got: MIN_FRAME_LEN + body.len(),
        });
    }
    let echoed_address = u16::from_be_bytes([body[0], body[1]]);
    let echoed_word = u16::from_be_bytes([body[2], body[3]]);

    if echoed_address != operation.address() {
        return Err(ModbusError::echo_mismatch(format!(
            "address: wrote {}, device echoed {}",
            operation.address(),
            echoed_address
        )));
    }

    let expected_word = match operation {
        Operation::WriteSingleCoil { value, .. } => {
            if *value {
                0xFF00
            } else {
                0x0000
            }
        }
        Operation::WriteSingleRegister { value, .. } => *value,
        _ => operation.quantity(),
    };
    if echoed_word != expected_word {
        return Err(ModbusError::echo_mismatch(format!(
            "{}: wrote {:#06x}, device echoed {:#06x}",
            if operation.quantity() > 1 { "quantity" } else { "value" },
            expected_word,
            echoed_word
        )));
    }

    Ok(ResponsePayload::WriteAck)
}

/// Pack bits into bytes, LSB-first within each byte, zero-padded.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `count` bits from LSB-first packed bytes.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bytes
                .get(i / 8)
                .is_some_and(|byte| byte & (1 << (i % 8)) != 0)
        })
        .collect()
}
