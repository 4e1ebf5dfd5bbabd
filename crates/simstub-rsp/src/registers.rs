//! Register file serialization.
//!
//! Every register is sent as exactly `register_width` bytes in the
//! target's byte order, concatenated in index order.

use simstub_target::TargetAdapter;

use crate::codec::{decode_hex, encode_hex};
use crate::error::ProtocolError;

fn width_of<T: TargetAdapter + ?Sized>(target: &T) -> usize {
    target.register_width().clamp(1, 8)
}

/// Serialize `value` into `width` bytes.
pub fn encode_value(value: u64, width: usize, big_endian: bool) -> Vec<u8> {
    let width = width.clamp(1, 8);
    let mut bytes = value.to_le_bytes()[..width].to_vec();
    if big_endian {
        bytes.reverse();
    }
    bytes
}

/// Inverse of [`encode_value`]. At most eight bytes are significant.
pub fn decode_value(bytes: &[u8], big_endian: bool) -> u64 {
    let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
    if big_endian {
        bytes.iter().take(8).fold(0, fold)
    } else {
        bytes.iter().take(8).rev().fold(0, fold)
    }
}

/// Fail with [`ProtocolError::UnknownRegister`] unless `index` exists.
pub fn check_index<T: TargetAdapter + ?Sized>(target: &T, index: usize) -> Result<(), ProtocolError> {
    if index < target.register_count() {
        Ok(())
    } else {
        Err(ProtocolError::UnknownRegister(index))
    }
}

/// Hex encoding of the whole register file, as sent for `g`.
pub fn read_all<T: TargetAdapter + ?Sized>(target: &T) -> String {
    let width = width_of(target);
    let big_endian = target.is_big_endian();
    let mut bytes = Vec::with_capacity(target.register_count() * width);
    for index in 0..target.register_count() {
        bytes.extend(encode_value(target.read_register(index), width, big_endian));
    }
    encode_hex(&bytes)
}

/// Hex encoding of one register, as sent for `p`.
pub fn read_one<T: TargetAdapter + ?Sized>(target: &T, index: usize) -> Result<String, ProtocolError> {
    check_index(target, index)?;
    let bytes = encode_value(
        target.read_register(index),
        width_of(target),
        target.is_big_endian(),
    );
    Ok(encode_hex(&bytes))
}

/// Load the register file from `G` hex digits.
///
/// The payload must cover every register exactly; nothing is written
/// otherwise.
pub fn write_all<T: TargetAdapter + ?Sized>(target: &mut T, hex: &[u8]) -> Result<(), ProtocolError> {
    let width = width_of(target);
    let expected = target.register_count() * width;
    let bytes = decode_hex(hex).ok_or(ProtocolError::MalformedRegisters {
        expected,
        actual: hex.len() / 2,
    })?;
    if bytes.len() != expected {
        return Err(ProtocolError::MalformedRegisters {
            expected,
            actual: bytes.len(),
        });
    }
    let big_endian = target.is_big_endian();
    for (index, chunk) in bytes.chunks(width).enumerate() {
        target.write_register(index, decode_value(chunk, big_endian));
    }
    Ok(())
}

/// Store one register from `P` data in target byte order.
pub fn write_one<T: TargetAdapter + ?Sized>(
    target: &mut T,
    index: usize,
    value: &[u8],
) -> Result<(), ProtocolError> {
    check_index(target, index)?;
    let width = width_of(target);
    if value.len() != width {
        return Err(ProtocolError::MalformedCommand(format!(
            "register {index} takes {width} bytes, got {}",
            value.len()
        )));
    }
    let decoded = decode_value(value, target.is_big_endian());
    target.write_register(index, decoded);
    Ok(())
}
