// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Unsigned LEB128, as used for all length and key fields of a stream id.
//! Writes are canonical (minimal length); reads accept overlong encodings
//! that still terminate, and fail on truncated input or values wider than
//! the target type.

use crate::Error;
use integer_encoding::{VarInt, VarIntReader};
use std::io::Cursor;

pub(crate) fn write_varint(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.encode_var_vec());
}

pub(crate) fn write_varlong(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.encode_var_vec());
}

pub(crate) fn read_varint(cursor: &mut Cursor<&[u8]>) -> Result<u32, Error> {
    let value = read_varlong(cursor)?;
    u32::try_from(value).map_err(|_| Error::malformed(format!("varint out of range: {}", value)))
}

pub(crate) fn read_varlong(cursor: &mut Cursor<&[u8]>) -> Result<u64, Error> {
    cursor
        .read_varint::<u64>()
        .map_err(|e| Error::malformed(format!("truncated varint: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_u64(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varlong(&mut buf, value);
        buf
    }

    #[test]
    fn canonical_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16384, u32::MAX as u64, u64::MAX] {
            let buf = encode_u64(value);
            let mut cursor = Cursor::new(buf.as_slice());
            assert_eq!(read_varlong(&mut cursor).unwrap(), value);
            // The cursor advances by exactly the bytes consumed.
            assert_eq!(cursor.position(), buf.len() as u64);
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_u64(0), [0x00]);
        assert_eq!(encode_u64(127), [0x7f]);
        assert_eq!(encode_u64(128), [0x80, 0x01]);
        assert_eq!(encode_u64(300), [0xac, 0x02]);
    }

    #[test]
    fn overlong_is_accepted_on_read() {
        let buf: &[u8] = &[0x80, 0x00];
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_varlong(&mut cursor).unwrap(), 0);
        assert_eq!(cursor.position(), 2);

        let buf: &[u8] = &[0xff, 0x00];
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_varlong(&mut cursor).unwrap(), 127);
    }

    #[test]
    fn truncated_input_is_rejected() {
        for buf in [&[][..], &[0x80][..], &[0xff, 0xff][..]] {
            let mut cursor = Cursor::new(buf);
            assert!(matches!(
                read_varlong(&mut cursor),
                Err(Error::MalformedId(_))
            ));
        }
    }

    #[test]
    fn varint_rejects_values_wider_than_u32() {
        let buf = encode_u64(u32::MAX as u64 + 1);
        let mut cursor = Cursor::new(buf.as_slice());
        assert!(matches!(
            read_varint(&mut cursor),
            Err(Error::MalformedId(_))
        ));

        let buf = encode_u64(u32::MAX as u64);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_varint(&mut cursor).unwrap(), u32::MAX);
    }
}
