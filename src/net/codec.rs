//! Primitive reads and writes for the wire format
//!
//! Everything multi-byte is big-endian. Packet bodies are parsed from an
//! in-memory cursor after the frame has been read off the socket, so the
//! decode side is synchronous.

use std::io::{self, Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("varint is wider than 5 bytes")]
    VarIntTooBig,
}

/// Encode a varint on its own, needed when sizing frame headers
pub fn varint(val: i32) -> Vec<u8> {
    let mut val = val as u32;
    let mut buf = Vec::new();
    loop {
        let mut temp = (val & 0x7F) as u8;
        val >>= 7;
        if val != 0 {
            temp |= 0x80;
        }
        buf.push(temp);
        if val == 0 {
            return buf;
        }
    }
}

pub trait PacketDecoderExt: Read + Sized {
    fn read_unsigned_byte(&mut self) -> DecodeResult<u8> {
        Ok(self.read_u8()?)
    }

    fn read_bytes(&mut self, count: usize) -> DecodeResult<Vec<u8>> {
        let mut read = vec![0; count];
        self.read_exact(&mut read)?;
        Ok(read)
    }

    fn read_long(&mut self) -> DecodeResult<i64> {
        Ok(self.read_i64::<BigEndian>()?)
    }

    fn read_int(&mut self) -> DecodeResult<i32> {
        Ok(self.read_i32::<BigEndian>()?)
    }

    fn read_double(&mut self) -> DecodeResult<f64> {
        Ok(self.read_f64::<BigEndian>()?)
    }

    fn read_float(&mut self) -> DecodeResult<f32> {
        Ok(self.read_f32::<BigEndian>()?)
    }

    fn read_varint(&mut self) -> DecodeResult<i32> {
        let mut num_read = 0;
        let mut result = 0i32;
        loop {
            let byte = self.read_unsigned_byte()?;
            result |= ((byte & 0x7F) as i32) << (7 * num_read);
            num_read += 1;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            if num_read == 5 {
                return Err(DecodeError::VarIntTooBig);
            }
        }
    }

    fn read_string(&mut self) -> DecodeResult<String> {
        let length = self.read_varint()?;
        Ok(String::from_utf8(self.read_bytes(length as usize)?)?)
    }
}

impl<T: AsRef<[u8]>> PacketDecoderExt for Cursor<T> {}

/// Writes are only ever into an in-memory buffer, so they cannot fail
pub trait PacketEncoderExt: Write {
    fn write_bool(&mut self, val: bool) {
        self.write_all(&[val as u8]).unwrap();
    }

    fn write_bytes(&mut self, val: &[u8]) {
        self.write_all(val).unwrap();
    }

    fn write_varint(&mut self, val: i32) {
        self.write_all(&varint(val)).unwrap();
    }

    fn write_byte(&mut self, val: i8) {
        self.write_all(&[val as u8]).unwrap();
    }

    fn write_unsigned_byte(&mut self, val: u8) {
        self.write_all(&[val]).unwrap();
    }

    fn write_unsigned_short(&mut self, val: u16) {
        self.write_u16::<BigEndian>(val).unwrap();
    }

    fn write_int(&mut self, val: i32) {
        self.write_i32::<BigEndian>(val).unwrap();
    }

    fn write_long(&mut self, val: i64) {
        self.write_i64::<BigEndian>(val).unwrap();
    }

    fn write_float(&mut self, val: f32) {
        self.write_f32::<BigEndian>(val).unwrap();
    }

    fn write_uuid(&mut self, val: u128) {
        self.write_u128::<BigEndian>(val).unwrap();
    }

    fn write_string(&mut self, val: &str) {
        self.write_varint(val.len() as i32);
        self.write_all(val.as_bytes()).unwrap();
    }
}

impl PacketEncoderExt for Vec<u8> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varints_round_trip() {
        for value in [0, 1, 127, 128, 255, 300, 2_097_151, i32::MAX, -1, i32::MIN] {
            let encoded = varint(value);
            assert!(encoded.len() <= 5);
            let mut cursor = Cursor::new(encoded);
            assert_eq!(cursor.read_varint().unwrap(), value);
        }
    }

    #[test]
    fn overlong_varint_is_an_error() {
        let mut cursor = Cursor::new([0x80, 0x80, 0x80, 0x80, 0x80, 0x80]);
        assert!(matches!(
            cursor.read_varint().unwrap_err(),
            DecodeError::VarIntTooBig
        ));
    }

    #[test]
    fn strings_round_trip() {
        let mut buf = Vec::new();
        buf.write_string("minecraft:test_house");
        let mut cursor = Cursor::new(buf);
        assert_eq!(cursor.read_string().unwrap(), "minecraft:test_house");
    }

    #[test]
    fn longs_are_big_endian() {
        let mut buf = Vec::new();
        buf.write_long(0x0102_0304_0506_0708);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        let mut cursor = Cursor::new(buf);
        assert_eq!(cursor.read_long().unwrap(), 0x0102_0304_0506_0708);
    }
}
