//! Binary resource serializer (spec §3 "Serializer"), grounded on
//! `serialization/binary_serializer.hpp`/`.cpp`. The C++ original reverses
//! each primitive's bytes when the host is little-endian so the wire format
//! is always big-endian; this port gets that for free from `to_be_bytes`/
//! `from_be_bytes`. Strings are written as UTF-8 followed by a `\0`
//! terminator, exactly as `serialize_string`/`deserialize_string` do.

use crate::error::{EngineError, EngineResult};

/// Append-only binary writer mirroring `Serializer::serialize`'s output
/// buffer (`String& out_str` in the original, here a `Vec<u8>`).
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// UTF-8 bytes followed by a NUL terminator
    /// (`serialize_string`: `out_str += data; out_str += '\0';`).
    pub fn write_string(&mut self, value: &str) {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    /// Raw byte blob prefixed with its length, for already-encoded payloads
    /// (e.g. a mesh's vertex/index buffers).
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_u64(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    /// Element count then each `f32`, matching `serialize_type` for
    /// `glm::vecN`/`matN` (a flat run of floats with no separators, since
    /// `vector_add_sep` is a no-op in the binary serializer).
    pub fn write_f32_slice(&mut self, values: &[f32]) {
        self.write_u64(values.len() as u64);
        for v in values {
            self.write_f32(*v);
        }
    }
}

/// Forward-only binary reader mirroring `Serializer::deserialize`'s
/// `total_read`/`position` bookkeeping.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, size: usize) -> EngineResult<&'a [u8]> {
        if self.remaining() < size {
            return Err(EngineError::RuntimeError(
                "binary deserialization failed: input formatting error (unexpected end of data)".into(),
            ));
        }
        let slice = &self.data[self.position..self.position + size];
        self.position += size;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> EngineResult<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> EngineResult<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> EngineResult<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> EngineResult<i32> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> EngineResult<f32> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> EngineResult<f64> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_string(&mut self) -> EngineResult<String> {
        let rest = &self.data[self.position..];
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            EngineError::RuntimeError(
                "binary deserialization failed: unterminated string".into(),
            )
        })?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|e| EngineError::RuntimeError(format!("invalid UTF-8 in serialized string: {e}")))?
            .to_string();
        self.position += end + 1;
        Ok(s)
    }

    pub fn read_bytes(&mut self) -> EngineResult<Vec<u8>> {
        let len = self.read_u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_f32_slice(&mut self) -> EngineResult<Vec<f32>> {
        let count = self.read_u64()? as usize;
        (0..count).map(|_| self.read_f32()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives_and_string() {
        let mut w = BinaryWriter::new();
        w.write_u32(42);
        w.write_f32(1.5);
        w.write_string("mesh.obj");
        let bytes = w.into_bytes();

        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 42);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_string().unwrap(), "mesh.obj");
    }

    #[test]
    fn round_trips_float_slice_and_bytes() {
        let mut w = BinaryWriter::new();
        w.write_f32_slice(&[1.0, 2.0, 3.0]);
        w.write_bytes(&[9, 8, 7]);
        let bytes = w.into_bytes();

        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.read_f32_slice().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(r.read_bytes().unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn truncated_input_is_a_recoverable_error() {
        let mut r = BinaryReader::new(&[0, 0]);
        assert!(r.read_u32().is_err());
    }
}
