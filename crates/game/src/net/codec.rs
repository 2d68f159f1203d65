#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of buffer: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Bounds-checked little-endian writer over a caller-supplied buffer.
#[derive(Debug)]
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn put(&mut self, bytes: &[u8]) -> CodecResult<()> {
        if bytes.len() > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: bytes.len(),
                available: self.remaining(),
            });
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> CodecResult<()> {
        self.put(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> CodecResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> CodecResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> CodecResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> CodecResult<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.put(bytes)
    }

    /// Writes `value` into a `width`-byte null-padded field.
    ///
    /// At most `width - 1` bytes of the string are kept so the field always
    /// ends in a terminator.
    pub fn write_fixed_str(&mut self, value: &str, width: usize) -> CodecResult<()> {
        if width > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: width,
                available: self.remaining(),
            });
        }
        let field = &mut self.buf[self.pos..self.pos + width];
        field.fill(0);
        let bytes = value.as_bytes();
        let len = bytes.len().min(width.saturating_sub(1));
        field[..len].copy_from_slice(&bytes[..len]);
        self.pos += width;
        Ok(())
    }
}

/// Bounds-checked little-endian reader.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.take_array().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.take(len)
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Reads a `width`-byte null-padded field. The last byte of the field is
    /// treated as a terminator whether or not the sender wrote one.
    pub fn read_fixed_str(&mut self, width: usize) -> CodecResult<String> {
        let field = self.take(width)?;
        let usable = &field[..width.saturating_sub(1)];
        let end = usable.iter().position(|&b| b == 0).unwrap_or(usable.len());
        Ok(String::from_utf8_lossy(&usable[..end]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut buf = [0u8; 15];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u8(0xAB).unwrap();
        writer.write_u16(0xBEEF).unwrap();
        writer.write_i32(-123_456).unwrap();
        writer.write_f32(f32::MAX).unwrap();
        writer.write_u32(u32::MAX).unwrap();
        assert_eq!(writer.remaining(), 0);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0xAB);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_i32().unwrap(), -123_456);
        assert_eq!(reader.read_f32().unwrap(), f32::MAX);
        assert_eq!(reader.read_u32().unwrap(), u32::MAX);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = [0u8; 4];
        ByteWriter::new(&mut buf).write_u32(0x0102_0304).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_write_past_end_fails() {
        let mut buf = [0u8; 3];
        let mut writer = ByteWriter::new(&mut buf);
        assert_eq!(
            writer.write_u32(1),
            Err(CodecError::UnexpectedEof {
                needed: 4,
                available: 3
            })
        );
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut reader = ByteReader::new(&[1, 2]);
        assert!(reader.read_u32().is_err());
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_fixed_str_pads_with_nul() {
        let mut buf = [0xFFu8; 8];
        ByteWriter::new(&mut buf).write_fixed_str("Ann", 8).unwrap();
        assert_eq!(buf, [b'A', b'n', b'n', 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fixed_str_truncates_and_terminates() {
        let mut buf = [0u8; 4];
        ByteWriter::new(&mut buf)
            .write_fixed_str("abcdefgh", 4)
            .unwrap();
        assert_eq!(buf, [b'a', b'b', b'c', 0]);
        assert_eq!(ByteReader::new(&buf).read_fixed_str(4).unwrap(), "abc");
    }

    #[test]
    fn test_fixed_str_without_terminator() {
        let raw = [b'w', b'x', b'y', b'z'];
        let mut reader = ByteReader::new(&raw);
        assert_eq!(reader.read_fixed_str(4).unwrap(), "wxy");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_empty_fixed_str() {
        let mut buf = [0u8; 32];
        ByteWriter::new(&mut buf).write_fixed_str("", 32).unwrap();
        assert_eq!(ByteReader::new(&buf).read_fixed_str(32).unwrap(), "");
    }
}
