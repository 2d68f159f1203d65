use super::protocol::{HEADER_SIZE, Message, PROTOCOL_MAGIC, PacketError, PacketHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("bad frame magic 0x{found:08x}")]
    BadMagic { found: u32 },
    #[error("unsupported protocol version {found}")]
    UnsupportedVersion { found: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn decode(&self) -> Result<Message, PacketError> {
        Message::decode(self.header.message_type, &self.payload)
    }
}

/// Per-connection receive buffer that reassembles frames from a byte stream.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pops the next complete frame.
    ///
    /// Returns `Ok(None)` when fewer bytes than a whole frame are buffered.
    /// On a bad magic or version the whole buffer is dropped and the error
    /// returned; nothing buffered before the error can be recovered.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, FrameError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = match PacketHeader::decode(&self.buf[..HEADER_SIZE]) {
            Ok(header) => header,
            Err(_) => return Ok(None),
        };

        if !header.is_valid() {
            self.buf.clear();
            return Err(if header.magic != PROTOCOL_MAGIC {
                FrameError::BadMagic {
                    found: header.magic,
                }
            } else {
                FrameError::UnsupportedVersion {
                    found: header.version,
                }
            });
        }

        let frame_len = header.frame_len();
        if self.buf.len() < frame_len {
            return Ok(None);
        }

        let payload = self.buf[HEADER_SIZE..frame_len].to_vec();
        self.buf.drain(..frame_len);

        Ok(Some(RawFrame { header, payload }))
    }

    /// Iterates over every complete frame currently buffered. The iterator
    /// ends at the first incomplete frame or after yielding an error, and can
    /// be restarted once more bytes arrive.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            buffer: self,
            failed: false,
        }
    }
}

pub struct Frames<'a> {
    buffer: &'a mut FrameBuffer,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<RawFrame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.buffer.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
