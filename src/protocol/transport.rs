use std::io::{self, Read, Write};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_std_read,
    enc::{Encoder, write::Writer},
    encode_into_std_write,
    error::{DecodeError, EncodeError},
};
use log::trace;
use thiserror::Error;

use super::MessageCode;

/// Server-imposed ceiling on a whole frame, header included.
pub const MAX_FRAME_LENGTH: usize = 10240;
/// `code:u32 || length:u32`
pub const HEADER_LENGTH: usize = 8;
/// Chunk size for long queries and bulk-load portions.
pub const LOAD_BUFFER_SIZE: usize = MAX_FRAME_LENGTH / 2;

pub type WireConfig = Configuration<BigEndian, Fixint>;

/// Big-endian, fixed-width integers: the layout every Sedna integer uses.
pub fn wire_config() -> WireConfig {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Serialize(#[from] EncodeError),
    #[error("failed to decode message: {0}")]
    Deserialize(DecodeError),
    #[error("message is too long: {length} bytes exceeds the {max} byte frame limit")]
    MessageTooLong { length: usize, max: usize },
    #[error("unknown message code {0}")]
    UnknownMessage(u32),
    #[error("message body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("socket connection broken")]
    ConnectionBroken,
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
}

impl From<DecodeError> for TransportError {
    fn from(value: DecodeError) -> Self {
        match value {
            DecodeError::Io { inner, .. } => io_fault(inner),
            other => TransportError::Deserialize(other),
        }
    }
}

impl TransportError {
    /// Faults after which the stream cannot be trusted. Frames are never
    /// longer than the limit, so an oversized one means the stream is out
    /// of step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionBroken
                | TransportError::Socket(_)
                | TransportError::Deserialize(_)
                | TransportError::MessageTooLong { .. }
        )
    }
}

/// Peer hang-ups surface as [`TransportError::ConnectionBroken`], everything
/// else as an OS-level socket error.
fn io_fault(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => TransportError::ConnectionBroken,
        _ => TransportError::Socket(err),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct FrameHeader {
    pub code: u32,
    pub length: u32,
}

/// One message as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: u32,
    pub body: Vec<u8>,
}

/// Embedded string: `0x00 || length:u32 || bytes`. Contents must already be UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct ZString<'a>(pub &'a [u8]);

impl Encode for ZString<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        let length = u32::try_from(self.0.len())
            .map_err(|_| EncodeError::Other("z-string is longer than u32::MAX bytes"))?;
        0u8.encode(encoder)?;
        length.encode(encoder)?;
        encoder.writer().write(self.0)
    }
}

pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    config: WireConfig,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            config: wire_config(),
        }
    }

    pub fn config(&self) -> WireConfig {
        self.config
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    /// Frame `body` under `code` and write it out in full.
    pub fn write_frame(&mut self, code: MessageCode, body: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame(code, body, self.config)?;
        trace!("writing {code} ({} bytes)", frame.len());

        self.stream.write_all(&frame).map_err(io_fault)?;
        self.stream.flush().map_err(io_fault)?;
        Ok(())
    }

    /// Read one header and exactly `length` bytes of body, however many
    /// socket reads that takes. A header announcing more than
    /// [`MAX_FRAME_LENGTH`] is rejected before the body is read.
    pub fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let header: FrameHeader = decode_from_std_read(&mut self.stream, self.config)?;
        let length = HEADER_LENGTH + header.length as usize;
        if length > MAX_FRAME_LENGTH {
            return Err(TransportError::MessageTooLong {
                length,
                max: MAX_FRAME_LENGTH,
            });
        }

        let body = self.read_exact(header.length as usize)?;
        trace!("read frame {} ({} bytes)", header.code, body.len());

        Ok(Frame {
            code: header.code,
            body,
        })
    }

    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0; n];
        self.stream.read_exact(&mut buf).map_err(io_fault)?;
        Ok(buf)
    }
}

pub fn encode_frame(
    code: MessageCode,
    body: &[u8],
    config: WireConfig,
) -> Result<Vec<u8>, TransportError> {
    let length = HEADER_LENGTH + body.len();
    if length > MAX_FRAME_LENGTH {
        return Err(TransportError::MessageTooLong {
            length,
            max: MAX_FRAME_LENGTH,
        });
    }

    let header = FrameHeader {
        code: code.as_u32(),
        length: body.len() as u32,
    };
    let mut frame = Vec::with_capacity(length);
    encode_into_std_write(header, &mut frame, config)?;
    frame.extend_from_slice(body);
    Ok(frame)
}
