//! Sedna client/server wire protocol.
//!
//! This module defines the messages exchanged with a Sedna server and the
//! framing used to carry them over a byte stream. It knows nothing about
//! sessions or transactions; [`connection`](crate::connection) drives it.
//!
//! # Binary Format
//!
//! Every message is a frame:
//!
//! - `code: u32`: the message type ([`MessageCode`]).
//! - `length: u32`: the number of body bytes that follow.
//! - `body`: `length` bytes whose layout depends on `code`.
//!
//! All integers are big-endian. A whole frame may not exceed
//! [`MAX_FRAME_LENGTH`] bytes; longer queries and documents are split by the
//! caller into execute-long and bulk-load portions.
//!
//! Strings inside bodies are "z-strings": a null byte, a `u32` length and the
//! UTF-8 bytes. Server bodies come in two flavours: data bodies start with a
//! 5 byte prefix (null byte + length) and error/debug bodies with a 9 byte
//! prefix (numeric code + null byte + length).
//!
//! # Key Components
//!
//! - [`ProtocolTransport`]: reads and writes frames over any `Read + Write`.
//! - [`Request`]: messages the client sends.
//! - [`Response`]: messages the server sends, decoded into a tagged union.
mod codes;
mod request;
mod response;
mod transport;

pub use codes::{DATA_PREFIX_LENGTH, DIAGNOSTIC_PREFIX_LENGTH, MessageCode};
pub use request::{Request, ResultFormat, SessionOption, VERSION_MAJOR, VERSION_MINOR};
pub use response::{Diagnostic, Response, normalize_message};
pub use transport::{
    Frame, FrameHeader, HEADER_LENGTH, LOAD_BUFFER_SIZE, MAX_FRAME_LENGTH, ProtocolTransport,
    TransportError, WireConfig, ZString, encode_frame, wire_config,
};
