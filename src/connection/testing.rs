//! In-memory server used by the connection tests.
//!
//! The session is strictly request/response, so every server message a test
//! needs can be queued up front; the client reads them in order.
use std::{
    io::{self, Cursor, Read, Write},
    sync::{Arc, Mutex},
};

use super::Connection;
use crate::{
    ConnectionConfig,
    protocol::{Frame, MessageCode, ProtocolTransport, encode_frame, wire_config},
};

pub(crate) struct MockStream {
    input: Cursor<Vec<u8>>,
    wire: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    /// Everything the client has written so far.
    pub(crate) fn wire(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.wire)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.wire.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct ServerScript {
    bytes: Vec<u8>,
}

impl ServerScript {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn raw(mut self, code: MessageCode, body: &[u8]) -> Self {
        self.bytes
            .extend(encode_frame(code, body, wire_config()).unwrap());
        self
    }

    /// Bytes that need not form a valid frame.
    pub(crate) fn bytes(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub(crate) fn message(self, code: MessageCode) -> Self {
        self.raw(code, &[])
    }

    /// Data-class body: null byte, length, payload.
    pub(crate) fn data(self, code: MessageCode, payload: &[u8]) -> Self {
        let mut body = vec![0];
        body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        body.extend_from_slice(payload);
        self.raw(code, &body)
    }

    /// Error/debug-class body: numeric code, null byte, length, text.
    pub(crate) fn diagnostic(self, code: MessageCode, number: u32, text: &str) -> Self {
        let mut body = number.to_be_bytes().to_vec();
        body.push(0);
        body.extend_from_slice(&(text.len() as u32).to_be_bytes());
        body.extend_from_slice(text.as_bytes());
        self.raw(code, &body)
    }

    pub(crate) fn then(mut self, other: ServerScript) -> Self {
        self.bytes.extend(other.bytes);
        self
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub(crate) fn into_stream(self) -> MockStream {
        MockStream {
            input: Cursor::new(self.bytes),
            wire: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub(crate) fn handshake_script() -> ServerScript {
    ServerScript::new()
        .message(MessageCode::SendSessionParameters)
        .message(MessageCode::SendAuthParameters)
        .message(MessageCode::AuthenticationOk)
}

/// Authenticated connection whose server will then play `script`.
pub(crate) fn connect_scripted(script: ServerScript) -> Connection<MockStream> {
    let stream = handshake_script().then(script).into_stream();
    match Connection::handshake(stream, ConnectionConfig::default()) {
        Ok(conn) => conn,
        Err(err) => panic!("scripted handshake failed: {err}"),
    }
}

pub(crate) fn parse_frames(bytes: &[u8]) -> Vec<Frame> {
    let mut transport = ProtocolTransport::new(Cursor::new(bytes.to_vec()));
    let mut frames = Vec::new();
    while let Ok(frame) = transport.read_frame() {
        frames.push(frame);
    }
    frames
}

impl Connection<MockStream> {
    pub(crate) fn wire(&self) -> Arc<Mutex<Vec<u8>>> {
        self.transport
            .as_ref()
            .map(|transport| transport.get_ref().wire())
            .expect("connection is closed")
    }

    pub(crate) fn sent_frames(&self) -> Vec<Frame> {
        parse_frames(&self.wire().lock().unwrap())
    }

    /// Frames sent after the three handshake messages.
    pub(crate) fn sent_codes(&self) -> Vec<u32> {
        self.sent_frames()
            .iter()
            .skip(3)
            .map(|frame| frame.code)
            .collect()
    }
}
