//! Sedna session driver.
//!
//! A [`Connection`] owns one byte stream and runs the synchronous
//! request/response loop on it: every public operation sends a frame and
//! blocks until the server's answer has been read and dispatched. Only one
//! request is ever outstanding on a connection.
//!
//! # Overview
//!
//! - Construction opens the socket and runs the [`handshake`] before
//!   returning.
//! - Queries run inside a transaction; [`Connection::execute`] begins one
//!   implicitly when none is open.
//! - Results are pulled item by item through [`QueryResult`], which borrows
//!   the connection mutably, so a second query cannot start while a result is
//!   being read.
//! - `LOAD` statements trigger the bulk-load exchange, in which the client
//!   streams a file or buffer to the server mid-query.
//!
//! # Example
//! ```no_run
//! use sedna::{Connection, ConnectionConfig, ResultFormat};
//!
//! let mut conn = Connection::connect(ConnectionConfig::default()).unwrap();
//! for item in conn.execute("doc('$documents')", ResultFormat::Xml).unwrap() {
//!     println!("{}", item.unwrap());
//! }
//! conn.commit().unwrap();
//! conn.close().unwrap();
//! ```
mod bulkload;
pub mod handshake;
mod metadata;
mod result;
mod shared;
mod transaction;

#[cfg(test)]
pub(crate) mod testing;

use std::{
    io::{Read, Write},
    net::TcpStream,
};

use log::{debug, info, warn};

use crate::{
    ConnectionConfig, Error, Result,
    protocol::{Diagnostic, MessageCode, ProtocolTransport, Request, Response, SessionOption, TransportError},
};
use bulkload::BulkLoad;
use handshake::{HandshakeAction, HandshakeState};
use result::ItemStream;

pub use result::{QueryResult, ResultKind};
pub use shared::SharedConnection;
pub use transaction::TransactionState;

pub type DebugHandler = Box<dyn FnMut(&Diagnostic) + Send>;

/// Outcome of dispatching one server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    /// The exchange is not over; read the next message.
    Continue,
    Done,
    Updated,
    BulkLoaded,
    /// An item was completed and is buffered on the stream.
    Item,
    ResultEnd,
    Text(String),
}

pub struct Connection<S: Read + Write = TcpStream> {
    transport: Option<ProtocolTransport<S>>,
    config: ConnectionConfig,
    transaction: TransactionState,
    items: ItemStream,
    bulk: BulkLoad,
    /// Error and debug lines collected during the current request.
    messages: Vec<String>,
    debug_handler: Option<DebugHandler>,
}

impl Connection<TcpStream> {
    /// Open a TCP session and authenticate.
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let address = config.address();
        let stream = TcpStream::connect(&address).map_err(|e| {
            Error::Interface(format!(
                "server connection to {address} failed, is the Sedna server running? {e}"
            ))
        })?;

        stream
            .set_nodelay(true)
            .and_then(|_| stream.set_read_timeout(config.timeout))
            .and_then(|_| stream.set_write_timeout(config.timeout))
            .map_err(|e| Error::Interface(format!("could not configure socket: {e}")))?;

        info!("connected to {address}");
        Self::handshake(stream, config)
    }
}

impl<S: Read + Write> Connection<S> {
    /// Authenticate over an already-open stream. The stream is dropped (and
    /// so closed) when the handshake fails.
    pub fn handshake(stream: S, config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self {
            transport: Some(ProtocolTransport::new(stream)),
            config,
            transaction: TransactionState::Idle,
            items: ItemStream::default(),
            bulk: BulkLoad::default(),
            messages: Vec::new(),
            debug_handler: None,
        };

        match conn.authenticate() {
            Ok(()) => {
                info!(
                    "authenticated as {} on database {}",
                    conn.config.login, conn.config.database
                );
                Ok(conn)
            }
            Err(err) => {
                warn!("handshake failed: {err}");
                conn.transport = None;
                Err(err)
            }
        }
    }

    fn authenticate(&mut self) -> Result<()> {
        let mut state = HandshakeState::Connected;
        self.send(&Request::StartUp)?;
        state = state.sent();

        while !state.is_terminal() {
            let response = self.receive()?;
            let (next, action) = state.advance(response);

            match action {
                HandshakeAction::SendSessionParameters => {
                    let login = self.config.login.clone();
                    let database = self.config.database.clone();
                    self.send(&Request::SessionParameters {
                        login: login.as_bytes(),
                        database: database.as_bytes(),
                    })?;
                }
                HandshakeAction::SendAuthParameters => {
                    let password = self.config.password.clone();
                    self.send(&Request::AuthenticationParameters {
                        password: password.as_bytes(),
                    })?;
                }
                HandshakeAction::Wait | HandshakeAction::Done => {}
                HandshakeAction::Fail(err) => return Err(err),
            }
            state = next.sent();
        }
        Ok(())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// Send close-connection and drop the socket. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        self.messages.clear();
        let outcome = self.round_trip(&Request::CloseConnection);
        self.transport = None;
        self.transaction = TransactionState::Idle;
        info!("session on {} closed", self.config.address());

        match outcome? {
            Reply::Done => Ok(()),
            other => Err(unexpected_reply(&other)),
        }
    }

    pub fn trace_on(&mut self) {
        self.config.trace = true;
    }

    pub fn trace_off(&mut self) {
        self.config.trace = false;
    }

    /// Ask the server to send debug information along with query results.
    pub fn debug_on(&mut self) -> Result<()> {
        self.set_session_option(SessionOption::DebugOn)
    }

    pub fn debug_off(&mut self) -> Result<()> {
        self.set_session_option(SessionOption::DebugOff)
    }

    fn set_session_option(&mut self, option: SessionOption) -> Result<()> {
        self.messages.clear();
        self.expect_done(&Request::SetSessionOptions(option))
    }

    pub fn reset_session_options(&mut self) -> Result<()> {
        self.messages.clear();
        self.expect_done(&Request::ResetSessionOptions)
    }

    /// Receive debug-info diagnostics as they arrive.
    pub fn set_debug_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Diagnostic) + Send + 'static,
    {
        self.debug_handler = Some(Box::new(handler));
    }

    fn expect_done(&mut self, request: &Request<'_>) -> Result<()> {
        match self.round_trip(request)? {
            Reply::Done => Ok(()),
            other => Err(unexpected_reply(&other)),
        }
    }

    pub(crate) fn send(&mut self, request: &Request<'_>) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        let code = request.code();
        let body = request.body(transport.config())?;

        if self.config.trace {
            match request.trace_text() {
                Some(text) => debug!("(C) {code} {text}"),
                None => debug!("(C) {code}"),
            }
        }

        if let Err(err) = transport.write_frame(code, &body) {
            return Err(self.fault(err));
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Response> {
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
        let frame = match transport.read_frame() {
            Ok(frame) => frame,
            Err(err) => return Err(self.fault(err)),
        };

        let code = frame.code;
        let response = Response::decode(frame).map_err(|err| self.fault(err))?;

        if self.config.trace {
            if let Ok(code) = MessageCode::try_from(code) {
                match response.trace_text() {
                    Some(text) => debug!("(S) {code} {text}"),
                    None => debug!("(S) {code}"),
                }
            }
        }
        Ok(response)
    }

    /// A broken stream cannot be resynchronised; drop it.
    fn fault(&mut self, err: TransportError) -> Error {
        if err.is_fatal() {
            warn!("closing broken session: {err}");
            self.transport = None;
            self.transaction = TransactionState::Idle;
        }
        Error::Transport(err)
    }

    /// Send `request` and, unless it is a fire-and-forget portion, read until
    /// the exchange produces a value.
    pub(crate) fn round_trip(&mut self, request: &Request<'_>) -> Result<Reply> {
        self.send(request)?;
        if !request.expects_reply() {
            return Ok(Reply::Continue);
        }
        self.await_reply()
    }

    pub(crate) fn await_reply(&mut self) -> Result<Reply> {
        loop {
            let response = self.receive()?;
            match self.dispatch(response)? {
                Reply::Continue => continue,
                reply => return Ok(reply),
            }
        }
    }

    fn dispatch(&mut self, response: Response) -> Result<Reply> {
        match response {
            Response::ErrorResponse(diagnostic) => {
                self.transaction = TransactionState::Idle;
                self.bulk.reset();
                self.messages.push(diagnostic.to_string());
                Err(Error::Database {
                    code: diagnostic.code,
                    message: self.messages.join("\n"),
                })
            }
            Response::DebugInfo(diagnostic) => {
                if let Some(handler) = self.debug_handler.as_mut() {
                    handler(&diagnostic);
                }
                self.messages.push(diagnostic.to_string());
                Ok(Reply::Continue)
            }

            Response::BeginTransactionOk => {
                self.transaction = TransactionState::Active;
                Ok(Reply::Done)
            }
            Response::BeginTransactionFailed(diagnostic) => {
                self.transaction = TransactionState::Idle;
                Err(Error::TransactionBeginFailed(diagnostic))
            }
            Response::CommitTransactionOk | Response::RollbackTransactionOk => {
                self.transaction = TransactionState::Idle;
                Ok(Reply::Done)
            }
            Response::CommitTransactionFailed(diagnostic) => {
                self.transaction = TransactionState::Idle;
                Err(Error::TransactionFailed(diagnostic))
            }
            Response::RollbackTransactionFailed(diagnostic) => {
                self.transaction = TransactionState::Idle;
                Err(Error::RollbackFailed(diagnostic))
            }

            Response::QuerySucceeded => {
                self.items = ItemStream::started();
                Ok(Reply::Continue)
            }
            Response::QueryFailed(diagnostic) => Err(Error::Programming(diagnostic.to_string())),
            Response::UpdateSucceeded => Ok(Reply::Updated),
            Response::UpdateFailed(diagnostic) => Err(Error::database(&diagnostic)),
            Response::ItemPart(data) => {
                self.items.push_part(&data);
                Ok(Reply::Continue)
            }
            Response::ItemEnd(data) => {
                self.items.end_item(&data);
                Ok(Reply::Item)
            }
            Response::ResultEnd => {
                self.items.end_result();
                Ok(Reply::ResultEnd)
            }

            Response::BulkLoadFileName(path) => {
                self.upload_file(path)?;
                Ok(Reply::Continue)
            }
            Response::BulkLoadFromStream => {
                self.upload_stream()?;
                Ok(Reply::Continue)
            }
            Response::BulkLoadSucceeded => match self.bulk.finish() {
                Some(err) => Err(err),
                None => Ok(Reply::BulkLoaded),
            },
            Response::BulkLoadFailed(diagnostic) | Response::BulkLoadError(diagnostic) => {
                Err(self.bulk.finish().unwrap_or_else(|| Error::database(&diagnostic)))
            }
            Response::LastQueryTime(time) => Ok(Reply::Text(time)),

            Response::CloseConnectionOk
            | Response::SetSessionOptionsOk
            | Response::ResetSessionOptionsOk => Ok(Reply::Done),
            Response::TransactionRollbackBeforeClose => {
                warn!("transaction rolled back when connection closed");
                self.transaction = TransactionState::Idle;
                Ok(Reply::Done)
            }

            response @ (Response::SendSessionParameters
            | Response::SendAuthParameters
            | Response::AuthenticationOk
            | Response::AuthenticationFailed(_)
            | Response::Unexpected(_)) => Err(Error::Interface(format!(
                "unexpected {response:?} on an authenticated session"
            ))),
        }
    }
}

fn unexpected_reply(reply: &Reply) -> Error {
    Error::Interface(format!("unexpected server reply {reply:?}"))
}
