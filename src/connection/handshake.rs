//! Session start-up and authentication.
//!
//! After the client sends start-up, the server asks for session parameters,
//! then for the password, and finally accepts or rejects the session. The
//! states here mirror that exchange; [`HandshakeState::advance`] is the whole
//! transition table.
use log::debug;

use crate::{Error, protocol::Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Connected,
    AwaitingSessionRequest,
    SessionParamsSent,
    AwaitingAuthRequest,
    AuthParamsSent,
    Authenticated,
    Failed,
}

/// What the client must do in reaction to a server message.
#[derive(Debug)]
pub enum HandshakeAction {
    SendSessionParameters,
    SendAuthParameters,
    /// Nothing to send; keep reading.
    Wait,
    Done,
    Fail(Error),
}

impl HandshakeState {
    /// State after the client's own message for this state went out.
    pub fn sent(self) -> Self {
        match self {
            Self::Connected => Self::AwaitingSessionRequest,
            Self::SessionParamsSent => Self::AwaitingAuthRequest,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed)
    }

    pub fn advance(self, response: Response) -> (Self, HandshakeAction) {
        debug!("handshake in state {self:?} received {response:?}");

        match (self, response) {
            (Self::AwaitingSessionRequest, Response::SendSessionParameters) => {
                (Self::SessionParamsSent, HandshakeAction::SendSessionParameters)
            }
            (Self::AwaitingAuthRequest, Response::SendAuthParameters) => {
                (Self::AuthParamsSent, HandshakeAction::SendAuthParameters)
            }
            // Servers running without security accept right after the session parameters.
            (Self::AuthParamsSent | Self::AwaitingAuthRequest, Response::AuthenticationOk) => {
                (Self::Authenticated, HandshakeAction::Done)
            }
            (state, Response::DebugInfo(_)) if !state.is_terminal() => {
                (state, HandshakeAction::Wait)
            }
            (_, Response::AuthenticationFailed(diagnostic)) => (
                Self::Failed,
                HandshakeAction::Fail(Error::Authentication(diagnostic)),
            ),
            (_, Response::ErrorResponse(diagnostic)) => (
                Self::Failed,
                HandshakeAction::Fail(Error::Operational(diagnostic)),
            ),
            (state, response) => (
                Self::Failed,
                HandshakeAction::Fail(Error::Interface(format!(
                    "unexpected {response:?} during handshake in state {state:?}"
                ))),
            ),
        }
    }
}
