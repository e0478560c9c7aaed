use std::fmt;

use super::{
    MessageCode,
    codes::{DATA_PREFIX_LENGTH, DIAGNOSTIC_PREFIX_LENGTH},
    transport::{Frame, TransportError},
};

/// Server diagnostic carried by error, debug and `*_FAILED` messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Numeric code from the first four bytes; debug messages carry none.
    pub code: Option<u32>,
    pub text: String,
}

impl Diagnostic {
    /// Parse a body laid out as `code:u32 || 0x00 || length:u32 || text`.
    pub fn parse(body: &[u8]) -> Self {
        let code = body
            .get(..4)
            .map(|code| u32::from_be_bytes([code[0], code[1], code[2], code[3]]));
        let text = body.get(DIAGNOSTIC_PREFIX_LENGTH..).unwrap_or_default();

        Self {
            code,
            text: normalize_message(text),
        }
    }

    /// Debug output shares the error layout but its code is meaningless.
    pub fn parse_debug(body: &[u8]) -> Self {
        Self {
            code: None,
            ..Self::parse(body)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// Right-trim every line, expand tabs to four spaces and trim the whole text.
pub fn normalize_message(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .split('\n')
        .map(|line| line.trim_end().replace('\t', "    "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn data_payload(body: &[u8]) -> &[u8] {
    body.get(DATA_PREFIX_LENGTH..).unwrap_or_default()
}

/// Every message the server may send, decoded from its frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    SendSessionParameters,
    SendAuthParameters,
    AuthenticationOk,
    AuthenticationFailed(Diagnostic),

    ErrorResponse(Diagnostic),
    DebugInfo(Diagnostic),

    BeginTransactionOk,
    BeginTransactionFailed(Diagnostic),
    CommitTransactionOk,
    CommitTransactionFailed(Diagnostic),
    RollbackTransactionOk,
    RollbackTransactionFailed(Diagnostic),

    QuerySucceeded,
    QueryFailed(Diagnostic),
    UpdateSucceeded,
    UpdateFailed(Diagnostic),
    ItemPart(Vec<u8>),
    ItemEnd(Vec<u8>),
    ResultEnd,

    BulkLoadFileName(String),
    BulkLoadFromStream,
    BulkLoadSucceeded,
    BulkLoadFailed(Diagnostic),
    BulkLoadError(Diagnostic),
    LastQueryTime(String),

    CloseConnectionOk,
    TransactionRollbackBeforeClose,
    SetSessionOptionsOk,
    ResetSessionOptionsOk,

    /// A client-side code echoed back by the server.
    Unexpected(MessageCode),
}

impl Response {
    pub fn decode(frame: Frame) -> Result<Self, TransportError> {
        let code =
            MessageCode::try_from(frame.code).map_err(TransportError::UnknownMessage)?;
        let body = frame.body.as_slice();

        let response = match code {
            MessageCode::SendSessionParameters => Response::SendSessionParameters,
            MessageCode::SendAuthParameters => Response::SendAuthParameters,
            MessageCode::AuthenticationOk => Response::AuthenticationOk,
            MessageCode::AuthenticationFailed => {
                Response::AuthenticationFailed(Diagnostic::parse(body))
            }
            MessageCode::ErrorResponse => Response::ErrorResponse(Diagnostic::parse(body)),
            MessageCode::DebugInfo => Response::DebugInfo(Diagnostic::parse_debug(body)),
            MessageCode::BeginTransactionOk => Response::BeginTransactionOk,
            MessageCode::BeginTransactionFailed => {
                Response::BeginTransactionFailed(Diagnostic::parse(body))
            }
            MessageCode::CommitTransactionOk => Response::CommitTransactionOk,
            MessageCode::CommitTransactionFailed => {
                Response::CommitTransactionFailed(Diagnostic::parse(body))
            }
            MessageCode::RollbackTransactionOk => Response::RollbackTransactionOk,
            MessageCode::RollbackTransactionFailed => {
                Response::RollbackTransactionFailed(Diagnostic::parse(body))
            }
            MessageCode::QuerySucceeded => Response::QuerySucceeded,
            MessageCode::QueryFailed => Response::QueryFailed(Diagnostic::parse(body)),
            MessageCode::UpdateSucceeded => Response::UpdateSucceeded,
            MessageCode::UpdateFailed => Response::UpdateFailed(Diagnostic::parse(body)),
            MessageCode::ItemPart => Response::ItemPart(data_payload(body).to_vec()),
            MessageCode::ItemEnd => Response::ItemEnd(data_payload(body).to_vec()),
            MessageCode::ResultEnd => Response::ResultEnd,
            MessageCode::BulkLoadFileName => {
                Response::BulkLoadFileName(String::from_utf8(data_payload(body).to_vec())?)
            }
            MessageCode::BulkLoadFromStream => Response::BulkLoadFromStream,
            MessageCode::BulkLoadSucceeded => Response::BulkLoadSucceeded,
            MessageCode::BulkLoadFailed => Response::BulkLoadFailed(Diagnostic::parse(body)),
            MessageCode::BulkLoadError => Response::BulkLoadError(Diagnostic::parse(body)),
            MessageCode::LastQueryTime => {
                Response::LastQueryTime(normalize_message(data_payload(body)))
            }
            MessageCode::CloseConnectionOk => Response::CloseConnectionOk,
            MessageCode::TransactionRollbackBeforeClose => {
                Response::TransactionRollbackBeforeClose
            }
            MessageCode::SetSessionOptionsOk => Response::SetSessionOptionsOk,
            MessageCode::ResetSessionOptionsOk => Response::ResetSessionOptionsOk,
            other => Response::Unexpected(other),
        };
        Ok(response)
    }

    /// Readable text for trace output, protocol prefix already removed.
    pub fn trace_text(&self) -> Option<String> {
        let text = match self {
            Response::AuthenticationFailed(d)
            | Response::ErrorResponse(d)
            | Response::DebugInfo(d)
            | Response::BeginTransactionFailed(d)
            | Response::CommitTransactionFailed(d)
            | Response::RollbackTransactionFailed(d)
            | Response::QueryFailed(d)
            | Response::UpdateFailed(d)
            | Response::BulkLoadFailed(d)
            | Response::BulkLoadError(d) => d.text.clone(),
            Response::ItemPart(data) | Response::ItemEnd(data) => normalize_message(data),
            Response::BulkLoadFileName(text) | Response::LastQueryTime(text) => text.clone(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}
