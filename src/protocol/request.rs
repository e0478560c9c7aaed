use bincode::encode_to_vec;

use super::{
    MessageCode,
    transport::{TransportError, WireConfig, ZString},
};

pub const VERSION_MAJOR: u8 = 3;
pub const VERSION_MINOR: u8 = 0;

/// Output format the server should use for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultFormat {
    #[default]
    Xml,
    /// Parenthesised S-expression rendering of the XML.
    SXml,
}

impl From<ResultFormat> for u8 {
    fn from(value: ResultFormat) -> Self {
        match value {
            ResultFormat::Xml => 0,
            ResultFormat::SXml => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOption {
    DebugOn,
    DebugOff,
}

impl From<SessionOption> for u32 {
    fn from(value: SessionOption) -> Self {
        match value {
            SessionOption::DebugOn => 1,
            SessionOption::DebugOff => 2,
        }
    }
}

/// Messages the client sends. Text fields are UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    StartUp,
    SessionParameters { login: &'a [u8], database: &'a [u8] },
    AuthenticationParameters { password: &'a [u8] },
    BeginTransaction,
    CommitTransaction,
    RollbackTransaction,
    Execute { format: ResultFormat, query: &'a [u8] },
    ExecuteLong { format: ResultFormat, chunk: &'a [u8] },
    LongQueryEnd,
    GetNextItem,
    BulkLoadPortion(&'a [u8]),
    BulkLoadEnd,
    ShowTime,
    SetSessionOptions(SessionOption),
    ResetSessionOptions,
    CloseConnection,
}

impl Request<'_> {
    pub fn code(&self) -> MessageCode {
        match self {
            Request::StartUp => MessageCode::StartUp,
            Request::SessionParameters { .. } => MessageCode::SessionParameters,
            Request::AuthenticationParameters { .. } => MessageCode::AuthenticationParameters,
            Request::BeginTransaction => MessageCode::BeginTransaction,
            Request::CommitTransaction => MessageCode::CommitTransaction,
            Request::RollbackTransaction => MessageCode::RollbackTransaction,
            Request::Execute { .. } => MessageCode::Execute,
            Request::ExecuteLong { .. } => MessageCode::ExecuteLong,
            Request::LongQueryEnd => MessageCode::LongQueryEnd,
            Request::GetNextItem => MessageCode::GetNextItem,
            Request::BulkLoadPortion(_) => MessageCode::BulkLoadPortion,
            Request::BulkLoadEnd => MessageCode::BulkLoadEnd,
            Request::ShowTime => MessageCode::ShowTime,
            Request::SetSessionOptions(_) => MessageCode::SetSessionOptions,
            Request::ResetSessionOptions => MessageCode::ResetSessionOptions,
            Request::CloseConnection => MessageCode::CloseConnection,
        }
    }

    /// Portions of a long query or a bulk load are written without waiting
    /// for a reply; the closing message collects the single answer.
    pub fn expects_reply(&self) -> bool {
        !matches!(
            self,
            Request::ExecuteLong { .. } | Request::BulkLoadPortion(_)
        )
    }

    pub fn body(&self, config: WireConfig) -> Result<Vec<u8>, TransportError> {
        let body = match self {
            Request::SessionParameters { login, database } => encode_to_vec(
                (
                    VERSION_MAJOR,
                    VERSION_MINOR,
                    ZString(login),
                    ZString(database),
                ),
                config,
            )?,
            Request::AuthenticationParameters { password } => {
                encode_to_vec(ZString(password), config)?
            }
            Request::Execute { format, query } => {
                encode_to_vec((u8::from(*format), ZString(query)), config)?
            }
            Request::ExecuteLong { format, chunk } => {
                encode_to_vec((u8::from(*format), ZString(chunk)), config)?
            }
            Request::BulkLoadPortion(data) => encode_to_vec(ZString(data), config)?,
            Request::SetSessionOptions(option) => {
                encode_to_vec((u32::from(*option), ZString(b"")), config)?
            }
            Request::StartUp
            | Request::BeginTransaction
            | Request::CommitTransaction
            | Request::RollbackTransaction
            | Request::LongQueryEnd
            | Request::GetNextItem
            | Request::BulkLoadEnd
            | Request::ShowTime
            | Request::ResetSessionOptions
            | Request::CloseConnection => Vec::new(),
        };
        Ok(body)
    }

    /// Human-readable part of the body for trace output. Passwords are never shown.
    pub fn trace_text(&self) -> Option<String> {
        match self {
            Request::SessionParameters { login, database } => Some(format!(
                "{} {}",
                String::from_utf8_lossy(login),
                String::from_utf8_lossy(database)
            )),
            Request::Execute { query: text, .. }
            | Request::ExecuteLong { chunk: text, .. }
            | Request::BulkLoadPortion(text) => {
                let text = String::from_utf8_lossy(text);
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::transport::wire_config;

    #[test]
    fn session_parameters_body() {
        let request = Request::SessionParameters {
            login: b"SYSTEM",
            database: b"test",
        };
        let body = request.body(wire_config()).unwrap();

        assert_eq!(request.code(), MessageCode::SessionParameters);
        assert_eq!(body, b"\x03\x00\0\0\0\0\x06SYSTEM\0\0\0\0\x04test");
    }

    #[test]
    fn execute_body_carries_format_byte() {
        let request = Request::Execute {
            format: ResultFormat::SXml,
            query: b"doc('a')",
        };
        let body = request.body(wire_config()).unwrap();

        assert_eq!(body[0], 1);
        assert_eq!(&body[1..6], &[0, 0, 0, 0, 8]);
        assert_eq!(&body[6..], b"doc('a')");
    }

    #[test]
    fn session_options_body() {
        let body = Request::SetSessionOptions(SessionOption::DebugOn)
            .body(wire_config())
            .unwrap();

        assert_eq!(body, vec![0, 0, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn fire_and_forget_requests() {
        assert!(!Request::BulkLoadPortion(b"x").expects_reply());
        assert!(
            !Request::ExecuteLong {
                format: ResultFormat::Xml,
                chunk: b"x"
            }
            .expects_reply()
        );
        assert!(Request::LongQueryEnd.expects_reply());
        assert!(Request::BulkLoadEnd.expects_reply());
    }

    #[test]
    fn password_is_not_traced() {
        let request = Request::AuthenticationParameters { password: b"MANAGER" };
        assert_eq!(request.trace_text(), None);
    }
}
