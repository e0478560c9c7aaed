//! Sedna message type codes.
//!
//! Every frame on the wire starts with one of these codes. The values are
//! fixed by the server; the names follow the server's own protocol table.

/// Message type code carried in the first four bytes of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageCode {
    ErrorResponse = 100,
    StartUp = 110,
    SessionParameters = 120,
    AuthenticationParameters = 130,
    SendSessionParameters = 140,
    SendAuthParameters = 150,
    AuthenticationOk = 160,
    AuthenticationFailed = 170,

    BeginTransaction = 210,
    CommitTransaction = 220,
    RollbackTransaction = 225,
    BeginTransactionOk = 230,
    BeginTransactionFailed = 240,
    CommitTransactionOk = 250,
    RollbackTransactionOk = 255,
    CommitTransactionFailed = 260,
    RollbackTransactionFailed = 265,

    Execute = 300,
    ExecuteLong = 301,
    LongQueryEnd = 302,
    GetNextItem = 310,
    QuerySucceeded = 320,
    QueryFailed = 330,
    UpdateSucceeded = 340,
    UpdateFailed = 350,
    ItemPart = 360,
    ItemEnd = 370,
    ResultEnd = 375,

    BulkLoadError = 400,
    BulkLoadPortion = 410,
    BulkLoadEnd = 420,
    BulkLoadFileName = 430,
    BulkLoadFromStream = 431,
    BulkLoadSucceeded = 440,
    BulkLoadFailed = 450,
    ShowTime = 451,
    LastQueryTime = 452,

    CloseConnection = 500,
    CloseConnectionOk = 510,
    TransactionRollbackBeforeClose = 520,
    SetSessionOptions = 530,
    SetSessionOptionsOk = 540,
    ResetSessionOptions = 550,
    ResetSessionOptionsOk = 560,

    DebugInfo = 600,
}

/// Non-content bytes in front of data-class bodies: null byte + u32 length.
pub const DATA_PREFIX_LENGTH: usize = 5;
/// Non-content bytes in front of error/debug bodies: u32 code + null byte + u32 length.
pub const DIAGNOSTIC_PREFIX_LENGTH: usize = 9;

impl MessageCode {
    pub const ALL: [MessageCode; 45] = [
        Self::ErrorResponse,
        Self::StartUp,
        Self::SessionParameters,
        Self::AuthenticationParameters,
        Self::SendSessionParameters,
        Self::SendAuthParameters,
        Self::AuthenticationOk,
        Self::AuthenticationFailed,
        Self::BeginTransaction,
        Self::CommitTransaction,
        Self::RollbackTransaction,
        Self::BeginTransactionOk,
        Self::BeginTransactionFailed,
        Self::CommitTransactionOk,
        Self::RollbackTransactionOk,
        Self::CommitTransactionFailed,
        Self::RollbackTransactionFailed,
        Self::Execute,
        Self::ExecuteLong,
        Self::LongQueryEnd,
        Self::GetNextItem,
        Self::QuerySucceeded,
        Self::QueryFailed,
        Self::UpdateSucceeded,
        Self::UpdateFailed,
        Self::ItemPart,
        Self::ItemEnd,
        Self::ResultEnd,
        Self::BulkLoadError,
        Self::BulkLoadPortion,
        Self::BulkLoadEnd,
        Self::BulkLoadFileName,
        Self::BulkLoadFromStream,
        Self::BulkLoadSucceeded,
        Self::BulkLoadFailed,
        Self::ShowTime,
        Self::LastQueryTime,
        Self::CloseConnection,
        Self::CloseConnectionOk,
        Self::TransactionRollbackBeforeClose,
        Self::SetSessionOptions,
        Self::SetSessionOptionsOk,
        Self::ResetSessionOptions,
        Self::ResetSessionOptionsOk,
        Self::DebugInfo,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Number of bytes to skip before the content of a server body.
    pub fn prefix_length(self) -> usize {
        match self {
            Self::ErrorResponse | Self::DebugInfo => DIAGNOSTIC_PREFIX_LENGTH,
            Self::ItemPart | Self::ItemEnd | Self::BulkLoadFileName | Self::LastQueryTime => {
                DATA_PREFIX_LENGTH
            }
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ErrorResponse => "SEDNA_ERROR_RESPONSE",
            Self::StartUp => "SEDNA_START_UP",
            Self::SessionParameters => "SEDNA_SESSION_PARAMETERS",
            Self::AuthenticationParameters => "SEDNA_AUTHENTICATION_PARAMETERS",
            Self::SendSessionParameters => "SEDNA_SEND_SESSION_PARAMETERS",
            Self::SendAuthParameters => "SEDNA_SEND_AUTH_PARAMETERS",
            Self::AuthenticationOk => "SEDNA_AUTHENTICATION_OK",
            Self::AuthenticationFailed => "SEDNA_AUTHENTICATION_FAILED",
            Self::BeginTransaction => "SEDNA_BEGIN_TRANSACTION",
            Self::CommitTransaction => "SEDNA_COMMIT_TRANSACTION",
            Self::RollbackTransaction => "SEDNA_ROLLBACK_TRANSACTION",
            Self::BeginTransactionOk => "SEDNA_BEGIN_TRANSACTION_OK",
            Self::BeginTransactionFailed => "SEDNA_BEGIN_TRANSACTION_FAILED",
            Self::CommitTransactionOk => "SEDNA_COMMIT_TRANSACTION_OK",
            Self::RollbackTransactionOk => "SEDNA_ROLLBACK_TRANSACTION_OK",
            Self::CommitTransactionFailed => "SEDNA_COMMIT_TRANSACTION_FAILED",
            Self::RollbackTransactionFailed => "SEDNA_ROLLBACK_TRANSACTION_FAILED",
            Self::Execute => "SEDNA_EXECUTE",
            Self::ExecuteLong => "SEDNA_EXECUTE_LONG",
            Self::LongQueryEnd => "SEDNA_LONG_QUERY_END",
            Self::GetNextItem => "SEDNA_GET_NEXT_ITEM",
            Self::QuerySucceeded => "SEDNA_QUERY_SUCCEEDED",
            Self::QueryFailed => "SEDNA_QUERY_FAILED",
            Self::UpdateSucceeded => "SEDNA_UPDATE_SUCCEEDED",
            Self::UpdateFailed => "SEDNA_UPDATE_FAILED",
            Self::ItemPart => "SEDNA_ITEM_PART",
            Self::ItemEnd => "SEDNA_ITEM_END",
            Self::ResultEnd => "SEDNA_RESULT_END",
            Self::BulkLoadError => "SEDNA_BULKLOAD_ERROR",
            Self::BulkLoadPortion => "SEDNA_BULKLOAD_PORTION",
            Self::BulkLoadEnd => "SEDNA_BULKLOAD_END",
            Self::BulkLoadFileName => "SEDNA_BULKLOAD_FILENAME",
            Self::BulkLoadFromStream => "SEDNA_BULKLOAD_FROMSTREAM",
            Self::BulkLoadSucceeded => "SEDNA_BULKLOAD_SUCCEEDED",
            Self::BulkLoadFailed => "SEDNA_BULKLOAD_FAILED",
            Self::ShowTime => "SEDNA_SHOW_TIME",
            Self::LastQueryTime => "SEDNA_LAST_QUERY_TIME",
            Self::CloseConnection => "SEDNA_CLOSE_CONNECTION",
            Self::CloseConnectionOk => "SEDNA_CLOSE_CONNECTION_OK",
            Self::TransactionRollbackBeforeClose => "SEDNA_TRANSACTION_ROLLBACK_BEFORE_CLOSE",
            Self::SetSessionOptions => "SEDNA_SET_SESSION_OPTIONS",
            Self::SetSessionOptionsOk => "SEDNA_SET_SESSION_OPTIONS_OK",
            Self::ResetSessionOptions => "SEDNA_RESET_SESSION_OPTIONS",
            Self::ResetSessionOptionsOk => "SEDNA_RESET_SESSION_OPTIONS_OK",
            Self::DebugInfo => "SEDNA_DEBUG_INFO",
        }
    }
}

impl TryFrom<u32> for MessageCode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_u32() == value)
            .ok_or(value)
    }
}

impl std::fmt::Display for MessageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
