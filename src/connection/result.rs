//! Pull-based query results.
//!
//! The server hands out one item per get-next-item request. The first item
//! arrives unasked right after query-succeeded, so by the time
//! [`Connection::execute`] returns an item is already buffered. Each call to
//! [`QueryResult::next`] takes the buffered item and, while the server has
//! more, asks for the following one before returning.
use std::{
    io::{Read, Write},
    net::TcpStream,
};

use log::debug;

use super::{Connection, Reply, unexpected_reply};
use crate::{
    Error, Result,
    protocol::{HEADER_LENGTH, LOAD_BUFFER_SIZE, MAX_FRAME_LENGTH, Request, ResultFormat},
};

/// Format byte plus z-string prefix in front of the query text.
const EXECUTE_PREFIX_LENGTH: usize = 6;

/// Item reassembly state for the query in flight.
#[derive(Debug, Default)]
pub(crate) struct ItemStream {
    /// Parts of the item being received; `None` until the first part arrives.
    parts: Option<Vec<u8>>,
    current: Option<Vec<u8>>,
    more: bool,
}

impl ItemStream {
    pub(crate) fn started() -> Self {
        Self {
            parts: None,
            current: None,
            more: true,
        }
    }

    pub(crate) fn push_part(&mut self, data: &[u8]) {
        self.parts.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    pub(crate) fn end_item(&mut self, data: &[u8]) {
        let mut item = self.parts.take().unwrap_or_default();
        item.extend_from_slice(data);
        self.current = Some(item);
    }

    /// A partially received item still counts as the last one.
    pub(crate) fn end_result(&mut self) {
        self.more = false;
        self.current = self.parts.take();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// A query producing a sequence of items.
    Items,
    Update,
    BulkLoad,
}

/// Output of one statement. Iterating yields each item as text.
pub struct QueryResult<'c, S: Read + Write = TcpStream> {
    conn: &'c mut Connection<S>,
    kind: ResultKind,
    time: Option<String>,
    failure: Option<Error>,
}

impl<'c, S: Read + Write> QueryResult<'c, S> {
    fn new(conn: &'c mut Connection<S>, kind: ResultKind) -> Self {
        Self {
            conn,
            kind,
            time: None,
            failure: None,
        }
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    /// True for updates and bulk loads, which carry no items.
    pub fn is_update(&self) -> bool {
        self.kind != ResultKind::Items
    }

    /// Concatenation of every remaining item.
    pub fn value(self) -> Result<String> {
        let mut value = String::new();
        for item in self {
            value.push_str(&item?);
        }
        Ok(value)
    }

    /// Server-side processing time of the last query.
    pub fn time(&mut self) -> Result<&str> {
        if self.time.is_none() {
            self.time = Some(self.conn.last_query_time()?);
        }
        Ok(self.time.as_deref().unwrap_or_default())
    }
}

impl<S: Read + Write> Iterator for QueryResult<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.failure.take() {
            return Some(Err(err));
        }
        if self.kind != ResultKind::Items {
            return None;
        }

        let current = self.conn.items.current.take()?;
        if self.conn.items.more {
            // Read ahead; a failure is reported after the item in hand.
            if let Err(err) = self.conn.fetch_next_item() {
                self.conn.items.more = false;
                self.failure = Some(err);
            }
        }
        Some(String::from_utf8(current).map_err(Error::from))
    }
}

impl<S: Read + Write> Connection<S> {
    /// Run `query`, beginning a transaction first if none is open.
    pub fn execute(&mut self, query: &str, format: ResultFormat) -> Result<QueryResult<'_, S>> {
        let outcome = self.run_statement(query.as_bytes(), format);
        // Text queued by `load_text` belongs to this statement only.
        self.bulk.reset();
        Ok(QueryResult::new(self, outcome?))
    }

    /// [`Connection::execute`] with the configured result format.
    pub fn query(&mut self, query: &str) -> Result<QueryResult<'_, S>> {
        let format = self.config.format;
        self.execute(query, format)
    }

    fn run_statement(&mut self, query: &[u8], format: ResultFormat) -> Result<ResultKind> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        self.messages.clear();
        if !self.in_transaction() {
            self.begin()?;
        }

        self.items = ItemStream::default();
        self.bulk.clear_failure();
        match self.submit_query(query, format)? {
            Reply::Item | Reply::ResultEnd => Ok(ResultKind::Items),
            Reply::Updated => Ok(ResultKind::Update),
            Reply::BulkLoaded => Ok(ResultKind::BulkLoad),
            other => Err(unexpected_reply(&other)),
        }
    }

    fn submit_query(&mut self, query: &[u8], format: ResultFormat) -> Result<Reply> {
        if HEADER_LENGTH + EXECUTE_PREFIX_LENGTH + query.len() <= MAX_FRAME_LENGTH {
            return self.round_trip(&Request::Execute { format, query });
        }

        let chunks = query.chunks(LOAD_BUFFER_SIZE);
        debug!("sending {} byte query in {} parts", query.len(), chunks.len());
        for chunk in chunks {
            self.send(&Request::ExecuteLong { format, chunk })?;
        }
        self.round_trip(&Request::LongQueryEnd)
    }

    /// Server-side processing time of the most recent query.
    pub fn last_query_time(&mut self) -> Result<String> {
        match self.round_trip(&Request::ShowTime)? {
            Reply::Text(time) => Ok(time),
            other => Err(unexpected_reply(&other)),
        }
    }

    pub(crate) fn fetch_next_item(&mut self) -> Result<()> {
        match self.round_trip(&Request::GetNextItem)? {
            Reply::Item | Reply::ResultEnd => Ok(()),
            other => Err(unexpected_reply(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        connection::testing::{ServerScript, connect_scripted},
        protocol::{Frame, MessageCode},
    };

    fn query_script() -> ServerScript {
        ServerScript::new()
            .message(MessageCode::BeginTransactionOk)
            .message(MessageCode::QuerySucceeded)
    }

    #[test]
    fn multi_part_item_is_one_string() {
        let mut conn = connect_scripted(
            query_script()
                .data(MessageCode::ItemPart, b"<documents>")
                .data(MessageCode::ItemPart, b"</documents>")
                .message(MessageCode::ItemEnd)
                .message(MessageCode::ResultEnd),
        );

        let items = conn
            .execute(r#"doc("$documents")"#, ResultFormat::Xml)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(items, vec!["<documents></documents>".to_string()]);
        assert_eq!(
            conn.sent_codes(),
            vec![
                MessageCode::BeginTransaction.as_u32(),
                MessageCode::Execute.as_u32(),
                MessageCode::GetNextItem.as_u32(),
            ]
        );
    }

    #[test]
    fn items_arrive_in_order_with_read_ahead() {
        let mut conn = connect_scripted(
            query_script()
                .data(MessageCode::ItemPart, b"1")
                .message(MessageCode::ItemEnd)
                .data(MessageCode::ItemPart, b"2")
                .message(MessageCode::ItemEnd)
                .data(MessageCode::ItemPart, b"3")
                .message(MessageCode::ItemEnd)
                .message(MessageCode::ResultEnd),
        );

        let mut result = conn.execute("1 to 3", ResultFormat::Xml).unwrap();
        assert_eq!(result.next().unwrap().unwrap(), "1");
        assert_eq!(result.next().unwrap().unwrap(), "2");
        assert_eq!(result.next().unwrap().unwrap(), "3");
        assert!(result.next().is_none());
        assert!(result.next().is_none());
        drop(result);

        let get_next = conn
            .sent_codes()
            .into_iter()
            .filter(|code| *code == MessageCode::GetNextItem.as_u32())
            .count();
        assert_eq!(get_next, 3);
    }

    #[test]
    fn partial_item_is_flushed_on_result_end() {
        let mut conn = connect_scripted(
            query_script()
                .data(MessageCode::ItemPart, b"half")
                .message(MessageCode::ResultEnd),
        );

        let value = conn.execute("q", ResultFormat::Xml).unwrap().value().unwrap();
        assert_eq!(value, "half");
    }

    #[test]
    fn empty_result() {
        let mut conn = connect_scripted(query_script().message(MessageCode::ResultEnd));

        let mut result = conn.execute("()", ResultFormat::Xml).unwrap();
        assert!(!result.is_update());
        assert!(result.next().is_none());
    }

    #[test]
    fn value_concatenates_items() {
        let mut conn = connect_scripted(
            query_script()
                .data(MessageCode::ItemPart, b"a")
                .message(MessageCode::ItemEnd)
                .data(MessageCode::ItemPart, b"b")
                .message(MessageCode::ItemEnd)
                .message(MessageCode::ResultEnd),
        );

        assert_eq!(conn.query("q").unwrap().value().unwrap(), "ab");
    }

    #[test]
    fn update_result_has_no_items() {
        let mut conn = connect_scripted(
            ServerScript::new()
                .message(MessageCode::BeginTransactionOk)
                .message(MessageCode::UpdateSucceeded),
        );

        let mut result = conn
            .execute("UPDATE delete doc('a')/x", ResultFormat::Xml)
            .unwrap();
        assert_eq!(result.kind(), ResultKind::Update);
        assert!(result.next().is_none());
    }

    #[test]
    fn query_failed_is_programming_error() {
        let mut conn = connect_scripted(
            ServerScript::new()
                .message(MessageCode::BeginTransactionOk)
                .diagnostic(MessageCode::QueryFailed, 5, "syntax error"),
        );

        let err = conn.execute("doc(", ResultFormat::Xml).err().unwrap();
        assert!(matches!(err, Error::Programming(ref text) if text == "[5] syntax error"));
        assert!(conn.in_transaction());
    }

    #[test]
    fn update_failed_is_database_error() {
        let mut conn = connect_scripted(
            ServerScript::new()
                .message(MessageCode::BeginTransactionOk)
                .diagnostic(MessageCode::UpdateFailed, 8, "constraint"),
        );

        let err = conn.execute("UPDATE x", ResultFormat::Xml).err().unwrap();
        assert!(matches!(err, Error::Database { code: Some(8), .. }));
    }

    #[test]
    fn long_query_is_split() {
        let mut conn = connect_scripted(query_script().message(MessageCode::ResultEnd));
        let query = "x".repeat(12_000);

        conn.execute(&query, ResultFormat::SXml).unwrap();

        let frames: Vec<Frame> = conn.sent_frames().into_iter().skip(4).collect();
        let (last, chunks) = frames.split_last().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(last.code, MessageCode::LongQueryEnd.as_u32());
        assert!(last.body.is_empty());

        let mut reassembled = Vec::new();
        for chunk in chunks {
            assert_eq!(chunk.code, MessageCode::ExecuteLong.as_u32());
            assert!(chunk.body.len() <= LOAD_BUFFER_SIZE + EXECUTE_PREFIX_LENGTH);
            assert_eq!(chunk.body[0], 1);
            reassembled.extend_from_slice(&chunk.body[EXECUTE_PREFIX_LENGTH..]);
        }
        assert_eq!(reassembled, query.as_bytes());
    }

    #[test]
    fn largest_single_frame_query() {
        let mut conn = connect_scripted(query_script().message(MessageCode::ResultEnd));
        let query = "y".repeat(MAX_FRAME_LENGTH - HEADER_LENGTH - EXECUTE_PREFIX_LENGTH);

        conn.execute(&query, ResultFormat::Xml).unwrap();

        let frames = conn.sent_frames();
        assert_eq!(frames[4].code, MessageCode::Execute.as_u32());
        assert_eq!(frames.len(), 5);
    }

    #[test]
    fn error_while_reading_ahead_follows_item() {
        let mut conn = connect_scripted(
            query_script()
                .data(MessageCode::ItemPart, b"first")
                .message(MessageCode::ItemEnd)
                .diagnostic(MessageCode::ErrorResponse, 99, "out of memory"),
        );

        let mut result = conn.execute("q", ResultFormat::Xml).unwrap();
        assert_eq!(result.next().unwrap().unwrap(), "first");
        assert!(matches!(result.next(), Some(Err(Error::Database { .. }))));
        assert!(result.next().is_none());
        drop(result);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn show_time() {
        let mut conn = connect_scripted(
            query_script()
                .message(MessageCode::ResultEnd)
                .data(MessageCode::LastQueryTime, b"0.012"),
        );

        let mut result = conn.execute("q", ResultFormat::Xml).unwrap();
        assert_eq!(result.time().unwrap(), "0.012");
        assert_eq!(result.time().unwrap(), "0.012");
    }

    #[test]
    fn invalid_utf8_item() {
        let mut conn = connect_scripted(
            query_script()
                .data(MessageCode::ItemPart, &[0xff, 0xfe])
                .message(MessageCode::ItemEnd)
                .message(MessageCode::ResultEnd),
        );

        let mut result = conn.execute("q", ResultFormat::Xml).unwrap();
        assert!(matches!(result.next(), Some(Err(Error::Utf8(_)))));
    }
}
