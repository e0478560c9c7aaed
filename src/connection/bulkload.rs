//! Document upload.
//!
//! A `LOAD` statement makes the server ask, mid-query, for the document
//! bytes: either by naming a local file (`LOAD "file" "doc"`) or by asking
//! for the client's input stream (`LOAD STDIN "doc"`). The client answers
//! with bulk-load portions, none of which is acknowledged, then a bulk-load
//! end after which the server reports success or failure.
use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use super::{Connection, QueryResult};
use crate::{
    Error, Result,
    protocol::{LOAD_BUFFER_SIZE, Request},
};

/// Bulk-load bookkeeping for the statement in flight.
#[derive(Debug, Default)]
pub(crate) struct BulkLoad {
    /// Document supplied by [`Connection::load_text`].
    input: Option<Vec<u8>>,
    /// Local failure to report once the server's verdict has been read.
    failure: Option<Error>,
}

impl BulkLoad {
    pub(crate) fn reset(&mut self) {
        self.input = None;
        self.failure = None;
    }

    pub(crate) fn clear_failure(&mut self) {
        self.failure = None;
    }

    /// The exchange is over; hand back any local failure.
    pub(crate) fn finish(&mut self) -> Option<Error> {
        self.input = None;
        self.failure.take()
    }
}

/// `LOAD <source> "doc" ["collection"]` with XQuery string escaping.
fn load_statement(source: &str, document: &str, collection: Option<&str>) -> String {
    let quote = |s: &str| format!("\"{}\"", s.replace('"', "\"\""));

    let mut statement = format!("LOAD {source} {}", quote(document));
    if let Some(collection) = collection {
        statement.push(' ');
        statement.push_str(&quote(collection));
    }
    statement
}

impl<S: Read + Write> Connection<S> {
    /// Store `text` as document `document`, optionally inside `collection`.
    pub fn load_text(
        &mut self,
        text: &str,
        document: &str,
        collection: Option<&str>,
    ) -> Result<QueryResult<'_, S>> {
        self.bulk.input = Some(text.as_bytes().to_vec());
        let statement = load_statement("STDIN", document, collection);
        self.query(&statement)
    }

    /// Store the local file at `path` as document `document`. Files not in
    /// UTF-8 must declare their encoding in the XML header.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        document: &str,
        collection: Option<&str>,
    ) -> Result<QueryResult<'_, S>> {
        let path = path.as_ref().to_string_lossy().replace('"', "\"\"");
        let statement = load_statement(&format!("\"{path}\""), document, collection);
        self.query(&statement)
    }

    pub(crate) fn upload_file(&mut self, path: String) -> Result<()> {
        let path = PathBuf::from(path);
        debug!("server requested bulk load of {}", path.display());

        match File::open(&path) {
            Ok(file) => self.upload(BufReader::new(file), &path),
            Err(source) => self.abandon_upload(Error::BulkLoadSource { path, source }),
        }
    }

    pub(crate) fn upload_stream(&mut self) -> Result<()> {
        match self.bulk.input.take() {
            Some(input) => self.upload(input.as_slice(), Path::new("<stdin>")),
            None => self.abandon_upload(Error::Programming(
                "server requested a bulk-load stream but no text was supplied".to_string(),
            )),
        }
    }

    /// Stream `source` in portions, then close the upload.
    fn upload<R: Read>(&mut self, mut source: R, origin: &Path) -> Result<()> {
        let mut portions = 0;
        loop {
            let mut chunk = Vec::with_capacity(LOAD_BUFFER_SIZE);
            if let Err(err) = source
                .by_ref()
                .take(LOAD_BUFFER_SIZE as u64)
                .read_to_end(&mut chunk)
            {
                return self.abandon_upload(Error::BulkLoadSource {
                    path: origin.to_path_buf(),
                    source: err,
                });
            }
            if chunk.is_empty() {
                break;
            }

            self.send(&Request::BulkLoadPortion(&chunk))?;
            portions += 1;
        }

        debug!("sent {portions} bulk-load portions from {}", origin.display());
        self.send(&Request::BulkLoadEnd)
    }

    /// End the upload early so the session stays in step with the server;
    /// `failure` is reported once the server answers.
    fn abandon_upload(&mut self, failure: Error) -> Result<()> {
        warn!("abandoning bulk load: {failure}");
        self.bulk.failure = Some(failure);
        self.send(&Request::BulkLoadEnd)
    }
}
