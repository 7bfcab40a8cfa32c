//! Incremental decoding of the `results` array in a query response.
//!
//! The response body arrives in chunks. Each completed array element is
//! decoded as soon as its closing byte is seen, so rows reach the caller
//! before the service has finished writing the body.

use crate::datastore::types::{DataStoreError, DataStoreResult, Record};

const RESULTS_KEY: &[u8] = b"results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Walking the top-level object looking for `"results": [`.
    Preamble,
    /// Inside the results array.
    Results,
    /// Array closed, or the object ended without one.
    Done,
}

/// Byte scanner that splits the `results` array into its elements.
#[derive(Debug)]
pub(crate) struct ResultsDecoder {
    buf: Vec<u8>,
    pos: usize,
    state: State,
    depth: usize,
    opened: bool,
    in_string: bool,
    escaped: bool,
    expect_key: bool,
    capturing_key: bool,
    key: Vec<u8>,
    results_next: bool,
    element_start: Option<usize>,
}

impl ResultsDecoder {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: State::Preamble,
            depth: 0,
            opened: false,
            in_string: false,
            escaped: false,
            expect_key: false,
            capturing_key: false,
            key: Vec::new(),
            results_next: false,
            element_start: None,
        }
    }

    /// True once no further chunk can yield a record.
    pub(crate) fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feed one body chunk, returning the records it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> DataStoreResult<Vec<Record>> {
        let mut records = Vec::new();
        if self.is_done() {
            return Ok(records);
        }
        self.buf.extend_from_slice(chunk);

        while self.pos < self.buf.len() && !self.is_done() {
            let i = self.pos;
            let b = self.buf[i];
            self.pos += 1;

            if self.in_string {
                self.scan_string(b);
                continue;
            }
            match self.state {
                State::Preamble => self.scan_preamble(b),
                State::Results => {
                    if let Some(record) = self.scan_results(i, b)? {
                        records.push(record);
                    }
                }
                State::Done => {}
            }
        }

        self.compact();
        Ok(records)
    }

    /// Check the body ended in a consistent place.
    pub(crate) fn finish(&self) -> DataStoreResult<()> {
        match self.state {
            State::Done => Ok(()),
            State::Results => Err(DataStoreError::Malformed(
                "response ended inside results".into(),
            )),
            State::Preamble if !self.opened => {
                Err(DataStoreError::Malformed("response is not a JSON object".into()))
            }
            State::Preamble => Err(DataStoreError::Malformed("response truncated".into())),
        }
    }

    fn scan_string(&mut self, b: u8) {
        if self.escaped {
            self.escaped = false;
        } else if b == b'\\' {
            self.escaped = true;
        } else if b == b'"' {
            self.in_string = false;
            self.capturing_key = false;
            return;
        }
        if self.capturing_key {
            self.key.push(b);
        }
    }

    fn scan_preamble(&mut self, b: u8) {
        match b {
            b'"' => {
                self.in_string = true;
                if self.depth == 1 && self.expect_key {
                    self.capturing_key = true;
                    self.key.clear();
                } else if self.depth == 1 {
                    self.results_next = false;
                }
            }
            b'[' if self.depth == 1 && self.results_next => {
                self.state = State::Results;
                self.depth = 2;
                self.element_start = None;
            }
            b'{' | b'[' => {
                self.depth += 1;
                if self.depth == 1 {
                    self.opened = true;
                    self.expect_key = true;
                }
                self.results_next = false;
            }
            b'}' | b']' => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 && self.opened {
                    self.state = State::Done;
                }
            }
            b':' if self.depth == 1 => {
                self.expect_key = false;
                self.results_next = self.key == RESULTS_KEY;
            }
            b',' if self.depth == 1 => {
                self.expect_key = true;
                self.results_next = false;
            }
            b if b.is_ascii_whitespace() => {}
            _ if self.depth == 1 => self.results_next = false,
            _ => {}
        }
    }

    fn scan_results(&mut self, i: usize, b: u8) -> DataStoreResult<Option<Record>> {
        match b {
            b'"' => {
                self.in_string = true;
                self.element_start.get_or_insert(i);
            }
            b'{' | b'[' => {
                self.element_start.get_or_insert(i);
                self.depth += 1;
            }
            b'}' | b']' if self.depth > 2 => self.depth -= 1,
            b']' => {
                let record = self.take_element(i)?;
                self.state = State::Done;
                self.depth = 1;
                return Ok(record);
            }
            b',' if self.depth == 2 => {
                return match self.take_element(i)? {
                    Some(record) => Ok(Some(record)),
                    None => Err(DataStoreError::Malformed("empty element in results".into())),
                };
            }
            b if b.is_ascii_whitespace() => {}
            _ => {
                self.element_start.get_or_insert(i);
            }
        }
        Ok(None)
    }

    fn take_element(&mut self, end: usize) -> DataStoreResult<Option<Record>> {
        let Some(start) = self.element_start.take() else {
            return Ok(None);
        };
        serde_json::from_slice(&self.buf[start..end])
            .map(Some)
            .map_err(|e| DataStoreError::Malformed(e.to_string()))
    }

    /// Drop bytes no pending element still needs.
    fn compact(&mut self) {
        let keep_from = self.element_start.unwrap_or(self.pos);
        if keep_from == 0 {
            return;
        }
        self.buf.drain(..keep_from);
        self.pos -= keep_from;
        if let Some(start) = self.element_start.as_mut() {
            *start -= keep_from;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_in_chunks(body: &str, size: usize) -> DataStoreResult<Vec<Record>> {
        let mut decoder = ResultsDecoder::new();
        let mut records = Vec::new();
        for chunk in body.as_bytes().chunks(size) {
            records.extend(decoder.push(chunk)?);
        }
        decoder.finish()?;
        Ok(records)
    }

    #[test]
    fn test_rows_split_across_chunks() {
        let body = r#"{"requestID": "r-1", "signature": {"results": "json"},
            "results": [{"name": "a, [b]", "tags": ["x"]}, 2, "three", null],
            "status": "success"}"#;
        let expected = vec![json!({"name": "a, [b]", "tags": ["x"]}), json!(2), json!("three"), json!(null)];

        for size in [1, 3, 7, body.len()] {
            assert_eq!(decode_in_chunks(body, size).unwrap(), expected, "chunk size {size}");
        }
    }

    #[test]
    fn test_rows_emitted_before_body_ends() {
        let mut decoder = ResultsDecoder::new();
        let first = decoder.push(br#"{"results": [{"id": 1}, {"id""#).unwrap();
        assert_eq!(first, vec![json!({"id": 1})]);
        assert!(!decoder.is_done());

        let rest = decoder.push(br#": 2}], "status": "success"}"#).unwrap();
        assert_eq!(rest, vec![json!({"id": 2})]);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_escaped_quotes_and_nested_key() {
        let body = r#"{"meta": {"results": [9]}, "note": "\"results\": [8]", "results": ["q\"]"]}"#;
        assert_eq!(decode_in_chunks(body, 4).unwrap(), vec![json!("q\"]")]);
    }

    #[test]
    fn test_empty_and_missing_results() {
        assert_eq!(decode_in_chunks(r#"{"results": []}"#, 2).unwrap(), Vec::<Record>::new());
        assert_eq!(decode_in_chunks(r#"{"status": "success"}"#, 5).unwrap(), Vec::<Record>::new());
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(
            decode_in_chunks("not json", 3),
            Err(DataStoreError::Malformed(_))
        ));
        assert!(matches!(
            decode_in_chunks(r#"{"results": [{"a": 1}"#, 3),
            Err(DataStoreError::Malformed(_))
        ));
        assert!(matches!(
            decode_in_chunks(r#"{"results": [tru]}"#, 3),
            Err(DataStoreError::Malformed(_))
        ));
    }
}
