//! Record framing.
//!
//! Every protocol document is terminated by [`RECORD_SEPARATOR`]. A single
//! websocket frame may carry several records, and a record may be split
//! across frames, so [`RecordReader`] buffers partial input.

/// ASCII record separator terminating every JSON record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Incremental splitter for record-separated text.
#[derive(Debug, Default)]
pub struct RecordReader {
    pending: String,
}

impl RecordReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and drain every complete record.
    ///
    /// Empty records (two separators in a row) are skipped.
    pub fn feed(&mut self, chunk: &str) -> std::vec::IntoIter<String> {
        self.pending.push_str(chunk);

        let mut records = Vec::new();
        while let Some(end) = self.pending.find(RECORD_SEPARATOR) {
            let record: String = self.pending.drain(..end).collect();
            self.pending.drain(..RECORD_SEPARATOR.len_utf8());
            if !record.trim().is_empty() {
                records.push(record);
            }
        }
        records.into_iter()
    }

    /// Whether a partial record is waiting for more input.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Terminate `json` with the record separator.
pub fn frame(json: &str) -> String {
    let mut out = String::with_capacity(json.len() + 1);
    out.push_str(json);
    out.push(RECORD_SEPARATOR);
    out
}
