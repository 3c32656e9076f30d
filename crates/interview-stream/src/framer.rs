//! Splits decoded SSE text into blank-line-delimited records.

/// One complete SSE record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    /// Value of the `event:` field, when present.
    pub event: Option<String>,
    /// Joined `data:` lines; `None` when the record carried no data field.
    pub data: Option<String>,
    /// Record text as received, without the delimiter.
    pub raw: String,
}

/// Incremental record framer with a carry buffer for the trailing fragment.
///
/// The carry buffer never holds a complete record: every delimiter found by
/// [`EventFramer::push`] is flushed before it returns.
#[derive(Debug, Default)]
pub struct EventFramer {
    carry: String,
    // Byte offset from which the next delimiter search may start.
    scanned: usize,
}

impl EventFramer {
    /// Appends decoded text and returns every record it completes, in order.
    pub fn push(&mut self, text: &str) -> Vec<SseRecord> {
        self.carry.push_str(text);
        let mut records = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some((idx, delim_len)) = find_frame_delimiter(self.carry.as_bytes(), from) {
            if let Some(record) = parse_record(&self.carry[consumed..idx]) {
                records.push(record);
            }
            consumed = idx + delim_len;
            from = consumed;
        }
        self.carry.drain(..consumed);
        // A delimiter is at most 4 bytes, so only the last 3 can start one.
        self.scanned = self.carry.len().saturating_sub(3);
        debug_assert!(find_frame_delimiter(self.carry.as_bytes(), 0).is_none());
        records
    }

    /// Flushes the trailing fragment as a final record at end of stream.
    pub fn finish(&mut self) -> Option<SseRecord> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.carry);
        parse_record(&rest)
    }

    /// Text received but not yet part of a complete record.
    pub fn carry_buffer(&self) -> &str {
        &self.carry
    }
}

fn find_frame_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_record(text: &str) -> Option<SseRecord> {
    if text.trim().is_empty() {
        return None;
    }
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    Some(SseRecord {
        event,
        data: (!data_lines.is_empty()).then(|| data_lines.join("\n")),
        raw: text.to_string(),
    })
}
