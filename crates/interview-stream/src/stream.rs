use serde_json::Value;

/// Classification of one streamed record.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// Incremental text to append to the answer being built.
    TextDelta(String),
    /// A terminal structured object (for example a resume analysis).
    StructuredResult(Value),
    /// The backend reported an error inside the stream.
    ErrorSignal(String),
    /// Anything else: malformed JSON, finish markers, records without data.
    Unrecognized,
}

/// One classified event produced by a `StreamSession`.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEvent {
    /// Position within the session, starting at 0 with no gaps.
    pub sequence_index: u64,
    /// Classified payload.
    pub kind: EventKind,
    /// Decoded JSON payload, `None` when the record did not decode.
    pub raw_payload: Option<Value>,
    /// SSE `event:` name, when the backend sent one.
    pub event_name: Option<String>,
}

impl StreamEvent {
    /// Returns the delta text for `TextDelta` events.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::TextDelta(text) => Some(text),
            _ => None,
        }
    }

    /// Whether the event carries content a caller can show or keep.
    pub fn is_usable(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TextDelta(_) | EventKind::StructuredResult(_)
        )
    }
}

/// Final value of a drained stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamResult {
    /// The last structured result seen.
    Structured(Value),
    /// Concatenated delta text, used when no structured result arrived.
    Text(String),
}

/// Caller-side accumulation of a session's events.
///
/// Text deltas are appended in arrival order; the last structured result
/// replaces any earlier one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccumulatedAnswer {
    /// Concatenated delta text.
    pub text: String,
    /// Last structured result, if any.
    pub result: Option<Value>,
    /// Error messages reported in-stream, in order.
    pub error_signals: Vec<String>,
    /// Number of `TextDelta` events applied.
    pub deltas: usize,
    /// Number of `Unrecognized` events seen.
    pub unrecognized: usize,
}

impl AccumulatedAnswer {
    /// Folds one event into the accumulation.
    pub fn apply(&mut self, event: &StreamEvent) {
        match &event.kind {
            EventKind::TextDelta(text) => {
                self.text.push_str(text);
                self.deltas += 1;
            }
            EventKind::StructuredResult(value) => self.result = Some(value.clone()),
            EventKind::ErrorSignal(message) => self.error_signals.push(message.clone()),
            EventKind::Unrecognized => self.unrecognized += 1,
        }
    }

    /// Whether at least one delta or structured result was seen.
    pub fn has_usable_content(&self) -> bool {
        self.deltas > 0 || self.result.is_some()
    }

    /// The structured result if present, else the text if any delta arrived.
    pub fn into_result(self) -> Option<StreamResult> {
        match self.result {
            Some(value) => Some(StreamResult::Structured(value)),
            None if self.deltas > 0 => Some(StreamResult::Text(self.text)),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(seq: u64, kind: EventKind) -> StreamEvent {
        StreamEvent {
            sequence_index: seq,
            kind,
            raw_payload: None,
            event_name: None,
        }
    }

    #[test]
    fn structured_result_takes_priority_over_text() {
        let mut answer = AccumulatedAnswer::default();
        answer.apply(&event(0, EventKind::TextDelta("analysing".into())));
        answer.apply(&event(
            1,
            EventKind::StructuredResult(serde_json::json!({"match_score":{"overall":1}})),
        ));
        assert!(answer.has_usable_content());
        assert!(matches!(
            answer.into_result(),
            Some(StreamResult::Structured(_))
        ));
    }

    #[test]
    fn only_noise_yields_no_result() {
        let mut answer = AccumulatedAnswer::default();
        answer.apply(&event(0, EventKind::Unrecognized));
        answer.apply(&event(1, EventKind::ErrorSignal("boom".into())));
        assert!(!answer.has_usable_content());
        assert_eq!(answer.error_signals, vec!["boom".to_string()]);
        assert_eq!(answer.unrecognized, 1);
        assert_eq!(answer.into_result(), None);
    }
}
