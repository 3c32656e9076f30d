//! Payload classification for streamed records.
//!
//! Precedence, first match wins:
//!
//! 1. non-null `error` field -> [`EventKind::ErrorSignal`]
//! 2. a configured result marker (or result envelope) -> [`EventKind::StructuredResult`]
//! 3. a configured delta path holding a non-empty string -> [`EventKind::TextDelta`]
//! 4. finish markers (`finish_reason`, `[DONE]`) -> [`EventKind::Unrecognized`]
//! 5. anything else -> [`EventKind::Unrecognized`]
//!
//! One stream may interleave text deltas with a single terminal JSON object,
//! so result markers are checked before delta paths.

use serde_json::Value;
use tracing::debug;

use crate::stream::EventKind;

/// JSON pointer of the chat-completion delta text.
pub const CHAT_DELTA_POINTER: &str = "/choices/0/delta/content";
/// JSON pointer of the flat `{"content": ...}` delta used by resume endpoints.
pub const FLAT_DELTA_POINTER: &str = "/content";

const FINISH_REASON_POINTER: &str = "/choices/0/finish_reason";
const DONE_SENTINEL: &str = "[DONE]";

/// Field names that mark a completed resume analysis.
pub const RESUME_ANALYSIS_MARKERS: [&str; 3] = ["basic_info", "technical_skills", "match_score"];

/// Classifies record payloads, configured per endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadClassifier {
    result_markers: Vec<String>,
    result_envelope: Option<String>,
    delta_pointers: Vec<String>,
}

impl Default for PayloadClassifier {
    fn default() -> Self {
        Self::chat_completions()
    }
}

impl PayloadClassifier {
    /// Plain chat-completion deltas, no structured results.
    pub fn chat_completions() -> Self {
        Self {
            result_markers: Vec::new(),
            result_envelope: None,
            delta_pointers: vec![CHAT_DELTA_POINTER.to_string()],
        }
    }

    /// Resume analysis streams: analysis sections or an `analysis` envelope,
    /// with either delta shape.
    pub fn resume_analysis() -> Self {
        Self::chat_completions()
            .with_result_markers(RESUME_ANALYSIS_MARKERS)
            .with_result_envelope("analysis")
            .with_delta_pointer(FLAT_DELTA_POINTER)
    }

    /// Adds top-level field names whose presence marks a structured result.
    pub fn with_result_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.result_markers
            .extend(markers.into_iter().map(Into::into));
        self
    }

    /// Sets a field whose object value is unwrapped and reported as the result.
    pub fn with_result_envelope(mut self, field: impl Into<String>) -> Self {
        self.result_envelope = Some(field.into());
        self
    }

    /// Adds a JSON pointer that may hold delta text.
    ///
    /// Pointers are tried in the order they were added.
    pub fn with_delta_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.delta_pointers.push(pointer.into());
        self
    }

    /// Returns the configured result marker names.
    pub fn result_markers(&self) -> &[String] {
        &self.result_markers
    }

    /// Decodes and classifies one payload.
    ///
    /// Undecodable payloads become `Unrecognized` with no raw value; they are
    /// logged and never abort the stream.
    pub fn classify_payload(&self, payload: &str) -> (Option<Value>, EventKind) {
        let trimmed = payload.trim();
        if trimmed == DONE_SENTINEL {
            debug!("stream finish sentinel");
            return (None, EventKind::Unrecognized);
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                let kind = self.classify_value(&value);
                (Some(value), kind)
            }
            Err(err) => {
                debug!(error = %err, payload = %preview(trimmed), "discarding malformed stream payload");
                (None, EventKind::Unrecognized)
            }
        }
    }

    /// Classifies an already-decoded payload.
    pub fn classify_value(&self, value: &Value) -> EventKind {
        if let Some(message) = error_message(value) {
            return EventKind::ErrorSignal(message);
        }

        if let Some(envelope) = &self.result_envelope
            && let Some(inner) = value.get(envelope).filter(|v| v.is_object())
        {
            return EventKind::StructuredResult(inner.clone());
        }
        if self
            .result_markers
            .iter()
            .any(|marker| value.get(marker).is_some_and(|v| !v.is_null()))
        {
            return EventKind::StructuredResult(value.clone());
        }

        for pointer in &self.delta_pointers {
            if let Some(text) = value
                .pointer(pointer)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
            {
                return EventKind::TextDelta(text.to_string());
            }
        }

        if let Some(reason) = value.pointer(FINISH_REASON_POINTER).filter(|v| !v.is_null()) {
            debug!(finish_reason = %reason, "stream finish marker");
        }
        EventKind::Unrecognized
    }
}

fn error_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) => Some(message.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

fn preview(payload: &str) -> &str {
    match payload.char_indices().nth(80) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_delta_is_extracted() {
        let classifier = PayloadClassifier::chat_completions();
        let (raw, kind) =
            classifier.classify_payload(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#);
        assert!(raw.is_some());
        assert_eq!(kind, EventKind::TextDelta("Hel".into()));
    }

    #[test]
    fn malformed_json_is_unrecognized_without_raw_value() {
        let (raw, kind) = PayloadClassifier::default().classify_payload("{\"choices\": [");
        assert_eq!(raw, None);
        assert_eq!(kind, EventKind::Unrecognized);
    }

    #[test]
    fn error_field_wins_over_everything() {
        let classifier = PayloadClassifier::resume_analysis();
        let value = json!({"error": "quota exceeded", "basic_info": {}, "content": "x"});
        assert_eq!(
            classifier.classify_value(&value),
            EventKind::ErrorSignal("quota exceeded".into())
        );
        let nested = json!({"error": {"message": "bad file"}});
        assert_eq!(
            classifier.classify_value(&nested),
            EventKind::ErrorSignal("bad file".into())
        );
        let null_error = json!({"error": null, "content": "ok"});
        assert_eq!(
            classifier.classify_value(&null_error),
            EventKind::TextDelta("ok".into())
        );
    }

    #[test]
    fn result_markers_win_over_delta_text() {
        let classifier = PayloadClassifier::resume_analysis();
        let value = json!({"match_score": {"overall": 82}, "content": "summary"});
        assert_eq!(
            classifier.classify_value(&value),
            EventKind::StructuredResult(value.clone())
        );
    }

    #[test]
    fn analysis_envelope_is_unwrapped() {
        let classifier = PayloadClassifier::resume_analysis();
        let value = json!({"analysis": {"basic_info": {"education": "BSc"}}});
        assert_eq!(
            classifier.classify_value(&value),
            EventKind::StructuredResult(json!({"basic_info": {"education": "BSc"}}))
        );
    }

    #[test]
    fn markers_are_injectable_per_call_site() {
        let plain = PayloadClassifier::chat_completions();
        let scoring = PayloadClassifier::chat_completions().with_result_markers(["evaluation"]);
        let value = json!({"evaluation": {"score": 70}});
        assert_eq!(plain.classify_value(&value), EventKind::Unrecognized);
        assert!(matches!(
            scoring.classify_value(&value),
            EventKind::StructuredResult(_)
        ));
        assert_eq!(scoring.result_markers(), ["evaluation".to_string()]);
    }

    #[test]
    fn finish_markers_and_empty_deltas_are_benign() {
        let classifier = PayloadClassifier::chat_completions();
        let finish = json!({"choices":[{"delta":{},"finish_reason":"stop"}]});
        assert_eq!(classifier.classify_value(&finish), EventKind::Unrecognized);
        let empty = json!({"choices":[{"delta":{"content":""}}]});
        assert_eq!(classifier.classify_value(&empty), EventKind::Unrecognized);
        assert_eq!(
            classifier.classify_payload(" [DONE] "),
            (None, EventKind::Unrecognized)
        );
    }

    #[test]
    fn flat_content_only_counts_when_configured() {
        let value = json!({"content": "Q1"});
        assert_eq!(
            PayloadClassifier::chat_completions().classify_value(&value),
            EventKind::Unrecognized
        );
        assert_eq!(
            PayloadClassifier::resume_analysis().classify_value(&value),
            EventKind::TextDelta("Q1".into())
        );
    }
}
