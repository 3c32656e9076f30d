use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt as _, stream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::classify::PayloadClassifier;
use crate::decode::Utf8ChunkDecoder;
use crate::errors::StreamError;
use crate::framer::{EventFramer, SseRecord};
use crate::stream::{AccumulatedAnswer, EventKind, StreamEvent};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send + 'static>>;

/// Lifecycle of a `StreamSession`.
///
/// `Open -> Draining -> Closed` on a normal end of body, `Open | Draining ->
/// Failed` on a read error or cancellation. `Closed` and `Failed` are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Reading, decoding and classifying chunks.
    Open,
    /// The body has ended (or an error signal halted it); flushed events are
    /// still being delivered.
    Draining,
    /// Every event has been delivered.
    Closed,
    /// A read error or cancellation ended the session; see `last_error`.
    Failed,
}

impl SessionState {
    /// Whether no further events can be produced.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Cloneable handle used to cancel one or more sessions.
///
/// Cancellation is cooperative: a session observes it at its next read
/// iteration, or immediately while it is waiting for a chunk.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    /// Creates a handle in the not-cancelled state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation. Never fails and may be called repeatedly.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Per-session behavior switches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Stop reading once an `ErrorSignal` has been yielded.
    pub halt_on_error_signal: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            halt_on_error_signal: true,
        }
    }
}

impl SessionOptions {
    /// Keeps reading after an in-stream error signal.
    pub fn continue_after_error_signal(mut self) -> Self {
        self.halt_on_error_signal = false;
        self
    }
}

/// Decodes one streaming response body into classified events.
///
/// The session owns the body and releases it on every exit path: end of
/// stream, read failure, error-signal halt, cancellation, or drop. Events are
/// single-pass; once the session is terminal it only returns `Ok(None)`.
pub struct StreamSession {
    id: uuid::Uuid,
    label: String,
    body: Option<ByteStream>,
    decoder: Utf8ChunkDecoder,
    framer: EventFramer,
    classifier: PayloadClassifier,
    options: SessionOptions,
    pending: VecDeque<StreamEvent>,
    state: SessionState,
    last_error: Option<StreamError>,
    next_seq: u64,
    cancel: CancelHandle,
    cancel_rx: watch::Receiver<bool>,
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("next_seq", &self.next_seq)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Creates a session over any byte stream (typically an HTTP body).
    pub fn new<S, E>(body: S, classifier: PayloadClassifier) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let body = body.map(|item| {
            item.map_err(|e| StreamError::transport(format!("stream read failed: {e}")))
        });
        let cancel = CancelHandle::new();
        let cancel_rx = cancel.subscribe();
        Self {
            id: uuid::Uuid::new_v4(),
            label: "stream".to_string(),
            body: Some(Box::pin(body)),
            decoder: Utf8ChunkDecoder::default(),
            framer: EventFramer::default(),
            classifier,
            options: SessionOptions::default(),
            pending: VecDeque::new(),
            state: SessionState::Open,
            last_error: None,
            next_seq: 0,
            cancel,
            cancel_rx,
        }
    }

    /// Sets the label used in log records (usually the endpoint name).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Overrides the default session options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches an externally owned cancel handle.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel_rx = handle.subscribe();
        self.cancel = handle;
        self
    }

    /// Returns the session id used in logs.
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the failure cause once the session is `Failed`.
    pub fn last_error(&self) -> Option<&StreamError> {
        self.last_error.as_ref()
    }

    /// Decoded text not yet forming a complete record.
    pub fn carry_buffer(&self) -> &str {
        self.framer.carry_buffer()
    }

    /// Returns a handle that cancels this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels the session and releases the body right away.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.state.is_terminal() {
            self.fail(StreamError::Cancelled);
        }
    }

    /// Waits for and returns the next classified event.
    ///
    /// Returns `Ok(None)` once the session is closed, and `Err` exactly once
    /// when it fails; later calls return `Ok(None)`.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, StreamError> {
        loop {
            if !self.state.is_terminal() && *self.cancel_rx.borrow() {
                self.fail(StreamError::Cancelled);
                return Err(StreamError::Cancelled);
            }
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.state {
                SessionState::Closed | SessionState::Failed => return Ok(None),
                SessionState::Draining => {
                    self.state = SessionState::Closed;
                    info!(session_id = %self.id, endpoint = %self.label, events = self.next_seq, "stream closed");
                    return Ok(None);
                }
                SessionState::Open => {}
            }

            let Some(body) = self.body.as_mut() else {
                self.begin_drain();
                continue;
            };
            let next = tokio::select! {
                biased;
                _ = self.cancel_rx.changed() => continue,
                next = body.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    debug!(session_id = %self.id, bytes = chunk.len(), "stream chunk");
                    let text = self.decoder.decode(&chunk);
                    let records = self.framer.push(&text);
                    self.enqueue(records);
                }
                Some(Err(err)) => {
                    self.fail(err.clone());
                    return Err(err);
                }
                None => self.begin_drain(),
            }
        }
    }

    /// Converts the session into a `futures::Stream` of events.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent, StreamError>> + Send {
        stream::unfold(Some(self), |session| async move {
            let mut session = session?;
            match session.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(session))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Reads the session to its end, accumulating every event.
    ///
    /// Content received before a failure is kept in the outcome.
    pub async fn drain(mut self) -> SessionOutcome {
        let mut answer = AccumulatedAnswer::default();
        loop {
            match self.next_event().await {
                Ok(Some(event)) => answer.apply(&event),
                Ok(None) => return SessionOutcome { answer, error: None },
                Err(err) => {
                    return SessionOutcome {
                        answer,
                        error: Some(err),
                    };
                }
            }
        }
    }

    fn enqueue(&mut self, records: Vec<SseRecord>) {
        for record in records {
            let (raw_payload, kind) = match record.data.as_deref() {
                Some(data) => self.classifier.classify_payload(data),
                None => {
                    debug!(session_id = %self.id, raw = %record.raw, "record without data field");
                    (None, EventKind::Unrecognized)
                }
            };
            let halt = self.options.halt_on_error_signal
                && matches!(kind, EventKind::ErrorSignal(_));
            if let EventKind::ErrorSignal(message) = &kind {
                warn!(session_id = %self.id, endpoint = %self.label, error = %message, "backend reported an error in stream");
            }
            self.pending.push_back(StreamEvent {
                sequence_index: self.next_seq,
                kind,
                raw_payload,
                event_name: record.event,
            });
            self.next_seq += 1;
            if halt {
                self.state = SessionState::Draining;
                self.body = None;
                return;
            }
        }
    }

    fn begin_drain(&mut self) {
        self.state = SessionState::Draining;
        self.body = None;
        let tail = self.decoder.finish();
        let mut records = self.framer.push(&tail);
        records.extend(self.framer.finish());
        debug!(session_id = %self.id, records = records.len(), "stream body ended; flushing");
        self.enqueue(records);
    }

    fn fail(&mut self, err: StreamError) {
        match &err {
            StreamError::Cancelled => {
                info!(session_id = %self.id, endpoint = %self.label, "stream cancelled")
            }
            other => {
                warn!(session_id = %self.id, endpoint = %self.label, error = %other, "stream failed")
            }
        }
        self.state = SessionState::Failed;
        self.body = None;
        self.pending.clear();
        self.last_error = Some(err);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.body.is_some() {
            debug!(session_id = %self.id, endpoint = %self.label, "releasing unfinished stream body");
        }
    }
}

/// Everything a drained session produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionOutcome {
    /// Accumulated events, including content received before a failure.
    pub answer: AccumulatedAnswer,
    /// The failure that ended the session, if any.
    pub error: Option<StreamError>,
}

impl SessionOutcome {
    /// Fails if the session failed, discarding partial content.
    pub fn into_result(self) -> Result<AccumulatedAnswer, StreamError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.answer),
        }
    }
}
