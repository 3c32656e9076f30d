//! Streaming-response assembler for the interview-prep backend.
//!
//! Chunked HTTP bodies are decoded incrementally (UTF-8 safe across chunk
//! boundaries), framed into SSE records, and classified into text deltas,
//! structured results and in-stream error signals. A [`StreamSession`] owns
//! one response body and hands out events in order; [`retry_stream`] reruns
//! stream-producing operations with exponential backoff.
//!
//! ```no_run
//! use interview_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = InterviewClient::new(ClientConfig::default())?;
//! let mut session = client
//!     .open(&KnowledgeQuery::new("What is a lifetime?"), &Credentials::anonymous())
//!     .await?;
//!
//! while let Some(event) = session.next_event().await? {
//!     if let Some(text) = event.text() {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Payload classification rules.
pub mod classify;
/// HTTP client for the backend's streaming endpoints.
pub mod client;
/// Client configuration and credentials.
pub mod config;
/// Incremental UTF-8 decoding of body chunks.
pub mod decode;
/// Streaming endpoints and their classifier profiles.
pub mod endpoint;
/// Public error types.
pub mod errors;
/// SSE record framing.
pub mod framer;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Typed request bodies.
pub mod requests;
/// Retry policy and the retrying stream driver.
pub mod retry;
/// Session lifecycle, cancellation and event delivery.
pub mod session;
/// Event and result types.
pub mod stream;

pub use classify::PayloadClassifier;
pub use client::{InterviewClient, UploadResponse};
pub use config::{ClientConfig, Credentials};
pub use decode::Utf8ChunkDecoder;
pub use endpoint::Endpoint;
pub use errors::{ClientError, StreamError};
pub use framer::{EventFramer, SseRecord};
pub use observability::init_observability;
pub use requests::{
    AnswerSubmission, CompanyInterviewRequest, Difficulty, EndpointRequest, KnowledgeQuery,
    ResumeAnswerEvaluation, ResumeInterviewRequest, ResumeUpload, SelfInterviewRequest,
};
pub use retry::{AttemptOutcome, AttemptSource, RetryPolicy, retry_stream};
pub use session::{CancelHandle, SessionOptions, SessionOutcome, SessionState, StreamSession};
pub use stream::{AccumulatedAnswer, EventKind, StreamEvent, StreamResult};
