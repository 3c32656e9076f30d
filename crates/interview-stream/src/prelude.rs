//! Common imports for client code.
pub use crate::{
    AccumulatedAnswer, AnswerSubmission, CancelHandle, ClientConfig, ClientError,
    CompanyInterviewRequest, Credentials, Difficulty, Endpoint, EventKind, InterviewClient,
    KnowledgeQuery, ResumeAnswerEvaluation, ResumeInterviewRequest, ResumeUpload, RetryPolicy,
    SelfInterviewRequest, StreamError, StreamEvent, StreamResult, StreamSession, UploadResponse,
};
