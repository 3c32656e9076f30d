//! Typed request bodies for the streaming endpoints.
//!
//! Field names match the backend's JSON contract, including its spelling of
//! `knowlage_name`.

use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::errors::ClientError;

/// Question count accepted by the question generators.
pub const QUESTION_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Resume file extensions the backend parses.
pub const RESUME_EXTENSIONS: [&str; 4] = ["pdf", "docx", "doc", "txt"];

/// A JSON body bound to one streaming endpoint.
pub trait EndpointRequest: Serialize {
    /// Endpoint the body is posted to.
    const ENDPOINT: Endpoint;

    /// Rejects bodies the backend would refuse, before any request is sent.
    fn validate(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Interview difficulty, serialized with the backend's labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "初级")]
    Junior,
    #[default]
    #[serde(rename = "中级")]
    Intermediate,
    #[serde(rename = "高级")]
    Senior,
    #[serde(rename = "资深")]
    Expert,
}

impl FromStr for Difficulty {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" | "初级" => Ok(Self::Junior),
            "intermediate" | "mid" | "中级" => Ok(Self::Intermediate),
            "senior" | "高级" => Ok(Self::Senior),
            "expert" | "资深" => Ok(Self::Expert),
            other => Err(ClientError::Validation(format!(
                "unknown difficulty {other:?} (expected junior, intermediate, senior or expert)"
            ))),
        }
    }
}

/// Question generation for a specific company and position.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompanyInterviewRequest {
    pub company_name: String,
    pub position: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CompanyInterviewRequest {
    pub fn new(company_name: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            position: position.into(),
            difficulty: Difficulty::default(),
            question_count: 5,
            user_id: None,
        }
    }
}

impl EndpointRequest for CompanyInterviewRequest {
    const ENDPOINT: Endpoint = Endpoint::CompanyQuestions;

    fn validate(&self) -> Result<(), ClientError> {
        require_non_empty("company_name", &self.company_name)?;
        require_non_empty("position", &self.position)?;
        validate_question_count(self.question_count)
    }
}

/// Keyword-driven practice questions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelfInterviewRequest {
    pub keywords: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    /// Knowledge bases to draw from, as the JSON-array string the backend expects.
    pub knowlage_name: String,
    pub history: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SelfInterviewRequest {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            difficulty: Difficulty::default(),
            question_count: 5,
            knowlage_name: "[]".to_string(),
            history: Vec::new(),
            user_id: None,
        }
    }
}

impl EndpointRequest for SelfInterviewRequest {
    const ENDPOINT: Endpoint = Endpoint::SelfPracticeQuestions;

    fn validate(&self) -> Result<(), ClientError> {
        require_non_empty("keywords", &self.keywords)?;
        validate_question_count(self.question_count)
    }
}

/// Questions tailored to the most recently uploaded resume.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResumeInterviewRequest {
    pub difficulty: Difficulty,
    pub question_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ResumeInterviewRequest {
    pub fn new() -> Self {
        Self {
            question_count: 5,
            ..Self::default()
        }
    }
}

impl EndpointRequest for ResumeInterviewRequest {
    const ENDPOINT: Endpoint = Endpoint::ResumeQuestions;

    fn validate(&self) -> Result<(), ClientError> {
        validate_question_count(self.question_count)
    }
}

/// An answer submitted for evaluation on the weakness-practice endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnswerSubmission {
    pub question: String,
    pub user_answer: String,
}

impl AnswerSubmission {
    pub fn new(question: impl Into<String>, user_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            user_answer: user_answer.into(),
        }
    }
}

impl EndpointRequest for AnswerSubmission {
    const ENDPOINT: Endpoint = Endpoint::WeaknessEvaluation;

    fn validate(&self) -> Result<(), ClientError> {
        require_non_empty("question", &self.question)?;
        require_non_empty("user_answer", &self.user_answer)
    }
}

/// An answer evaluated against a previously produced resume analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResumeAnswerEvaluation {
    pub question: String,
    pub user_answer: String,
    pub resume_analysis: Value,
}

impl ResumeAnswerEvaluation {
    pub fn new(
        question: impl Into<String>,
        user_answer: impl Into<String>,
        resume_analysis: Value,
    ) -> Self {
        Self {
            question: question.into(),
            user_answer: user_answer.into(),
            resume_analysis,
        }
    }
}

impl EndpointRequest for ResumeAnswerEvaluation {
    const ENDPOINT: Endpoint = Endpoint::ResumeAnswerEvaluation;

    fn validate(&self) -> Result<(), ClientError> {
        require_non_empty("question", &self.question)?;
        require_non_empty("user_answer", &self.user_answer)
    }
}

/// A question for the knowledge-base chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KnowledgeQuery {
    pub query: String,
    pub top_k: u32,
}

impl KnowledgeQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: 3,
        }
    }
}

impl EndpointRequest for KnowledgeQuery {
    const ENDPOINT: Endpoint = Endpoint::KnowledgeChat;

    fn validate(&self) -> Result<(), ClientError> {
        require_non_empty("query", &self.query)?;
        if self.top_k == 0 {
            return Err(ClientError::Validation("top_k must be greater than 0".into()));
        }
        Ok(())
    }
}

/// A resume file plus the optional targeting fields sent with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeUpload {
    pub file_name: String,
    pub bytes: Bytes,
    pub mime: String,
    pub target_position: Option<String>,
    pub job_description: Option<String>,
}

impl ResumeUpload {
    /// Builds an upload from in-memory bytes, guessing the MIME type from the name.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            bytes: bytes.into(),
            mime,
            target_position: None,
            job_description: None,
        }
    }

    /// Reads a resume file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::Validation(format!("invalid resume path {}", path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Validation(format!("failed to read resume {}: {e}", path.display()))
        })?;
        Ok(Self::new(file_name, bytes))
    }

    pub fn with_target_position(mut self, position: impl Into<String>) -> Self {
        self.target_position = non_blank(position.into());
        self
    }

    pub fn with_job_description(mut self, description: impl Into<String>) -> Self {
        self.job_description = non_blank(description.into());
        self
    }

    /// Checks the file is non-empty and has a supported extension.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.bytes.is_empty() {
            return Err(ClientError::Validation(format!(
                "resume file {} is empty",
                self.file_name
            )));
        }
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension {
            Some(ext) if RESUME_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(ClientError::Validation(format!(
                "unsupported resume file {} (expected one of {})",
                self.file_name,
                RESUME_EXTENSIONS.join(", ")
            ))),
        }
    }

    pub(crate) fn into_form(self) -> Result<reqwest::multipart::Form, ClientError> {
        let part = reqwest::multipart::Part::stream(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)
            .map_err(|e| ClientError::Validation(format!("invalid resume mime type: {e}")))?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(position) = self.target_position {
            form = form.text("target_position", position);
        }
        if let Some(description) = self.job_description {
            form = form.text("job_description", description);
        }
        Ok(form)
    }
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_question_count(count: u32) -> Result<(), ClientError> {
    if !QUESTION_COUNT_RANGE.contains(&count) {
        return Err(ClientError::Validation(format!(
            "question_count must be between {} and {}, got {count}",
            QUESTION_COUNT_RANGE.start(),
            QUESTION_COUNT_RANGE.end()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn self_interview_body_matches_backend_fields() {
        let mut req = SelfInterviewRequest::new("rust, tokio");
        req.difficulty = Difficulty::Senior;
        let body = serde_json::to_value(&req).expect("serialize");
        assert_eq!(
            body,
            json!({
                "keywords": "rust, tokio",
                "difficulty": "高级",
                "question_count": 5,
                "knowlage_name": "[]",
                "history": []
            })
        );
        assert!(req.validate().is_ok());
    }

    #[test]
    fn company_request_rejects_blank_fields_and_bad_counts() {
        let mut req = CompanyInterviewRequest::new("Acme", " ");
        assert!(matches!(req.validate(), Err(ClientError::Validation(_))));
        req.position = "backend".into();
        req.question_count = 11;
        assert!(matches!(req.validate(), Err(ClientError::Validation(_))));
        req.question_count = 10;
        req.user_id = Some("u1".into());
        assert!(req.validate().is_ok());
        assert_eq!(serde_json::to_value(&req).expect("serialize")["user_id"], "u1");
    }

    #[test]
    fn difficulty_parses_english_and_backend_labels() {
        assert_eq!("Senior".parse::<Difficulty>().ok(), Some(Difficulty::Senior));
        assert_eq!("资深".parse::<Difficulty>().ok(), Some(Difficulty::Expert));
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn upload_validation_checks_extension_and_size() {
        let upload = ResumeUpload::new("cv.pdf", b"%PDF-1.7".to_vec())
            .with_target_position("backend engineer")
            .with_job_description("  ");
        assert_eq!(upload.mime, "application/pdf");
        assert_eq!(upload.job_description, None);
        assert!(upload.validate().is_ok());

        assert!(ResumeUpload::new("cv.png", b"x".to_vec()).validate().is_err());
        assert!(ResumeUpload::new("cv.txt", Vec::new()).validate().is_err());
    }

    #[tokio::test]
    async fn from_path_reads_file_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("resume.txt");
        tokio::fs::write(&path, "Rust developer").await.expect("write");

        let upload = ResumeUpload::from_path(&path).await.expect("read");
        assert_eq!(upload.file_name, "resume.txt");
        assert_eq!(upload.mime, "text/plain");
        assert_eq!(upload.bytes, Bytes::from_static(b"Rust developer"));

        let missing = ResumeUpload::from_path(dir.path().join("missing.pdf")).await;
        assert!(matches!(missing, Err(ClientError::Validation(_))));
    }
}
