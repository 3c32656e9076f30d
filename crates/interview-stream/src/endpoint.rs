use std::fmt;

use crate::classify::{FLAT_DELTA_POINTER, PayloadClassifier};

/// Streaming endpoints of the interview backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CompanyQuestions,
    SelfPracticeQuestions,
    ResumeQuestions,
    WeaknessEvaluation,
    ResumeAnswerEvaluation,
    /// Knowledge-base chat. The backend path keeps its historical spelling.
    KnowledgeChat,
    ResumeUpload,
}

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::CompanyQuestions,
        Endpoint::SelfPracticeQuestions,
        Endpoint::ResumeQuestions,
        Endpoint::WeaknessEvaluation,
        Endpoint::ResumeAnswerEvaluation,
        Endpoint::KnowledgeChat,
        Endpoint::ResumeUpload,
    ];

    /// Path relative to the configured base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::CompanyQuestions => "/interview/company/generate_company_questions/",
            Self::SelfPracticeQuestions => "/interview/self/generate_self_interview/",
            Self::ResumeQuestions => "/interview/resume/generate_resume_questions/",
            Self::WeaknessEvaluation => "/interview/weakness/submit_answer/",
            Self::ResumeAnswerEvaluation => "/interview/resume/evaluate_answer/",
            Self::KnowledgeChat => "/knowlage_chat/",
            Self::ResumeUpload => "/interview/resume/upload_resume/",
        }
    }

    /// Short name used in logs and session labels.
    pub fn name(self) -> &'static str {
        match self {
            Self::CompanyQuestions => "company_questions",
            Self::SelfPracticeQuestions => "self_practice_questions",
            Self::ResumeQuestions => "resume_questions",
            Self::WeaknessEvaluation => "weakness_evaluation",
            Self::ResumeAnswerEvaluation => "resume_answer_evaluation",
            Self::KnowledgeChat => "knowledge_chat",
            Self::ResumeUpload => "resume_upload",
        }
    }

    /// Classifier profile matching the payload shapes this endpoint emits.
    pub fn classifier(self) -> PayloadClassifier {
        match self {
            Self::ResumeUpload => PayloadClassifier::resume_analysis(),
            Self::ResumeAnswerEvaluation => {
                PayloadClassifier::chat_completions().with_delta_pointer(FLAT_DELTA_POINTER)
            }
            _ => PayloadClassifier::chat_completions(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::EventKind;
    use serde_json::json;

    #[test]
    fn paths_are_distinct_and_slash_terminated() {
        let mut paths: Vec<_> = Endpoint::ALL.iter().map(|e| e.path()).collect();
        assert!(paths.iter().all(|p| p.starts_with('/') && p.ends_with('/')));
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), Endpoint::ALL.len());
    }

    #[test]
    fn resume_evaluation_accepts_flat_deltas_but_chat_does_not() {
        let flat = json!({"content": "good answer"});
        assert_eq!(
            Endpoint::ResumeAnswerEvaluation.classifier().classify_value(&flat),
            EventKind::TextDelta("good answer".into())
        );
        assert_eq!(
            Endpoint::KnowledgeChat.classifier().classify_value(&flat),
            EventKind::Unrecognized
        );
    }

    #[test]
    fn upload_profile_recognizes_analysis() {
        let value = json!({"technical_skills": ["rust"]});
        assert!(matches!(
            Endpoint::ResumeUpload.classifier().classify_value(&value),
            EventKind::StructuredResult(_)
        ));
        assert_eq!(Endpoint::ResumeUpload.to_string(), "resume_upload");
    }
}
