use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

// The two questionnaire variants. Every question and every assessment is
// scoped to exactly one of these; an assessment is answered against the
// question catalog of its own type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    Org,
    Action,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Org => "org",
            QuestionType::Action => "action",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "org" | "organization" | "organisation" | "o" => Some(QuestionType::Org),
            "action" | "a" => Some(QuestionType::Action),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Org => "Organization",
            QuestionType::Action => "Action",
        }
    }
}

// A catalog question. Categories are not a separate table: a category is
// just the text value recurring across rows, ordered by csequence, with
// qsequence ordering questions inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub csequence: i64,
    pub category: String,
    pub qtype: QuestionType,
    pub qsequence: i64,
    pub question: String,
}

// One candidate answer for a question, carrying the score that the gap
// engine aggregates. Scores may be negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub score: i64,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: i64,
    pub client_id: i64,
    pub qtype: QuestionType,
    pub name: String,
    pub client_name: String,
    pub created_at: String,
}

// One recorded actual/required answer pair for one question within an
// assessment, joined with the owning question and both scores so callers
// can resume or report without re-querying per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub assessment_id: i64,
    pub question_id: i64,
    pub answer_id_desired: i64,
    pub answer_id_actual: i64,
    pub actual_score: i64,
    pub desired_score: i64,
}

// The joined row the gap engine consumes: one per recorded choice,
// carrying the labels and scores of both selected answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub category: String,
    pub question: String,
    pub actual_answer: String,
    pub actual_score: i64,
    pub desired_answer: String,
    pub desired_score: i64,
}

// Explicit completion state for an assessment, computed from storage on
// demand. "Complete" means a choice exists for every catalog question of
// the assessment's type; there is no stored flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AssessmentProgress {
    pub answered: i64,
    pub total: i64,
    pub complete: bool,
}

impl AssessmentProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.answered as f64 / self.total as f64) * 100.0
        }
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
