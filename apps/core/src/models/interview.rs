use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Profile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_index: u32,
    pub text: String,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    InProgress,
    Completed,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> InterviewStatus {
        match value {
            "completed" => InterviewStatus::Completed,
            _ => InterviewStatus::InProgress,
        }
    }
}

/// One interview session and its accumulated transcript.
///
/// `questions` is immutable after creation; `answers` is append-only; the
/// aggregate fields are overwritten as a unit on every finalization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub user_id: String,
    pub target_role: String,
    /// Snapshot of the candidate profile at interview start.
    pub profile: Profile,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    /// Aggregate score on the 0-10 scale; 0 until finalized.
    pub score: i64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
}
