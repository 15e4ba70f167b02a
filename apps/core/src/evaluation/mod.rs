//! AI evaluation service: question generation, per-answer scoring, and the
//! final transcript report.
//!
//! Every operation resolves to a schema-valid value. With no usable API key
//! the service runs a deterministic mock; a provider failure of any kind
//! (HTTP, parse, wrong arity) degrades to a fixed fallback and is logged,
//! never surfaced to the caller.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::{LlmClient, LlmError};
use crate::models::{Answer, Profile, Question};

pub mod prompts;

/// Number of questions every interview starts with.
pub const QUESTION_COUNT: usize = 5;

/// Marker substituted into the transcript for unanswered questions.
const NO_ANSWER: &str = "(no answer)";

/// One evaluation result, for a single answer or for the whole transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub score: i64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
}

impl Evaluation {
    fn clamped(mut self) -> Self {
        self.score = self.score.clamp(0, 10);
        self
    }
}

pub struct EvaluationService {
    provider: Option<LlmClient>,
}

impl EvaluationService {
    /// Keys that are unset or still placeholders leave the service in
    /// deterministic mock mode.
    pub fn new(api_key: Option<&str>) -> Self {
        let provider = api_key
            .filter(|key| !is_placeholder(key))
            .map(|key| LlmClient::new(key.to_string()));
        if provider.is_none() {
            warn!("AI provider key not configured; running in deterministic mock mode");
        }
        Self { provider }
    }

    /// Deterministic mock mode, regardless of environment. Used by tests.
    pub fn offline() -> Self {
        Self { provider: None }
    }

    /// Exactly [`QUESTION_COUNT`] non-empty question texts. Never fails:
    /// provider trouble yields the fixed fallback set for the role.
    pub async fn generate_questions(&self, profile: &Profile, target_role: &str) -> Vec<String> {
        let Some(client) = &self.provider else {
            return mock_questions();
        };
        match try_generate(client, profile, target_role).await {
            Ok(questions) => questions,
            Err(error) => {
                warn!(%error, "question generation degraded; using fallback set");
                fallback_questions(target_role)
            }
        }
    }

    /// Scores one answer against its question. Never fails: provider trouble
    /// yields the neutral fallback evaluation.
    pub async fn evaluate_answer(
        &self,
        question: &str,
        answer: &str,
        target_role: &str,
    ) -> Evaluation {
        let Some(client) = &self.provider else {
            return mock_evaluation();
        };
        let prompt = prompts::answer_prompt(question, answer, target_role);
        match client
            .complete_json::<Evaluation>(prompts::EVALUATION_SYSTEM, &prompt)
            .await
        {
            Ok(evaluation) => evaluation.clamped(),
            Err(error) => {
                warn!(%error, "answer evaluation degraded; using neutral fallback");
                neutral_evaluation()
            }
        }
    }

    /// Aggregate report over the full transcript. Same fallback contract as
    /// [`Self::evaluate_answer`].
    pub async fn final_evaluation(
        &self,
        questions: &[Question],
        answers: &[Answer],
        target_role: &str,
    ) -> Evaluation {
        let Some(client) = &self.provider else {
            return mock_evaluation();
        };
        let transcript = transcript(questions, answers);
        let prompt = prompts::final_prompt(&transcript, target_role);
        match client
            .complete_json::<Evaluation>(prompts::EVALUATION_SYSTEM, &prompt)
            .await
        {
            Ok(evaluation) => evaluation.clamped(),
            Err(error) => {
                warn!(%error, "final evaluation degraded; using neutral fallback");
                neutral_evaluation()
            }
        }
    }
}

async fn try_generate(
    client: &LlmClient,
    profile: &Profile,
    target_role: &str,
) -> Result<Vec<String>, LlmError> {
    #[derive(Deserialize)]
    struct QuestionsPayload {
        questions: Vec<String>,
    }

    let prompt = prompts::questions_prompt(profile, target_role, QUESTION_COUNT);
    let payload: QuestionsPayload = client
        .complete_json(prompts::QUESTIONS_SYSTEM, &prompt)
        .await?;

    // Wrong arity or blank texts count as provider failure.
    if payload.questions.len() != QUESTION_COUNT {
        return Err(LlmError::Malformed(format!(
            "expected {QUESTION_COUNT} questions, got {}",
            payload.questions.len()
        )));
    }
    if payload.questions.iter().any(|q| q.trim().is_empty()) {
        return Err(LlmError::Malformed("empty question text".to_string()));
    }
    Ok(payload.questions)
}

/// Pairs each question with its answer by index for the final report.
pub fn transcript(questions: &[Question], answers: &[Answer]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let answer = answers
                .iter()
                .find(|a| a.question_index as usize == index)
                .map(|a| a.text.as_str())
                .unwrap_or(NO_ANSWER);
            format!("Q: {}\nA: {}", question.text, answer)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_placeholder(key: &str) -> bool {
    let key = key.trim();
    key.is_empty() || key.contains("your_")
}

/// Fixed question set for mock mode.
fn mock_questions() -> Vec<String> {
    [
        "Tell me about yourself.",
        "What are your core technical skills?",
        "How do you handle conflict in a team?",
        "Describe a project you are proud of.",
        "Why should we hire you?",
    ]
    .map(str::to_string)
    .to_vec()
}

/// Fallback question set when a configured provider fails mid-flight.
/// Parameterized only by the target role.
fn fallback_questions(target_role: &str) -> Vec<String> {
    vec![
        format!("Tell me about your experience related to {target_role}."),
        "What are your greatest strengths?".to_string(),
        "Describe a challenging problem you solved recently.".to_string(),
        "Why are you interested in this position?".to_string(),
        "Where do you see yourself in 5 years?".to_string(),
    ]
}

/// Fixed positive evaluation for mock mode.
fn mock_evaluation() -> Evaluation {
    Evaluation {
        score: 8,
        strengths: vec![
            "Clear communication".to_string(),
            "Relevant technical background".to_string(),
        ],
        improvements: vec!["Add more quantitative results".to_string()],
        summary: "The answer shows good competence and alignment with the role.".to_string(),
    }
}

/// Neutral evaluation used when a configured provider fails.
fn neutral_evaluation() -> Evaluation {
    Evaluation {
        score: 5,
        strengths: vec!["Answered the question".to_string()],
        improvements: vec!["Provide more specific examples".to_string()],
        summary: "Basic response provided.".to_string(),
    }
}
