//! Prompt builders for the three evaluation operations.
//! Every prompt demands JSON-only output; the client strips fences anyway.

use crate::models::Profile;

pub const QUESTIONS_SYSTEM: &str = "You are a professional HR interviewer. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

pub const EVALUATION_SYSTEM: &str = "You are an expert HR evaluator. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

const EVALUATION_DIMENSIONS: &str = "Evaluate on:\n\
    - Technical knowledge\n\
    - Communication clarity\n\
    - Confidence\n\
    - Problem-solving";

const EVALUATION_SCHEMA: &str = r#"Return ONLY valid JSON (no markdown):
{
  "score": <number 0-10>,
  "strengths": ["string"],
  "improvements": ["string"],
  "summary": "string"
}"#;

pub fn questions_prompt(profile: &Profile, target_role: &str, count: usize) -> String {
    let profile_json =
        serde_json::to_string_pretty(profile).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"Based on this candidate profile:
{profile_json}

Generate {count} relevant first-round interview questions for the role of "{target_role}".
Return ONLY valid JSON (no markdown):
{{
  "questions": ["Question 1", "Question 2", "..."]
}}"#
    )
}

pub fn answer_prompt(question: &str, answer: &str, target_role: &str) -> String {
    format!(
        "Evaluate this answer for a \"{target_role}\" position.\n\n\
        Question: \"{question}\"\n\
        Answer: \"{answer}\"\n\n\
        {EVALUATION_DIMENSIONS}\n\n\
        {EVALUATION_SCHEMA}"
    )
}

pub fn final_prompt(transcript: &str, target_role: &str) -> String {
    format!(
        "You are evaluating a candidate interview for the role of \"{target_role}\".\n\n\
        Transcript:\n{transcript}\n\n\
        {EVALUATION_DIMENSIONS}\n\n\
        {EVALUATION_SCHEMA}"
    )
}
