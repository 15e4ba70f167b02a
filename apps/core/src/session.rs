//! Interview session state machine.
//!
//! Lifecycle: start (questions generated, record created in_progress) →
//! answer submissions (append-only) → end (aggregate report persisted,
//! record completed; repeatable as an idempotent recompute).
//!
//! Provider outages never abort a transition: the evaluation service always
//! resolves, so the only caller-visible failures here are missing records
//! and out-of-range indices.

use serde::Serialize;

use crate::errors::CoreError;
use crate::evaluation::{Evaluation, EvaluationService};
use crate::models::{Answer, Profile, Question};
use crate::repos::{InterviewRepository, NewInterview, UserRepository};

/// Output of a successful start: the new interview and its question list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedInterview {
    pub interview_id: String,
    pub questions: Vec<Question>,
}

pub struct InterviewService {
    users: UserRepository,
    interviews: InterviewRepository,
    evaluator: EvaluationService,
}

impl InterviewService {
    pub fn new(
        users: UserRepository,
        interviews: InterviewRepository,
        evaluator: EvaluationService,
    ) -> Self {
        Self {
            users,
            interviews,
            evaluator,
        }
    }

    /// Starts an interview for the authenticated caller: generates the
    /// question list, snapshots the profile, and persists the record in
    /// `in_progress` with no answers.
    pub async fn start(
        &self,
        caller_id: &str,
        profile: Profile,
        target_role: &str,
    ) -> Result<StartedInterview, CoreError> {
        // Two of the three engines have no foreign keys; ownership is
        // enforced here instead.
        if self.users.find_by_id(caller_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("user {caller_id} not found")));
        }

        let texts = self.evaluator.generate_questions(&profile, target_role).await;
        let questions: Vec<Question> = texts
            .into_iter()
            .enumerate()
            .map(|(order, text)| Question {
                text,
                order: order as u32,
            })
            .collect();

        let interview = self
            .interviews
            .create(NewInterview {
                user_id: caller_id.to_string(),
                target_role: target_role.to_string(),
                profile,
                questions,
            })
            .await?;

        Ok(StartedInterview {
            interview_id: interview.id,
            questions: interview.questions,
        })
    }

    /// Evaluates one answer and appends it to the transcript. Does not
    /// change the session state. Re-submitting the same index appends a
    /// duplicate entry (observed behavior, kept as-is).
    pub async fn submit_answer(
        &self,
        interview_id: &str,
        question_index: usize,
        answer_text: &str,
    ) -> Result<Evaluation, CoreError> {
        let interview = self
            .interviews
            .find_by_id(interview_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("interview {interview_id} not found")))?;

        let question = interview.questions.get(question_index).ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "question index {question_index} out of range (interview has {} questions)",
                interview.questions.len()
            ))
        })?;

        let evaluation = self
            .evaluator
            .evaluate_answer(&question.text, answer_text, &interview.target_role)
            .await;

        let mut answers = interview.answers;
        answers.push(Answer {
            question_index: question_index as u32,
            text: answer_text.to_string(),
            score: evaluation.score,
        });
        self.interviews.save_answers(interview_id, &answers).await?;

        Ok(evaluation)
    }

    /// Finalizes the interview: computes the aggregate report over the full
    /// transcript, persists it, and marks the record completed. Calling it
    /// again recomputes and overwrites.
    pub async fn end(&self, interview_id: &str) -> Result<Evaluation, CoreError> {
        let interview = self
            .interviews
            .find_by_id(interview_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("interview {interview_id} not found")))?;

        let report = self
            .evaluator
            .final_evaluation(
                &interview.questions,
                &interview.answers,
                &interview.target_role,
            )
            .await;

        self.interviews.finalize(interview_id, &report).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InterviewStatus, NewUser, Role};
    use crate::store::{FileStore, RecordStore};
    use std::sync::Arc;

    fn profile() -> Profile {
        Profile {
            job_title: "Backend Engineer".to_string(),
            years_experience: 3,
            skills: vec!["Go".to_string(), "SQL".to_string()],
            linked_in_url: None,
        }
    }

    async fn service() -> (tempfile::TempDir, InterviewService, String) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(dir.path()));
        let users = UserRepository::new(store.clone());
        let interviews = InterviewRepository::new(store);
        let user = users
            .create(NewUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Candidate,
            })
            .await
            .unwrap();
        let service = InterviewService::new(users, interviews, EvaluationService::offline());
        (dir, service, user.id)
    }

    #[tokio::test]
    async fn test_start_returns_five_questions_with_sequential_orders() {
        let (_dir, service, user_id) = service().await;
        let started = service
            .start(&user_id, profile(), "Backend Engineer")
            .await
            .unwrap();

        assert!(!started.interview_id.is_empty());
        assert_eq!(started.questions.len(), 5);
        for (index, question) in started.questions.iter().enumerate() {
            assert_eq!(question.order, index as u32);
            assert!(!question.text.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn test_start_for_unknown_user_is_not_found() {
        let (_dir, service, _user_id) = service().await;
        let err = service
            .start("ghost", profile(), "Backend Engineer")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_submit_answer_scores_and_appends() {
        let (_dir, service, user_id) = service().await;
        let started = service
            .start(&user_id, profile(), "Backend Engineer")
            .await
            .unwrap();

        let evaluation = service
            .submit_answer(&started.interview_id, 0, "I design services using Go.")
            .await
            .unwrap();
        assert!((0..=10).contains(&evaluation.score));
        assert!(!evaluation.summary.is_empty());
        assert!(!evaluation.strengths.is_empty());

        let stored = service
            .interviews
            .find_by_id(&started.interview_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.answers.len(), 1);
        assert_eq!(stored.answers[0].question_index, 0);
        assert_eq!(stored.answers[0].score, evaluation.score);
    }

    #[tokio::test]
    async fn test_out_of_range_index_rejected_without_mutation() {
        let (_dir, service, user_id) = service().await;
        let started = service
            .start(&user_id, profile(), "Backend Engineer")
            .await
            .unwrap();

        let err = service
            .submit_answer(&started.interview_id, 5, "late answer")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));

        let stored = service
            .interviews
            .find_by_id(&started.interview_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.answers.is_empty());
    }

    #[tokio::test]
    async fn test_submit_answer_unknown_interview_is_not_found() {
        let (_dir, service, _user_id) = service().await;
        let err = service.submit_answer("missing", 0, "answer").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resubmitting_same_index_appends_duplicate() {
        let (_dir, service, user_id) = service().await;
        let started = service
            .start(&user_id, profile(), "Backend Engineer")
            .await
            .unwrap();

        service
            .submit_answer(&started.interview_id, 2, "first take")
            .await
            .unwrap();
        service
            .submit_answer(&started.interview_id, 2, "second take")
            .await
            .unwrap();

        let stored = service
            .interviews
            .find_by_id(&started.interview_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.answers.len(), 2);
        assert_eq!(stored.answers[0].text, "first take");
        assert_eq!(stored.answers[1].text, "second take");
    }

    #[tokio::test]
    async fn test_full_interview_flow_and_idempotent_end() {
        let (_dir, service, user_id) = service().await;
        let started = service
            .start(&user_id, profile(), "Backend Engineer")
            .await
            .unwrap();

        for index in 0..5 {
            service
                .submit_answer(&started.interview_id, index, "A considered answer.")
                .await
                .unwrap();
        }

        let report = service.end(&started.interview_id).await.unwrap();
        assert!((0..=10).contains(&report.score));
        assert!(!report.strengths.is_empty());
        assert!(!report.improvements.is_empty());
        assert!(!report.summary.is_empty());

        let stored = service
            .interviews
            .find_by_id(&started.interview_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InterviewStatus::Completed);
        assert_eq!(stored.score, report.score);

        // Ending again recomputes the same aggregate and stays completed.
        let second = service.end(&started.interview_id).await.unwrap();
        assert_eq!(second, report);
        let stored = service
            .interviews
            .find_by_id(&started.interview_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InterviewStatus::Completed);
        assert_eq!(stored.answers.len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_on_different_interviews() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(dir.path()));
        let users = UserRepository::new(store.clone());
        let interviews = InterviewRepository::new(store);
        let user = users
            .create(NewUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Candidate,
            })
            .await
            .unwrap();
        let service = Arc::new(InterviewService::new(
            users,
            interviews,
            EvaluationService::offline(),
        ));

        let first = service
            .start(&user.id, profile(), "Backend Engineer")
            .await
            .unwrap();
        let second = service
            .start(&user.id, profile(), "Backend Engineer")
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            tokio::spawn({
                let service = service.clone();
                let id = first.interview_id.clone();
                async move { service.submit_answer(&id, 0, "first interview answer").await }
            }),
            tokio::spawn({
                let service = service.clone();
                let id = second.interview_id.clone();
                async move { service.submit_answer(&id, 0, "second interview answer").await }
            }),
        );
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        let one = service
            .interviews
            .find_by_id(&first.interview_id)
            .await
            .unwrap()
            .unwrap();
        let two = service
            .interviews
            .find_by_id(&second.interview_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(one.answers.len(), 1);
        assert_eq!(one.answers[0].text, "first interview answer");
        assert_eq!(two.answers.len(), 1);
        assert_eq!(two.answers[0].text, "second interview answer");
    }
}
