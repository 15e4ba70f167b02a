use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::{
    created_at_field, int_field, nested_field, require_id, string_field, to_blob, UserRepository,
};
use crate::errors::CoreError;
use crate::evaluation::Evaluation;
use crate::models::{Answer, Interview, InterviewStatus, Profile, Question};
use crate::store::{Collection, FindOptions, Predicate, Record, RecordStore};

#[derive(Debug, Clone)]
pub struct NewInterview {
    pub user_id: String,
    pub target_role: String,
    pub profile: Profile,
    pub questions: Vec<Question>,
}

/// Owning user's public identity attached to a listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRef {
    pub name: String,
    pub email: String,
}

/// One row of the admin interview listing, enriched with the candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewListing {
    pub interview_id: String,
    pub candidate: CandidateRef,
    pub target_role: String,
    pub score: i64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InterviewRepository {
    store: Arc<dyn RecordStore>,
}

impl InterviewRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_interview: NewInterview) -> Result<Interview, CoreError> {
        let mut record = Record::new();
        record.insert("user_id".into(), Value::String(new_interview.user_id));
        record.insert(
            "target_role".into(),
            Value::String(new_interview.target_role),
        );
        record.insert("profile".into(), to_blob(&new_interview.profile)?);
        record.insert("questions".into(), to_blob(&new_interview.questions)?);
        record.insert("answers".into(), to_blob::<Vec<Answer>>(&vec![])?);
        record.insert("score".into(), Value::from(0));
        record.insert("strengths".into(), to_blob::<Vec<String>>(&vec![])?);
        record.insert("improvements".into(), to_blob::<Vec<String>>(&vec![])?);
        record.insert("summary".into(), Value::String(String::new()));
        record.insert(
            "status".into(),
            Value::String(InterviewStatus::InProgress.as_str().into()),
        );

        let stored = self.store.create(Collection::Interviews, record).await?;
        interview_from_record(&stored)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Interview>, CoreError> {
        let record = self.store.find_by_id(Collection::Interviews, id).await?;
        record.as_ref().map(interview_from_record).transpose()
    }

    /// Persists the full answers sequence after an append.
    pub async fn save_answers(&self, id: &str, answers: &[Answer]) -> Result<Interview, CoreError> {
        let mut fields = Record::new();
        fields.insert("answers".into(), to_blob(&answers)?);
        match self.store.update(Collection::Interviews, id, fields).await? {
            Some(record) => interview_from_record(&record),
            None => Err(CoreError::NotFound(format!("interview {id} not found"))),
        }
    }

    /// Overwrites the aggregate report as a unit and marks the interview
    /// completed. Safe to call repeatedly; the record never reverts.
    pub async fn finalize(&self, id: &str, report: &Evaluation) -> Result<Interview, CoreError> {
        let mut fields = Record::new();
        fields.insert("score".into(), Value::from(report.score));
        fields.insert("strengths".into(), to_blob(&report.strengths)?);
        fields.insert("improvements".into(), to_blob(&report.improvements)?);
        fields.insert("summary".into(), Value::String(report.summary.clone()));
        fields.insert(
            "status".into(),
            Value::String(InterviewStatus::Completed.as_str().into()),
        );
        match self.store.update(Collection::Interviews, id, fields).await? {
            Some(record) => interview_from_record(&record),
            None => Err(CoreError::NotFound(format!("interview {id} not found"))),
        }
    }

    /// Newest-first listing with the owning user's `{name, email}` attached.
    /// The join lives here so the store stays backend-agnostic; entries whose
    /// owner is missing are dropped, matching inner-join semantics.
    pub async fn list_all(
        &self,
        users: &UserRepository,
    ) -> Result<Vec<InterviewListing>, CoreError> {
        let records = self
            .store
            .find(
                Collection::Interviews,
                &Predicate::new(),
                FindOptions {
                    sort_desc_by_created_at: true,
                },
            )
            .await?;

        let mut listings = Vec::with_capacity(records.len());
        for record in &records {
            let interview = interview_from_record(record)?;
            let Some(owner) = users.find_by_id(&interview.user_id).await? else {
                continue;
            };
            listings.push(InterviewListing {
                interview_id: interview.id,
                candidate: CandidateRef {
                    name: owner.name,
                    email: owner.email,
                },
                target_role: interview.target_role,
                score: interview.score,
                strengths: interview.strengths,
                improvements: interview.improvements,
                summary: interview.summary,
                created_at: interview.created_at,
            });
        }
        Ok(listings)
    }

    pub async fn count(&self) -> Result<u64, CoreError> {
        Ok(self
            .store
            .count(Collection::Interviews, &Predicate::new())
            .await?)
    }

    /// Mean aggregate score over finalized (non-zero score) interviews,
    /// on the 0-10 scale.
    pub async fn average_score(&self) -> Result<f64, CoreError> {
        Ok(self
            .store
            .average(Collection::Interviews, "score", &Predicate::new())
            .await?)
    }
}

fn interview_from_record(record: &Record) -> Result<Interview, CoreError> {
    Ok(Interview {
        id: require_id(record)?,
        user_id: string_field(record, "user_id"),
        target_role: string_field(record, "target_role"),
        profile: nested_field::<Option<Profile>>(record, "profile")?.ok_or_else(|| {
            CoreError::InvalidArgument("interview record has no profile snapshot".to_string())
        })?,
        questions: nested_field(record, "questions")?,
        answers: nested_field(record, "answers")?,
        score: int_field(record, "score"),
        strengths: nested_field(record, "strengths")?,
        improvements: nested_field(record, "improvements")?,
        summary: string_field(record, "summary"),
        status: InterviewStatus::parse(&string_field(record, "status")),
        created_at: created_at_field(record),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, Role};
    use crate::store::FileStore;

    fn profile() -> Profile {
        Profile {
            job_title: "Backend Engineer".to_string(),
            years_experience: 3,
            skills: vec!["Go".to_string(), "SQL".to_string()],
            linked_in_url: None,
        }
    }

    fn questions() -> Vec<Question> {
        (0..5)
            .map(|order| Question {
                text: format!("Question {order}?"),
                order,
            })
            .collect()
    }

    fn repos() -> (tempfile::TempDir, UserRepository, InterviewRepository) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::open(dir.path()));
        (
            dir,
            UserRepository::new(store.clone()),
            InterviewRepository::new(store),
        )
    }

    async fn seed_user(users: &UserRepository, email: &str) -> String {
        users
            .create(NewUser {
                name: "Ada".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                role: Role::Candidate,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_starts_in_progress_with_empty_answers() {
        let (_dir, users, interviews) = repos();
        let user_id = seed_user(&users, "ada@example.com").await;

        let interview = interviews
            .create(NewInterview {
                user_id: user_id.clone(),
                target_role: "Backend Engineer".to_string(),
                profile: profile(),
                questions: questions(),
            })
            .await
            .unwrap();

        assert_eq!(interview.status, InterviewStatus::InProgress);
        assert_eq!(interview.user_id, user_id);
        assert_eq!(interview.questions.len(), 5);
        assert!(interview.answers.is_empty());
        assert_eq!(interview.score, 0);

        let reread = interviews.find_by_id(&interview.id).await.unwrap().unwrap();
        assert_eq!(reread.profile, profile());
        assert_eq!(reread.questions, interview.questions);
    }

    #[tokio::test]
    async fn test_save_answers_roundtrip() {
        let (_dir, users, interviews) = repos();
        let user_id = seed_user(&users, "ada@example.com").await;
        let interview = interviews
            .create(NewInterview {
                user_id,
                target_role: "Backend Engineer".to_string(),
                profile: profile(),
                questions: questions(),
            })
            .await
            .unwrap();

        let answers = vec![Answer {
            question_index: 0,
            text: "I design services using Go.".to_string(),
            score: 7,
        }];
        let updated = interviews
            .save_answers(&interview.id, &answers)
            .await
            .unwrap();
        assert_eq!(updated.answers, answers);
        assert_eq!(updated.status, InterviewStatus::InProgress);
    }

    #[tokio::test]
    async fn test_finalize_overwrites_aggregates_idempotently() {
        let (_dir, users, interviews) = repos();
        let user_id = seed_user(&users, "ada@example.com").await;
        let interview = interviews
            .create(NewInterview {
                user_id,
                target_role: "Backend Engineer".to_string(),
                profile: profile(),
                questions: questions(),
            })
            .await
            .unwrap();

        let report = Evaluation {
            score: 8,
            strengths: vec!["depth".to_string()],
            improvements: vec!["brevity".to_string()],
            summary: "solid".to_string(),
        };
        let finalized = interviews.finalize(&interview.id, &report).await.unwrap();
        assert_eq!(finalized.status, InterviewStatus::Completed);
        assert_eq!(finalized.score, 8);

        // Recompute overwrites, never appends.
        let second = Evaluation {
            score: 6,
            strengths: vec!["focus".to_string()],
            improvements: vec!["examples".to_string()],
            summary: "revised".to_string(),
        };
        let refinalized = interviews.finalize(&interview.id, &second).await.unwrap();
        assert_eq!(refinalized.status, InterviewStatus::Completed);
        assert_eq!(refinalized.score, 6);
        assert_eq!(refinalized.strengths, vec!["focus".to_string()]);
        assert_eq!(refinalized.summary, "revised");
    }

    #[tokio::test]
    async fn test_missing_interview_is_not_found() {
        let (_dir, _users, interviews) = repos();
        let err = interviews.save_answers("missing", &[]).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_all_enriches_with_candidate_and_sorts_newest_first() {
        let (_dir, users, interviews) = repos();
        let ada = seed_user(&users, "ada@example.com").await;
        let bob = seed_user(&users, "bob@example.com").await;

        for user_id in [&ada, &bob] {
            interviews
                .create(NewInterview {
                    user_id: user_id.clone(),
                    target_role: "Backend Engineer".to_string(),
                    profile: profile(),
                    questions: questions(),
                })
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let listings = interviews.list_all(&users).await.unwrap();
        assert_eq!(listings.len(), 2);
        // Bob's interview was created last, so it lists first.
        assert_eq!(listings[0].candidate.email, "bob@example.com");
        assert_eq!(listings[1].candidate.email, "ada@example.com");
        assert_eq!(listings[1].candidate.name, "Ada");
        assert_eq!(listings[0].target_role, "Backend Engineer");
    }

    #[tokio::test]
    async fn test_list_all_drops_orphaned_interviews() {
        let (_dir, users, interviews) = repos();
        interviews
            .create(NewInterview {
                user_id: "ghost".to_string(),
                target_role: "Backend Engineer".to_string(),
                profile: profile(),
                questions: questions(),
            })
            .await
            .unwrap();
        let listings = interviews.list_all(&users).await.unwrap();
        assert!(listings.is_empty());
    }
}
