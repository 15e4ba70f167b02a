use std::sync::Arc;

use serde_json::Value;

use super::{created_at_field, nested_field, require_id, string_field, to_blob};
use crate::errors::CoreError;
use crate::models::{NewUser, Profile, Role, User};
use crate::store::{Collection, Predicate, Record, RecordStore};

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn RecordStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Registers a user. Email uniqueness is prechecked here so the contract
    /// holds even on engines without a native constraint; engines that do
    /// declare one surface the same error kind.
    pub async fn create(&self, new_user: NewUser) -> Result<User, CoreError> {
        let predicate = Predicate::new().eq("email", new_user.email.clone());
        if self
            .store
            .find_one(Collection::Users, &predicate)
            .await?
            .is_some()
        {
            return Err(CoreError::ConstraintViolation(format!(
                "email '{}' is already registered",
                new_user.email
            )));
        }

        let mut record = Record::new();
        record.insert("name".into(), Value::String(new_user.name));
        record.insert("email".into(), Value::String(new_user.email));
        record.insert("password".into(), Value::String(new_user.password_hash));
        record.insert("role".into(), Value::String(new_user.role.as_str().into()));

        let stored = self.store.create(Collection::Users, record).await?;
        user_from_record(&stored)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError> {
        let record = self.store.find_by_id(Collection::Users, id).await?;
        record.as_ref().map(user_from_record).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let predicate = Predicate::new().eq("email", email);
        let record = self.store.find_one(Collection::Users, &predicate).await?;
        record.as_ref().map(user_from_record).transpose()
    }

    /// Replaces the whole profile object.
    pub async fn update_profile(&self, id: &str, profile: &Profile) -> Result<User, CoreError> {
        let mut fields = Record::new();
        fields.insert("profile".into(), to_blob(profile)?);
        match self.store.update(Collection::Users, id, fields).await? {
            Some(record) => user_from_record(&record),
            None => Err(CoreError::NotFound(format!("user {id} not found"))),
        }
    }

    pub async fn count_candidates(&self) -> Result<u64, CoreError> {
        let predicate = Predicate::new().eq("role", Role::Candidate.as_str());
        Ok(self.store.count(Collection::Users, &predicate).await?)
    }
}

/// The public user shape: the stored password never leaves this function.
fn user_from_record(record: &Record) -> Result<User, CoreError> {
    Ok(User {
        id: require_id(record)?,
        name: string_field(record, "name"),
        email: string_field(record, "email"),
        role: Role::parse(&string_field(record, "role")),
        profile: nested_field::<Option<Profile>>(record, "profile")?,
        created_at: created_at_field(record),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;

    fn repo() -> (tempfile::TempDir, UserRepository) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()));
        (dir, UserRepository::new(store))
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: "$2b$10$opaque".to_string(),
            role: Role::Candidate,
        }
    }

    #[tokio::test]
    async fn test_register_then_lookup() {
        let (_dir, repo) = repo();
        let user = repo.create(new_user("ada@example.com")).await.unwrap();
        assert!(!user.id.is_empty());
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::Candidate);
        assert!(user.profile.is_none());

        let by_id = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, user.email);
        let by_email = repo.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_constraint_violation() {
        let (_dir, repo) = repo();
        repo.create(new_user("ada@example.com")).await.unwrap();
        let err = repo.create(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_password_never_exposed_in_public_shape() {
        let (_dir, repo) = repo();
        let user = repo.create(new_user("ada@example.com")).await.unwrap();
        let serialized = serde_json::to_string(&user).unwrap();
        assert!(!serialized.contains("password"));
        assert!(!serialized.contains("opaque"));
    }

    #[tokio::test]
    async fn test_profile_update_roundtrip() {
        let (_dir, repo) = repo();
        let user = repo.create(new_user("ada@example.com")).await.unwrap();

        let profile = Profile {
            job_title: "Backend Engineer".to_string(),
            years_experience: 3,
            skills: vec!["Go".to_string(), "SQL".to_string()],
            linked_in_url: Some("https://linkedin.com/in/ada".to_string()),
        };
        let updated = repo.update_profile(&user.id, &profile).await.unwrap();
        assert_eq!(updated.profile.as_ref(), Some(&profile));

        let reread = repo.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reread.profile, Some(profile));
    }

    #[tokio::test]
    async fn test_update_profile_missing_user_is_not_found() {
        let (_dir, repo) = repo();
        let profile = Profile {
            job_title: "x".to_string(),
            years_experience: 0,
            skills: vec![],
            linked_in_url: None,
        };
        let err = repo.update_profile("missing", &profile).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_count_candidates_excludes_admins() {
        let (_dir, repo) = repo();
        repo.create(new_user("c1@example.com")).await.unwrap();
        repo.create(NewUser {
            role: Role::Admin,
            ..new_user("admin@example.com")
        })
        .await
        .unwrap();
        assert_eq!(repo.count_candidates().await.unwrap(), 1);
    }
}
