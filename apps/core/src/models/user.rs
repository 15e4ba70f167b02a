use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Candidate profile. Mutated only through the explicit profile-update
/// operation; a copy is snapshotted onto every interview at start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub job_title: String,
    #[serde(default)]
    pub years_experience: u32,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_in_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Admin => "admin",
        }
    }

    /// Unrecognized values read back as candidate, the least-privileged role.
    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            _ => Role::Candidate,
        }
    }
}

/// The public user shape. The password credential stays in the stored
/// record and is never carried here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub created_at: DateTime<Utc>,
}

/// Registration input. The credential arrives already hashed; the identity
/// provider owns hashing; the core only stores the opaque value.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}
