pub mod interview;
pub mod user;

pub use interview::{Answer, Interview, InterviewStatus, Question};
pub use user::{NewUser, Profile, Role, User};
