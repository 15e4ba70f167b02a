//! Admin-facing read operations: the enriched interview listing and the
//! dashboard headline numbers.

use serde::Serialize;

use crate::errors::CoreError;
use crate::repos::{InterviewListing, InterviewRepository, UserRepository};

/// Headline dashboard counters. `avg_score` is the mean finalized interview
/// score rescaled from 0-10 to 0-100 and rounded to the nearest integer;
/// zero when nothing has been finalized yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_candidates: u64,
    pub total_interviews: u64,
    pub avg_score: u32,
}

pub struct AdminService {
    users: UserRepository,
    interviews: InterviewRepository,
}

impl AdminService {
    pub fn new(users: UserRepository, interviews: InterviewRepository) -> Self {
        Self { users, interviews }
    }

    /// All interviews, newest first, each enriched with the candidate's
    /// name and email.
    pub async fn list_interviews(&self) -> Result<Vec<InterviewListing>, CoreError> {
        self.interviews.list_all(&self.users).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, CoreError> {
        let total_candidates = self.users.count_candidates().await?;
        let total_interviews = self.interviews.count().await?;
        let average = self.interviews.average_score().await?;
        Ok(DashboardStats {
            total_candidates,
            total_interviews,
            avg_score: rescale_average(average),
        })
    }
}

fn rescale_average(average: f64) -> u32 {
    (average * 10.0).round().clamp(0.0, 100.0) as u32
}
