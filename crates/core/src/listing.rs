//! Listing helpers: filtering, sorting and per-status counts.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::Job;
use crate::status::JobStatus;

/// Field a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Name,
    Status,
    Priority,
    Progress,
}

impl std::str::FromStr for SortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "created_at" | "created" => Ok(SortKey::CreatedAt),
            "name" => Ok(SortKey::Name),
            "status" => Ok(SortKey::Status),
            "priority" => Ok(SortKey::Priority),
            "progress" => Ok(SortKey::Progress),
            other => Err(CoreError::Validation(format!("Unknown sort key: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filter and ordering applied to a listing. The default shows every job,
/// newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Case-insensitive substring match on the job name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => job
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }

    /// Filtered and sorted copy of `jobs`. Sorting is stable, so equal keys
    /// keep their store order.
    pub fn apply(&self, jobs: &[Job]) -> Vec<Job> {
        let mut out: Vec<Job> = jobs.iter().filter(|j| self.matches(j)).cloned().collect();
        out.sort_by(|a, b| {
            let ord = compare(self.sort_by, a, b);
            match self.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        out
    }
}

fn compare(key: SortKey, a: &Job, b: &Job) -> Ordering {
    match key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Status => a.status.cmp(&b.status),
        SortKey::Priority => a.priority.cmp(&b.priority),
        SortKey::Progress => a.progress.cmp(&b.progress),
    }
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub in_queue: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
}

impl StatusCounts {
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut counts = Self {
            total: jobs.len(),
            ..Self::default()
        };
        for job in jobs {
            *counts.slot(job.status) += 1;
        }
        counts
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::InQueue => self.in_queue,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Stopped => self.stopped,
        }
    }

    fn slot(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::InQueue => &mut self.in_queue,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Stopped => &mut self.stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::status::JobPriority;

    fn jobs() -> Vec<Job> {
        let base = Utc::now();
        let mk = |name: &str, status, priority, progress, mins| {
            let mut j = Job::new(name, priority, base + Duration::minutes(mins));
            j.status = status;
            j.progress = progress;
            j
        };
        vec![
            mk("Backup Job", JobStatus::Completed, JobPriority::Regular, 100, 0),
            mk("backup logs", JobStatus::Running, JobPriority::High, 40, 1),
            mk("Report Generation", JobStatus::Running, JobPriority::High, 30, 2),
            mk("Email Campaign", JobStatus::InQueue, JobPriority::Regular, 0, 3),
        ]
    }

    #[test]
    fn default_is_newest_first() {
        let out = JobFilter::default().apply(&jobs());
        let names: Vec<_> = out.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(
            names,
            ["Email Campaign", "Report Generation", "backup logs", "Backup Job"]
        );
    }

    #[test]
    fn search_is_case_insensitive() {
        let filter = JobFilter {
            search: Some("BACKUP".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&jobs()).len(), 2);
    }

    #[test]
    fn blank_search_matches_everything() {
        let filter = JobFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&jobs()).len(), 4);
    }

    #[test]
    fn status_filter_and_progress_sort() {
        let filter = JobFilter {
            status: Some(JobStatus::Running),
            sort_by: SortKey::Progress,
            direction: SortDirection::Asc,
            ..Default::default()
        };
        let out = filter.apply(&jobs());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].progress, 30);
        assert_eq!(out[1].progress, 40);
    }

    #[test]
    fn sort_key_parses_aliases() {
        assert_eq!("created-at".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert_eq!("Name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert!("size".parse::<SortKey>().is_err());
    }

    #[test]
    fn counts_per_status() {
        let counts = StatusCounts::from_jobs(&jobs());
        assert_eq!(counts.total, 4);
        assert_eq!(counts.running, 2);
        assert_eq!(counts.get(JobStatus::Completed), 1);
        assert_eq!(counts.get(JobStatus::InQueue), 1);
        assert_eq!(counts.get(JobStatus::Failed), 0);
    }
}
