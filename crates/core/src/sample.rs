//! Seed data for the mock transport and a freshly started server.

use chrono::Duration;

use crate::job::Job;
use crate::status::{JobPriority, JobStatus};
use crate::types::Timestamp;

struct Seed {
    id: &'static str,
    name: &'static str,
    status: JobStatus,
    priority: JobPriority,
    progress: i16,
    created_mins_ago: i64,
    started_mins_ago: Option<i64>,
    completed_mins_ago: Option<i64>,
    error: Option<&'static str>,
}

const SEEDS: &[Seed] = &[
    Seed {
        id: "1",
        name: "Data Processing Job 1",
        status: JobStatus::Running,
        priority: JobPriority::High,
        progress: 65,
        created_mins_ago: 60,
        started_mins_ago: Some(50),
        completed_mins_ago: None,
        error: None,
    },
    Seed {
        id: "2",
        name: "Backup Job",
        status: JobStatus::Completed,
        priority: JobPriority::Regular,
        progress: 100,
        created_mins_ago: 120,
        started_mins_ago: Some(60),
        completed_mins_ago: Some(30),
        error: None,
    },
    Seed {
        id: "3",
        name: "Failed Job",
        status: JobStatus::Failed,
        priority: JobPriority::High,
        progress: 45,
        created_mins_ago: 30,
        started_mins_ago: Some(25),
        completed_mins_ago: None,
        error: Some("Connection timeout"),
    },
    Seed {
        id: "4",
        name: "Email Campaign Job",
        status: JobStatus::InQueue,
        priority: JobPriority::Regular,
        progress: 0,
        created_mins_ago: 15,
        started_mins_ago: None,
        completed_mins_ago: None,
        error: None,
    },
    Seed {
        id: "5",
        name: "Report Generation",
        status: JobStatus::Running,
        priority: JobPriority::High,
        progress: 30,
        created_mins_ago: 40,
        started_mins_ago: Some(20),
        completed_mins_ago: None,
        error: None,
    },
    Seed {
        id: "6",
        name: "Database Cleanup",
        status: JobStatus::Stopped,
        priority: JobPriority::Regular,
        progress: 75,
        created_mins_ago: 90,
        started_mins_ago: Some(80),
        completed_mins_ago: None,
        error: None,
    },
    Seed {
        id: "7",
        name: "File Sync Job",
        status: JobStatus::Pending,
        priority: JobPriority::High,
        progress: 0,
        created_mins_ago: 5,
        started_mins_ago: None,
        completed_mins_ago: None,
        error: None,
    },
    Seed {
        id: "8",
        name: "Log Analysis",
        status: JobStatus::Completed,
        priority: JobPriority::Regular,
        progress: 100,
        created_mins_ago: 100,
        started_mins_ago: Some(80),
        completed_mins_ago: Some(70),
        error: None,
    },
];

/// Eight sample jobs covering every status, timestamped relative to `now`.
pub fn sample_jobs(now: Timestamp) -> Vec<Job> {
    let ago = |mins: i64| now - Duration::minutes(mins);
    SEEDS
        .iter()
        .map(|s| Job {
            id: s.id.to_string(),
            name: s.name.to_string(),
            status: s.status,
            priority: s.priority,
            progress: s.progress,
            created_at: ago(s.created_mins_ago),
            started_at: s.started_mins_ago.map(ago),
            completed_at: s.completed_mins_ago.map(ago),
            error_message: s.error.map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::listing::StatusCounts;

    #[test]
    fn covers_every_status() {
        let jobs = sample_jobs(Utc::now());
        let counts = StatusCounts::from_jobs(&jobs);
        assert_eq!(counts.total, 8);
        for status in JobStatus::ALL {
            assert!(counts.get(*status) > 0, "no sample job in {status}");
        }
    }

    #[test]
    fn samples_respect_timestamp_invariants() {
        for job in sample_jobs(Utc::now()) {
            assert!((0..=100).contains(&job.progress));
            if job.started_at.is_some() {
                assert!(job.status.has_started(), "{}", job.name);
            }
            if job.completed_at.is_some() {
                assert_eq!(job.status, JobStatus::Completed, "{}", job.name);
                assert_eq!(job.progress, 100);
            }
        }
    }
}
