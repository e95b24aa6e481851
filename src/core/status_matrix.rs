//! Status matrix and aggregate statistics (spec §4.4): a pure view derived
//! by iterating a task's jobs, never stored independently.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::job::{Job, JobStatus};

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatusMatrix {
    /// recipient -> sender -> status
    pub cells: HashMap<Uuid, HashMap<Uuid, JobStatus>>,
}

impl StatusMatrix {
    pub fn from_jobs<'a>(jobs: impl Iterator<Item = &'a Job>) -> Self {
        let mut cells: HashMap<Uuid, HashMap<Uuid, JobStatus>> = HashMap::new();
        for job in jobs {
            cells
                .entry(job.recipient_id)
                .or_default()
                .insert(job.sender_id, job.status);
        }
        Self { cells }
    }

    /// All pairs for one recipient, O(R) where R is the diversity cap.
    pub fn senders_for_recipient(&self, recipient_id: Uuid) -> Option<&HashMap<Uuid, JobStatus>> {
        self.cells.get(&recipient_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct TaskStatistics {
    pub total_sent: u32,
    pub total_failed: u32,
    pub total_pending: u32,
    pub total_processing: u32,
    pub total_emails: u32,
    pub success_rate: f64,
    pub progress_percent: f64,
}

impl TaskStatistics {
    pub fn from_jobs<'a>(jobs: impl Iterator<Item = &'a Job>) -> Self {
        let mut stats = TaskStatistics::default();
        for job in jobs {
            stats.total_emails += 1;
            match job.status {
                JobStatus::Sent => stats.total_sent += 1,
                JobStatus::Failed => stats.total_failed += 1,
                JobStatus::Pending => stats.total_pending += 1,
                JobStatus::Processing => stats.total_processing += 1,
            }
        }
        let terminal = stats.total_sent + stats.total_failed;
        stats.success_rate = if terminal > 0 {
            stats.total_sent as f64 / terminal as f64
        } else {
            0.0
        };
        stats.progress_percent = if stats.total_emails > 0 {
            terminal as f64 / stats.total_emails as f64 * 100.0
        } else {
            0.0
        };
        stats
    }

    /// Conservation invariant (spec property 6).
    pub fn conserves(&self) -> bool {
        self.total_sent + self.total_failed + self.total_pending + self.total_processing
            == self.total_emails
    }
}
