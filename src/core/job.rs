//! In-memory job store (spec §2.4). A Job is a single planned send,
//! identified by `(task, sender, recipient)` and scheduled at a specific
//! wall-clock instant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: u32,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Deterministic id over `taskId | senderId | recipientId | day | i`
    /// (spec §4.2), so re-materialising the same plan slot — e.g. a
    /// short tail group that legitimately reuses an earlier sender for the
    /// same day — always lands on the same Job rather than inserting a
    /// duplicate.
    pub fn deterministic_id(
        task_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        day: u32,
        index: u32,
    ) -> Uuid {
        let name = format!("{task_id}|{sender_id}|{recipient_id}|{day}|{index}");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    pub fn new_pending(
        task_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        day: u32,
        index: u32,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::deterministic_id(task_id, sender_id, recipient_id, day, index),
            task_id,
            sender_id,
            recipient_id,
            scheduled_at,
            status: JobStatus::Pending,
            attempts: 0,
            error: None,
            sent_at: None,
        }
    }
}

/// Maps `JobId -> Job`, indexed by task for bulk filtering. Not
/// thread-synchronised on its own; the scheduler guards access with its
/// single mutex (§5).
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<Uuid, Job>,
    by_task: HashMap<Uuid, Vec<Uuid>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on `job.id`: inserting a job whose deterministic id
    /// already exists overwrites it in place rather than adding a second
    /// entry to the per-task index (spec §3: exactly one Job per
    /// `(senderId, recipientId)` plan slot).
    pub fn insert(&mut self, job: Job) {
        if !self.jobs.contains_key(&job.id) {
            self.by_task.entry(job.task_id).or_default().push(job.id);
        }
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, job_id: Uuid) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn get_mut(&mut self, job_id: Uuid) -> Option<&mut Job> {
        self.jobs.get_mut(&job_id)
    }

    pub fn for_task(&self, task_id: Uuid) -> impl Iterator<Item = &Job> {
        self.by_task
            .get(&task_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.jobs.get(id))
    }

    pub fn for_task_with_status(
        &self,
        task_id: Uuid,
        status: JobStatus,
    ) -> impl Iterator<Item = &Job> {
        self.for_task(task_id).filter(move |j| j.status == status)
    }

    pub fn delete_task(&mut self, task_id: Uuid) {
        if let Some(ids) = self.by_task.remove(&task_id) {
            for id in ids {
                self.jobs.remove(&id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.by_task.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn deterministic_id_is_stable_for_the_same_five_tuple() {
        let task = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let a = Job::deterministic_id(task, sender, recipient, 3, 7);
        let b = Job::deterministic_id(task, sender, recipient, 3, 7);
        assert_eq!(a, b);
        assert_ne!(a, Job::deterministic_id(task, sender, recipient, 3, 8));
        assert_ne!(a, Job::deterministic_id(task, sender, recipient, 4, 7));
    }

    #[test]
    fn rematerialising_the_same_slot_overwrites_instead_of_duplicating() {
        // Mirrors a short tail group that lists the same sender twice on the
        // same day: two independent `new_pending` calls for identical
        // (task, sender, recipient, day, index) must collapse to one entry,
        // both in the primary map and the per-task index.
        let task = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut store = JobStore::new();
        store.insert(Job::new_pending(task, sender, recipient, 1, 0, Utc::now()));
        store.insert(Job::new_pending(task, sender, recipient, 1, 0, Utc::now()));
        assert_eq!(store.for_task(task).count(), 1);
    }
}
