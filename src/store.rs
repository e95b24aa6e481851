//! Minimal in-memory stand-in for the persisted task/recipient records a
//! real deployment would keep in a database. This is demo plumbing for the
//! HTTP façade, not a persistence layer: nothing here survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::{PlanParams, Recipient, Task};

#[derive(Default)]
struct Inner {
    tasks: HashMap<Uuid, Task>,
    /// Ordered recipient ids per task: index `i` is the planner's recipient
    /// index `i` for that task's own population.
    task_recipients: HashMap<Uuid, Vec<Uuid>>,
    /// The parameters a task was (re)planned with, kept so `start`/`resume`
    /// can recompute the plan without the caller resending it.
    task_plan_params: HashMap<Uuid, PlanParams>,
    recipients: HashMap<Uuid, Recipient>,
}

#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<Inner>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_task(&self, task: Task) {
        self.inner.lock().tasks.insert(task.id, task);
    }

    pub fn get_task(&self, id: Uuid) -> Option<Task> {
        self.inner.lock().tasks.get(&id).cloned()
    }

    pub fn delete_task(&self, id: Uuid) {
        let mut inner = self.inner.lock();
        inner.tasks.remove(&id);
        inner.task_recipients.remove(&id);
        inner.task_plan_params.remove(&id);
    }

    pub fn put_plan_params(&self, task_id: Uuid, params: PlanParams) {
        self.inner.lock().task_plan_params.insert(task_id, params);
    }

    pub fn plan_params(&self, task_id: Uuid) -> Option<PlanParams> {
        self.inner.lock().task_plan_params.get(&task_id).cloned()
    }

    pub fn put_task_recipients(&self, task_id: Uuid, recipients: Vec<Recipient>) {
        let mut inner = self.inner.lock();
        let ids = recipients.iter().map(|r| r.id).collect();
        for r in recipients {
            inner.recipients.insert(r.id, r);
        }
        inner.task_recipients.insert(task_id, ids);
    }

    /// Recipient ids in planner order for one task, used to map the plan's
    /// 0-based recipient indices back to concrete ids.
    pub fn recipient_ids_for_task(&self, task_id: Uuid) -> Vec<Uuid> {
        self.inner
            .lock()
            .task_recipients
            .get(&task_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn recipient_email(&self, id: Uuid) -> Option<String> {
        self.inner
            .lock()
            .recipients
            .get(&id)
            .map(|r| r.email.clone())
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.tasks.clear();
        inner.task_recipients.clear();
        inner.task_plan_params.clear();
        inner.recipients.clear();
    }
}
