//! The runtime scheduler (spec §4.2): materialises a `Plan` into timers,
//! drives dispatch through a [`SendBackend`], and owns task lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SchedulerError;

use super::clock::{Clock, TimerHandle, TimerSource};
use super::domain::{Task, TaskStatus};
use super::job::{Job, JobStatus, JobStore};
use super::planner::Plan;
use super::send_backend::SendBackend;
use super::status_matrix::{StatusMatrix, TaskStatistics};

/// How often the low-frequency completion-check tick runs while a task is
/// running (spec: "periodically via a low-frequency tick (~60 s)").
pub const DEFAULT_COMPLETION_TICK: Duration = Duration::from_secs(60);

struct TaskRuntime {
    task: Task,
    is_running: bool,
    completed_at: Option<DateTime<Utc>>,
    job_timers: HashMap<Uuid, TimerHandle>,
    completion_ticker: Option<TimerHandle>,
}

impl TaskRuntime {
    fn new(task: Task) -> Self {
        Self {
            task,
            is_running: false,
            completed_at: None,
            job_timers: HashMap::new(),
            completion_ticker: None,
        }
    }

    fn cancel_all_timers(&mut self) {
        for (_, handle) in self.job_timers.drain() {
            handle.cancel();
        }
        if let Some(ticker) = self.completion_ticker.take() {
            ticker.cancel();
        }
    }
}

struct SchedulerState {
    tasks: HashMap<Uuid, TaskRuntime>,
    jobs: JobStore,
}

struct SchedulerInner {
    timer_source: TimerSource,
    send_backend: Arc<dyn SendBackend>,
    state: Mutex<SchedulerState>,
    completion_tick: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task: Task,
    pub is_running: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub stats: TaskStatistics,
}

/// Owns all task runtime state for one process. Construct one instance per
/// service; it is `Clone`-free on purpose (share via `Arc<Scheduler>`).
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, send_backend: Arc<dyn SendBackend>) -> Self {
        Self::with_completion_tick(clock, send_backend, DEFAULT_COMPLETION_TICK)
    }

    pub fn with_completion_tick(
        clock: Arc<dyn Clock>,
        send_backend: Arc<dyn SendBackend>,
        completion_tick: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                timer_source: TimerSource::new(clock),
                send_backend,
                state: Mutex::new(SchedulerState {
                    tasks: HashMap::new(),
                    jobs: JobStore::new(),
                }),
                completion_tick,
            }),
        }
    }

    /// Register a task record created out-of-band (analogous to `POST
    /// /send-tasks`). A no-op if the task is already registered.
    pub fn register_task(&self, task: Task) {
        let mut state = self.inner.state.lock();
        state
            .tasks
            .entry(task.id)
            .or_insert_with(|| TaskRuntime::new(task));
    }

    /// Materialise `plan` into jobs and arm timers (spec §4.2). `recipient_ids`
    /// maps the plan's 0-based recipient indices to concrete recipient ids and
    /// must have at least `plan.total_emails`-implied length; callers built it
    /// from the same population the plan was computed over.
    pub fn start_task(
        &self,
        task_id: Uuid,
        plan: &Plan,
        recipient_ids: &[Uuid],
    ) -> Result<(), SchedulerError> {
        // Validate alignment before touching any state (no silent repair at
        // start time, unlike the planner's own internal repair pass).
        for day in &plan.daily_schedule {
            for assignment in &day.per_sender {
                if !assignment.is_aligned() {
                    return Err(SchedulerError::DataIntegrity {
                        sender: assignment.sender_id,
                        day: day.day,
                        recipients: assignment.recipient_indices.len(),
                        times: assignment.planned_times.len(),
                    });
                }
            }
        }

        let mut state = self.inner.state.lock();
        if !state.tasks.contains_key(&task_id) {
            return Err(SchedulerError::TaskNotFound(task_id));
        }

        // Idempotent cleanup of any prior state for this task precedes
        // generation (re-`start`ed tasks first run `cleanupTask`).
        cleanup_task_locked(&mut state, task_id);

        let now = self.inner.timer_source.now();
        let mut jobs_to_arm = Vec::new();

        for day in &plan.daily_schedule {
            let day_start = now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
                + chrono::Duration::days(i64::from(day.day) - 1);

            for assignment in &day.per_sender {
                for (idx, &recipient_idx) in assignment.recipient_indices.iter().enumerate() {
                    let recipient_id = match recipient_ids.get(recipient_idx as usize) {
                        Some(id) => *id,
                        None => {
                            tracing::error!(
                                recipient_idx,
                                "scheduler: recipient index out of range, falling back to day start"
                            );
                            continue;
                        }
                    };
                    let slot = assignment.planned_times.get(idx).copied();
                    let scheduled_at = match slot {
                        Some(t) => day_start
                            + chrono::Duration::hours(i64::from(t.hour))
                            + chrono::Duration::minutes(i64::from(t.minute)),
                        None => {
                            tracing::error!("scheduler: missing planned time, falling back to day 00:00");
                            day_start
                        }
                    };

                    let job = Job::new_pending(
                        task_id,
                        assignment.sender_id,
                        recipient_id,
                        day.day,
                        idx as u32,
                        scheduled_at,
                    );
                    jobs_to_arm.push(job);
                }
            }
        }

        for job in jobs_to_arm {
            arm_job_locked(&self.inner, &mut state, job);
        }

        let runtime = state.tasks.get_mut(&task_id).expect("checked above");
        runtime.is_running = true;
        runtime.completed_at = None;
        runtime.task.status = TaskStatus::Running;
        runtime.task.start_time = Some(now);
        runtime.task.duration_days = Some(plan.calculated_days);
        runtime.completion_ticker = Some(spawn_completion_ticker(self.inner.clone(), task_id));

        Ok(())
    }

    pub fn pause_task(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        let mut state = self.inner.state.lock();
        let runtime = state
            .tasks
            .get_mut(&task_id)
            .ok_or(SchedulerError::TaskNotFound(task_id))?;
        runtime.cancel_all_timers();
        runtime.is_running = false;
        runtime.task.status = TaskStatus::Paused;
        Ok(())
    }

    /// Re-arm timers for all still-`Pending` jobs (spec: "overdue jobs fire
    /// immediately"). A no-op if the task was never started (§7: "Resume
    /// before initialisation — no-op").
    pub fn resume_task(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        let mut state = self.inner.state.lock();
        if !state.tasks.contains_key(&task_id) {
            // no-op per spec, but the caller still needs to know the task
            // itself doesn't exist vs. simply never-started; both map to
            // TaskNotFound here since we always register before start.
            return Err(SchedulerError::TaskNotFound(task_id));
        }

        let pending_jobs: Vec<Job> = state
            .jobs
            .for_task_with_status(task_id, JobStatus::Pending)
            .cloned()
            .collect();

        for job in pending_jobs {
            arm_job_locked(&self.inner, &mut state, job);
        }

        let runtime = state.tasks.get_mut(&task_id).expect("checked above");
        runtime.is_running = true;
        runtime.task.status = TaskStatus::Running;
        runtime.completion_ticker = Some(spawn_completion_ticker(self.inner.clone(), task_id));
        Ok(())
    }

    /// Full cleanup: cancel all timers, delete all jobs, wipe task runtime
    /// back to `Initialized` (spec: "Stop on unknown task — no-op").
    pub fn stop_task(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        let mut state = self.inner.state.lock();
        if !state.tasks.contains_key(&task_id) {
            return Ok(());
        }
        cleanup_task_locked(&mut state, task_id);
        let runtime = state.tasks.get_mut(&task_id).expect("checked above");
        runtime.task.status = TaskStatus::Initialized;
        runtime.task.start_time = None;
        runtime.task.end_time = None;
        runtime.task.duration_days = None;
        runtime.completed_at = None;
        Ok(())
    }

    pub fn get_task_status(&self, task_id: Uuid) -> Result<TaskSnapshot, SchedulerError> {
        let state = self.inner.state.lock();
        let runtime = state
            .tasks
            .get(&task_id)
            .ok_or(SchedulerError::TaskNotFound(task_id))?;
        let stats = TaskStatistics::from_jobs(state.jobs.for_task(task_id));
        Ok(TaskSnapshot {
            task: runtime.task.clone(),
            is_running: runtime.is_running,
            completed_at: runtime.completed_at,
            stats,
        })
    }

    pub fn get_status_matrix(&self, task_id: Uuid) -> Result<StatusMatrix, SchedulerError> {
        let state = self.inner.state.lock();
        if !state.tasks.contains_key(&task_id) {
            return Err(SchedulerError::TaskNotFound(task_id));
        }
        Ok(StatusMatrix::from_jobs(state.jobs.for_task(task_id)))
    }

    /// Defensive completion sweep over every tracked task, independent of
    /// any single task's own completion ticker. Intended for the worker
    /// binary's background loop, not the request path.
    pub fn sweep_all(&self) {
        let mut state = self.inner.state.lock();
        let now = self.inner.timer_source.now();
        let task_ids: Vec<Uuid> = state
            .tasks
            .iter()
            .filter(|(_, r)| r.task.status == TaskStatus::Running)
            .map(|(id, _)| *id)
            .collect();
        for task_id in task_ids {
            maybe_complete_task_locked(&mut state, task_id, now);
        }
    }

    /// Clear all tasks, jobs, and timers process-wide (administrative).
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        let task_ids: Vec<Uuid> = state.tasks.keys().copied().collect();
        for id in task_ids {
            if let Some(runtime) = state.tasks.get_mut(&id) {
                runtime.cancel_all_timers();
            }
        }
        state.tasks.clear();
        state.jobs.clear();
    }
}

fn cleanup_task_locked(state: &mut SchedulerState, task_id: Uuid) {
    if let Some(runtime) = state.tasks.get_mut(&task_id) {
        runtime.cancel_all_timers();
    }
    state.jobs.delete_task(task_id);
}

fn arm_job_locked(inner: &Arc<SchedulerInner>, state: &mut SchedulerState, job: Job) {
    let job_id = job.id;
    let task_id = job.task_id;
    let scheduled_at = job.scheduled_at;

    state.jobs.insert(job);

    let dispatch_inner = inner.clone();
    let handle = inner
        .timer_source
        .schedule_at(scheduled_at, async move {
            dispatch_job(dispatch_inner, task_id, job_id).await;
        });

    if let Some(runtime) = state.tasks.get_mut(&task_id) {
        runtime.job_timers.insert(job_id, handle);
    } else {
        handle.cancel();
    }
}

async fn dispatch_job(inner: Arc<SchedulerInner>, task_id: Uuid, job_id: Uuid) {
    let (sender_id, recipient_id, task_name) = {
        let mut state = inner.state.lock();
        let still_running = state
            .tasks
            .get(&task_id)
            .map(|r| r.is_running)
            .unwrap_or(false);
        if !still_running {
            // Paused between arm and fire: leave the job Pending for resume.
            return;
        }

        let task_name = state
            .tasks
            .get(&task_id)
            .map(|r| r.task.name.clone())
            .unwrap_or_default();

        let job = match state.jobs.get_mut(job_id) {
            Some(j) => j,
            None => return,
        };
        job.status = JobStatus::Processing;
        job.attempts += 1;
        let ids = (job.sender_id, job.recipient_id, task_name);

        // Drop this job's timer handle now, before the send future is
        // polled: a `pause` that races us must not abort a job that has
        // already committed to sending (spec: already-`Processing` jobs run
        // to their terminal outcome regardless of `isRunning`).
        if let Some(runtime) = state.tasks.get_mut(&task_id) {
            runtime.job_timers.remove(&job_id);
        }
        ids
    };

    let subject = format!("Message from campaign {task_name}");
    let body = format!("This is an automated message for campaign {task_name}.");

    let result = inner
        .send_backend
        .send(sender_id, recipient_id, &subject, &body)
        .await;

    let mut state = inner.state.lock();
    let now = inner.timer_source.now();
    if let Some(job) = state.jobs.get_mut(job_id) {
        match result {
            Ok(_message_id) => {
                job.status = JobStatus::Sent;
                job.sent_at = Some(now);
                job.error = None;
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
                tracing::warn!(task = %task_id, job = %job_id, error = %e, "job failed");
            }
        }
    }

    maybe_complete_task_locked(&mut state, task_id, now);
}

fn maybe_complete_task_locked(state: &mut SchedulerState, task_id: Uuid, now: DateTime<Utc>) {
    let any_pending = state
        .jobs
        .for_task_with_status(task_id, JobStatus::Pending)
        .next()
        .is_some();
    let any_processing = state
        .jobs
        .for_task_with_status(task_id, JobStatus::Processing)
        .next()
        .is_some();

    if any_pending || any_processing {
        return;
    }

    if let Some(runtime) = state.tasks.get_mut(&task_id) {
        if runtime.task.status == TaskStatus::Running {
            runtime.cancel_all_timers();
            runtime.is_running = false;
            runtime.task.status = TaskStatus::Completed;
            runtime.task.end_time = Some(now);
            runtime.completed_at = Some(now);
            tracing::info!(task = %task_id, "task completed");
        }
    }
}

fn spawn_completion_ticker(inner: Arc<SchedulerInner>, task_id: Uuid) -> TimerHandle {
    let tick = inner.completion_tick;
    let clock = inner.timer_source.clone();
    let handle_inner = inner.clone();
    let join = tokio::spawn(async move {
        loop {
            tokio::time::sleep(tick).await;
            let now = clock.now();
            let mut state = handle_inner.state.lock();
            let still_tracked = state.tasks.contains_key(&task_id);
            if !still_tracked {
                return;
            }
            maybe_complete_task_locked(&mut state, task_id, now);
            let done = state
                .tasks
                .get(&task_id)
                .map(|r| r.task.status != TaskStatus::Running)
                .unwrap_or(true);
            drop(state);
            if done {
                return;
            }
        }
    });
    TimerHandle::from_join(join)
}
