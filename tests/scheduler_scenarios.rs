//! End-to-end scenarios from the planning/scheduling design notes (S1-S6):
//! plan a campaign, drive it through a paused tokio clock, and check the
//! resulting send counts and matrix invariants.

use std::sync::Arc;
use std::time::Duration;

use campaign_scheduler::core::{
    plan, AntiSpamLimits, PlanParams, Scheduler, SimulatedBackendConfig, SimulatedSendBackend,
    SystemClock, Task, TaskStatus,
};
use campaign_scheduler::error::SendError;
use uuid::Uuid;

fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

fn instant_backend(success_probability: f64, limits: AntiSpamLimits) -> Arc<SimulatedSendBackend> {
    Arc::new(SimulatedSendBackend::new(SimulatedBackendConfig {
        min_latency: Duration::ZERO,
        max_latency: Duration::ZERO,
        success_probability,
        limits,
    }))
}

#[tokio::test(start_paused = true)]
async fn s1_plan_shape() {
    let params = PlanParams::new(ids(6), 30, 1.0, 2);
    let p = plan(&params);
    assert_eq!(p.calculated_days, 6);
    assert_eq!(p.group_info.total_groups, 3);
    assert_eq!(p.group_info.days_per_group, 2);
    assert_eq!(p.group_info.sender_daily_capacity, 24);
    assert_eq!(p.seed_len(), 180);
}

#[tokio::test(start_paused = true)]
async fn s2_plan_shape() {
    let params = PlanParams::new(ids(4), 30, 2.0, 2);
    let p = plan(&params);
    assert_eq!(p.calculated_days, 2);
    assert_eq!(p.group_info.total_groups, 2);
    assert_eq!(p.group_info.days_per_group, 1);
    assert_eq!(p.group_info.sender_daily_capacity, 48);
    assert_eq!(p.seed_len(), 120);
}

#[tokio::test(start_paused = true)]
async fn s3_fractional_rate_rounds_up() {
    let params = PlanParams::new(ids(6), 30, 0.5, 3);
    let p = plan(&params);
    assert_eq!(p.calculated_days, 6);
    assert_eq!(p.group_info.total_groups, 2);
    assert_eq!(p.group_info.days_per_group, 3);
}

#[tokio::test(start_paused = true)]
async fn s4_single_job_dispatches_once_and_completes() {
    let sender_ids = ids(1);
    let recipient_ids = ids(1);
    let params = PlanParams::new(sender_ids, 1, 1.0, 1).with_working_hours(1);
    let p = plan(&params);
    assert_eq!(p.calculated_days, 1);
    assert_eq!(p.total_emails, 1);

    let backend = instant_backend(
        1.0,
        AntiSpamLimits {
            per_minute: 100,
            per_hour: 100,
        },
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), backend);
    let task = Task::new("s4", params.sender_ids.clone(), 1.0, 1, None);
    let task_id = task.id;
    scheduler.register_task(task);
    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();

    tokio::time::advance(Duration::from_secs(2 * 3600)).await;
    tokio::task::yield_now().await;

    let snapshot = scheduler.get_task_status(task_id).unwrap();
    assert_eq!(snapshot.task.status, TaskStatus::Completed);
    assert_eq!(snapshot.stats.total_sent, 1);
    assert_eq!(snapshot.stats.total_failed, 0);
    assert!(snapshot.stats.conserves());
}

#[tokio::test(start_paused = true)]
async fn s5_pause_then_resume_reaches_total() {
    let sender_ids = ids(4);
    let recipient_ids = ids(30);
    let params = PlanParams::new(sender_ids.clone(), 30, 2.0, 2);
    let p = plan(&params);
    assert_eq!(p.total_emails, 120);

    let backend = instant_backend(
        1.0,
        AntiSpamLimits {
            per_minute: 10_000,
            per_hour: 10_000,
        },
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), backend);
    let task = Task::new("s5", sender_ids, 2.0, 2, None);
    let task_id = task.id;
    scheduler.register_task(task);
    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();

    tokio::time::advance(Duration::from_secs(3)).await;
    tokio::task::yield_now().await;

    scheduler.pause_task(task_id).unwrap();
    let before = scheduler.get_task_status(task_id).unwrap().stats;

    tokio::time::advance(Duration::from_secs(10 * 3600)).await;
    tokio::task::yield_now().await;
    let during_pause = scheduler.get_task_status(task_id).unwrap().stats;
    assert_eq!(before.total_sent, during_pause.total_sent);
    assert_eq!(before.total_failed, during_pause.total_failed);
    assert_eq!(during_pause.total_processing, 0, "no in-flight job should survive a pause window");

    scheduler.resume_task(task_id).unwrap();
    tokio::time::advance(Duration::from_secs(10 * 24 * 3600)).await;
    tokio::task::yield_now().await;

    let after = scheduler.get_task_status(task_id).unwrap().stats;
    assert_eq!(after.total_sent + after.total_failed, 120);
    assert!(after.conserves());
}

#[tokio::test(start_paused = true)]
async fn s6_rate_envelope_collision_fails_most_jobs_but_conserves() {
    let sender_ids = ids(1);
    let recipient_ids = ids(30);
    let params = PlanParams::new(sender_ids.clone(), 30, 30.0, 1).with_working_hours(1);
    let p = plan(&params);
    assert_eq!(p.total_emails, 30);

    let backend = instant_backend(
        1.0,
        AntiSpamLimits {
            per_minute: 10,
            per_hour: 10_000,
        },
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), backend);
    let task = Task::new("s6", sender_ids, 30.0, 1, None);
    let task_id = task.id;
    scheduler.register_task(task);
    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();

    tokio::time::advance(Duration::from_secs(3600)).await;
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    tokio::task::yield_now().await;

    let snapshot = scheduler.get_task_status(task_id).unwrap();
    assert!(snapshot.stats.total_failed >= 20, "expected most sends past the per-minute envelope to fail, got {:?}", snapshot.stats);
    assert!(snapshot.stats.conserves());
    assert_eq!(snapshot.stats.total_sent + snapshot.stats.total_failed, 30);
}

#[tokio::test(start_paused = true)]
async fn idempotent_start_stop_start() {
    let sender_ids = ids(1);
    let recipient_ids = ids(1);
    let params = PlanParams::new(sender_ids.clone(), 1, 1.0, 1).with_working_hours(1);
    let p = plan(&params);

    let backend = instant_backend(
        1.0,
        AntiSpamLimits {
            per_minute: 100,
            per_hour: 100,
        },
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), backend);
    let task = Task::new("idempotent", sender_ids, 1.0, 1, None);
    let task_id = task.id;
    scheduler.register_task(task);

    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();
    scheduler.stop_task(task_id).unwrap();
    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();

    tokio::time::advance(Duration::from_secs(2 * 3600)).await;
    tokio::task::yield_now().await;

    let snapshot = scheduler.get_task_status(task_id).unwrap();
    assert_eq!(snapshot.task.status, TaskStatus::Completed);
    assert_eq!(snapshot.stats.total_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn reset_purges_all_observable_state() {
    let sender_ids = ids(2);
    let recipient_ids = ids(5);
    let params = PlanParams::new(sender_ids.clone(), 5, 1.0, 1);
    let p = plan(&params);

    let backend = instant_backend(
        1.0,
        AntiSpamLimits {
            per_minute: 100,
            per_hour: 100,
        },
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), backend);
    let task = Task::new("reset-me", sender_ids, 1.0, 1, None);
    let task_id = task.id;
    scheduler.register_task(task);
    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();

    scheduler.reset();

    assert!(matches!(
        scheduler.get_task_status(task_id),
        Err(campaign_scheduler::error::SchedulerError::TaskNotFound(_))
    ));
    assert!(scheduler.get_status_matrix(task_id).is_err());
}

#[tokio::test(start_paused = true)]
async fn non_divisible_sender_count_materialises_no_duplicate_jobs() {
    // 3 senders, R=2: the tail group is one sender short and reuses an
    // earlier, distinct sender rather than duplicating itself. The distinct
    // (sender, recipient) pairs the plan seeds settle at |distinct senders| *
    // N, but a reused sender legitimately gets a second day's worth of work
    // in its second group, so the jobs the scheduler actually arms track the
    // plan's own per-day totals, not the seed count. What must NOT happen is
    // the old bug: a duplicated sender slot on the *same* day minting two
    // jobs for an identical (sender, recipient, day, index) out of random ids.
    let sender_ids = ids(3);
    let recipient_ids = ids(10);
    let params = PlanParams::new(sender_ids.clone(), 10, 1.0, 2);
    let p = plan(&params);
    assert_eq!(p.total_emails, 30);
    let expected_jobs: u32 = p.daily_schedule.iter().map(|d| d.total_for_day).sum();

    let backend = instant_backend(
        1.0,
        AntiSpamLimits {
            per_minute: 10_000,
            per_hour: 10_000,
        },
    );
    let scheduler = Scheduler::new(Arc::new(SystemClock), backend);
    let task = Task::new("tail-wrap", sender_ids, 1.0, 2, None);
    let task_id = task.id;
    scheduler.register_task(task);
    scheduler.start_task(task_id, &p, &recipient_ids).unwrap();

    tokio::time::advance(Duration::from_secs(30 * 24 * 3600)).await;
    tokio::task::yield_now().await;

    let snapshot = scheduler.get_task_status(task_id).unwrap();
    assert_eq!(snapshot.stats.total_emails, expected_jobs);
    assert_eq!(snapshot.stats.total_sent, expected_jobs);
    assert!(snapshot.stats.conserves());
}

#[test]
fn send_error_variants_are_distinguishable() {
    let a = SendError::SpamFilterBlock;
    let b = SendError::MailboxFull(Uuid::new_v4());
    assert_ne!(a, b);
}
