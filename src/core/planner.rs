//! Pure, time-independent campaign planner (spec §4.1).
//!
//! `plan()` takes no clock and performs no I/O: given a set of senders, a
//! recipient count, and throughput constraints, it returns a complete
//! day-by-day assignment of (sender, recipient) pairs to minute-of-day
//! slots, plus the sparse status-matrix seed derived from it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlannerError;

/// What to do when `|senders|` does not divide evenly into groups of size `R`.
///
/// Open question 1 (§9): the source wraps senders into every group, which
/// duplicates work for earlier senders when the tail is short. We preserve
/// that observed behaviour as the default and expose it as a policy so a
/// caller can opt into truncating the tail group instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailPolicy {
    /// Wrap around to earlier senders so every group has exactly `R` members.
    #[default]
    WrapReuse,
    /// Allow the final group to be short instead of reusing senders.
    Truncate,
}

#[derive(Debug, Clone)]
pub struct PlanParams {
    pub sender_ids: Vec<Uuid>,
    pub recipient_count: u32,
    pub emails_per_hour: f64,
    pub emails_per_recipient_per_day: u32,
    pub working_hours: u32,
    pub tail_policy: TailPolicy,
}

impl PlanParams {
    pub fn new(
        sender_ids: Vec<Uuid>,
        recipient_count: u32,
        emails_per_hour: f64,
        emails_per_recipient_per_day: u32,
    ) -> Self {
        Self {
            sender_ids,
            recipient_count,
            emails_per_hour,
            emails_per_recipient_per_day,
            working_hours: 24,
            tail_policy: TailPolicy::default(),
        }
    }

    pub fn with_working_hours(mut self, working_hours: u32) -> Self {
        self.working_hours = working_hours;
        self
    }

    /// Boundary validation (spec: "Invalid inputs ... are rejected by the
    /// caller before planning").
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.sender_ids.is_empty() {
            return Err(PlannerError::NoSenders);
        }
        if self.recipient_count == 0 {
            return Err(PlannerError::NoRecipients);
        }
        if !(self.emails_per_hour > 0.0) {
            return Err(PlannerError::InvalidEmailsPerHour(self.emails_per_hour));
        }
        if self.emails_per_recipient_per_day == 0 {
            return Err(PlannerError::InvalidDiversityCap(
                self.emails_per_recipient_per_day as i64,
            ));
        }
        if self.working_hours == 0 || self.working_hours > 24 {
            return Err(PlannerError::InvalidWorkingHours(self.working_hours as i64));
        }
        Ok(())
    }
}

/// `HH:MM` wall-clock-of-day slot, minute granularity (open question 5: the
/// source drops seconds; we keep that).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinuteOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl MinuteOfDay {
    pub fn total_minutes(self) -> u32 {
        self.hour * 60 + self.minute
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderDayAssignment {
    pub sender_id: Uuid,
    pub recipient_indices: Vec<u32>,
    pub planned_times: Vec<MinuteOfDay>,
}

impl SenderDayAssignment {
    /// Invariant check (spec: `len(recipientIds) == len(plannedTimes)`).
    pub fn is_aligned(&self) -> bool {
        self.recipient_indices.len() == self.planned_times.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: u32,
    pub per_sender: Vec<SenderDayAssignment>,
    pub total_for_day: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroupInfo {
    pub total_groups: u32,
    pub days_per_group: u32,
    pub senders_per_group: u32,
    pub sender_daily_capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub total_emails: u32,
    pub calculated_days: u32,
    pub group_info: GroupInfo,
    pub daily_schedule: Vec<DaySchedule>,
    /// Sparse seed: only (recipient_index, sender_id) pairs that are
    /// actually scheduled somewhere appear here, all as `Pending`.
    pub status_matrix_seed: Vec<(u32, Uuid)>,
}

impl Plan {
    pub fn seed_len(&self) -> usize {
        self.status_matrix_seed.len()
    }
}

/// `senderDailyCapacity = ceil(P * H)`, floored at 1 (open question 2:
/// fractional `emailsPerHour` is accepted as a rational and rounded up so a
/// sub-hourly rate still guarantees forward progress).
fn sender_daily_capacity(emails_per_hour: f64, working_hours: u32) -> u32 {
    let raw = emails_per_hour * working_hours as f64;
    (raw.ceil() as u32).max(1)
}

/// Partition `senders` into groups of exactly `group_size`, wrapping or
/// truncating the tail per `policy`.
fn group_senders(senders: &[Uuid], group_size: u32, policy: TailPolicy) -> Vec<Vec<Uuid>> {
    let group_size = group_size as usize;
    let total_groups = (senders.len() + group_size - 1) / group_size;
    let mut groups = Vec::with_capacity(total_groups);

    for g in 0..total_groups {
        let mut members = Vec::with_capacity(group_size);
        for slot in 0..group_size {
            let idx = g * group_size + slot;
            if idx < senders.len() {
                members.push(senders[idx]);
            } else if policy == TailPolicy::WrapReuse {
                // Wrap to the head of the whole sender list so a short tail
                // reuses earlier, distinct senders instead of cloning itself.
                members.push(senders[idx % senders.len()]);
            }
        }
        if !members.is_empty() {
            groups.push(members);
        }
    }
    groups
}

/// Distribute `k` messages across `working_hours` hours, `minute = floor(i/P * 60)`
/// within the active hour, filling hour-by-hour until `k` slots are emitted.
fn slot_times(k: u32, emails_per_hour: f64, working_hours: u32) -> Vec<MinuteOfDay> {
    let mut times = Vec::with_capacity(k as usize);
    let per_hour = emails_per_hour.max(1.0);
    'outer: for hour in 0..working_hours {
        let this_hour_count = per_hour.ceil() as u32;
        for i in 0..this_hour_count {
            if times.len() as u32 >= k {
                break 'outer;
            }
            let minute = ((i as f64 / per_hour) * 60.0).floor() as u32;
            times.push(MinuteOfDay {
                hour,
                minute: minute.min(59),
            });
        }
    }
    // Repair any length mismatch (spec: implementations MUST detect and
    // repair before handing the plan to the scheduler).
    while (times.len() as u32) < k {
        tracing::error!(
            expected = k,
            produced = times.len(),
            "planner: slot_times length mismatch, repairing with trailing midnight slots"
        );
        times.push(MinuteOfDay { hour: 0, minute: 0 });
    }
    times.truncate(k as usize);
    times
}

/// Execute the grouped-serial planning algorithm (spec §4.1).
pub fn plan(params: &PlanParams) -> Plan {
    let PlanParams {
        sender_ids,
        recipient_count,
        emails_per_hour,
        emails_per_recipient_per_day: r,
        working_hours,
        tail_policy,
    } = params;

    let n = *recipient_count;
    let sender_daily_capacity = sender_daily_capacity(*emails_per_hour, *working_hours);
    let groups = group_senders(sender_ids, *r, *tail_policy);
    let total_groups = groups.len() as u32;
    let days_per_group = (n + sender_daily_capacity - 1) / sender_daily_capacity;
    let calculated_days = total_groups * days_per_group;

    let mut daily_schedule = Vec::with_capacity(calculated_days as usize);
    let mut seed_set: HashMap<(u32, Uuid), ()> = HashMap::new();

    let mut global_day = 0u32;
    for group in &groups {
        for day_in_group in 1..=days_per_group {
            global_day += 1;
            let start = (day_in_group - 1) * sender_daily_capacity;
            let end = (day_in_group * sender_daily_capacity).min(n);
            let recipients_today: Vec<u32> = if start < end { (start..end).collect() } else { vec![] };
            let k = recipients_today.len() as u32;

            let mut per_sender = Vec::with_capacity(group.len());
            for &sender_id in group {
                let planned_times = slot_times(k, *emails_per_hour, *working_hours);
                debug_assert_eq!(recipients_today.len(), planned_times.len());
                for &recipient_idx in &recipients_today {
                    seed_set.insert((recipient_idx, sender_id), ());
                }
                per_sender.push(SenderDayAssignment {
                    sender_id,
                    recipient_indices: recipients_today.clone(),
                    planned_times,
                });
            }

            daily_schedule.push(DaySchedule {
                day: global_day,
                total_for_day: k * group.len() as u32,
                per_sender,
            });
        }
    }

    let status_matrix_seed: Vec<(u32, Uuid)> = seed_set.into_keys().collect();
    let total_emails = status_matrix_seed.len() as u32;

    Plan {
        total_emails,
        calculated_days,
        group_info: GroupInfo {
            total_groups,
            days_per_group,
            senders_per_group: *r,
            sender_daily_capacity,
        },
        daily_schedule,
        status_matrix_seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn senders(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn s1_six_senders_thirty_recipients() {
        let params = PlanParams::new(senders(6), 30, 1.0, 2);
        let p = plan(&params);
        assert_eq!(p.calculated_days, 6);
        assert_eq!(p.group_info.total_groups, 3);
        assert_eq!(p.group_info.days_per_group, 2);
        assert_eq!(p.group_info.sender_daily_capacity, 24);
        assert_eq!(p.seed_len(), 180);
    }

    #[test]
    fn s2_four_senders_thirty_recipients() {
        let params = PlanParams::new(senders(4), 30, 2.0, 2);
        let p = plan(&params);
        assert_eq!(p.calculated_days, 2);
        assert_eq!(p.group_info.total_groups, 2);
        assert_eq!(p.group_info.days_per_group, 1);
        assert_eq!(p.group_info.sender_daily_capacity, 48);
        assert_eq!(p.seed_len(), 120);
    }

    #[test]
    fn s3_fractional_emails_per_hour() {
        let params = PlanParams::new(senders(6), 30, 0.5, 3);
        let p = plan(&params);
        // capacity = ceil(0.5 * 24) = 12 -> days_per_group = ceil(30/12) = 3
        assert_eq!(p.group_info.days_per_group, 3);
        assert_eq!(p.group_info.total_groups, 2);
        assert_eq!(p.calculated_days, 6);
    }

    #[test]
    fn s4_single_sender_single_recipient() {
        let params = PlanParams::new(senders(1), 1, 1.0, 1).with_working_hours(1);
        let p = plan(&params);
        assert_eq!(p.calculated_days, 1);
        assert_eq!(p.total_emails, 1);
    }

    #[test]
    fn length_alignment_holds_across_random_shapes() {
        for &(n_senders, n_recipients, p_per_hour, r) in &[
            (6usize, 30u32, 1.0f64, 2u32),
            (4, 30, 2.0, 2),
            (1, 1, 1.0, 1),
            (5, 17, 3.0, 3),
            (7, 100, 0.5, 4),
        ] {
            let params = PlanParams::new(senders(n_senders), n_recipients, p_per_hour, r);
            let plan = plan(&params);
            for day in &plan.daily_schedule {
                for assignment in &day.per_sender {
                    assert!(
                        assignment.is_aligned(),
                        "day {} sender {} misaligned: {} recipients vs {} times",
                        day.day,
                        assignment.sender_id,
                        assignment.recipient_indices.len(),
                        assignment.planned_times.len()
                    );
                }
            }
        }
    }

    #[test]
    fn diversity_cap_never_exceeded() {
        let params = PlanParams::new(senders(7), 40, 2.0, 3);
        let p = plan(&params);
        for day in &p.daily_schedule {
            let mut senders_per_recipient: HashMap<u32, u32> = HashMap::new();
            for assignment in &day.per_sender {
                for &recipient in &assignment.recipient_indices {
                    *senders_per_recipient.entry(recipient).or_insert(0) += 1;
                }
            }
            for (_, count) in senders_per_recipient {
                assert!(count <= p.group_info.senders_per_group);
            }
        }
    }

    #[test]
    fn per_sender_daily_cap_never_exceeded() {
        let params = PlanParams::new(senders(5), 200, 3.0, 2);
        let p = plan(&params);
        for day in &p.daily_schedule {
            for assignment in &day.per_sender {
                assert!(assignment.recipient_indices.len() as u32 <= p.group_info.sender_daily_capacity);
            }
        }
    }

    #[test]
    fn completion_bound_matches_formula() {
        let params = PlanParams::new(senders(9), 250, 4.0, 4);
        let p = plan(&params);
        let expected_groups = (9u32 + 4 - 1) / 4;
        let capacity = sender_daily_capacity(4.0, 24);
        let expected_days_per_group = (250u32 + capacity - 1) / capacity;
        assert_eq!(p.calculated_days, expected_groups * expected_days_per_group);
    }

    #[test]
    fn planner_is_total_for_valid_input() {
        // Any validated input returns a plan without panicking.
        let params = PlanParams::new(senders(3), 1000, 0.1, 1);
        let _ = plan(&params);
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        assert!(PlanParams::new(vec![], 10, 1.0, 1).validate().is_err());
        assert!(PlanParams::new(senders(1), 0, 1.0, 1).validate().is_err());
        assert!(PlanParams::new(senders(1), 10, 0.0, 1).validate().is_err());
        assert!(PlanParams::new(senders(1), 10, 1.0, 0).validate().is_err());
        assert!(PlanParams::new(senders(1), 10, 1.0, 1)
            .with_working_hours(25)
            .validate()
            .is_err());
    }

    #[test]
    fn non_divisible_sender_count_reuses_distinct_senders() {
        for &n_senders in &[3usize, 5] {
            let params = PlanParams::new(senders(n_senders), 10, 1.0, 2);
            let p = plan(&params);
            assert_eq!(p.total_emails, n_senders as u32 * 10);
            for day in &p.daily_schedule {
                let mut seen = std::collections::HashSet::new();
                for assignment in &day.per_sender {
                    assert!(
                        seen.insert(assignment.sender_id),
                        "day {} has the same sender assigned twice in one group",
                        day.day
                    );
                }
            }
        }
    }

    #[test]
    fn tail_truncate_policy_allows_short_final_group() {
        let mut params = PlanParams::new(senders(5), 10, 1.0, 2);
        params.tail_policy = TailPolicy::Truncate;
        let p = plan(&params);
        // groups: [0,1], [2,3], [4] -> 3 groups
        assert_eq!(p.group_info.total_groups, 3);
    }
}
