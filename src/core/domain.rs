//! Entities from the data model (spec §3) that the planner and scheduler
//! operate on. Senders/Recipients/Tasks are normally CRUD records owned by
//! the persistent store (out of scope here); these are the in-memory shapes
//! the core needs to plan and run against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: Uuid,
    pub company_name: String,
    pub email_account: String,
    pub smtp_endpoint: String,
    pub port: u16,
    pub tls: bool,
    pub sender_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub company: Option<String>,
    pub blacklisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Initialized,
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub status: TaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_days: Option<u32>,
    pub emails_per_hour: f64,
    pub emails_per_recipient_per_day: u32,
    pub created_by: Option<Uuid>,
    pub sender_ids: Vec<Uuid>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        sender_ids: Vec<Uuid>,
        emails_per_hour: f64,
        emails_per_recipient_per_day: u32,
        created_by: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: TaskStatus::Initialized,
            start_time: None,
            end_time: None,
            duration_days: None,
            emails_per_hour,
            emails_per_recipient_per_day,
            created_by,
            sender_ids,
        }
    }
}
