use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised validating planner inputs at the boundary, before `plan()` runs.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("no senders provided")]
    NoSenders,
    #[error("recipient population is empty")]
    NoRecipients,
    #[error("emailsPerHour must be positive, got {0}")]
    InvalidEmailsPerHour(f64),
    #[error("emailsPerRecipientPerDay must be >= 1, got {0}")]
    InvalidDiversityCap(i64),
    #[error("workingHours must be in 1..=24, got {0}")]
    InvalidWorkingHours(i64),
}

/// Errors raised by scheduler control operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} not found")]
    TaskNotFound(uuid::Uuid),
    #[error("plan is internally inconsistent: sender {sender} day {day} has {recipients} recipients but {times} planned times")]
    DataIntegrity {
        sender: uuid::Uuid,
        day: u32,
        recipients: usize,
        times: usize,
    },
    #[error("action {0:?} is not valid for task in state {1:?}")]
    InvalidAction(ControlAction, crate::core::domain::TaskStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    Stop,
}

/// Errors surfaced by a [`crate::core::send_backend::SendBackend`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SendError {
    #[error("anti-spam envelope exceeded for sender {sender}: {detail}")]
    AntiSpam { sender: uuid::Uuid, detail: String },
    #[error("mailbox full for recipient {0}")]
    MailboxFull(uuid::Uuid),
    #[error("transient server error: {0}")]
    TransientServerError(String),
    #[error("invalid recipient {0}")]
    InvalidRecipient(uuid::Uuid),
    #[error("blocked by spam filter")]
    SpamFilterBlock,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Machine-readable codes for the demo HTTP façade's error envelope (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidSendEmails,
    DisabledSendEmails,
    NoReceiveEmails,
    TaskNotFound,
    CalculationRequired,
    MissingStatusMatrix,
    SchedulerStartFailed,
    DataIntegrityError,
    InvalidAction,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorDetail,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}
