//! Core scheduling engine: pure planning plus the stateful runtime that
//! drives it. Everything here is persistence-agnostic; a real deployment
//! wires a durable store and an HTTP/gRPC façade on top.

pub mod clock;
pub mod domain;
pub mod job;
pub mod planner;
pub mod scheduler;
pub mod send_backend;
pub mod status_matrix;

pub use clock::{Clock, SystemClock, TimerHandle, TimerSource};
pub use domain::{Recipient, Sender, Task, TaskStatus};
pub use job::{Job, JobStatus, JobStore};
pub use planner::{plan, DaySchedule, GroupInfo, MinuteOfDay, Plan, PlanParams, SenderDayAssignment, TailPolicy};
pub use scheduler::{Scheduler, TaskSnapshot};
pub use send_backend::{
    AntiSpamLimits, RecipientAddressLookup, SendBackend, SenderCredentialLookup,
    SimulatedBackendConfig, SimulatedSendBackend, SmtpSendBackend, SmtpSenderCredentials,
};
pub use status_matrix::{StatusMatrix, TaskStatistics};
