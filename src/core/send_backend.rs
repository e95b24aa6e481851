//! Send backend (spec §4.3): the scheduler's only collaborator for actually
//! dispatching a message. Enforces the anti-spam rate envelope and, for the
//! simulated backend, injects latency and a configurable failure rate so
//! planner/scheduler tests stay deterministic and fast.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use rand::Rng;
use uuid::Uuid;

use crate::error::SendError;

pub type MessageId = String;

#[async_trait]
pub trait SendBackend: Send + Sync {
    async fn send(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        subject: &str,
        body: &str,
    ) -> Result<MessageId, SendError>;
}

/// Rolling per-sender send-rate counter. Cleaned lazily: old timestamps are
/// pruned on every check rather than on a background sweep, matching the
/// spec's "counters are cleaned lazily".
#[derive(Default)]
struct SenderWindow {
    sends: Vec<std::time::Instant>,
}

impl SenderWindow {
    fn prune(&mut self, now: std::time::Instant, horizon: Duration) {
        self.sends.retain(|t| now.duration_since(*t) <= horizon);
    }

    fn count_within(&mut self, now: std::time::Instant, horizon: Duration) -> usize {
        self.prune(now, horizon);
        self.sends.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AntiSpamLimits {
    /// Max sends in the trailing 60s window.
    pub per_minute: u32,
    /// Max sends in the trailing 3600s window.
    pub per_hour: u32,
}

impl Default for AntiSpamLimits {
    fn default() -> Self {
        Self {
            per_minute: 20,
            per_hour: 300,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimulatedBackendConfig {
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub success_probability: f64,
    pub limits: AntiSpamLimits,
}

impl Default for SimulatedBackendConfig {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(100),
            max_latency: Duration::from_millis(1000),
            success_probability: 0.95,
            limits: AntiSpamLimits::default(),
        }
    }
}

/// In-memory simulated send backend used by the planner/scheduler test
/// suite and by default in the demo binaries when no SMTP credentials are
/// configured.
pub struct SimulatedSendBackend {
    config: SimulatedBackendConfig,
    windows: Mutex<HashMap<Uuid, SenderWindow>>,
}

impl SimulatedSendBackend {
    pub fn new(config: SimulatedBackendConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_and_record(&self, sender_id: Uuid) -> Result<(), SendError> {
        let now = std::time::Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(sender_id).or_default();

        let minute_count = window.count_within(now, Duration::from_secs(60));
        if minute_count >= self.config.limits.per_minute as usize {
            return Err(SendError::AntiSpam {
                sender: sender_id,
                detail: format!(
                    "{} sends in the last 60s (limit {})",
                    minute_count, self.config.limits.per_minute
                ),
            });
        }

        let hour_count = window.count_within(now, Duration::from_secs(3600));
        if hour_count >= self.config.limits.per_hour as usize {
            return Err(SendError::AntiSpam {
                sender: sender_id,
                detail: format!(
                    "{} sends in the last 3600s (limit {})",
                    hour_count, self.config.limits.per_hour
                ),
            });
        }

        window.sends.push(now);
        Ok(())
    }

    /// Drop per-sender windows that have had no sends within `idle_after`,
    /// so a long-lived process doesn't accumulate one `SenderWindow` per
    /// sender that ever sent a single message.
    pub fn prune_idle_senders(&self, idle_after: Duration) {
        let now = std::time::Instant::now();
        let mut windows = self.windows.lock();
        windows.retain(|_, w| {
            w.prune(now, idle_after);
            !w.sends.is_empty()
        });
    }
}

#[async_trait]
impl SendBackend for SimulatedSendBackend {
    async fn send(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        _subject: &str,
        _body: &str,
    ) -> Result<MessageId, SendError> {
        self.check_and_record(sender_id)?;

        let latency_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(
                self.config.min_latency.as_millis() as u64..=self.config.max_latency.as_millis() as u64,
            )
        };
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        let roll: f64 = rand::thread_rng().gen();
        if roll <= self.config.success_probability {
            return Ok(Uuid::new_v4().to_string());
        }

        // Pick a distinct failure mode so tests and logs can tell them apart.
        let failure_roll: f64 = rand::thread_rng().gen();
        Err(if failure_roll < 0.25 {
            SendError::MailboxFull(recipient_id)
        } else if failure_roll < 0.5 {
            SendError::TransientServerError("upstream SMTP relay timed out".to_string())
        } else if failure_roll < 0.75 {
            SendError::InvalidRecipient(recipient_id)
        } else {
            SendError::SpamFilterBlock
        })
    }
}

/// Credentials the scheduler needs to send through a given sender's own
/// mailbox. Lookup (decrypting at-rest secrets, etc.) is the persistent
/// store's job; this crate only needs the resolved endpoint.
#[derive(Debug, Clone)]
pub struct SmtpSenderCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

pub type SenderCredentialLookup =
    Arc<dyn Fn(Uuid) -> Option<SmtpSenderCredentials> + Send + Sync>;

pub type RecipientAddressLookup = Arc<dyn Fn(Uuid) -> Option<String> + Send + Sync>;

/// Real SMTP-backed send implementation: build a multipart message with
/// `lettre` and relay it. Rate envelope enforcement is identical to the
/// simulated backend so both implementations satisfy the same contract.
pub struct SmtpSendBackend {
    limits: AntiSpamLimits,
    windows: Mutex<HashMap<Uuid, SenderWindow>>,
    credentials: SenderCredentialLookup,
    recipient_email: RecipientAddressLookup,
}

impl SmtpSendBackend {
    pub fn new(
        limits: AntiSpamLimits,
        credentials: SenderCredentialLookup,
        recipient_email: RecipientAddressLookup,
    ) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
            credentials,
            recipient_email,
        }
    }

    fn check_and_record(&self, sender_id: Uuid) -> Result<(), SendError> {
        let now = std::time::Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(sender_id).or_default();

        if window.count_within(now, Duration::from_secs(60)) >= self.limits.per_minute as usize {
            return Err(SendError::AntiSpam {
                sender: sender_id,
                detail: "per-minute envelope exceeded".to_string(),
            });
        }
        if window.count_within(now, Duration::from_secs(3600)) >= self.limits.per_hour as usize {
            return Err(SendError::AntiSpam {
                sender: sender_id,
                detail: "per-hour envelope exceeded".to_string(),
            });
        }
        window.sends.push(now);
        Ok(())
    }

    pub fn prune_idle_senders(&self, idle_after: Duration) {
        let now = std::time::Instant::now();
        let mut windows = self.windows.lock();
        windows.retain(|_, w| {
            w.prune(now, idle_after);
            !w.sends.is_empty()
        });
    }
}

#[async_trait]
impl SendBackend for SmtpSendBackend {
    async fn send(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        subject: &str,
        body: &str,
    ) -> Result<MessageId, SendError> {
        self.check_and_record(sender_id)?;

        let creds = (self.credentials)(sender_id)
            .ok_or_else(|| SendError::Transport("unknown sender account".to_string()))?;
        let to_email = (self.recipient_email)(recipient_id)
            .ok_or(SendError::InvalidRecipient(recipient_id))?;

        let from = format!("{} <{}>", creds.from_name, creds.from_email);
        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| SendError::Transport(format!("invalid from address: {e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|_| SendError::InvalidRecipient(recipient_id))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(strip_html(body)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(body.to_string()),
                    ),
            )
            .map_err(|e| SendError::Transport(format!("failed to build message: {e}")))?;

        let transport: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&creds.host)
                .map_err(|e| SendError::Transport(format!("failed to create transport: {e}")))?
                .credentials(Credentials::new(creds.username, creds.password))
                .port(creds.port)
                .build();

        let response = transport
            .send(email)
            .await
            .map_err(|e| SendError::TransientServerError(e.to_string()))?;

        Ok(response.message().collect::<Vec<_>>().join(""))
    }
}

fn strip_html(html: &str) -> String {
    let re = regex::Regex::new(r"<[^>]*>").expect("static regex is valid");
    re.replace_all(html, "").to_string()
}
