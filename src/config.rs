use std::env;
use std::time::Duration;

/// Process-wide configuration, loaded once at startup. Defaults match the
/// worked planning examples (24 working hours, a 20/min and 300/hour
/// anti-spam envelope).
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub frontend_url: String,
    pub default_working_hours: u32,
    pub anti_spam_per_minute: u32,
    pub anti_spam_per_hour: u32,
    pub simulated_success_probability: f64,
    pub simulated_min_latency: Duration,
    pub simulated_max_latency: Duration,
    pub completion_check_tick: Duration,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            default_working_hours: env_parse("DEFAULT_WORKING_HOURS", 24),
            anti_spam_per_minute: env_parse("ANTI_SPAM_PER_MINUTE", 20),
            anti_spam_per_hour: env_parse("ANTI_SPAM_PER_HOUR", 300),
            simulated_success_probability: env_parse("SIMULATED_SUCCESS_PROBABILITY", 0.95),
            simulated_min_latency: Duration::from_millis(env_parse(
                "SIMULATED_MIN_LATENCY_MS",
                100,
            )),
            simulated_max_latency: Duration::from_millis(env_parse(
                "SIMULATED_MAX_LATENCY_MS",
                1000,
            )),
            completion_check_tick: Duration::from_secs(env_parse(
                "COMPLETION_CHECK_TICK_SECS",
                60,
            )),
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|p| p.parse().ok()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
