use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tokio::time::sleep;

use campaign_scheduler::config::Config;
use campaign_scheduler::core::{
    AntiSpamLimits, Scheduler, SimulatedBackendConfig, SimulatedSendBackend, SystemClock,
};

/// Background sweep process. This does not poll a shared queue for
/// cross-process work: the scheduler's own per-task timers already drive
/// dispatch in-process. This binary exists to run the defensive completion
/// sweep and rate-window pruning independent of any single HTTP request,
/// off the request path.
#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env();

    let send_backend = Arc::new(SimulatedSendBackend::new(SimulatedBackendConfig {
        min_latency: cfg.simulated_min_latency,
        max_latency: cfg.simulated_max_latency,
        success_probability: cfg.simulated_success_probability,
        limits: AntiSpamLimits {
            per_minute: cfg.anti_spam_per_minute,
            per_hour: cfg.anti_spam_per_hour,
        },
    }));
    let scheduler = Arc::new(Scheduler::with_completion_tick(
        Arc::new(SystemClock),
        send_backend.clone(),
        cfg.completion_check_tick,
    ));

    println!("🔄 campaign-scheduler worker started");
    println!("   - completion sweep every iteration");
    println!("   - rate-window pruning every 12 iterations (~1 min)");

    let mut iteration = 0u64;
    loop {
        iteration += 1;

        scheduler.sweep_all();

        // Rate windows are pruned lazily on every check_and_record call
        // already; this sweep just bounds memory for senders that have
        // gone quiet.
        if iteration % 12 == 0 {
            send_backend.prune_idle_senders(Duration::from_secs(3600));
        }

        sleep(Duration::from_secs(5)).await;
    }
}
