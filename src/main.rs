use actix_cors::Cors;
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use dotenvy::dotenv;
use std::sync::Arc;

use campaign_scheduler::config::Config;
use campaign_scheduler::core::{AntiSpamLimits, Scheduler, SimulatedBackendConfig, SimulatedSendBackend, SystemClock};
use campaign_scheduler::store::TaskStore;
use campaign_scheduler::api;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
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
        send_backend,
        cfg.completion_check_tick,
    ));
    let store = TaskStore::new();

    println!("🚀 campaign-scheduler API starting on http://{}", cfg.bind_addr);

    let bind_addr = cfg.bind_addr.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cfg.frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "PATCH"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(scheduler.clone()))
            .app_data(web::Data::new(store.clone()))
            .wrap(cors)
            .wrap(actix_middleware::Logger::default())
            .service(web::scope("/api").configure(api::configure))
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
