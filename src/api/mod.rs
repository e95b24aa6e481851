//! Thin demo HTTP façade over the scheduler core (§6). No auth, persistence,
//! or templating layer — those belong to a real deployment's own stack;
//! this crate only proves out the planning/scheduling engine.

pub mod tasks;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/send-tasks").configure(tasks::configure));
}
