use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::{plan, Plan, PlanParams, Recipient, Scheduler, Task, TaskStatus};
use crate::error::{ControlAction, ErrorCode, ErrorEnvelope};
use crate::store::TaskStore;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/calculate", web::post().to(calculate))
        .route("", web::post().to(create_task))
        .route("/{id}/control", web::post().to(control))
        .route("/{id}/status", web::get().to(status))
        .route("", web::delete().to(reset));
}

#[derive(Debug, Deserialize, Validate)]
struct CalculateRequest {
    #[validate(length(min = 1, message = "senderIds must not be empty"))]
    sender_ids: Vec<Uuid>,
    #[validate(range(min = 1, message = "recipientCount must be at least 1"))]
    recipient_count: u32,
    #[validate(range(min = 0.0001, message = "emailsPerHour must be positive"))]
    emails_per_hour: f64,
    #[validate(range(min = 1, message = "emailsPerRecipientPerDay must be at least 1"))]
    emails_per_recipient_per_day: u32,
    working_hours: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CalculateResponse {
    success: bool,
    plan: Plan,
}

async fn calculate(body: web::Json<CalculateRequest>) -> HttpResponse {
    let body = body.into_inner();
    if body.sender_ids.is_empty() {
        return HttpResponse::BadRequest().json(ErrorEnvelope::new(
            ErrorCode::InvalidSendEmails,
            "senderIds must not be empty",
        ));
    }
    if body.recipient_count == 0 {
        return HttpResponse::BadRequest().json(ErrorEnvelope::new(
            ErrorCode::NoReceiveEmails,
            "recipient population is empty",
        ));
    }
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ErrorEnvelope::new(ErrorCode::InvalidSendEmails, e.to_string()));
    }

    let mut params = PlanParams::new(
        body.sender_ids,
        body.recipient_count,
        body.emails_per_hour,
        body.emails_per_recipient_per_day,
    );
    if let Some(hours) = body.working_hours {
        params = params.with_working_hours(hours);
    }
    if let Err(e) = params.validate() {
        return HttpResponse::BadRequest()
            .json(ErrorEnvelope::new(ErrorCode::DisabledSendEmails, e.to_string()));
    }

    let computed = plan(&params);
    HttpResponse::Ok().json(CalculateResponse {
        success: true,
        plan: computed,
    })
}

#[derive(Debug, Deserialize, Validate)]
struct CreateTaskRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    name: String,
    #[validate(length(min = 1, message = "senderIds must not be empty"))]
    sender_ids: Vec<Uuid>,
    #[validate(range(min = 1))]
    recipient_count: u32,
    #[validate(range(min = 0.0001))]
    emails_per_hour: f64,
    #[validate(range(min = 1))]
    emails_per_recipient_per_day: u32,
    working_hours: Option<u32>,
    created_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct CreateTaskResponse {
    success: bool,
    task: Task,
    duration_days: u32,
}

async fn create_task(
    store: web::Data<TaskStore>,
    scheduler: web::Data<Arc<Scheduler>>,
    body: web::Json<CreateTaskRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ErrorEnvelope::new(ErrorCode::InvalidSendEmails, e.to_string()));
    }

    let mut params = PlanParams::new(
        body.sender_ids.clone(),
        body.recipient_count,
        body.emails_per_hour,
        body.emails_per_recipient_per_day,
    );
    if let Some(hours) = body.working_hours {
        params = params.with_working_hours(hours);
    }
    if let Err(e) = params.validate() {
        return HttpResponse::BadRequest()
            .json(ErrorEnvelope::new(ErrorCode::DisabledSendEmails, e.to_string()));
    }
    let computed = plan(&params);

    let task = Task::new(
        body.name,
        body.sender_ids,
        body.emails_per_hour,
        body.emails_per_recipient_per_day,
        body.created_by,
    );
    let task_id = task.id;

    // The demo façade has no real lead store; it mints placeholder
    // recipients so the planner's indices have somewhere to land.
    let recipients: Vec<Recipient> = (0..body.recipient_count)
        .map(|i| Recipient {
            id: Uuid::new_v4(),
            email: format!("recipient-{i}@example.invalid"),
            first_name: None,
            company: None,
            blacklisted: false,
        })
        .collect();

    store.put_task(task.clone());
    store.put_task_recipients(task_id, recipients);
    store.put_plan_params(task_id, params);
    scheduler.register_task(task.clone());

    HttpResponse::Created().json(CreateTaskResponse {
        success: true,
        task,
        duration_days: computed.calculated_days,
    })
}

#[derive(Debug, Deserialize)]
struct ControlRequest {
    action: ControlAction,
    calculation_result: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ControlResponse {
    success: bool,
    task: Task,
}

async fn control(
    store: web::Data<TaskStore>,
    scheduler: web::Data<Arc<Scheduler>>,
    path: web::Path<Uuid>,
    body: web::Json<ControlRequest>,
) -> HttpResponse {
    let task_id = path.into_inner();
    let body = body.into_inner();

    let Some(mut task) = store.get_task(task_id) else {
        return HttpResponse::NotFound().json(ErrorEnvelope::new(
            ErrorCode::TaskNotFound,
            format!("task {task_id} not found"),
        ));
    };

    let result = match body.action {
        ControlAction::Start => {
            let has_status_matrix = body
                .calculation_result
                .as_ref()
                .and_then(|v| v.get("statusMatrix"))
                .is_some();
            if !has_status_matrix {
                return HttpResponse::BadRequest().json(ErrorEnvelope::new(
                    ErrorCode::MissingStatusMatrix,
                    "control action 'start' requires calculationResult.statusMatrix",
                ));
            }
            let Some(params) = store.plan_params(task_id) else {
                return HttpResponse::BadRequest().json(ErrorEnvelope::new(
                    ErrorCode::CalculationRequired,
                    "no plan parameters on record for this task; call /calculate first",
                ));
            };
            let computed = plan(&params);
            let recipient_ids = store.recipient_ids_for_task(task_id);
            scheduler.start_task(task_id, &computed, &recipient_ids)
        }
        ControlAction::Pause => scheduler.pause_task(task_id),
        ControlAction::Resume => scheduler.resume_task(task_id),
        ControlAction::Stop => scheduler.stop_task(task_id),
    };

    if let Err(e) = result {
        if matches!(body.action, ControlAction::Start) {
            task.status = TaskStatus::Failed;
            store.put_task(task.clone());
        }
        let code = match &e {
            crate::error::SchedulerError::TaskNotFound(_) => ErrorCode::TaskNotFound,
            crate::error::SchedulerError::DataIntegrity { .. } => ErrorCode::DataIntegrityError,
            crate::error::SchedulerError::InvalidAction(..) => ErrorCode::InvalidAction,
        };
        return HttpResponse::BadRequest().json(
            ErrorEnvelope::new(code, e.to_string()).with_details(serde_json::json!({
                "taskId": task_id,
            })),
        );
    }

    let snapshot = match scheduler.get_task_status(task_id) {
        Ok(s) => s,
        Err(e) => {
            return HttpResponse::InternalServerError()
                .json(ErrorEnvelope::new(ErrorCode::SchedulerStartFailed, e.to_string()))
        }
    };
    store.put_task(snapshot.task.clone());

    HttpResponse::Ok().json(ControlResponse {
        success: true,
        task: snapshot.task,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    success: bool,
    task: Task,
    senders: Vec<Uuid>,
    scheduler_status: Option<SchedulerStatusView>,
    status_matrix: crate::core::StatusMatrix,
    matrix_stats: crate::core::TaskStatistics,
    real_time_stats: crate::core::TaskStatistics,
}

#[derive(Debug, Serialize)]
struct SchedulerStatusView {
    is_running: bool,
}

async fn status(scheduler: web::Data<Arc<Scheduler>>, path: web::Path<Uuid>) -> HttpResponse {
    let task_id = path.into_inner();
    let snapshot = match scheduler.get_task_status(task_id) {
        Ok(s) => s,
        Err(_) => {
            return HttpResponse::NotFound().json(ErrorEnvelope::new(
                ErrorCode::TaskNotFound,
                format!("task {task_id} not found"),
            ))
        }
    };
    let matrix = scheduler
        .get_status_matrix(task_id)
        .unwrap_or_default();

    HttpResponse::Ok().json(StatusResponse {
        success: true,
        senders: snapshot.task.sender_ids.clone(),
        scheduler_status: Some(SchedulerStatusView {
            is_running: snapshot.is_running,
        }),
        status_matrix: matrix,
        matrix_stats: snapshot.stats,
        real_time_stats: snapshot.stats,
        task: snapshot.task,
    })
}

async fn reset(store: web::Data<TaskStore>, scheduler: web::Data<Arc<Scheduler>>) -> HttpResponse {
    scheduler.reset();
    store.clear();
    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
}
