// src/tasks.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Local, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::calendar::{month_view, MonthView};
use crate::error::AppError;
use crate::models::task::{CreateTaskRequest, TaskId, UpdateDueDateRequest};
use crate::notifier::TasksChanged;
use crate::reminders::{evaluate, ReminderAlerts, ReminderCategory, Reminders};
use crate::task_hub::Applied;

/// Header a tab sends with its writes so it is not told about them.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

pub fn origin_client(req: &HttpRequest) -> Option<Uuid> {
    req.headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Tells the user's other tabs to reload when `applied` wrote a snapshot.
pub fn announce<R>(req: &HttpRequest, data: &AppState, user_id: &str, applied: &Applied<R>) {
    if applied.changed {
        data.notifier.do_send(TasksChanged {
            user_id: user_id.to_string(),
            origin: origin_client(req),
        });
    }
}

/// GET /api/tasks
pub async fn list_tasks(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let tasks = data.hub.tasks(&user_id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// POST /api/tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let CreateTaskRequest { text, due_date } = payload.into_inner();
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Task text must not be blank".to_string()));
    }

    let applied = data
        .hub
        .update(&user_id, |store| store.add_task(text, due_date))
        .await?;
    info!("Task {} created for user {}", applied.value, user_id);
    announce(&req, &data, &user_id, &applied);
    Ok(HttpResponse::Ok().json(applied.tasks))
}

/// POST /api/tasks/{id}/toggle
pub async fn toggle_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let id = TaskId(path.into_inner());
    let applied = data.hub.update(&user_id, |store| store.toggle_task(id)).await?;
    announce(&req, &data, &user_id, &applied);
    Ok(HttpResponse::Ok().json(applied.tasks))
}

/// PUT /api/tasks/{id}/due_date
pub async fn update_due_date(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<UpdateDueDateRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let id = TaskId(path.into_inner());
    let due_date = payload.into_inner().due_date;
    let applied = data
        .hub
        .update(&user_id, |store| store.update_task_due_date(id, due_date))
        .await?;
    announce(&req, &data, &user_id, &applied);
    Ok(HttpResponse::Ok().json(applied.tasks))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let id = TaskId(path.into_inner());
    let applied = data.hub.update(&user_id, |store| store.delete_task(id)).await?;
    announce(&req, &data, &user_id, &applied);
    Ok(HttpResponse::Ok().json(applied.tasks))
}

#[derive(Serialize)]
struct RemindersResponse {
    date: NaiveDate,
    alerts: ReminderAlerts,
    reminders: Reminders,
}

#[derive(Deserialize)]
pub struct RemindersQuery {
    // comma separated, e.g. "overdue,thisWeek"
    pub dismiss: Option<String>,
}

/// GET /api/reminders?dismiss=overdue,today
/// Dismissed categories are left out of `alerts` for this response only.
pub async fn get_reminders(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<RemindersQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let dismissed = query
        .dismiss
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<ReminderCategory>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::BadRequest)?;

    let tasks = data.hub.tasks(&user_id).await?;
    let today = Local::now().date_naive();
    let reminders = evaluate(&tasks, today);
    let mut alerts = ReminderAlerts::from(&reminders);
    for category in dismissed {
        alerts.dismiss(category);
    }
    Ok(HttpResponse::Ok().json(RemindersResponse {
        date: today,
        alerts,
        reminders,
    }))
}

#[derive(Serialize)]
struct CalendarResponse {
    #[serde(flatten)]
    view: MonthView,
    next: Option<(i32, u32)>,
    previous: Option<(i32, u32)>,
}

/// GET /api/calendar/{year}/{month}
pub async fn get_calendar(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(i32, u32)>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let (year, month) = path.into_inner();
    let tasks = data.hub.tasks(&user_id).await?;
    let view = month_view(&tasks, year, month)
        .ok_or_else(|| AppError::BadRequest(format!("No such month: {}-{}", year, month)))?;
    Ok(HttpResponse::Ok().json(CalendarResponse {
        next: view.next(),
        previous: view.previous(),
        view,
    }))
}
