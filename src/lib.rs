pub mod app_state;
pub mod assistant;
pub mod auth;
pub mod calendar;
pub mod chat_session;
pub mod completion;
pub mod config;
pub mod error;
pub mod intent;
pub mod kv_store;
pub mod models;
pub mod notifier;
pub mod reminders;
pub mod task_hub;
pub mod task_store;
pub mod tasks;
pub mod ws_session;

use actix_web::{web, HttpResponse, Responder};

use crate::assistant::{close_session, get_transcript, open_session, send_message};
use crate::completion::{chat, chat_json_config};
use crate::tasks::{
    create_task, delete_task, get_calendar, get_reminders, list_tasks, toggle_task,
    update_due_date,
};
use crate::ws_session::ws_index;

pub const LIVENESS: &str = "AI Assistant API is running";

/// GET /
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body(LIVENESS)
}

/// Registers every route. Expects `web::Data<AppState>` and the
/// [`auth::Authentication`] middleware to be installed by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/chat")
                        .app_data(chat_json_config())
                        .route(web::post().to(chat)),
                )
                // TASKS
                .service(
                    web::scope("/tasks")
                        .route("", web::get().to(list_tasks))
                        .route("", web::post().to(create_task))
                        .route("/{id}", web::delete().to(delete_task))
                        .route("/{id}/toggle", web::post().to(toggle_task))
                        .route("/{id}/due_date", web::put().to(update_due_date)),
                )
                .route("/reminders", web::get().to(get_reminders))
                .route("/calendar/{year}/{month}", web::get().to(get_calendar))
                // LOCAL ASSISTANT
                .service(
                    web::scope("/assistant/sessions")
                        .route("", web::post().to(open_session))
                        .route("/{session_id}", web::get().to(get_transcript))
                        .route("/{session_id}", web::delete().to(close_session))
                        .route("/{session_id}/messages", web::post().to(send_message)),
                ),
        )
        // WEBSOCKET change notifications
        .service(web::resource("/ws").route(web::get().to(ws_index)));
}
