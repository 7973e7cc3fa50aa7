// src/assistant.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::AppError;
use crate::models::message::{AssistantReply, ChatRequest};
use crate::tasks::announce;

/// POST /api/assistant/sessions
pub async fn open_session(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let session_id = data.hub.open_chat(&user_id);
    Ok(HttpResponse::Ok().json(json!({ "session_id": session_id })))
}

/// GET /api/assistant/sessions/{session_id}
pub async fn get_transcript(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let messages = data.hub.transcript(&user_id, path.into_inner())?;
    Ok(HttpResponse::Ok().json(messages))
}

/// POST /api/assistant/sessions/{session_id}/messages
pub async fn send_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<ChatRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    let applied = data
        .hub
        .submit(&user_id, path.into_inner(), &payload.message)
        .await?;
    announce(&req, &data, &user_id, &applied);

    match applied.value {
        Some((exchange, messages)) => Ok(HttpResponse::Ok().json(AssistantReply {
            intent: exchange.intent,
            reply: exchange.reply,
            messages,
        })),
        None => Err(AppError::BadRequest("Message must not be blank".to_string())),
    }
}

/// DELETE /api/assistant/sessions/{session_id}
pub async fn close_session(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = current_user(&req)?;
    data.hub.close_chat(&user_id, path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}
