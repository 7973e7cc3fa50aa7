use actix_web::{error::InternalError, web, HttpRequest, HttpResponse, Responder};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::config::Config;
use crate::error::CompletionError;
use crate::models::message::{ChatReply, ChatRequest};

pub const EMPTY_COMPLETION: &str = "Sorry, I couldn't generate a response.";
pub const COMPLETION_FAILED: &str = "An error occurred while processing your request.";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ProviderMessage<'a>>,
}

#[derive(Serialize)]
struct ProviderMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Thin client for a hosted chat-completion API.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl CompletionClient {
    pub fn new(api_base: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY is not set; /api/chat will answer with an error message");
        }
        Self::new(
            &config.openai_api_base,
            config.openai_api_key.clone(),
            &config.openai_model,
        )
    }

    /// Text of the first choice, `None` when the provider returned nothing.
    pub async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingCredential)?;
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![ProviderMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Provider { status, body });
        }

        let parsed: CompletionResponse = resp.json().await?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.is_empty()))
    }

    /// Never fails: provider problems turn into a fixed reply.
    pub async fn generate_response(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => EMPTY_COMPLETION.to_string(),
            Err(e) => {
                error!("Error calling completion provider: {}", e);
                COMPLETION_FAILED.to_string()
            }
        }
    }
}

/// POST /api/chat
pub async fn chat(data: web::Data<AppState>, payload: web::Json<ChatRequest>) -> impl Responder {
    let message = data.completion.generate_response(&payload.message).await;
    HttpResponse::Ok().json(ChatReply { message })
}

/// Body errors on /api/chat answer like a failed completion.
pub fn chat_json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        warn!("Rejected chat payload: {}", err);
        let resp = HttpResponse::InternalServerError().json(json!({ "error": COMPLETION_FAILED }));
        InternalError::from_response(err, resp).into()
    })
}
