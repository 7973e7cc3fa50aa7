use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{auth_state, verify_token, AuthState};
use crate::error::AppError;
use crate::notifier::{Connect, Disconnect, ListChanged, TaskNotifier};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One browser tab listening for changes to its user's task list.
pub struct WebSocketConnection {
    pub client_id: Uuid,
    pub user_id: String,
    pub hb: Instant,
    pub notifier: Addr<TaskNotifier>,
}

impl WebSocketConnection {
    pub fn new(user_id: String, notifier: Addr<TaskNotifier>) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            user_id,
            hb: Instant::now(),
            notifier,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WebSocket client {} heartbeat failed, disconnecting", act.client_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WebSocketConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        self.notifier
            .send(Connect {
                user_id: self.user_id.clone(),
                client_id: self.client_id,
                addr: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(()) => {
                        // the client echoes this id in X-Client-Id on its own writes
                        let hello = json!({ "type": "hello", "client_id": act.client_id });
                        ctx.text(hello.to_string());
                    }
                    Err(e) => {
                        warn!("Failed to register with notifier: {}", e);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.notifier.do_send(Disconnect {
            user_id: self.user_id.clone(),
            client_id: self.client_id,
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) => {
                // the channel is server → client only
                self.hb = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<ListChanged> for WebSocketConnection {
    type Result = ();

    fn handle(&mut self, msg: ListChanged, ctx: &mut ws::WebsocketContext<Self>) {
        let outgoing = serde_json::to_string(&msg).unwrap_or_default();
        debug!("Sending change signal to client {}: {}", self.client_id, outgoing);
        ctx.text(outgoing);
    }
}

#[derive(Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws. Browsers cannot set headers on upgrades, so `?token=` is accepted too.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    params: web::Query<WsParams>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let user_id = match auth_state(&req) {
        AuthState::SignedIn(uid) => uid,
        AuthState::Loading | AuthState::SignedOut => match params.token.as_deref() {
            Some(token) => verify_token(token, &data.config.jwt_secret)
                .map_err(|_| AppError::Unauthorized)?,
            None => return Err(AppError::Unauthorized.into()),
        },
    };

    ws::start(
        WebSocketConnection::new(user_id, data.notifier.clone()),
        &req,
        stream,
    )
}
