use actix::prelude::*;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::kv_store::tasks_key;

/// Pushed to a connection when its user's task list changed elsewhere.
#[derive(Message, Serialize, Debug, Clone, PartialEq, Eq)]
#[rtype(result = "()")]
pub struct ListChanged {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub key: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub user_id: String,
    pub client_id: Uuid,
    pub addr: Recipient<ListChanged>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub user_id: String,
    pub client_id: Uuid,
}

/// Sent after a user's list was persisted. `origin` is the connection that
/// caused it and is not told about its own change.
#[derive(Message)]
#[rtype(result = "()")]
pub struct TasksChanged {
    pub user_id: String,
    pub origin: Option<Uuid>,
}

#[cfg(test)]
#[derive(Message)]
#[rtype(result = "usize")]
pub struct ConnectionCount {
    pub user_id: String,
}

/// Tracks open change-notification sockets per user.
#[derive(Default)]
pub struct TaskNotifier {
    sessions: HashMap<String, Vec<(Uuid, Recipient<ListChanged>)>>,
}

impl TaskNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for TaskNotifier {
    type Context = Context<Self>;
}

impl Handler<Connect> for TaskNotifier {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("User {} connected (WS) as client {}", msg.user_id, msg.client_id);
        self.sessions
            .entry(msg.user_id)
            .or_default()
            .push((msg.client_id, msg.addr));
    }
}

impl Handler<Disconnect> for TaskNotifier {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("User {} disconnected (WS) client {}", msg.user_id, msg.client_id);
        if let Some(conns) = self.sessions.get_mut(&msg.user_id) {
            conns.retain(|(id, _)| *id != msg.client_id);
            if conns.is_empty() {
                self.sessions.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<TasksChanged> for TaskNotifier {
    type Result = ();

    fn handle(&mut self, msg: TasksChanged, _: &mut Context<Self>) {
        let Some(conns) = self.sessions.get(&msg.user_id) else {
            return;
        };
        let signal = ListChanged {
            kind: "tasks_changed",
            key: tasks_key(&msg.user_id),
        };
        for (client_id, addr) in conns {
            if Some(*client_id) == msg.origin {
                continue;
            }
            debug!("Notifying client {} of {}", client_id, signal.key);
            addr.do_send(signal.clone());
        }
    }
}

#[cfg(test)]
impl Handler<ConnectionCount> for TaskNotifier {
    type Result = usize;

    fn handle(&mut self, msg: ConnectionCount, _: &mut Context<Self>) -> usize {
        self.sessions.get(&msg.user_id).map_or(0, Vec::len)
    }
}
