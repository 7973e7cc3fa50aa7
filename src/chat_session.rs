use crate::intent::{self, Intent};
use crate::models::message::ChatMessage;
use crate::task_store::TaskStore;

/// Transcript of one chat view. Append-only, never persisted.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

/// Result of a submitted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub intent: Intent,
    pub reply: String,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Records `text` and the dispatcher's answer to it. Blank input is
    /// ignored and yields `None`.
    pub fn submit(&mut self, text: &str, store: &mut TaskStore) -> Option<Exchange> {
        if text.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(text));
        let (intent, reply) = intent::dispatch(text, store);
        self.messages.push(ChatMessage::assistant(reply.clone()));
        Some(Exchange { intent, reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> TaskStore {
        let mut store = TaskStore::new();
        store.restore("u1", None);
        store
    }

    #[test]
    fn appends_user_then_reply() {
        let mut store = signed_in();
        let mut chat = ChatSession::new();

        let exchange = chat.submit("add task: stretch", &mut store).unwrap();
        assert_eq!(exchange.intent, Intent::AddTask);
        chat.submit("list tasks", &mut store);

        let transcript: Vec<_> = chat
            .messages()
            .iter()
            .map(|m| (m.is_user, m.text.as_str()))
            .collect();
        assert_eq!(
            transcript,
            [
                (true, "add task: stretch"),
                (false, "Task added: stretch"),
                (true, "list tasks"),
                (false, "Your tasks:\n1. [ ] stretch"),
            ]
        );
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut store = signed_in();
        let mut chat = ChatSession::new();
        assert!(chat.submit("   \n\t", &mut store).is_none());
        assert!(chat.submit("", &mut store).is_none());
        assert!(chat.messages().is_empty());
        assert!(!store.is_dirty());
    }
}
