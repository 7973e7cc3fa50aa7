use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::AuthState;
use crate::chat_session::{ChatSession, Exchange};
use crate::error::{AppError, StoreError};
use crate::kv_store::KvStore;
use crate::models::message::ChatMessage;
use crate::models::task::Task;
use crate::task_store::TaskStore;

pub const DEFAULT_CHAT_IDLE: Duration = Duration::from_secs(30 * 60);
pub const MAX_CHATS_PER_USER: usize = 8;

#[derive(Debug)]
pub struct Applied<R> {
    pub value: R,
    pub tasks: Vec<Task>,
    /// Whether a new snapshot was written.
    pub changed: bool,
}

struct OwnedChat {
    owner: String,
    session: ChatSession,
    last_used: Instant,
    // recency for eviction; Instants can tie
    touched: u64,
}

#[derive(Default)]
struct ChatRegistry {
    chats: HashMap<Uuid, OwnedChat>,
    clock: u64,
}

impl ChatRegistry {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // Chats of other users look exactly like missing ones. An idle chat is
    // dropped on sight.
    fn live(&mut self, user_id: &str, chat_id: Uuid, idle: Duration) -> Result<&mut OwnedChat, AppError> {
        let expired = match self.chats.get(&chat_id) {
            Some(chat) if chat.owner == user_id => chat.last_used.elapsed() >= idle,
            _ => return Err(chat_not_found(chat_id)),
        };
        if expired {
            self.chats.remove(&chat_id);
            debug!("Chat {} of user {} expired", chat_id, user_id);
            return Err(chat_not_found(chat_id));
        }

        let touched = self.tick();
        let chat = self
            .chats
            .get_mut(&chat_id)
            .ok_or_else(|| chat_not_found(chat_id))?;
        chat.last_used = Instant::now();
        chat.touched = touched;
        Ok(chat)
    }

    fn sweep(&mut self, idle: Duration) -> usize {
        let before = self.chats.len();
        self.chats.retain(|_, chat| chat.last_used.elapsed() < idle);
        before - self.chats.len()
    }

    fn evict_oldest(&mut self, user_id: &str, keep: usize) {
        let mut mine: Vec<(u64, Uuid)> = self
            .chats
            .iter()
            .filter(|(_, chat)| chat.owner == user_id)
            .map(|(id, chat)| (chat.touched, *id))
            .collect();
        if mine.len() <= keep {
            return;
        }
        mine.sort_unstable();
        for (_, id) in &mine[..mine.len() - keep] {
            self.chats.remove(id);
            info!("Evicted chat {} of user {}", id, user_id);
        }
    }
}

// Each call reopens the user's snapshot. Cycles are serialized per user.
pub struct TaskHub {
    kv: Arc<KvStore>,
    user_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    registry: StdMutex<ChatRegistry>,
    chat_idle: Duration,
}

impl TaskHub {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self {
            kv,
            user_locks: StdMutex::new(HashMap::new()),
            registry: StdMutex::new(ChatRegistry::default()),
            chat_idle: DEFAULT_CHAT_IDLE,
        }
    }

    pub fn with_chat_idle(mut self, idle: Duration) -> Self {
        self.chat_idle = idle;
        self
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user_id.to_string()).or_default().clone()
    }

    fn registry(&self) -> MutexGuard<'_, ChatRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let lock = self.user_lock(user_id);
        let _cycle = lock.lock().await;
        let store = TaskStore::open(&signed_in(user_id), &self.kv).await?;
        Ok(store.tasks().to_vec())
    }

    pub async fn update<R, F>(&self, user_id: &str, op: F) -> Result<Applied<R>, StoreError>
    where
        F: FnOnce(&mut TaskStore) -> R,
    {
        let lock = self.user_lock(user_id);
        let _cycle = lock.lock().await;
        let mut store = TaskStore::open(&signed_in(user_id), &self.kv).await?;
        let value = op(&mut store);
        let changed = store.persist(&self.kv).await?;
        if changed {
            debug!("Persisted {} task(s) for user {}", store.len(), user_id);
        }
        Ok(Applied {
            value,
            tasks: store.tasks().to_vec(),
            changed,
        })
    }

    pub fn open_chat(&self, user_id: &str) -> Uuid {
        let mut registry = self.registry();
        registry.sweep(self.chat_idle);
        registry.evict_oldest(user_id, MAX_CHATS_PER_USER - 1);

        let id = Uuid::new_v4();
        let touched = registry.tick();
        registry.chats.insert(
            id,
            OwnedChat {
                owner: user_id.to_string(),
                session: ChatSession::new(),
                last_used: Instant::now(),
                touched,
            },
        );
        info!("Opened chat {} for user {}", id, user_id);
        id
    }

    pub fn transcript(&self, user_id: &str, chat_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        let mut registry = self.registry();
        let chat = registry.live(user_id, chat_id, self.chat_idle)?;
        Ok(chat.session.messages().to_vec())
    }

    /// `value` is `None` for blank input.
    pub async fn submit(
        &self,
        user_id: &str,
        chat_id: Uuid,
        text: &str,
    ) -> Result<Applied<Option<(Exchange, Vec<ChatMessage>)>>, AppError> {
        let lock = self.user_lock(user_id);
        let _cycle = lock.lock().await;
        self.registry().live(user_id, chat_id, self.chat_idle)?;

        let mut store = TaskStore::open(&signed_in(user_id), &self.kv).await?;
        let (exchange, messages) = {
            let mut registry = self.registry();
            let chat = registry.live(user_id, chat_id, self.chat_idle)?;
            let exchange = chat.session.submit(text, &mut store);
            (exchange, chat.session.messages().to_vec())
        };
        let changed = store.persist(&self.kv).await?;

        Ok(Applied {
            value: exchange.map(|e| (e, messages)),
            tasks: store.tasks().to_vec(),
            changed,
        })
    }

    pub fn close_chat(&self, user_id: &str, chat_id: Uuid) -> Result<(), AppError> {
        let mut registry = self.registry();
        registry.live(user_id, chat_id, self.chat_idle)?;
        registry.chats.remove(&chat_id);
        info!("Closed chat {} for user {}", chat_id, user_id);
        Ok(())
    }

    pub fn sweep(&self) -> usize {
        let expired = self.registry().sweep(self.chat_idle);
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        if expired > 0 {
            debug!("Swept {} idle chat(s)", expired);
        }
        expired
    }

    #[cfg(test)]
    fn chat_count(&self) -> usize {
        self.registry().chats.len()
    }
}

fn signed_in(user_id: &str) -> AuthState {
    AuthState::SignedIn(user_id.to_string())
}

fn chat_not_found(chat_id: Uuid) -> AppError {
    AppError::NotFound(format!("Chat session {} not found", chat_id))
}
