use chrono::{NaiveDate, Utc};
use log::{debug, warn};

use crate::auth::AuthState;
use crate::error::StoreError;
use crate::kv_store::{tasks_key, KvStore};
use crate::models::task::{Task, TaskId};

/// The ordered task list of the signed-in user
#[derive(Debug, Default)]
pub struct TaskStore {
    owner: Option<String>,
    tasks: Vec<Task>,
    dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    Add {
        text: String,
        due_date: Option<NaiveDate>,
    },
    Toggle(TaskId),
    Delete(TaskId),
    SetDueDate(TaskId, Option<NaiveDate>),
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(auth: &AuthState, kv: &KvStore) -> Result<Self, StoreError> {
        let snapshot = match auth {
            AuthState::SignedIn(user_id) => kv.get(&tasks_key(user_id)).await?,
            AuthState::Loading | AuthState::SignedOut => None,
        };
        let mut store = Self::new();
        store.apply_auth(auth, snapshot.as_deref());
        Ok(store)
    }

    // Absent or malformed snapshots leave the list empty.
    pub fn restore(&mut self, user_id: &str, snapshot: Option<&str>) {
        self.tasks = match snapshot {
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable task snapshot for {}: {}", user_id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        debug!("Loaded {} task(s) for user {}", self.tasks.len(), user_id);
        self.owner = Some(user_id.to_string());
        self.dirty = false;
    }

    pub fn sign_out(&mut self) {
        self.owner = None;
        self.tasks.clear();
        self.dirty = false;
    }

    pub fn apply_auth(&mut self, auth: &AuthState, snapshot: Option<&str>) {
        match auth {
            AuthState::SignedIn(user_id) => self.restore(user_id, snapshot),
            AuthState::Loading | AuthState::SignedOut => self.sign_out(),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    // callers reject blank text
    pub fn add_task(&mut self, text: impl Into<String>, due_date: Option<NaiveDate>) -> TaskId {
        let id = self.next_id();
        let text = text.into();
        debug!("Adding task {}: {:?} (due {:?})", id, text, due_date);
        self.tasks.push(Task {
            id,
            text,
            completed: false,
            due_date,
        });
        self.dirty = true;
        id
    }

    pub fn toggle_task(&mut self, id: TaskId) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = !task.completed;
                debug!("Toggled task {} -> completed={}", id, task.completed);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn delete_task(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        if removed {
            debug!("Deleted task {}", id);
            self.dirty = true;
        }
        removed
    }

    pub fn update_task_due_date(&mut self, id: TaskId, due_date: Option<NaiveDate>) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.due_date = due_date;
                debug!("Task {} now due {:?}", id, due_date);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, command: TaskCommand) -> bool {
        match command {
            TaskCommand::Add { text, due_date } => {
                self.add_task(text, due_date);
                true
            }
            TaskCommand::Toggle(id) => self.toggle_task(id),
            TaskCommand::Delete(id) => self.delete_task(id),
            TaskCommand::SetDueDate(id, due_date) => self.update_task_due_date(id, due_date),
        }
    }

    pub fn snapshot(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.tasks)?)
    }

    /// Writes the whole list if anything changed, an empty list included.
    pub async fn persist(&mut self, kv: &KvStore) -> Result<bool, StoreError> {
        let owner = match (&self.owner, self.dirty) {
            (Some(owner), true) => owner.clone(),
            _ => return Ok(false),
        };
        kv.set(&tasks_key(&owner), self.snapshot()?).await?;
        self.dirty = false;
        Ok(true)
    }

    // Creation time in ms, bumped past the newest id so two adds within the
    // same millisecond stay distinct.
    fn next_id(&self) -> TaskId {
        let now = Utc::now().timestamp_millis();
        let newest = self.tasks.iter().map(|t| t.id.0).max().unwrap_or(i64::MIN);
        TaskId(now.max(newest.saturating_add(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn signed_in(user_id: &str) -> AuthState {
        AuthState::SignedIn(user_id.to_string())
    }

    fn store_with(texts: &[&str]) -> TaskStore {
        let mut store = TaskStore::new();
        store.restore("u1", None);
        for text in texts {
            store.add_task(*text, None);
        }
        store
    }

    #[test]
    fn add_appends_incomplete_task() {
        let mut store = store_with(&["first"]);
        let id = store.add_task("second", Some(date("2024-06-14")));

        assert_eq!(store.len(), 2);
        let task = store.get(id).unwrap();
        assert_eq!(task.text, "second");
        assert!(!task.completed);
        assert_eq!(task.due_date, Some(date("2024-06-14")));
        assert_eq!(store.tasks()[1].id, id);
    }

    #[test]
    fn ids_stay_unique_for_rapid_adds() {
        let store = store_with(&["a", "b", "c", "d"]);
        let ids: Vec<_> = store.tasks().iter().map(|t| t.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut store = store_with(&["a", "b"]);
        store.dirty = false;
        let before = store.tasks().to_vec();

        assert!(!store.toggle_task(TaskId(-1)));
        assert!(!store.delete_task(TaskId(-1)));
        assert!(!store.update_task_due_date(TaskId(-1), Some(date("2024-01-01"))));

        assert_eq!(store.tasks(), before.as_slice());
        assert!(!store.is_dirty());
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut store = store_with(&["a"]);
        let id = store.tasks()[0].id;
        store.toggle_task(id);
        assert!(store.get(id).unwrap().completed);
        store.toggle_task(id);
        assert!(!store.get(id).unwrap().completed);
    }

    #[test]
    fn delete_and_due_date_target_by_id() {
        let mut store = store_with(&["a", "b", "c"]);
        let b = store.tasks()[1].id;
        let c = store.tasks()[2].id;

        assert!(store.update_task_due_date(c, Some(date("2024-02-29"))));
        assert!(store.delete_task(b));

        let texts: Vec<_> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["a", "c"]);
        assert_eq!(store.get(c).unwrap().due_date, Some(date("2024-02-29")));
        assert!(store.update_task_due_date(c, None));
        assert_eq!(store.get(c).unwrap().due_date, None);
    }

    #[test]
    fn malformed_snapshot_fails_closed() {
        let mut store = TaskStore::new();
        store.restore("u1", Some("{not json"));
        assert!(store.is_empty());
        assert_eq!(store.owner(), Some("u1"));

        store.restore("u1", Some(r#"[{"id":1,"text":"x"}]"#));
        assert!(store.is_empty());
    }

    #[test]
    fn signing_out_or_loading_clears_without_writing() {
        let mut store = store_with(&["a"]);
        store.apply_auth(&AuthState::Loading, None);
        assert!(store.is_empty());
        assert_eq!(store.owner(), None);
        assert!(!store.is_dirty());

        store.apply_auth(&AuthState::SignedIn("u2".into()), Some("[]"));
        assert_eq!(store.owner(), Some("u2"));
        store.apply_auth(&AuthState::SignedOut, None);
        assert_eq!(store.owner(), None);
    }

    #[actix_web::test]
    async fn snapshot_round_trips_per_user() {
        let kv = KvStore::memory();
        let mut store = TaskStore::open(&signed_in("alice"), &kv).await.unwrap();
        assert!(store.is_empty());

        store.add_task("A", None);
        let b = store.add_task("B", Some(date("2024-01-01")));
        store.toggle_task(b);
        assert!(store.persist(&kv).await.unwrap());
        assert!(!store.is_dirty());

        let reloaded = TaskStore::open(&signed_in("alice"), &kv).await.unwrap();
        assert_eq!(reloaded.tasks(), store.tasks());

        let other = TaskStore::open(&signed_in("bob"), &kv).await.unwrap();
        assert!(other.is_empty());
    }

    #[actix_web::test]
    async fn deleting_last_task_persists_empty_list() {
        let kv = KvStore::memory();
        let mut store = TaskStore::open(&signed_in("alice"), &kv).await.unwrap();
        let id = store.add_task("only", None);
        store.persist(&kv).await.unwrap();

        store.delete_task(id);
        assert!(store.persist(&kv).await.unwrap());

        assert_eq!(kv.get("tasks_alice").await.unwrap().as_deref(), Some("[]"));
        assert!(TaskStore::open(&signed_in("alice"), &kv).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn clean_or_signed_out_store_does_not_write() {
        let kv = KvStore::memory();
        let mut store = TaskStore::open(&signed_in("alice"), &kv).await.unwrap();
        assert!(!store.persist(&kv).await.unwrap());
        assert_eq!(kv.get("tasks_alice").await.unwrap(), None);

        let mut anonymous = TaskStore::new();
        anonymous.add_task("floating", None);
        assert!(!anonymous.persist(&kv).await.unwrap());
    }

    #[actix_web::test]
    async fn unsettled_identity_reads_nothing() {
        let kv = KvStore::memory();
        kv.set("tasks_alice", "[]".to_string()).await.unwrap();

        for auth in [AuthState::Loading, AuthState::SignedOut] {
            let mut store = TaskStore::open(&auth, &kv).await.unwrap();
            assert_eq!(store.owner(), None);
            store.add_task("floating", None);
            assert!(!store.persist(&kv).await.unwrap());
        }
        assert_eq!(kv.get("tasks_alice").await.unwrap().as_deref(), Some("[]"));
    }
}
