use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::debug;
use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, Collection, Database};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const KV_COLLECTION: &str = "kv_store";

/// Slot name holding a user's persisted task list.
pub fn tasks_key(user_id: &str) -> String {
    format!("tasks_{}", user_id)
}

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        Ok(MongoDB { client, db })
    }

    fn slots(&self) -> Collection<KvEntry> {
        self.db.collection::<KvEntry>(KV_COLLECTION)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KvEntry {
    #[serde(rename = "_id")]
    key: String,
    value: String,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

/// Durable string slots addressed by key.
pub enum KvStore {
    Mongo(MongoDB),
    Memory(MemoryStore),
}

impl KvStore {
    pub fn memory() -> Self {
        KvStore::Memory(MemoryStore::default())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            KvStore::Mongo(mongo) => {
                let entry = mongo.slots().find_one(doc! { "_id": key }).await?;
                Ok(entry.map(|e| e.value))
            }
            KvStore::Memory(mem) => {
                let slots = mem.slots.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(slots.get(key).cloned())
            }
        }
    }

    /// Overwrites the slot; the last writer wins.
    pub async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        debug!("Writing slot {} ({} bytes)", key, value.len());
        match self {
            KvStore::Mongo(mongo) => {
                let entry = KvEntry {
                    key: key.to_string(),
                    value,
                    updated_at: Utc::now(),
                };
                mongo
                    .slots()
                    .replace_one(doc! { "_id": key }, &entry)
                    .upsert(true)
                    .await?;
                Ok(())
            }
            KvStore::Memory(mem) => {
                let mut slots = mem.slots.lock().unwrap_or_else(PoisonError::into_inner);
                slots.insert(key.to_string(), value);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_scoped_by_user() {
        assert_eq!(tasks_key("uid-42"), "tasks_uid-42");
    }

    #[actix_web::test]
    async fn memory_slots_overwrite() {
        let kv = KvStore::memory();
        assert_eq!(kv.get("tasks_a").await.unwrap(), None);

        kv.set("tasks_a", "[1]".to_string()).await.unwrap();
        kv.set("tasks_a", "[]".to_string()).await.unwrap();
        kv.set("tasks_b", "[2]".to_string()).await.unwrap();

        assert_eq!(kv.get("tasks_a").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(kv.get("tasks_b").await.unwrap().as_deref(), Some("[2]"));
    }
}
