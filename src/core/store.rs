//! Key-value persistence shared by every handler.
//!
//! Documents are JSON values under prefixed keys. The Spin key-value store is
//! the production backend; [`MemoryStore`] backs the native server and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

pub fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn comment_key(id: &str) -> String {
    format!("comment:{}", id)
}

pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

pub trait KvStoreExt: KvStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.set(key, &serde_json::to_vec(value)?)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

impl KvStore for spin_sdk::key_value::Store {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        spin_sdk::key_value::Store::get(self, key)
            .map_err(|e| anyhow::anyhow!("key-value get {}: {:?}", key, e))
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        spin_sdk::key_value::Store::set(self, key, value)
            .map_err(|e| anyhow::anyhow!("key-value set {}: {:?}", key, e))
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        spin_sdk::key_value::Store::delete(self, key)
            .map_err(|e| anyhow::anyhow!("key-value delete {}: {:?}", key, e))
    }
}

/// In-process store. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {}", e))?;
        entries.remove(key);
        Ok(())
    }
}
