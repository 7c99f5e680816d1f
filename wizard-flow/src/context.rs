use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{GraphError, Result};

/// Key/value store shared by the tasks of one session.
///
/// Cloning a `Context` shares the underlying map. Use [`Context::deep_clone`]
/// when an independent copy is needed.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.set_sync(key, value)
    }

    pub fn set_sync(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| GraphError::ContextError(format!("failed to serialize '{key}': {e}")))?;
        self.data.insert(key, value);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    /// Synchronous read, usable from edge conditions and guards.
    pub fn get_sync<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Removes a value and returns it deserialized. Used for one-shot inputs.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .remove(key)
            .and_then(|(_, v)| serde_json::from_value(v).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Copy of every entry, sorted by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// A context holding the same entries but backed by its own map.
    pub fn deep_clone(&self) -> Self {
        Self {
            data: Arc::new(self.snapshot().into_iter().collect()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = HashMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            data: Arc::new(entries.into_iter().collect()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_removes_the_value() {
        let context = Context::new();
        context.set("input", "hello").await.unwrap();

        let taken: Option<String> = context.take("input").await;
        assert_eq!(taken.as_deref(), Some("hello"));
        assert!(!context.contains_key("input"));
    }

    #[tokio::test]
    async fn deep_clone_is_independent() {
        let context = Context::new();
        context.set("count", 1).await.unwrap();

        let copy = context.deep_clone();
        copy.set("count", 2).await.unwrap();

        assert_eq!(context.get::<i32>("count").await, Some(1));
        assert_eq!(copy.get::<i32>("count").await, Some(2));
    }

    #[test]
    fn serializes_as_a_plain_map() {
        let context = Context::new();
        context.set_sync("name", "Evelyn").unwrap();

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Evelyn" }));

        let restored: Context = serde_json::from_value(json).unwrap();
        assert_eq!(restored.get_sync::<String>("name").as_deref(), Some("Evelyn"));
    }
}
