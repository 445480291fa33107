use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use super::errors::{DraftError, Result};
use super::record::{Draft, SAVED_AT_FIELD};
use super::storage::KeyValueStorage;

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// 草稿存储 - 一个键只保存一份草稿，后写覆盖先写
pub struct DraftStore<S> {
    storage: Arc<S>,
    key: String,
}

impl<S> Clone for DraftStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            key: self.key.clone(),
        }
    }
}

impl<S: KeyValueStorage> DraftStore<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(storage), key)
    }

    pub fn from_shared(storage: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Save `record` stamped with the current time, returning the stamp.
    ///
    /// A `savedAt` field inside the record itself is replaced by the stamp.
    pub async fn save_draft<T: Serialize>(&self, record: &T) -> Result<DateTime<Utc>> {
        let saved_at = Utc::now();
        let mut fields = match serde_json::to_value(record)? {
            Value::Object(fields) => fields,
            other => return Err(DraftError::NotAnObject(json_kind(&other))),
        };
        fields.insert(SAVED_AT_FIELD.to_string(), serde_json::to_value(saved_at)?);
        let data = serde_json::to_string(&fields)?;

        if let Err(err) = self.storage.set(&self.key, &data).await {
            tracing::warn!(key = %self.key, %err, "failed to save draft");
            return Err(err.into());
        }

        tracing::debug!(key = %self.key, %saved_at, "draft saved");
        Ok(saved_at)
    }

    /// Load the saved draft.
    ///
    /// Content that no longer parses counts as no draft at all; only the
    /// storage medium itself can make this fail.
    pub async fn load_draft<T: DeserializeOwned>(&self) -> Result<Option<Draft<T>>> {
        let data = match self.storage.get(&self.key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(key = %self.key, "no draft stored");
                return Ok(None);
            }
            Err(err) => {
                tracing::warn!(key = %self.key, %err, "failed to load draft");
                return Err(err.into());
            }
        };

        match serde_json::from_str(&data) {
            Ok(draft) => Ok(Some(draft)),
            Err(err) => {
                tracing::warn!(key = %self.key, %err, "stored draft is corrupt, ignoring it");
                Ok(None)
            }
        }
    }

    pub async fn clear_draft(&self) -> Result<()> {
        if let Err(err) = self.storage.delete(&self.key).await {
            tracing::warn!(key = %self.key, %err, "failed to clear draft");
            return Err(err.into());
        }

        tracing::debug!(key = %self.key, "draft cleared");
        Ok(())
    }

    /// Existence check only, the content is not parsed.
    pub async fn has_draft(&self) -> bool {
        match self.storage.get(&self.key).await {
            Ok(value) => value.is_some(),
            Err(err) => {
                tracing::warn!(key = %self.key, %err, "failed to check draft");
                false
            }
        }
    }
}
