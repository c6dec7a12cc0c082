//! Table-agnostic access to single items and partitions.
//!
//! Every operation reports the store's failure cause through `AppError`;
//! callers that only want the yes/no answer use [`crate::error::Outcome`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::store::client::{Item, ItemList, KeyCondition, StoreClient, UpdateExpression};

/// Generic item operations over any table of the injected store.
#[derive(Clone)]
pub struct ItemAccess {
    store: Arc<dyn StoreClient>,
}

impl ItemAccess {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// Insert `item`, overwriting whatever is stored at its key.
    pub async fn add_item(&self, table: &str, item: Item) -> Result<(), AppError> {
        self.store.put(table, item).await
    }

    /// Delete the item at `key`. Succeeds whether or not it existed.
    pub async fn remove_item(&self, table: &str, key: &Item) -> Result<(), AppError> {
        self.store.delete(table, key).await
    }

    /// Set every non-null attribute of `changes` on the item at `key`,
    /// leaving all other attributes as they are.
    ///
    /// Null attributes are skipped, never written. A change set with nothing
    /// left to write succeeds without touching the store.
    pub async fn edit_item(&self, table: &str, key: &Item, changes: &Item) -> Result<(), AppError> {
        let update = UpdateExpression::from_changes(changes);
        if let Some((name, _)) = update
            .assignments()
            .iter()
            .find(|(name, _)| key.contains_key(name))
        {
            return Err(AppError::BadRequest(format!(
                "Cannot edit key attribute '{}'",
                name
            )));
        }

        if update.is_empty() {
            tracing::debug!(table, "Edit has no attributes to set, skipping store call");
            return Ok(());
        }

        self.store.update(table, key, &update).await?;
        Ok(())
    }

    /// Fetch the item at `key`; `Ok(None)` if there is none.
    pub async fn retrieve_item(&self, table: &str, key: &Item) -> Result<Option<Item>, AppError> {
        self.store.get(table, key).await
    }

    /// Fetch every item whose key matches `partial_key`.
    pub async fn list_items(&self, table: &str, partial_key: &Item) -> Result<ItemList, AppError> {
        self.store
            .query(table, &KeyCondition::from_key(partial_key))
            .await
    }

    /// Like [`ItemAccess::list_items`], through a secondary index.
    pub async fn list_items_by_index(
        &self,
        table: &str,
        index: &str,
        partial_key: &Item,
    ) -> Result<ItemList, AppError> {
        self.store
            .query(table, &KeyCondition::from_key(partial_key).on_index(index))
            .await
    }
}

/// Convert a record into a storable item.
pub fn to_item<T: Serialize>(record: &T) -> Result<Item, AppError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(item)) => Ok(item),
        Ok(other) => Err(AppError::Internal(format!(
            "Record serialized to a non-object value: {}",
            other
        ))),
        Err(e) => Err(AppError::Internal(format!("Failed to serialize record: {}", e))),
    }
}

/// Convert a stored item back into a record.
pub fn from_item<T: DeserializeOwned>(item: Item) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(item))
        .map_err(|e| AppError::Database(format!("Malformed stored item: {}", e)))
}
