//! In-process store with the same key-schema rules as the production store.
//!
//! Used by the test suites and for local runs without a DynamoDB endpoint.
//! Key attributes are restricted to strings.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Settings;
use crate::error::AppError;
use crate::store::client::{Item, ItemList, KeyCondition, StoreClient, UpdateExpression};

/// Key schema of a table: a partition key and an optional sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
    pub indexes: Vec<IndexSchema>,
}

/// A secondary index over a table, queried by its own key attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: None,
            indexes: Vec::new(),
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_index(
        mut self,
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: Option<&str>,
    ) -> Self {
        self.indexes.push(IndexSchema {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: sort_key.map(str::to_string),
        });
        self
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        name == self.partition_key || self.sort_key.as_deref() == Some(name)
    }

    /// Extract the stored key of `attributes`.
    ///
    /// With `exact`, `attributes` must hold the key attributes and nothing else.
    fn stored_key(&self, attributes: &Item, exact: bool) -> Result<StoredKey, AppError> {
        if exact {
            if let Some(extra) = attributes.keys().find(|k| !self.is_key_attribute(k)) {
                return Err(AppError::BadRequest(format!(
                    "Attribute '{}' is not part of the key of table '{}'",
                    extra, self.name
                )));
            }
        }

        let partition = key_string(&self.name, attributes, &self.partition_key)?;
        let sort = match &self.sort_key {
            Some(sort_key) => key_string(&self.name, attributes, sort_key)?,
            None => String::new(),
        };
        Ok((partition, sort))
    }
}

type StoredKey = (String, String);

fn key_string(table: &str, attributes: &Item, name: &str) -> Result<String, AppError> {
    match attributes.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(AppError::BadRequest(format!(
            "Key attribute '{}' of table '{}' cannot be empty",
            name, table
        ))),
        Some(_) => Err(AppError::BadRequest(format!(
            "Key attribute '{}' of table '{}' must be a string",
            name, table
        ))),
        None => Err(AppError::BadRequest(format!(
            "Missing key attribute '{}' for table '{}'",
            name, table
        ))),
    }
}

struct Table {
    schema: TableSchema,
    items: BTreeMap<StoredKey, Item>,
}

/// In-memory implementation of [`StoreClient`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style table declaration. Redeclaring a table replaces it.
    pub fn with_table(mut self, schema: TableSchema) -> Self {
        let tables = self
            .tables
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        tables.insert(
            schema.name.clone(),
            Table {
                schema,
                items: BTreeMap::new(),
            },
        );
        self
    }

    /// A store holding the pages and authorizations tables named in `settings`.
    pub fn for_settings(settings: &Settings) -> Self {
        Self::new()
            .with_table(TableSchema::new(&settings.page_table, "userid").with_sort_key("pageid"))
            .with_table(
                TableSchema::new(&settings.authorization_table, "userid")
                    .with_sort_key("pageid")
                    .with_index(&settings.authorization_page_index, "pageid", Some("userid")),
            )
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Table>>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> Result<&'a mut Table, AppError> {
    tables
        .get_mut(name)
        .ok_or_else(|| AppError::Database(format!("Table '{}' not found", name)))
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn put(&self, table: &str, item: Item) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, table)?;
        let key = table.schema.stored_key(&item, false)?;
        table.items.insert(key, item);
        Ok(())
    }

    async fn get(&self, table: &str, key: &Item) -> Result<Option<Item>, AppError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, table)?;
        let key = table.schema.stored_key(key, true)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn delete(&self, table: &str, key: &Item) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, table)?;
        let key = table.schema.stored_key(key, true)?;
        table.items.remove(&key);
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        key: &Item,
        update: &UpdateExpression,
    ) -> Result<Item, AppError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, table)?;
        let stored_key = table.schema.stored_key(key, true)?;

        if let Some((name, _)) = update
            .assignments()
            .iter()
            .find(|(name, _)| table.schema.is_key_attribute(name))
        {
            return Err(AppError::BadRequest(format!(
                "Cannot update key attribute '{}'",
                name
            )));
        }

        let table_name = table.schema.name.clone();
        let item = table.items.get_mut(&stored_key).ok_or_else(|| {
            AppError::NotFound(format!("No item at the given key in '{}'", table_name))
        })?;

        for (name, value) in update.assignments() {
            item.insert(name.clone(), value.clone());
        }
        Ok(item.clone())
    }

    async fn query(&self, table: &str, condition: &KeyCondition) -> Result<ItemList, AppError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, table)?;

        let (partition_key, sort_key) = match condition.index() {
            Some(index_name) => {
                let index = table
                    .schema
                    .indexes
                    .iter()
                    .find(|i| i.name == index_name)
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Index '{}' not found on table '{}'",
                            index_name, table.schema.name
                        ))
                    })?;
                (index.partition_key.clone(), index.sort_key.clone())
            }
            None => (
                table.schema.partition_key.clone(),
                table.schema.sort_key.clone(),
            ),
        };

        let terms = condition.terms();
        if !terms.iter().any(|(name, _)| *name == partition_key) {
            return Err(AppError::BadRequest(format!(
                "Query condition must name the partition key '{}'",
                partition_key
            )));
        }
        if let Some((name, _)) = terms
            .iter()
            .find(|(name, _)| *name != partition_key && Some(name) != sort_key.as_ref())
        {
            return Err(AppError::BadRequest(format!(
                "Query condition on non-key attribute '{}'",
                name
            )));
        }

        let mut items: Vec<Item> = table
            .items
            .values()
            .filter(|item| condition.matches(item))
            .cloned()
            .collect();

        // Base-table results come out of the BTreeMap in sort-key order already.
        if let Some(sort_key) = sort_key.filter(|_| condition.index().is_some()) {
            items.sort_by(|a, b| {
                let a = a.get(&sort_key).and_then(Value::as_str).unwrap_or_default();
                let b = b.get(&sort_key).and_then(Value::as_str).unwrap_or_default();
                a.cmp(b)
            });
        }

        Ok(ItemList::new(items))
    }
}
