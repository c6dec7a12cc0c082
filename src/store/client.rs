use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AppError;

/// A stored record: attribute name to value.
///
/// Keys are items too, holding only the key-schema attributes.
pub type Item = Map<String, Value>;

/// Build an item from `(attribute, string value)` pairs.
pub fn string_item(pairs: &[(&str, &str)]) -> Item {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect()
}

/// The result of a partition query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemList {
    pub items: Vec<Item>,
    pub count: usize,
}

impl ItemList {
    pub fn new(items: Vec<Item>) -> Self {
        let count = items.len();
        Self { items, count }
    }
}

/// A "set only these attributes" update.
///
/// Assignments keep the order in which they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    assignments: Vec<(String, Value)>,
}

impl UpdateExpression {
    /// Collect one assignment per attribute in `changes` whose value is not null.
    pub fn from_changes(changes: &Item) -> Self {
        let mut assignments = Vec::new();
        for (name, value) in changes {
            if value.is_null() {
                continue;
            }
            assignments.push((name.clone(), value.clone()));
        }
        Self { assignments }
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// `SET #a0 = :a0, #a1 = :a1` plus the placeholder maps.
    pub fn render(&self) -> RenderedExpression {
        render_terms("a", ", ", &self.assignments, "SET ")
    }
}

/// Equality conditions selecting a group of items, optionally through a
/// secondary index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyCondition {
    index: Option<String>,
    terms: Vec<(String, Value)>,
}

impl KeyCondition {
    pub fn from_key(partial_key: &Item) -> Self {
        Self {
            index: None,
            terms: partial_key
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn on_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    /// `#k0 = :k0 AND #k1 = :k1` plus the placeholder maps.
    pub fn render(&self) -> RenderedExpression {
        render_terms("k", " AND ", &self.terms, "")
    }

    /// Whether `item` satisfies every term.
    pub fn matches(&self, item: &Item) -> bool {
        self.terms
            .iter()
            .all(|(name, value)| item.get(name) == Some(value))
    }
}

/// An expression string with its attribute name and value placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedExpression {
    pub expression: String,
    pub names: Vec<(String, String)>,
    pub values: Vec<(String, Value)>,
}

fn render_terms(
    tag: &str,
    separator: &str,
    terms: &[(String, Value)],
    prefix: &str,
) -> RenderedExpression {
    let mut clauses = Vec::with_capacity(terms.len());
    let mut names = Vec::with_capacity(terms.len());
    let mut values = Vec::with_capacity(terms.len());

    for (i, (name, value)) in terms.iter().enumerate() {
        let name_ref = format!("#{tag}{i}");
        let value_ref = format!(":{tag}{i}");
        clauses.push(format!("{name_ref} = {value_ref}"));
        names.push((name_ref, name.clone()));
        values.push((value_ref, value.clone()));
    }

    RenderedExpression {
        expression: format!("{prefix}{}", clauses.join(separator)),
        names,
        values,
    }
}

/// The partitioned document store underneath every table.
///
/// Abstracted as a trait so the data-access layer never depends on a
/// concrete client and tests can swap in an in-memory store or a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Insert or overwrite the item at its key.
    async fn put(&self, table: &str, item: Item) -> Result<(), AppError>;

    /// Fetch the item at `key`. Returns `None` if it doesn't exist.
    async fn get(&self, table: &str, key: &Item) -> Result<Option<Item>, AppError>;

    /// Delete the item at `key`. Deleting a missing item is not an error.
    async fn delete(&self, table: &str, key: &Item) -> Result<(), AppError>;

    /// Apply `update` to the existing item at `key` and return the new item.
    ///
    /// Fails with `AppError::NotFound` if there is no item at `key`.
    async fn update(
        &self,
        table: &str,
        key: &Item,
        update: &UpdateExpression,
    ) -> Result<Item, AppError>;

    /// Fetch every item matching `condition`.
    async fn query(&self, table: &str, condition: &KeyCondition) -> Result<ItemList, AppError>;
}
