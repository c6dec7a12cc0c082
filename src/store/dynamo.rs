use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use base64::Engine;
use serde_json::{Number, Value};

use crate::config::Settings;
use crate::error::AppError;
use crate::store::client::{
    Item, ItemList, KeyCondition, RenderedExpression, StoreClient, UpdateExpression,
};

/// DynamoDB implementation of StoreClient.
///
/// Only available when the `aws` feature is enabled.
pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoStore {
    /// Create a client for the region and endpoint in `settings`.
    ///
    /// Credentials come from the usual AWS provider chain. Setting an
    /// endpoint points the client at DynamoDB Local or LocalStack.
    pub async fn from_settings(settings: &Settings) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));

        if let Some(endpoint) = &settings.endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        Self {
            client: aws_sdk_dynamodb::Client::new(&sdk_config),
        }
    }

    /// Create with an explicit client (useful for testing / DI).
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }
}

fn store_error<E>(op: &str, table: &str, err: E) -> AppError
where
    E: std::error::Error,
{
    AppError::Database(format!(
        "{} on '{}' failed: {}",
        op,
        table,
        DisplayErrorContext(&err)
    ))
}

/// Split a rendered expression into the SDK's placeholder maps.
fn placeholders(
    rendered: &RenderedExpression,
) -> (HashMap<String, String>, HashMap<String, AttributeValue>) {
    let names = rendered.names.iter().cloned().collect();
    let values = rendered
        .values
        .iter()
        .map(|(placeholder, value)| (placeholder.clone(), to_attribute(value)))
        .collect();
    (names, values)
}

fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(item_to_attributes(map)),
    }
}

fn item_to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

fn parse_number(text: &str) -> Result<Value, AppError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::from(n));
    }
    if let Ok(n) = text.parse::<u64>() {
        return Ok(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| AppError::Database(format!("Unreadable number attribute '{}'", text)))
}

fn from_attribute(attribute: &AttributeValue) -> Result<Value, AppError> {
    let engine = base64::engine::general_purpose::STANDARD;

    Ok(match attribute {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(from_attribute)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(attributes_to_item(map)?),
        AttributeValue::Ss(set) => Value::Array(set.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(
            set.iter()
                .map(|n| parse_number(n))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::B(blob) => Value::String(engine.encode(blob.as_ref())),
        AttributeValue::Bs(blobs) => Value::Array(
            blobs
                .iter()
                .map(|blob| Value::String(engine.encode(blob.as_ref())))
                .collect(),
        ),
        other => {
            return Err(AppError::Database(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

fn attributes_to_item(attributes: &HashMap<String, AttributeValue>) -> Result<Item, AppError> {
    attributes
        .iter()
        .map(|(name, attribute)| Ok((name.clone(), from_attribute(attribute)?)))
        .collect()
}

#[async_trait]
impl StoreClient for DynamoStore {
    async fn put(&self, table: &str, item: Item) -> Result<(), AppError> {
        tracing::debug!(table, "put_item");
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item_to_attributes(&item)))
            .send()
            .await
            .map_err(|e| store_error("put", table, e))?;

        Ok(())
    }

    async fn get(&self, table: &str, key: &Item) -> Result<Option<Item>, AppError> {
        tracing::debug!(table, "get_item");
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(item_to_attributes(key)))
            .send()
            .await
            .map_err(|e| store_error("get", table, e))?;

        output.item().map(attributes_to_item).transpose()
    }

    async fn delete(&self, table: &str, key: &Item) -> Result<(), AppError> {
        tracing::debug!(table, "delete_item");
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(item_to_attributes(key)))
            .send()
            .await
            .map_err(|e| store_error("delete", table, e))?;

        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        key: &Item,
        update: &UpdateExpression,
    ) -> Result<Item, AppError> {
        tracing::debug!(table, attributes = update.assignments().len(), "update_item");

        if update.is_empty() {
            return Err(AppError::BadRequest("Update sets no attributes".into()));
        }
        let Some(key_attribute) = key.keys().next() else {
            return Err(AppError::BadRequest("Update key is empty".into()));
        };

        let rendered = update.render();
        let (mut names, values) = placeholders(&rendered);
        names.insert("#key".to_string(), key_attribute.clone());

        let result = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(item_to_attributes(key)))
            .update_expression(rendered.expression)
            .condition_expression("attribute_exists(#key)")
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => output
                .attributes()
                .map(attributes_to_item)
                .transpose()?
                .ok_or_else(|| {
                    AppError::Database(format!("update on '{}' returned no attributes", table))
                }),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Err(AppError::NotFound(format!(
                        "No item at the given key in '{}'",
                        table
                    )))
                } else {
                    Err(store_error("update", table, service_err))
                }
            }
        }
    }

    async fn query(&self, table: &str, condition: &KeyCondition) -> Result<ItemList, AppError> {
        tracing::debug!(table, index = ?condition.index(), "query");

        let rendered = condition.render();
        let (names, values) = placeholders(&rendered);

        let output = self
            .client
            .query()
            .table_name(table)
            .set_index_name(condition.index().map(str::to_string))
            .key_condition_expression(rendered.expression)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(|e| store_error("query", table, e))?;

        if output.last_evaluated_key().is_some() {
            tracing::warn!(
                table,
                "Query result truncated by the store; only the first page is returned"
            );
        }

        let items = output
            .items()
            .iter()
            .map(attributes_to_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ItemList::new(items))
    }
}
