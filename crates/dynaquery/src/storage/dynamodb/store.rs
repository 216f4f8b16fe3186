//! DynamoDB `ItemStore` implementation.
//!
//! Renders query descriptors and write conditions into expressions and
//! issues exactly one SDK request per call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, KeysAndAttributes, ReturnValue, Select};
use aws_sdk_dynamodb::Client;
use tracing::{debug, trace};

use dynaquery_core::expression::ExpressionBuilder;
use dynaquery_core::query::{QueryDescriptor, SelectMode};
use dynaquery_core::storage::{
    BatchGetOutput, ItemStore, Page, RepositoryError, Result, WriteCondition,
};
use dynaquery_core::value::Item;

use super::client::create_client;
use super::conversions::{from_sdk_item, to_sdk_item, to_sdk_values};
use super::error::{
    map_batch_get_item_error, map_build_error, map_delete_item_error, map_get_item_error,
    map_list_tables_error, map_put_item_error, map_query_error, map_scan_error,
    map_update_item_error,
};
use crate::config::Config;

/// DynamoDB-backed store.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Creates a store with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a store from configuration.
    pub async fn from_config(config: &Config) -> Self {
        Self::new(create_client(config).await)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Verifies the store answers within `timeout` by listing tables.
    pub async fn health_check(&self, timeout: Duration) -> Result<()> {
        let request = self.client.list_tables().limit(1).send();
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => {
                result.map_err(map_list_tables_error)?;
                debug!("store health check passed");
                Ok(())
            }
            Err(_) => Err(RepositoryError::ConnectionFailed(format!(
                "connection timeout after {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

fn select_mode(select: SelectMode) -> Select {
    match select {
        SelectMode::AllAttributes => Select::AllAttributes,
        SelectMode::SpecificAttributes => Select::SpecificAttributes,
    }
}

fn to_page(
    items: Option<Vec<HashMap<String, AttributeValue>>>,
    count: i32,
    last_evaluated_key: Option<HashMap<String, AttributeValue>>,
) -> Result<Page> {
    let items = items
        .unwrap_or_default()
        .into_iter()
        .map(from_sdk_item)
        .collect::<Result<Vec<_>>>()?;
    let last_evaluated_key = last_evaluated_key
        .filter(|key| !key.is_empty())
        .map(from_sdk_item)
        .transpose()?;

    Ok(Page {
        items,
        count: i64::from(count),
        last_evaluated_key,
    })
}

/// A write condition rendered with its own placeholders.
struct RenderedCondition {
    expression: Option<String>,
    names: Option<HashMap<String, String>>,
    values: Option<HashMap<String, AttributeValue>>,
}

fn render_write(
    updates: Option<&Item>,
    condition: Option<&WriteCondition>,
) -> (Option<String>, RenderedCondition) {
    let mut builder = ExpressionBuilder::new();
    let update_expression = updates.and_then(|updates| builder.update_set(updates));
    let expression = condition.map(|condition| builder.condition(condition));
    let placeholders = builder.finish();

    (
        update_expression,
        RenderedCondition {
            expression,
            names: placeholders.names,
            values: to_sdk_values(placeholders.values),
        },
    )
}

#[async_trait]
impl ItemStore for DynamoDbStore {
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key.clone())))
            .send()
            .await
            .map_err(map_get_item_error)?;

        result.item.map(from_sdk_item).transpose()
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<()> {
        let (_, condition) = render_write(None, condition);

        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_sdk_item(item)))
            .set_condition_expression(condition.expression)
            .set_expression_attribute_names(condition.names)
            .set_expression_attribute_values(condition.values)
            .send()
            .await
            .map_err(map_put_item_error)?;

        Ok(())
    }

    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        updates: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<()> {
        let (update_expression, condition) = render_write(Some(&updates), condition);
        let Some(update_expression) = update_expression else {
            return Err(RepositoryError::Validation(
                "update has no attributes to set".to_string(),
            ));
        };

        self.client
            .update_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key.clone())))
            .update_expression(update_expression)
            .set_condition_expression(condition.expression)
            .set_expression_attribute_names(condition.names)
            .set_expression_attribute_values(condition.values)
            .send()
            .await
            .map_err(map_update_item_error)?;

        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<bool> {
        let result = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key.clone())))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(map_delete_item_error)?;

        Ok(result.attributes.is_some_and(|old| !old.is_empty()))
    }

    async fn batch_get_items(&self, table: &str, keys: Vec<Item>) -> Result<BatchGetOutput> {
        if keys.is_empty() {
            return Ok(BatchGetOutput::default());
        }

        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys.into_iter().map(to_sdk_item).collect()))
            .build()
            .map_err(map_build_error)?;

        let result = self
            .client
            .batch_get_item()
            .request_items(table, request)
            .send()
            .await
            .map_err(map_batch_get_item_error)?;

        let items = result
            .responses
            .and_then(|mut responses| responses.remove(table))
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_item)
            .collect::<Result<Vec<_>>>()?;
        let unprocessed_keys = result
            .unprocessed_keys
            .and_then(|mut unprocessed| unprocessed.remove(table))
            .map(|request| request.keys().to_vec())
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn fetch_page(
        &self,
        query: &QueryDescriptor,
        limit: Option<i32>,
        start_key: Option<Item>,
    ) -> Result<Page> {
        let rendered = query.render();
        let start_key = start_key.map(to_sdk_item);
        trace!(
            table = %query.table,
            key_condition = ?rendered.key_condition,
            filter = ?rendered.filter,
            limit = ?limit,
            "fetching page"
        );

        if query.is_scan() {
            let result = self
                .client
                .scan()
                .table_name(&query.table)
                .set_index_name(query.index_name.clone())
                .set_filter_expression(rendered.filter)
                .set_projection_expression(rendered.projection)
                .set_expression_attribute_names(rendered.names)
                .set_expression_attribute_values(to_sdk_values(rendered.values))
                .select(select_mode(query.select))
                .set_limit(limit)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(map_scan_error)?;
            to_page(result.items, result.count, result.last_evaluated_key)
        } else {
            let result = self
                .client
                .query()
                .table_name(&query.table)
                .set_index_name(query.index_name.clone())
                .set_key_condition_expression(rendered.key_condition)
                .set_filter_expression(rendered.filter)
                .set_projection_expression(rendered.projection)
                .set_expression_attribute_names(rendered.names)
                .set_expression_attribute_values(to_sdk_values(rendered.values))
                .select(select_mode(query.select))
                .scan_index_forward(query.scan_forward)
                .set_limit(limit)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(map_query_error)?;
            to_page(result.items, result.count, result.last_evaluated_key)
        }
    }

    // A count may span several responses once the evaluated data passes 1 MB.
    async fn count_items(&self, query: &QueryDescriptor) -> Result<i64> {
        // COUNT cannot carry a projection; unused placeholders are rejected.
        let counted = QueryDescriptor {
            projection: Vec::new(),
            select: SelectMode::AllAttributes,
            ..query.clone()
        };
        let rendered = counted.render();
        let values = to_sdk_values(rendered.values);

        let mut total = 0i64;
        let mut start_key = None;
        loop {
            let (count, last_evaluated_key) = if counted.is_scan() {
                let result = self
                    .client
                    .scan()
                    .table_name(&counted.table)
                    .set_index_name(counted.index_name.clone())
                    .set_filter_expression(rendered.filter.clone())
                    .set_expression_attribute_names(rendered.names.clone())
                    .set_expression_attribute_values(values.clone())
                    .select(Select::Count)
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map_err(map_scan_error)?;
                (result.count, result.last_evaluated_key)
            } else {
                let result = self
                    .client
                    .query()
                    .table_name(&counted.table)
                    .set_index_name(counted.index_name.clone())
                    .set_key_condition_expression(rendered.key_condition.clone())
                    .set_filter_expression(rendered.filter.clone())
                    .set_expression_attribute_names(rendered.names.clone())
                    .set_expression_attribute_values(values.clone())
                    .select(Select::Count)
                    .set_exclusive_start_key(start_key)
                    .send()
                    .await
                    .map_err(map_query_error)?;
                (result.count, result.last_evaluated_key)
            };

            total += i64::from(count);
            match last_evaluated_key.filter(|key| !key.is_empty()) {
                Some(key) => start_key = Some(key),
                None => return Ok(total),
            }
        }
    }
}
