use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynaquery::storage::dynamodb::{target_display, DynamoDbStore};
use dynaquery::{Config, PageReplaySearcher};
use dynaquery_core::paging::PageRequest;
use dynaquery_core::query::{build_map_query, SecondaryIndex};
use dynaquery_core::storage::ItemStore;
use dynaquery_core::value::{AttrValue, Item};

/// dynaquery - Query DynamoDB tables by attribute conditions
#[derive(Parser, Debug)]
#[command(name = "dynaquery")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Table to read from
    #[arg(long, short, env = "DYNAMODB_TABLE_NAME")]
    table: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Endpoint override, e.g. http://localhost:8000 for DynamoDB Local
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one item by primary key
    Get {
        /// Key attribute as name=value; repeat for composite keys
        #[arg(long = "key", short, required = true, value_parser = parse_assignment)]
        key: Vec<(String, AttrValue)>,
    },
    /// Fetch one page of items matching the conditions
    Query {
        #[command(flatten)]
        target: QueryTarget,

        /// 1-based page to return
        #[arg(long, default_value = "1")]
        page: u64,

        /// Items per page (0 uses DEFAULT_PAGE_SIZE)
        #[arg(long, default_value = "0")]
        page_size: u64,

        /// Size of the first page when it differs from the others
        #[arg(long, default_value = "0")]
        first_page_size: u64,
    },
    /// Count items matching the conditions
    Count {
        #[command(flatten)]
        target: QueryTarget,
    },
    /// Check that the store answers
    Health {
        /// Seconds to wait for an answer
        #[arg(long, default_value = "4")]
        timeout: u64,
    },
}

#[derive(Args, Debug)]
struct QueryTarget {
    /// Secondary index to query; the base table when omitted
    #[arg(long, short, default_value = "")]
    index: String,

    /// Key attributes of the index, partition key first
    #[arg(long, short, required = true, value_delimiter = ',')]
    keys: Vec<String>,

    /// Equality condition as name=value; repeat to combine
    #[arg(long = "where", short, value_parser = parse_assignment)]
    conditions: Vec<(String, AttrValue)>,
}

impl QueryTarget {
    fn index(&self) -> SecondaryIndex {
        SecondaryIndex::new(self.index.clone(), self.keys.clone())
    }

    fn conditions(&self) -> Option<Item> {
        if self.conditions.is_empty() {
            return None;
        }
        Some(self.conditions.iter().cloned().collect())
    }
}

/// Parses `name=value`. Values that read as JSON keep their type; anything
/// else is a string.
fn parse_assignment(raw: &str) -> Result<(String, AttrValue), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("expected name=value, got '{raw}'"));
    };
    if name.is_empty() {
        return Err(format!("missing attribute name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), AttrValue::from_json(value)))
}

fn item_to_json(item: Item) -> Result<Value> {
    Ok(AttrValue::M(item).into_json()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dynaquery=info,dynaquery_core=info".into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = Config::from_env();
    if let Some(table) = cli.table {
        config.table_name = table;
    }
    if let Some(region) = cli.region {
        config.region = region;
    }
    if cli.endpoint_url.is_some() {
        config.endpoint_url = cli.endpoint_url;
    }

    tracing::info!(
        table = %config.table_name,
        target = %target_display(&config),
        "Connecting to store"
    );
    let store = Arc::new(DynamoDbStore::from_config(&config).await);

    let output = match cli.command {
        Command::Get { key } => {
            let key: Item = key.into_iter().collect();
            let item = store
                .get_item(&config.table_name, &key)
                .await
                .context("failed to fetch item")?;
            match item {
                Some(item) => item_to_json(item)?,
                None => bail!("no item found for the given key"),
            }
        }
        Command::Query {
            target,
            page,
            page_size,
            first_page_size,
        } => {
            let query =
                build_map_query(&config.table_name, &target.index(), target.conditions().as_ref())?;
            let searcher = PageReplaySearcher::new(store, config.default_page_size);
            let result = searcher
                .search(&query, PageRequest::new(page, page_size, first_page_size))
                .await
                .context("query failed")?;
            tracing::info!(
                items = result.items.len(),
                total = result.total,
                last = result.last,
                "Query complete"
            );

            let items = result
                .items
                .into_iter()
                .map(item_to_json)
                .collect::<Result<Vec<_>>>()?;
            serde_json::json!({
                "items": items,
                "total": result.total,
                "last": result.last,
            })
        }
        Command::Count { target } => {
            let query =
                build_map_query(&config.table_name, &target.index(), target.conditions().as_ref())?;
            let searcher = PageReplaySearcher::new(store, config.default_page_size);
            let total = searcher.count(&query).await.context("count failed")?;
            serde_json::json!({ "total": total })
        }
        Command::Health { timeout } => {
            store
                .health_check(Duration::from_secs(timeout))
                .await
                .context("health check failed")?;
            serde_json::json!({ "status": "success" })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
