use std::env;

/// Store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table name (default: "dynaquery")
    pub table_name: String,
    /// AWS region (default: "us-east-1")
    pub region: String,
    /// Endpoint override, e.g. a local DynamoDB (default: none)
    pub endpoint_url: Option<String>,
    /// Static access key id; the SDK default chain is used when absent
    pub access_key_id: Option<String>,
    /// Static secret access key; the SDK default chain is used when absent
    pub secret_access_key: Option<String>,
    /// Page size for searches that do not request one (default: 20)
    pub default_page_size: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "dynaquery")
    /// - `AWS_REGION` - Region (default: "us-east-1")
    /// - `AWS_ENDPOINT_URL` - Endpoint override (optional)
    /// - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` - Static credentials (optional)
    /// - `DEFAULT_PAGE_SIZE` - Default search page size (default: 20)
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("DYNAMODB_TABLE_NAME")
                .unwrap_or_else(|_| "dynaquery".to_string()),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url: non_empty_var("AWS_ENDPOINT_URL"),
            access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(20),
        }
    }

    /// Static credentials, when both halves are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
