use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::api_config::ApiConfig;
use crate::api::dashboard::{DashboardQuery, DashboardReport};
use crate::store::source::{OrdersSource, TablesSource};
use crate::types::RecordId;
use crate::types::order::RawOrder;
use crate::types::table::RawTable;

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("build http client failed")?;

        Ok(Self {
            http,
            base_url: config.base_url,
            token: config.token,
        })
    }

    pub async fn orders(&self) -> Result<Vec<RawOrder>> {
        let uri_path = "/orders";
        let text = self.get_success(uri_path, &[]).await?;

        decode_collection(uri_path, &text)
    }

    pub async fn tables(&self) -> Result<Vec<RawTable>> {
        let uri_path = "/tables";
        let text = self.get_success(uri_path, &[]).await?;

        decode_collection(uri_path, &text)
    }

    /// Orders attached to one table. A table the backend does not know has no orders.
    pub async fn table_orders(&self, table_id: RecordId) -> Result<Vec<RawOrder>> {
        let uri_path = format!("/orders/table/{table_id}");
        let (status, text) = self.get(&uri_path, &[]).await?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(table_id, "no orders endpoint for table; treating as empty");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("GET {uri_path} http error {status}: {text}");
        }

        decode_collection(&uri_path, &text)
    }

    pub async fn dashboard(&self, report: DashboardReport, query: &DashboardQuery) -> Result<Value> {
        let uri_path = report.path();
        let params = query.params(report)?;
        let text = self.get_success(uri_path, &params).await?;

        let parsed: Value = serde_json::from_str(&text)
            .with_context(|| format!("parse {uri_path} response JSON failed"))?;

        Ok(match parsed {
            Value::Object(mut envelope) if envelope.contains_key("data") => {
                envelope.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        })
    }

    async fn get_success(&self, uri_path: &str, params: &[(&'static str, String)]) -> Result<String> {
        let (status, text) = self.get(uri_path, params).await?;

        if !status.is_success() {
            anyhow::bail!("GET {uri_path} http error {status}: {text}");
        }

        Ok(text)
    }

    async fn get(&self, uri_path: &str, params: &[(&'static str, String)]) -> Result<(StatusCode, String)> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, uri_path))
            .header("Accept", "application/json");

        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("GET {uri_path} failed"))?;

        let status = resp.status();
        let text = resp.text().await.context("read response body failed")?;

        Ok((status, text))
    }
}

/// Pulls the `data` array out of a `{ "data": [...] }` envelope. Bodies that
/// are valid JSON but carry no such array decode to an empty collection.
fn decode_collection<T: DeserializeOwned>(uri_path: &str, text: &str) -> Result<Vec<T>> {
    let mut parsed: Value = match serde_json::from_str(text) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, uri_path, "failed to parse JSON response");
            anyhow::bail!("parse {uri_path} response JSON failed: {e}");
        }
    };

    match parsed.get_mut("data").map(Value::take) {
        Some(Value::Array(records)) => records
            .into_iter()
            .map(|record| {
                serde_json::from_value(record)
                    .with_context(|| format!("decode record from {uri_path} failed"))
            })
            .collect(),
        _ => {
            tracing::warn!(uri_path, "response has no `data` collection; treating as empty");
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl OrdersSource for ApiClient {
    async fn fetch_orders(&self) -> Result<Vec<RawOrder>> {
        self.orders().await
    }
}

#[async_trait]
impl TablesSource for ApiClient {
    async fn fetch_tables(&self) -> Result<Vec<RawTable>> {
        self.tables().await
    }

    async fn fetch_table_orders(&self, table_id: RecordId) -> Result<Vec<RawOrder>> {
        self.table_orders(table_id).await
    }
}
