//! HTTP execution client for the remote event query REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::wire::{QueryKind, QueryStatus, ResultId, ResultPage, SubmitParams};
use crate::{ClientError, ClientResult, ExecutionClient};

const API_PREFIX: &str = "rs/esm/v2/";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `https://siem.example.org/`.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_url() -> String {
    "https://localhost/".to_string()
}

fn default_timeout_seconds() -> f64 {
    30.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: String::new(),
            timeout_seconds: default_timeout_seconds(),
            accept_invalid_certs: false,
        }
    }
}

#[derive(Clone)]
pub struct HttpExecutionClient {
    cfg: ClientConfig,
    http: Client,
}

impl HttpExecutionClient {
    pub fn new(cfg: ClientConfig) -> ClientResult<Self> {
        let timeout = Duration::try_from_secs_f64(cfg.timeout_seconds.max(1.0)).map_err(|e| {
            ClientError::connection(format!("invalid timeout_seconds {}: {e}", cfg.timeout_seconds))
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::connection(format!("failed to construct http client: {e}")))?;

        Ok(Self { cfg, http })
    }

    fn endpoint(&self, method: &str) -> ClientResult<Url> {
        let mut base = self.cfg.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|url| url.join(API_PREFIX))
            .and_then(|url| url.join(method))
            .map_err(|e| ClientError::connection(format!("invalid service URL {}: {e}", self.cfg.url)))
    }

    /// POST a JSON body to an API method and return the decoded JSON reply
    /// (`Value::Null` for an empty body).
    async fn call(&self, method: &str, query: &[(&str, String)], body: Value) -> ClientResult<Value> {
        let mut url = self.endpoint(method)?;
        if !query.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (key, value) in query {
                qp.append_pair(key, value);
            }
        }

        let mut req = self.http.post(url).json(&body);
        if !self.cfg.username.is_empty() {
            req = req.basic_auth(self.cfg.username.clone(), Some(self.cfg.password.clone()));
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::connection(format!("{method} request failed: {e}")))?;
        let status = response.status();
        debug!(method, %status, "service replied");
        let text = response.text().await.map_err(|e| {
            ClientError::connection(format!("failed to read {method} response (status {status}): {e}"))
        })?;

        if !status.is_success() {
            return Err(ClientError::remote(format!("{method} returned {status}: {text}")));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ClientError::decode(format!("{method} returned invalid JSON: {e}: {text}")))
    }
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
    async fn submit(&self, kind: QueryKind, params: &SubmitParams) -> ClientResult<ResultId> {
        let query = [
            ("type", "EVENT".to_string()),
            ("reverse", "false".to_string()),
        ];
        let reply = self
            .call("qryExecuteDetail", &query, params.to_config(kind))
            .await?;
        reply
            .get("resultID")
            .and_then(ResultId::from_json)
            .ok_or_else(|| ClientError::decode(format!("submit reply without resultID: {reply}")))
    }

    async fn poll_status(&self, result_id: &ResultId) -> ClientResult<QueryStatus> {
        let reply = self
            .call("qryGetStatus", &[], json!({ "resultID": result_id.as_str() }))
            .await?;
        let complete = reply
            .get("complete")
            .and_then(Value::as_bool)
            .ok_or_else(|| ClientError::decode(format!("status reply without complete flag: {reply}")))?;
        Ok(QueryStatus { complete })
    }

    async fn fetch_rows(
        &self,
        result_id: &ResultId,
        start_pos: u32,
        num_rows: u32,
    ) -> ClientResult<ResultPage> {
        let query = [
            ("startPos", start_pos.to_string()),
            ("numRows", num_rows.to_string()),
            ("reverse", "false".to_string()),
        ];
        let reply = self
            .call("qryGetResults", &query, json!({ "resultID": result_id.as_str() }))
            .await?;
        serde_json::from_value(reply)
            .map_err(|e| ClientError::decode(format!("invalid result page: {e}")))
    }

    async fn close(&self, result_id: &ResultId) -> ClientResult<()> {
        let query = [("resultID", result_id.as_str().to_string())];
        self.call("qryClose", &query, json!({})).await?;
        Ok(())
    }
}
