//! RPC-over-HTTP implementation of the secondary transport.
//!
//! Every operation is a `POST {base_url}/rpc/{function}` with a JSON body.
//! The fallback gateway stays reachable when the primary query layer is not,
//! but it is restricted: result pages are capped at [`MAX_PAGE_SIZE`].

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use steadfast_types::models::config::SecondaryConfig;
use steadfast_types::{AuditEntry, TransportError, VersionedRecord};

use super::{CasOutcome, Operation, OperationOutput, Transport};

/// Largest page the fallback gateway will return for one query.
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct CasResponse {
    applied: bool,
    #[serde(default)]
    record: Option<VersionedRecord>,
    #[serde(default)]
    audit: Option<AuditEntry>,
}

/// Record identity used to give 404/409 answers their domain meaning.
struct RecordKey<'a> {
    record_type: &'a str,
    record_id: &'a str,
}

pub struct RpcTransport {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RpcTransport {
    /// Create a transport with a pre-built client.
    pub fn new(http_client: Client, base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http_client, base_url, api_key, timeout }
    }

    pub fn from_config(config: &SecondaryConfig) -> Result<Self, TransportError> {
        let base_url = config.base_url.clone().ok_or_else(|| TransportError::Rejected {
            message: "secondary.base_url is not configured".to_string(),
        })?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Rejected { message: err.to_string() })?;
        Ok(Self::new(http_client, base_url, config.api_key.clone(), timeout))
    }

    pub fn build_url(&self, function: &str) -> String {
        format!("{}/rpc/{}", self.base_url, function)
    }

    fn map_reqwest_err(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout { duration_ms: self.timeout.as_millis() as u64 }
        } else if err.is_connect() {
            TransportError::ConnectionRefused { endpoint: self.base_url.clone() }
        } else if err.is_decode() {
            TransportError::Malformed { message: err.to_string() }
        } else {
            TransportError::Unavailable { message: err.to_string() }
        }
    }

    async fn call(&self, function: &str, body: Value, key: Option<RecordKey<'_>>) -> Result<Response, TransportError> {
        let mut request = self.http_client.post(self.build_url(function)).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|err| self.map_reqwest_err(err))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        tracing::debug!(function, status = status.as_u16(), "Secondary RPC call failed");
        Err(match (status, key) {
            (StatusCode::NOT_FOUND, Some(key)) => TransportError::NotFound {
                record_type: key.record_type.to_string(),
                record_id: key.record_id.to_string(),
            },
            (StatusCode::CONFLICT, Some(key)) => TransportError::Duplicate {
                record_type: key.record_type.to_string(),
                record_id: key.record_id.to_string(),
            },
            _ => TransportError::from_status(status.as_u16(), message),
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, TransportError> {
        response.json::<T>().await.map_err(|err| TransportError::Malformed { message: err.to_string() })
    }
}

#[async_trait]
impl Transport for RpcTransport {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn execute(&self, operation: Operation) -> Result<OperationOutput, TransportError> {
        match operation {
            Operation::Ping => {
                self.call("ping", json!({}), None).await?;
                Ok(OperationOutput::Pong)
            },
            Operation::Query { record_type, query } => {
                let limit = query.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
                let body = json!({
                    "record_type": record_type,
                    "filters": query.filters,
                    "limit": limit,
                });
                let response = self.call("query_records", body, None).await?;
                self.decode(response).await.map(OperationOutput::Records)
            },
            Operation::Fetch { record_type, record_id } => {
                let body = json!({ "record_type": record_type, "record_id": record_id });
                let key = RecordKey { record_type: &record_type, record_id: &record_id };
                let response = self.call("fetch_record", body, Some(key)).await?;
                self.decode(response).await.map(OperationOutput::Record)
            },
            Operation::Insert { record_type, record_id, fields } => {
                let body = json!({ "record_type": record_type, "record_id": record_id, "fields": fields });
                let key = RecordKey { record_type: &record_type, record_id: &record_id };
                let response = self.call("insert_record", body, Some(key)).await?;
                self.decode(response).await.map(OperationOutput::Record)
            },
            Operation::ConditionalUpdate(update) => {
                let body = serde_json::to_value(&update)
                    .map_err(|err| TransportError::Rejected { message: err.to_string() })?;
                let response = self.call("conditional_update", body, None).await?;
                let cas: CasResponse = self.decode(response).await?;
                match (cas.applied, cas.record) {
                    (true, Some(record)) => {
                        Ok(OperationOutput::Update(CasOutcome::Applied { record, audit: cas.audit }))
                    },
                    (true, None) => Err(TransportError::Malformed {
                        message: "applied update without a record".to_string(),
                    }),
                    (false, _) => Ok(OperationOutput::Update(CasOutcome::NoMatch)),
                }
            },
            Operation::AuditTrail { record_type, record_id } => {
                let body = json!({ "record_type": record_type, "record_id": record_id });
                let response = self.call("audit_trail", body, None).await?;
                self.decode(response).await.map(OperationOutput::AuditEntries)
            },
        }
    }
}
