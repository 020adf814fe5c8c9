//! GraphQL-over-HTTP query executor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::application::ports::{QueryError, QueryExecutor};

use super::error::InfraError;

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorItem>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorItem {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct GraphqlClient {
    http: Client,
    endpoint: Url,
}

impl GraphqlClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, InfraError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("graphql client: {err}")))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl QueryExecutor for GraphqlClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, QueryError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        debug!(
            target = "native::graphql",
            endpoint = %self.endpoint,
            bytes = body.len(),
            "query answered"
        );

        decode_envelope(&body)
    }
}

fn decode_envelope(body: &[u8]) -> Result<Value, QueryError> {
    let envelope: GraphqlEnvelope =
        serde_json::from_slice(body).map_err(|err| QueryError::Decode(err.to_string()))?;

    if !envelope.errors.is_empty() {
        return Err(QueryError::Graphql {
            messages: envelope
                .errors
                .into_iter()
                .map(|item| item.message)
                .collect(),
        });
    }

    match envelope.data {
        Some(Value::Null) | None => Err(QueryError::MissingData),
        Some(data) => Ok(data),
    }
}
