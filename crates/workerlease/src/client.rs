//! Remote generator speaking the lease server's JSON protocol.
//!
//! - `POST <base>` acquires
//! - `PUT <base>/<id>` renews
//! - `DELETE <base>/<id>` releases
//!
//! Servers report allocation failures as `{"error": "..."}` with a 200 status, so
//! the body decides the outcome, not the status code.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::generator::Generator;
use crate::lease::{LeaseError, LeaseRecord};
use crate::version::WORKERLEASE_VERSION;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LeaseResponse {
    Lease(LeaseRecord),
    Error { error: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReleaseResponse {
    Error { error: String },
    Deleted {
        #[allow(dead_code)]
        deleted: bool,
    },
}

/// [`Generator`] backed by a remote lease server.
pub struct HttpGenerator {
    base: String,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(base: impl Into<String>) -> Result<Self, reqwest::Error> {
        let user_agent = format!("workerlease/{}", WORKERLEASE_VERSION);
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_client(base, client))
    }

    pub fn with_client(base: impl Into<String>, client: reqwest::Client) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base, client }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn id_url(&self, id: i64) -> String {
        format!("{}/{}", self.base, id)
    }

    async fn lease_call(
        &self,
        request: reqwest::RequestBuilder,
        on_error: LeaseError,
    ) -> Result<LeaseRecord, LeaseError> {
        let response = request.send().await.map_err(transport)?;
        match response.json::<LeaseResponse>().await.map_err(transport)? {
            LeaseResponse::Lease(record) => Ok(record),
            LeaseResponse::Error { error } => {
                tracing::debug!(server_error = %error, "Lease server rejected request");
                Err(on_error)
            }
        }
    }
}

fn transport(e: reqwest::Error) -> LeaseError {
    LeaseError::Transport(e.to_string())
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn acquire(&self) -> Result<LeaseRecord, LeaseError> {
        self.lease_call(self.client.post(&self.base), LeaseError::PoolExhausted)
            .await
    }

    async fn renew(&self, id: i64) -> Result<LeaseRecord, LeaseError> {
        self.lease_call(self.client.put(self.id_url(id)), LeaseError::InvalidLease)
            .await
    }

    async fn release(&self, id: i64) -> Result<(), LeaseError> {
        let response = self
            .client
            .delete(self.id_url(id))
            .send()
            .await
            .map_err(transport)?;

        match response.json::<ReleaseResponse>().await.map_err(transport)? {
            ReleaseResponse::Deleted { .. } => Ok(()),
            ReleaseResponse::Error { error } => {
                tracing::debug!(id, server_error = %error, "Lease server rejected release");
                Err(LeaseError::InvalidLease)
            }
        }
    }
}
