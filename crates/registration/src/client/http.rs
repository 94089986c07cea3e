//! Reqwest-backed downstream client.

use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use reqwest::Client;

use super::{CallResponse, DownstreamClient, Endpoint};
use crate::error::DownstreamError;
use crate::payload::NotificationPayload;

/// Downstream client performing real HTTP calls.
///
/// The timeout is set on the client, so a hung service fails the attempt
/// at the transport layer instead of blocking the saga.
#[derive(Debug, Clone)]
pub struct HttpDownstreamClient {
    client: Client,
}

impl HttpDownstreamClient {
    /// Builds a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn map_transport_error(endpoint: &Endpoint, error: reqwest::Error) -> DownstreamError {
    if error.is_timeout() {
        DownstreamError::Timeout {
            endpoint: endpoint.name.clone(),
        }
    } else {
        DownstreamError::Transport {
            endpoint: endpoint.name.clone(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl DownstreamClient for HttpDownstreamClient {
    async fn post(
        &self,
        endpoint: &Endpoint,
        payload: &NotificationPayload,
    ) -> Result<CallResponse, DownstreamError> {
        let response = self
            .client
            .post(&endpoint.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| map_transport_error(endpoint, e))?;
        Ok(CallResponse::new(response.status().as_u16()))
    }

    async fn delete(
        &self,
        endpoint: &Endpoint,
        id: UserId,
    ) -> Result<CallResponse, DownstreamError> {
        let response = self
            .client
            .delete(endpoint.delete_url(id))
            .send()
            .await
            .map_err(|e| map_transport_error(endpoint, e))?;
        Ok(CallResponse::new(response.status().as_u16()))
    }
}
