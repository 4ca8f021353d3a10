use reqwest::Client;
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Payment processor error: {0}")]
    ApiError(String),

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Failed to generate transaction id")]
    RandomFailed,
}

/// Body of `POST /charges`
#[derive(Debug, Serialize)]
pub struct ChargeRequest<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub method: &'a str,
    pub reference: Uuid,
}

/// Body of `POST /refunds`
#[derive(Debug, Serialize)]
pub struct RefundRequest<'a> {
    pub transaction_id: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse {
    pub transaction_id: String,
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub transaction_id: String,
}

/// HTTP client for an external payment processor.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl RemoteGateway {
    pub fn new(base_url: &str, api_key: Option<Secret<String>>) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn send<T: Serialize>(&self, path: &str, body: &T) -> Result<Receipt, GatewayError> {
        let response = self.post(path).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = %status,
                path = %path,
                error = %error_text,
                "Payment processor request failed"
            );

            if status.as_u16() == 402 {
                return Err(GatewayError::Declined(error_text));
            }
            return Err(GatewayError::ApiError(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        let body: GatewayResponse = response.json().await.map_err(|e| {
            GatewayError::ApiError(format!("Failed to parse processor response: {}", e))
        })?;

        match body.status.as_str() {
            "succeeded" | "refunded" => Ok(Receipt {
                transaction_id: body.transaction_id,
            }),
            _ => Err(GatewayError::Declined(
                body.message.unwrap_or(body.status),
            )),
        }
    }

    pub async fn charge(&self, request: &ChargeRequest<'_>) -> Result<Receipt, GatewayError> {
        self.send("/charges", request).await
    }

    pub async fn refund(&self, request: &RefundRequest<'_>) -> Result<Receipt, GatewayError> {
        self.send("/refunds", request).await
    }

    pub async fn health(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::ApiError(format!(
                "Status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Where charges and refunds go. Without `PAYMENT_API_URL` every charge
/// succeeds locally with a `mock-` transaction id.
#[derive(Debug, Clone)]
pub enum PaymentGateway {
    Mock,
    Remote(RemoteGateway),
}

impl PaymentGateway {
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        match &config.payment_api_url {
            Some(url) => Ok(PaymentGateway::Remote(RemoteGateway::new(
                url,
                config.payment_api_key.clone(),
            )?)),
            None => Ok(PaymentGateway::Mock),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, PaymentGateway::Remote(_))
    }

    #[tracing::instrument(skip(self))]
    pub async fn charge(
        &self,
        reference: Uuid,
        amount_cents: i64,
        currency: &str,
        method: &str,
    ) -> Result<Receipt, GatewayError> {
        match self {
            PaymentGateway::Mock => {
                let receipt = Receipt {
                    transaction_id: mock_transaction_id()?,
                };
                tracing::debug!(transaction_id = %receipt.transaction_id, "Mock charge accepted");
                Ok(receipt)
            }
            PaymentGateway::Remote(remote) => {
                remote
                    .charge(&ChargeRequest {
                        amount_cents,
                        currency,
                        method,
                        reference,
                    })
                    .await
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        transaction_id: &str,
        amount_cents: i64,
        currency: &str,
    ) -> Result<Receipt, GatewayError> {
        match self {
            PaymentGateway::Mock => Ok(Receipt {
                transaction_id: transaction_id.to_string(),
            }),
            PaymentGateway::Remote(remote) => {
                remote
                    .refund(&RefundRequest {
                        transaction_id,
                        amount_cents,
                        currency,
                    })
                    .await
            }
        }
    }
}

fn mock_transaction_id() -> Result<String, GatewayError> {
    let mut bytes = [0u8; 12];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| GatewayError::RandomFailed)?;

    Ok(format!("mock-{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_mock_gateway_issues_unique_ids() {
        let gateway = PaymentGateway::Mock;

        let first = gateway.charge(Uuid::new_v4(), 4500, "USD", "card").await.unwrap();
        let second = gateway.charge(Uuid::new_v4(), 4500, "USD", "card").await.unwrap();

        assert!(first.transaction_id.starts_with("mock-"));
        assert_eq!(first.transaction_id.len(), "mock-".len() + 24);
        assert_ne!(first.transaction_id, second.transaction_id);
        assert!(!gateway.is_configured());
    }

    #[tokio::test]
    async fn test_remote_charge_sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .and(header("authorization", "Bearer sk_test"))
            .and(body_partial_json(serde_json::json!({
                "amount_cents": 9000,
                "currency": "EUR",
                "method": "paypal"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transaction_id": "txn_123",
                "status": "succeeded"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = PaymentGateway::Remote(
            RemoteGateway::new(&server.uri(), Some(Secret::new("sk_test".to_string()))).unwrap(),
        );
        let receipt = gateway
            .charge(Uuid::new_v4(), 9000, "EUR", "paypal")
            .await
            .unwrap();

        assert_eq!(receipt.transaction_id, "txn_123");
    }

    #[tokio::test]
    async fn test_remote_decline_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/charges"))
            .respond_with(ResponseTemplate::new(402).set_body_string("card declined"))
            .mount(&server)
            .await;

        let remote = RemoteGateway::new(&server.uri(), None).unwrap();
        let result = PaymentGateway::Remote(remote)
            .charge(Uuid::new_v4(), 100, "USD", "card")
            .await;

        assert!(matches!(result, Err(GatewayError::Declined(msg)) if msg == "card declined"));
    }

    #[tokio::test]
    async fn test_remote_failed_status_in_body_is_a_decline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refunds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transaction_id": "txn_9",
                "status": "failed",
                "message": "already refunded"
            })))
            .mount(&server)
            .await;

        let remote = RemoteGateway::new(&format!("{}/", server.uri()), None).unwrap();
        let result = PaymentGateway::Remote(remote)
            .refund("txn_9", 100, "USD")
            .await;

        assert!(matches!(result, Err(GatewayError::Declined(msg)) if msg == "already refunded"));
    }

    #[tokio::test]
    async fn test_remote_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let remote = RemoteGateway::new(&server.uri(), None).unwrap();

        assert!(remote.health().await.is_err());
    }
}
