//! Outbound WhatsApp reply delivery
//!
//! Graph API `/{phone_number_id}/messages` client. Delivery is best-effort
//! with at most one attempt per reply: failures are logged and the dialogue
//! proceeds as though the message was sent.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Outbound reply channel, injectable so tests can capture sends.
#[async_trait]
pub trait ReplyDelivery: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
}

/// Send a batch of replies in order, swallowing failures. Order matters for
/// user comprehension (summary before prompt), so sends are sequential.
pub async fn send_all(delivery: &dyn ReplyDelivery, to: &str, replies: &[String]) {
    for body in replies {
        if let Err(err) = delivery.send_text(to, body).await {
            warn!(to = %to, error = %err, "Failed to deliver reply");
        }
    }
}

pub struct WhatsAppDelivery {
    client: reqwest::Client,
    graph_api_base: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppDelivery {
    pub fn new(config: &GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            graph_api_base: config.graph_api_base.clone(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
        }
    }
}

/// Graph API text-message payload for a single recipient.
fn text_message_payload(to: &str, body: &str) -> serde_json::Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "body": body }
    })
}

#[async_trait]
impl ReplyDelivery for WhatsAppDelivery {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.graph_api_base, self.phone_number_id);
        let payload = text_message_payload(to, body);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            let result: serde_json::Value = response.json().await?;
            let message_id = result["messages"][0]["id"].as_str().unwrap_or("unknown");
            debug!(to = %to, message_id = %message_id, "Reply delivered");
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(DeliveryError::Api(error_text))
        }
    }
}
