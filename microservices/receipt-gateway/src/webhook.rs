//! Meta webhook boundary
//!
//! Two vendor-defined entry points: the GET verification handshake and the
//! POST message-receive envelope. The envelope is flattened into inbound
//! text/image events for the dialogue engine. Status callbacks carry no
//! messages and are acknowledged without a reply; unsupported message types
//! (audio, stickers) get the default upload prompt.

use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::delivery::{self, ReplyDelivery};
use crate::dialogue::DialogueEngine;
use crate::menu;

/// Shared context for the webhook handlers.
#[derive(Clone)]
pub struct WebhookContext {
    pub engine: Arc<DialogueEngine>,
    pub delivery: Arc<dyn ReplyDelivery>,
    pub verify_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: String,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: String,
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
}

/// GET handshake: echo the challenge when the token matches, else 403.
pub async fn verify(ctx: &WebhookContext, query: VerifyQuery) -> (StatusCode, String) {
    if query.mode == "subscribe" && query.verify_token == ctx.verify_token {
        info!("Webhook verification succeeded");
        (StatusCode::OK, query.challenge)
    } else {
        warn!(mode = %query.mode, "Webhook verification rejected");
        (StatusCode::FORBIDDEN, String::new())
    }
}

/// POST receive: dispatch each inbound message to the dialogue engine and
/// hand the ordered replies to delivery. Always acknowledges with 200; a
/// non-2xx would only make Meta redeliver the same event.
pub async fn receive(ctx: &WebhookContext, event: WebhookEvent) -> StatusCode {
    for message in event.into_messages() {
        let replies = match message.message_type.as_str() {
            "text" => match &message.text {
                Some(text) => ctx.engine.on_text(&message.from, &text.body).await,
                None => Vec::new(),
            },
            "image" => match &message.image {
                Some(image) => ctx.engine.on_image(&message.from, &image.id).await,
                None => Vec::new(),
            },
            other => {
                // Not something the dialogue can use; nudge toward the image.
                debug!(from = %message.from, message_type = %other, "Unsupported message type");
                vec![menu::UPLOAD_PROMPT.to_string()]
            }
        };
        delivery::send_all(ctx.delivery.as_ref(), &message.from, &replies).await;
    }
    StatusCode::OK
}

// Meta webhook envelope, reduced to the parts the gateway consumes.
// Unknown fields (contacts, metadata, statuses) are ignored by serde.

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<TextBody>,
    pub image: Option<ImageRef>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRef {
    pub id: String,
}

impl WebhookEvent {
    /// Flatten entries and changes into the messages they carry. Status
    /// callbacks have no `messages` array and flatten to nothing.
    pub fn into_messages(self) -> Vec<InboundMessage> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.changes)
            .flat_map(|change| change.value.messages)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::extraction::ReceiptExtractor;
    use crate::fields::ReceiptRecord;
    use crate::media::{self, MediaError, MediaFetcher, TempImage};
    use crate::menu;
    use crate::session::InMemorySessionStore;

    struct NoopExtractor;

    #[async_trait]
    impl ReceiptExtractor for NoopExtractor {
        async fn extract(&self, _image: &TempImage) -> ReceiptRecord {
            ReceiptRecord::default()
        }
    }

    struct NoopMedia;

    #[async_trait]
    impl MediaFetcher for NoopMedia {
        async fn fetch_image(&self, _media_id: &str) -> media::Result<TempImage> {
            Err(MediaError::Api("unused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplyDelivery for RecordingDelivery {
        async fn send_text(&self, to: &str, body: &str) -> crate::delivery::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn context(delivery: Arc<RecordingDelivery>) -> WebhookContext {
        let engine = DialogueEngine::new(
            Arc::new(InMemorySessionStore::new(1800)),
            Arc::new(NoopExtractor),
            Arc::new(NoopMedia),
        );
        WebhookContext {
            engine: Arc::new(engine),
            delivery,
            verify_token: "secret-token".to_string(),
        }
    }

    fn query(mode: &str, token: &str) -> VerifyQuery {
        VerifyQuery {
            mode: mode.to_string(),
            verify_token: token.to_string(),
            challenge: "challenge-123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_verify_echoes_challenge_on_match() {
        let ctx = context(Arc::new(RecordingDelivery::default()));
        let (status, body) = verify(&ctx, query("subscribe", "secret-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "challenge-123");
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_token_and_wrong_mode() {
        let ctx = context(Arc::new(RecordingDelivery::default()));

        let (status, _) = verify(&ctx, query("subscribe", "wrong")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = verify(&ctx, query("unsubscribe", "secret-token")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_envelope_flattens_text_message() {
        let raw = r#"{
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1031",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": { "display_phone_number": "15550001111", "phone_number_id": "2222" },
                        "contacts": [{ "profile": { "name": "Jane" }, "wa_id": "2348031234567" }],
                        "messages": [{
                            "from": "2348031234567",
                            "id": "wamid.ABC",
                            "timestamp": "1712345678",
                            "type": "text",
                            "text": { "body": "hello" }
                        }]
                    }
                }]
            }]
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        let messages = event.into_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "2348031234567");
        assert_eq!(messages[0].message_type, "text");
        assert_eq!(messages[0].text.as_ref().unwrap().body, "hello");
    }

    #[test]
    fn test_envelope_flattens_image_message() {
        let raw = r#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "2348031234567",
                            "id": "wamid.DEF",
                            "type": "image",
                            "image": { "id": "media-789", "mime_type": "image/jpeg", "sha256": "x" }
                        }]
                    }
                }]
            }]
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        let messages = event.into_messages();
        assert_eq!(messages[0].message_type, "image");
        assert_eq!(messages[0].image.as_ref().unwrap().id, "media-789");
    }

    #[test]
    fn test_status_callback_flattens_to_nothing() {
        let raw = r#"{
            "entry": [{
                "changes": [{
                    "value": {
                        "messaging_product": "whatsapp",
                        "statuses": [{ "id": "wamid.GHI", "status": "delivered" }]
                    }
                }]
            }]
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert!(event.into_messages().is_empty());
    }

    #[tokio::test]
    async fn test_receive_dispatches_and_delivers_replies() {
        let delivery = Arc::new(RecordingDelivery::default());
        let ctx = context(delivery.clone());

        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "entry": [{
                    "changes": [{
                        "value": {
                            "messages": [{
                                "from": "2348031234567",
                                "type": "text",
                                "text": { "body": "hi" }
                            }]
                        }
                    }]
                }]
            }"#,
        )
        .unwrap();

        let status = receive(&ctx, event).await;
        assert_eq!(status, StatusCode::OK);

        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "2348031234567");
        assert_eq!(sent[0].1, menu::UPLOAD_PROMPT);
    }

    #[tokio::test]
    async fn test_receive_acknowledges_empty_envelope() {
        let delivery = Arc::new(RecordingDelivery::default());
        let ctx = context(delivery.clone());

        let event: WebhookEvent = serde_json::from_str(r#"{"entry": []}"#).unwrap();
        let status = receive(&ctx, event).await;
        assert_eq!(status, StatusCode::OK);
        assert!(delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receive_prompts_on_unsupported_message_type() {
        let delivery = Arc::new(RecordingDelivery::default());
        let ctx = context(delivery.clone());

        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "entry": [{
                    "changes": [{
                        "value": {
                            "messages": [{
                                "from": "2348031234567",
                                "type": "audio"
                            }]
                        }
                    }]
                }]
            }"#,
        )
        .unwrap();

        let status = receive(&ctx, event).await;
        assert_eq!(status, StatusCode::OK);

        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, menu::UPLOAD_PROMPT);
    }
}
