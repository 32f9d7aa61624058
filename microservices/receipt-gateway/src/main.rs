//! WhatsApp Receipt Gateway
//!
//! Receives Meta webhook events, downloads the attached receipt image,
//! extracts the five receipt fields (name, phone, email, amount, date)
//! through a vision model, and walks the sender through a confirm/edit
//! dialogue before accepting the receipt.

#![allow(dead_code)]

use risiti_core::{HealthStatus, MicroserviceRuntime, ReadinessStatus, Result, RisitiService};
use std::sync::Arc;
use tracing::info;

mod config;
mod delivery;
mod dialogue;
mod extraction;
mod fields;
mod media;
mod menu;
mod session;
mod webhook;


pub use config::GatewayConfig;
use delivery::WhatsAppDelivery;
use dialogue::DialogueEngine;
use extraction::OpenAiVisionExtractor;
use media::WhatsAppMediaClient;
use session::InMemorySessionStore;
use webhook::WebhookContext;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("receipt_gateway=debug".parse().unwrap()),
        )
        .json()
        .init();

    info!("Starting Receipt Gateway");

    let service = Arc::new(ReceiptGatewayService::new()?);
    MicroserviceRuntime::run(service).await
}

/// Receipt gateway service state
#[derive(Clone)]
pub struct ReceiptGatewayService {
    config: GatewayConfig,
    sessions: InMemorySessionStore,
    ctx: WebhookContext,
    start_time: std::time::Instant,
}

impl ReceiptGatewayService {
    pub fn new() -> Result<Self> {
        let config = GatewayConfig::from_env()?;

        let sessions = InMemorySessionStore::new(config.session_ttl_secs);
        let engine = DialogueEngine::new(
            Arc::new(sessions.clone()),
            Arc::new(OpenAiVisionExtractor::new(&config)),
            Arc::new(WhatsAppMediaClient::new(&config)),
        );
        let ctx = WebhookContext {
            engine: Arc::new(engine),
            delivery: Arc::new(WhatsAppDelivery::new(&config)),
            verify_token: config.verify_token.clone(),
        };

        Ok(Self {
            config,
            sessions,
            ctx,
            start_time: std::time::Instant::now(),
        })
    }
}

#[async_trait::async_trait]
impl RisitiService for ReceiptGatewayService {
    fn service_id(&self) -> &'static str {
        "receipt-gateway"
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: self.service_id().to_string(),
            version: self.version().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    async fn ready(&self) -> ReadinessStatus {
        let whatsapp_configured =
            !self.config.access_token.is_empty() && !self.config.phone_number_id.is_empty();
        let vision_configured = !self.config.openai_api_key.is_empty();

        ReadinessStatus {
            ready: whatsapp_configured && vision_configured,
            dependencies: vec![
                risiti_core::DependencyStatus {
                    name: "whatsapp".to_string(),
                    available: whatsapp_configured,
                    latency_ms: None,
                },
                risiti_core::DependencyStatus {
                    name: "vision".to_string(),
                    available: vision_configured,
                    latency_ms: None,
                },
            ],
        }
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down Receipt Gateway");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        info!(
            http = %self.config.http_bind,
            graph_base = %self.config.graph_api_base,
            model = %self.config.vision_model,
            "Starting Receipt Gateway server"
        );

        self.sessions
            .start_cleanup(self.config.session_cleanup_interval_secs);

        let ctx = self.ctx.clone();

        let app = axum::Router::new()
            .route(
                "/health",
                axum::routing::get({
                    let service = self.clone();
                    move || {
                        let service = service.clone();
                        async move { axum::Json(service.health().await) }
                    }
                }),
            )
            .route(
                "/ready",
                axum::routing::get({
                    let service = self.clone();
                    move || {
                        let service = service.clone();
                        async move { axum::Json(service.ready().await) }
                    }
                }),
            )
            .route(
                "/webhook",
                axum::routing::get({
                    let ctx = ctx.clone();
                    move |axum::extract::Query(query): axum::extract::Query<webhook::VerifyQuery>| {
                        let ctx = ctx.clone();
                        async move { webhook::verify(&ctx, query).await }
                    }
                })
                .post({
                    let ctx = ctx.clone();
                    move |axum::Json(event): axum::Json<webhook::WebhookEvent>| {
                        let ctx = ctx.clone();
                        async move { webhook::receive(&ctx, event).await }
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind(&self.config.http_bind).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
