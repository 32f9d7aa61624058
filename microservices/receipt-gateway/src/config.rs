//! Receipt Gateway Configuration

use risiti_core::Result;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_bind: String,
    pub verify_token: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub graph_api_base: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub vision_model: String,
    pub media_tmp_dir: String,
    pub session_ttl_secs: u64,
    pub session_cleanup_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_bind: std::env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            verify_token: std::env::var("WHATSAPP_VERIFY_TOKEN")
                .unwrap_or_else(|_| "".to_string()),
            phone_number_id: std::env::var("WHATSAPP_PHONE_NUMBER_ID")
                .unwrap_or_else(|_| "".to_string()),
            access_token: std::env::var("WHATSAPP_ACCESS_TOKEN")
                .unwrap_or_else(|_| "".to_string()),
            graph_api_base: std::env::var("GRAPH_API_BASE")
                .unwrap_or_else(|_| "https://graph.facebook.com/v18.0".to_string()),
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "".to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            vision_model: std::env::var("VISION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            media_tmp_dir: std::env::var("MEDIA_TMP_DIR").unwrap_or_else(|_| "tmp".to_string()),
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
            session_cleanup_interval_secs: std::env::var("SESSION_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}
