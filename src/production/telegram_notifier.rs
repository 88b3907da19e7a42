//! Telegram Bot API notifier

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;

use crate::config::{SettingsStore, BOT_TOKEN_KEY};
use crate::message::format_order_message;
use crate::models::{DeliveryOutcome, Order};
use crate::traits::{CredentialStore, Notifier, NotifierError};

const TIMEOUT_SECONDS: u64 = 25;
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Body of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Where the next message goes, resolved per send
struct Destination {
    chat_id: String,
    token: String,
}

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    settings: SettingsStore,
    credentials: Arc<dyn CredentialStore>,
}

impl TelegramNotifier {
    pub fn new(settings: SettingsStore, credentials: Arc<dyn CredentialStore>) -> Result<Self, NotifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()
            .map_err(|e| NotifierError::NetworkError(e.to_string()))?;

        tracing::debug!("Initialized Telegram client with {}s timeout", TIMEOUT_SECONDS);
        Ok(Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            settings,
            credentials,
        })
    }

    /// Point at a different Bot API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// `None` when either the chat id or the bot token is missing
    fn destination(&self, chat_id: Option<&str>) -> Result<Option<Destination>, NotifierError> {
        let Some(chat_id) = chat_id else {
            return Ok(None);
        };
        let token = self
            .credentials
            .retrieve(BOT_TOKEN_KEY)
            .map_err(|e| NotifierError::CredentialError(e.to_string()))?;

        Ok(token
            .filter(|t| !t.trim().is_empty())
            .map(|token| Destination { chat_id: chat_id.to_string(), token }))
    }

    async fn post(&self, destination: &Destination, text: &str) -> Result<(), NotifierError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, destination.token);
        let payload = serde_json::json!({
            "chat_id": destination.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let start = Instant::now();
        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            // reqwest errors carry the URL, which contains the token
            let e = e.without_url();
            if e.is_timeout() {
                NotifierError::Timeout
            } else {
                NotifierError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.json::<ApiResponse>().await.ok();
        tracing::debug!(status = status, duration_ms = start.elapsed().as_millis() as u64, "Telegram response");

        match body {
            Some(ApiResponse { ok: true, .. }) if (200..300).contains(&status) => Ok(()),
            Some(ApiResponse { description, .. }) => Err(NotifierError::HttpError {
                status,
                description: description.unwrap_or_default(),
            }),
            None => Err(NotifierError::HttpError { status, description: "Unreadable response".to_string() }),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, order: &Order) -> DeliveryOutcome {
        let settings = self.settings.get();

        let destination = match self.destination(settings.destination()) {
            Ok(destination) => destination,
            Err(e) => {
                tracing::error!(order_id = %order.order_id, error = %e, "Could not read bot token");
                return DeliveryOutcome::failed(e.to_string());
            }
        };

        let Some(destination) = destination else {
            if settings.stub_when_unconfigured {
                tracing::info!(
                    order_id = %order.order_id,
                    delay_ms = settings.stub_delay_ms,
                    "No Telegram destination configured, simulating delivery"
                );
                tokio::time::sleep(settings.stub_delay()).await;
                return DeliveryOutcome::Delivered;
            }
            tracing::warn!(order_id = %order.order_id, "No Telegram destination configured");
            return DeliveryOutcome::failed(NotifierError::NotConfigured.to_string());
        };

        let text = format_order_message(order, settings.business.as_ref());
        tracing::info!(order_id = %order.order_id, "Sending order to Telegram");

        match self.post(&destination, &text).await {
            Ok(()) => {
                tracing::info!(order_id = %order.order_id, "Telegram accepted order message");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(order_id = %order.order_id, error = %e, "Telegram delivery failed");
                } else {
                    tracing::error!(order_id = %order.order_id, error = %e, "Telegram rejected order message");
                }
                DeliveryOutcome::failed(e.to_string())
            }
        }
    }
}
