//! Notifier trait for announcing orders to the operator

use thiserror::Error;

use crate::models::{DeliveryOutcome, Order};

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("HTTP {status}: {description}")]
    HttpError { status: u16, description: String },
    #[error("Timeout")]
    Timeout,
    #[error("No notifier destination configured")]
    NotConfigured,
    #[error("Credential error: {0}")]
    CredentialError(String),
}

impl NotifierError {
    /// Whether a later attempt could plausibly succeed without operator action
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifierError::NetworkError(_) => true,
            NotifierError::HttpError { status, .. } => *status >= 500 || *status == 429,
            NotifierError::Timeout => true,
            NotifierError::NotConfigured => false,
            NotifierError::CredentialError(_) => false,
        }
    }
}

/// Trait for order delivery.
///
/// Implementations never fail past this boundary: every error is folded into
/// `DeliveryOutcome::Failed`.
///
/// Production: Telegram Bot API via reqwest
/// Testing: Recorded responses
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, order: &Order) -> DeliveryOutcome;
}
