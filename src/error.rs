//! Crate-level error type returned by commands

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::traits::{CredentialError, StoreError};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Rejected input; nothing was persisted
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The store could not be read or written; the operation did not happen
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("Credential failure: {0}")]
    Credential(#[from] CredentialError),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Export failed: {0}")]
    Export(String),
}

impl From<CatalogError> for StorefrontError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Validation(e) => StorefrontError::Validation(e),
            CatalogError::Store(e) => StorefrontError::Store(e),
        }
    }
}

impl From<csv::Error> for StorefrontError {
    fn from(e: csv::Error) -> Self {
        StorefrontError::Export(e.to_string())
    }
}

impl StorefrontError {
    /// Whether the user can fix this by changing their input
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StorefrontError::Validation(_)
                | StorefrontError::OrderNotFound(_)
                | StorefrontError::ConfirmationRequired(_)
        )
    }
}
