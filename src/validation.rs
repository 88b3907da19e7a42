//! Input validation for checkout and catalog edits
//!
//! Runs before anything is persisted; a rejected input never reaches the store.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{CartItem, CustomerDetails, Product};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name is required")]
    NameRequired,
    #[error("Mobile number is required")]
    MobileRequired,
    #[error("Please enter a valid 10-digit Indian mobile number")]
    InvalidMobile,
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Quantity for {0} must be at least 1")]
    InvalidQuantity(String),
    #[error("SKU, Name, and Category are required")]
    MissingProductFields,
    #[error("Rate for {0} cannot be negative")]
    NegativeRate(String),
    #[error("Product with SKU/ID \"{0}\" already exists")]
    DuplicateProduct(String),
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
}

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[6-9]\d{9}$").expect("static regex"))
}

/// Check the fields the order message depends on
pub fn validate_customer(details: &CustomerDetails) -> Result<(), ValidationError> {
    if details.name.trim().is_empty() {
        return Err(ValidationError::NameRequired);
    }
    let mobile = details.mobile.trim();
    if mobile.is_empty() {
        return Err(ValidationError::MobileRequired);
    }
    if !mobile_pattern().is_match(mobile) {
        return Err(ValidationError::InvalidMobile);
    }
    Ok(())
}

pub fn validate_cart(items: &[CartItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }
    for item in items {
        if item.qty == 0 {
            return Err(ValidationError::InvalidQuantity(item.product.id.clone()));
        }
        if item.product.rate < Decimal::ZERO {
            return Err(ValidationError::NegativeRate(item.product.id.clone()));
        }
    }
    Ok(())
}

pub fn validate_product(product: &Product) -> Result<(), ValidationError> {
    if product.id.trim().is_empty() || product.name.trim().is_empty() || product.category.trim().is_empty() {
        return Err(ValidationError::MissingProductFields);
    }
    if product.rate < Decimal::ZERO {
        return Err(ValidationError::NegativeRate(product.id.clone()));
    }
    Ok(())
}

/// Trim free-text fields and drop optional ones left blank
pub fn normalize_customer(details: CustomerDetails) -> CustomerDetails {
    fn optional(value: Option<String>) -> Option<String> {
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
    CustomerDetails {
        name: details.name.trim().to_string(),
        mobile: details.mobile.trim().to_string(),
        gst: optional(details.gst),
        address: optional(details.address),
        notes: optional(details.notes),
    }
}
