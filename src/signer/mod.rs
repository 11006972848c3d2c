//! Producing the payment credential for a selected requirement.
//!
//! The interceptor treats the credential as an opaque string: whatever a
//! [`PaymentSigner`] returns is placed verbatim into the `X-Payment` header of
//! the retried request. [`Eip3009Signer`] is the built-in implementation for
//! the "exact" scheme on EVM networks.

use async_trait::async_trait;
use std::sync::Arc;

use crate::proto::{PaymentRequirements, X402Version};

pub mod eip3009;

pub use eip3009::*;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Unsupported scheme {scheme:?} on network {network:?}")]
    UnsupportedScheme { scheme: String, network: String },
    #[error("Unknown network {0:?}")]
    UnknownNetwork(String),
    #[error("Invalid EVM address {0:?}")]
    InvalidAddress(String),
    #[error("Invalid payment amount {0:?}")]
    InvalidAmount(String),
    #[error("Failed to sign payment payload: {0}")]
    Signature(String),
    #[error("Failed to encode payment payload to json")]
    JsonEncode(#[source] serde_json::Error),
    /// Raised by custom signers.
    #[error("{0}")]
    Custom(String),
}

impl From<serde_json::Error> for SigningError {
    fn from(error: serde_json::Error) -> Self {
        SigningError::JsonEncode(error)
    }
}

/// Builds a signed payment credential for one requirement.
///
/// A fresh credential is requested for every retry; implementations must not
/// hand out a cached one.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    async fn create_payment_header(
        &self,
        requirements: &PaymentRequirements,
        x402_version: X402Version,
    ) -> Result<String, SigningError>;
}

#[async_trait]
impl<T: PaymentSigner + ?Sized> PaymentSigner for Arc<T> {
    async fn create_payment_header(
        &self,
        requirements: &PaymentRequirements,
        x402_version: X402Version,
    ) -> Result<String, SigningError> {
        (**self).create_payment_header(requirements, x402_version).await
    }
}
