//! Version 1 wire format: the `402` body and the settlement header.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - One way the seller is willing to be paid
//! - [`PaymentRequired`] - The `402` body, a non-empty list of requirements
//! - [`PaymentResponse`] - Decoded `X-Payment-Response` header

use alloy_primitives::U256;
use alloy_primitives::ruint::ParseError;
use http::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::proto::{X_PAYMENT_RESPONSE, X402Version};
use crate::util::Base64Bytes;

/// Payment requirements set by the seller.
///
/// Amounts and addresses stay as the strings the server sent; the signer
/// parses them into chain types when it builds the authorization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// Amount in the asset's base units, as a decimal string.
    pub max_amount_required: String,
    /// The resource URL being paid for.
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient address.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token contract address.
    pub asset: String,
    /// Scheme-specific extra data. For "exact" on EVM this is the EIP-712
    /// domain `name` and `version` of the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Parses `maxAmountRequired` into base units.
    pub fn amount(&self) -> Result<U256, ParseError> {
        self.max_amount_required.parse::<U256>()
    }
}

/// HTTP 402 Payment Required body.
///
/// `accepts` is never empty: a challenge that offers nothing is rejected at
/// deserialization time, the same way any other malformed body is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: X402Version,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequiredWire {
    x402_version: X402Version,
    #[serde(default)]
    accepts: Vec<PaymentRequirements>,
    #[serde(default)]
    error: Option<String>,
}

impl<'de> Deserialize<'de> for PaymentRequired {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = PaymentRequiredWire::deserialize(deserializer)?;
        if wire.accepts.is_empty() {
            let detail = match &wire.error {
                Some(error) => format!("no payment requirements offered (server error: {error})"),
                None => "no payment requirements offered".to_string(),
            };
            return Err(serde::de::Error::custom(detail));
        }
        Ok(PaymentRequired {
            x402_version: wire.x402_version,
            accepts: wire.accepts,
            error: wire.error,
        })
    }
}

impl PaymentRequired {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Settlement result reported by the server in `X-Payment-Response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResponse {
    /// The payment settled.
    Success {
        /// Transaction hash of the settlement.
        transaction: String,
        network: String,
        payer: Option<String>,
    },
    /// Settlement failed.
    Error {
        reason: String,
        network: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentResponseError {
    #[error("X-Payment-Response is not valid base64")]
    Base64(#[source] base64::DecodeError),
    #[error("X-Payment-Response is not a valid settlement payload")]
    Json(#[source] serde_json::Error),
}

impl PaymentResponse {
    /// Decodes the `X-Payment-Response` header, if the server sent one.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, PaymentResponseError> {
        let Some(value) = headers.get(X_PAYMENT_RESPONSE) else {
            return Ok(None);
        };
        let json = Base64Bytes::from(value.as_bytes())
            .decode()
            .map_err(PaymentResponseError::Base64)?;
        let response = serde_json::from_slice(&json).map_err(PaymentResponseError::Json)?;
        Ok(Some(response))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentResponse::Success { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
}

impl Serialize for PaymentResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            PaymentResponse::Success {
                transaction,
                network,
                payer,
            } => PaymentResponseWire {
                success: true,
                error_reason: None,
                transaction: Some(transaction.clone()),
                network: Some(network.clone()),
                payer: payer.clone(),
            },
            PaymentResponse::Error { reason, network } => PaymentResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                transaction: None,
                network: network.clone(),
                payer: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PaymentResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = PaymentResponseWire::deserialize(deserializer)?;
        match wire.success {
            true => {
                let transaction = wire
                    .transaction
                    .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
                let network = wire
                    .network
                    .ok_or_else(|| serde::de::Error::missing_field("network"))?;
                Ok(PaymentResponse::Success {
                    transaction,
                    network,
                    payer: wire.payer,
                })
            }
            false => {
                let reason = wire
                    .error_reason
                    .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
                Ok(PaymentResponse::Error {
                    reason,
                    network: wire.network,
                })
            }
        }
    }
}
