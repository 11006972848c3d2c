//! Wire types for the x402 exchange as seen by a paying client.
//!
//! Only the V1 body-based challenge is understood: the server answers `402`
//! with a JSON [`PaymentRequired`] body, the client retries with an
//! `X-Payment` header, and the server may report settlement back through
//! `X-Payment-Response`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;

pub mod v1;

pub use v1::*;

/// Request header carrying the signed payment credential.
pub const X_PAYMENT: &str = "X-Payment";
/// Response header carrying the base64 settlement result.
pub const X_PAYMENT_RESPONSE: &str = "X-Payment-Response";
/// CORS header that lets a browser-facing caller read [`X_PAYMENT_RESPONSE`].
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";

/// Protocol version advertised in a challenge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum X402Version {
    /// Version `1`.
    V1,
}

impl X402Version {
    pub const fn as_u8(self) -> u8 {
        match self {
            X402Version::V1 => 1,
        }
    }
}

impl From<X402Version> for u8 {
    fn from(version: X402Version) -> Self {
        version.as_u8()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported x402 version: {0}")]
pub struct X402VersionError(pub u8);

impl TryFrom<u8> for X402Version {
    type Error = X402VersionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(X402Version::V1),
            _ => Err(X402VersionError(value)),
        }
    }
}

impl Serialize for X402Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        X402Version::try_from(num).map_err(serde::de::Error::custom)
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_round_trips_as_integer() {
        assert_eq!(serde_json::to_string(&X402Version::V1).unwrap(), "1");
        let parsed: X402Version = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, X402Version::V1);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = serde_json::from_str::<X402Version>("7").unwrap_err();
        assert!(err.to_string().contains("Unsupported x402 version: 7"));
    }
}
