//! File-based client configuration.
//!
//! A JSON document describing the paying account and its policy:
//!
//! ```json
//! {
//!   "private_key": "$X402_PRIVATE_KEY",
//!   "max_value": "1000000",
//!   "network": "base-sepolia",
//!   "scheme": "exact"
//! }
//! ```
//!
//! String values in [`LiteralOrEnv`] positions may reference environment
//! variables as `$VAR` or `${VAR}`, keeping secrets out of the file.

use alloy_primitives::U256;
use alloy_signer_local::PrivateKeySigner;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::client::X402Client;

/// A value given literally or as a reference to an environment variable.
///
/// - Literal: `"0xac09..."`
/// - Simple env var: `"$X402_PRIVATE_KEY"`
/// - Braced env var: `"${X402_PRIVATE_KEY}"`
///
/// The resolved string is parsed with [`FromStr`].
#[derive(Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if `s` is `$VAR` or `${VAR}`.
    fn env_var_name(s: &str) -> Option<&str> {
        if let Some(name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(name)
        } else {
            let name = s.strip_prefix('$')?;
            let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
            valid.then_some(name)
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for LiteralOrEnv<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = match Self::env_var_name(&s) {
            Some(name) => std::env::var(name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{name}' not found (referenced as '{s}')"
                ))
            })?,
            None => s,
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))?;
        Ok(LiteralOrEnv(parsed))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// The paying account and its policy.
#[serde_as]
#[derive(Clone, Deserialize)]
pub struct X402ClientConfig {
    /// Hex-encoded secp256k1 key of the paying EVM account.
    pub private_key: LiteralOrEnv<PrivateKeySigner>,
    /// Spend ceiling per request, in the asset's base units.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub max_value: Option<U256>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
}

impl fmt::Debug for X402ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X402ClientConfig")
            .field("address", &self.private_key.address())
            .field("max_value", &self.max_value)
            .field("network", &self.network)
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl X402ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), address = %config.private_key.address(), "Loaded x402 client config");
        Ok(config)
    }

    /// Builds an [`X402Client`] paying with the configured key through EIP-3009.
    pub fn into_client(self) -> X402Client {
        let mut client = X402Client::from_wallet(self.private_key.into_inner());
        if let Some(max_value) = self.max_value {
            client = client.with_max_value(max_value);
        }
        if let Some(network) = self.network {
            client = client.with_network(network);
        }
        if let Some(scheme) = self.scheme {
            client = client.with_scheme(scheme);
        }
        client
    }
}
