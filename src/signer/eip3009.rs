//! Signing for the "exact" scheme on EVM networks.
//!
//! The credential is an ERC-3009 `transferWithAuthorization` signed as EIP-712
//! typed data, wrapped in a V1 payment payload, serialized to JSON and base64
//! encoded.
//!
//! ```ignore
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_interceptor::Eip3009Signer;
//!
//! let signer = Eip3009Signer::new(PrivateKeySigner::random());
//! ```

use alloy_primitives::{Address, B256, Bytes, FixedBytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain, sol};
use async_trait::async_trait;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::sync::Arc;

use crate::networks::chain_id_by_network_name;
use crate::proto::{PaymentRequirements, X402Version};
use crate::signer::{PaymentSigner, SigningError};
use crate::timestamp::UnixTimestamp;
use crate::util::Base64Bytes;

/// The only scheme this signer handles.
pub const EXACT_SCHEME: &str = "exact";

/// How far in the past `validAfter` is placed, so the authorization is
/// immediately valid despite clock skew.
const VALID_AFTER_SKEW_SECS: u64 = 10 * 60;

sol!(
    /// ERC-3009 `transferWithAuthorization` as EIP-712 typed data.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// Signed payment authorization placed in the payment payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmPayloadAuthorization,
}

/// Who can transfer how much, and when.
#[serde_as]
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    pub from: Address,
    pub to: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub value: U256,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

/// The JSON document that gets base64 encoded into `X-Payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: X402Version,
    pub scheme: String,
    pub network: String,
    pub payload: ExactEvmPayload,
}

/// Abstracts over owned and `Arc`-shared signers.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner`
/// is not `Clone`-cheap to share, so signing goes through this trait.
#[async_trait]
pub trait SignerLike: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + ?Sized> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// EIP-712 domain `name`/`version` of the token, read from `extra`.
/// Missing values default to empty strings.
fn token_domain(requirements: &PaymentRequirements) -> (String, String) {
    let field = |key: &str| {
        requirements
            .extra
            .as_ref()
            .and_then(|extra| extra.get(key))
            .and_then(|v| v.as_str())
            .map(ToOwned::to_owned)
            .unwrap_or_default()
    };
    (field("name"), field("version"))
}

fn parse_address(value: &str) -> Result<Address, SigningError> {
    value
        .parse::<Address>()
        .map_err(|_| SigningError::InvalidAddress(value.to_string()))
}

/// [`PaymentSigner`] for the "exact" scheme on the networks in
/// [`crate::networks::KNOWN_NETWORKS`].
#[derive(Debug, Clone)]
pub struct Eip3009Signer<S> {
    signer: S,
}

impl<S> Eip3009Signer<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }
}

impl<S: SignerLike> Eip3009Signer<S> {
    /// Address that funds the payments.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Builds and signs the authorization for `requirements`.
    pub async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<ExactEvmPayload, SigningError> {
        if requirements.scheme != EXACT_SCHEME {
            return Err(SigningError::UnsupportedScheme {
                scheme: requirements.scheme.clone(),
                network: requirements.network.clone(),
            });
        }
        let chain_id = chain_id_by_network_name(&requirements.network)
            .ok_or_else(|| SigningError::UnknownNetwork(requirements.network.clone()))?;
        let asset = parse_address(&requirements.asset)?;
        let pay_to = parse_address(&requirements.pay_to)?;
        let value = requirements
            .amount()
            .map_err(|_| SigningError::InvalidAmount(requirements.max_amount_required.clone()))?;

        let (name, version) = token_domain(requirements);
        let domain = eip712_domain! {
            name: name,
            version: version,
            chain_id: chain_id,
            verifying_contract: asset,
        };

        let now = UnixTimestamp::now();
        let valid_after = now.earlier_by(VALID_AFTER_SKEW_SECS);
        let valid_before = now + requirements.max_timeout_seconds;
        let nonce: [u8; 32] = rng().random();
        let nonce = FixedBytes(nonce);

        let authorization = ExactEvmPayloadAuthorization {
            from: self.signer.address(),
            to: pay_to,
            value,
            valid_after,
            valid_before,
            nonce,
        };
        #[cfg(feature = "telemetry")]
        tracing::debug!(?authorization, "Constructed authorization payload");

        // Must mirror `authorization` field for field: the server rebuilds
        // this struct from the payload to verify the signature.
        let transfer_with_authorization = TransferWithAuthorization {
            from: authorization.from,
            to: authorization.to,
            value: authorization.value,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        };
        let eip712_hash = transfer_with_authorization.eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&eip712_hash)
            .await
            .map_err(|e| SigningError::Signature(format!("{e:?}")))?;

        Ok(ExactEvmPayload {
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
            authorization,
        })
    }
}

#[async_trait]
impl<S: SignerLike> PaymentSigner for Eip3009Signer<S> {
    #[cfg_attr(feature = "telemetry", tracing::instrument(name = "x402.sign_payment", skip_all, err, fields(
        network = %requirements.network,
        amount = %requirements.max_amount_required,
    )))]
    async fn create_payment_header(
        &self,
        requirements: &PaymentRequirements,
        x402_version: X402Version,
    ) -> Result<String, SigningError> {
        let payload = self.sign_authorization(requirements).await?;
        let payment_payload = PaymentPayload {
            x402_version,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            payload,
        };
        let json = serde_json::to_vec(&payment_payload)?;
        Ok(Base64Bytes::encode(&json).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "base-sepolia".to_string(),
            max_amount_required: "10000".to_string(),
            resource: "https://api.example.com/weather".to_string(),
            description: "Weather report".to_string(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".to_string(),
            max_timeout_seconds: 60,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            extra: Some(json!({ "name": "USDC", "version": "2" })),
        }
    }

    fn decode(header: &str) -> PaymentPayload {
        let json = Base64Bytes::from(header.as_bytes()).decode().unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[tokio::test]
    async fn header_carries_a_recoverable_signature() {
        let wallet = PrivateKeySigner::random();
        let expected_from = wallet.address();
        let signer = Eip3009Signer::new(wallet);
        let requirements = requirements();

        let header = signer
            .create_payment_header(&requirements, X402Version::V1)
            .await
            .unwrap();
        let payload = decode(&header);

        assert_eq!(payload.x402_version, X402Version::V1);
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.network, "base-sepolia");
        let authorization = payload.payload.authorization;
        assert_eq!(authorization.from, expected_from);
        assert_eq!(authorization.to, parse_address(&requirements.pay_to).unwrap());
        assert_eq!(authorization.value, U256::from(10000u64));
        assert_eq!(
            authorization.valid_before.as_secs() - authorization.valid_after.as_secs(),
            VALID_AFTER_SKEW_SECS + 60
        );

        let domain = eip712_domain! {
            name: "USDC".to_string(),
            version: "2".to_string(),
            chain_id: 84532u64,
            verifying_contract: parse_address(&requirements.asset).unwrap(),
        };
        let hash = TransferWithAuthorization {
            from: authorization.from,
            to: authorization.to,
            value: authorization.value,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        }
        .eip712_signing_hash(&domain);
        let signature = Signature::try_from(payload.payload.signature.as_ref()).unwrap();
        let recovered = signature.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, expected_from);
    }

    #[tokio::test]
    async fn value_is_a_decimal_string_on_the_wire() {
        let signer = Eip3009Signer::new(PrivateKeySigner::random());
        let header = signer
            .create_payment_header(&requirements(), X402Version::V1)
            .await
            .unwrap();
        let json = Base64Bytes::from(header.as_bytes()).decode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["x402Version"], json!(1));
        assert_eq!(value["payload"]["authorization"]["value"], json!("10000"));
        assert!(value["payload"]["authorization"]["validAfter"].is_string());
    }

    #[tokio::test]
    async fn credentials_are_never_reused() {
        let signer = Eip3009Signer::new(Arc::new(PrivateKeySigner::random()));
        let first = signer
            .create_payment_header(&requirements(), X402Version::V1)
            .await
            .unwrap();
        let second = signer
            .create_payment_header(&requirements(), X402Version::V1)
            .await
            .unwrap();
        assert_ne!(
            decode(&first).payload.authorization.nonce,
            decode(&second).payload.authorization.nonce
        );
    }

    #[tokio::test]
    async fn rejects_unknown_network() {
        let signer = Eip3009Signer::new(PrivateKeySigner::random());
        let mut requirements = requirements();
        requirements.network = "solana".to_string();
        let err = signer
            .create_payment_header(&requirements, X402Version::V1)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::UnknownNetwork(n) if n == "solana"));
    }

    #[tokio::test]
    async fn rejects_other_schemes() {
        let signer = Eip3009Signer::new(PrivateKeySigner::random());
        let mut requirements = requirements();
        requirements.scheme = "upto".to_string();
        let err = signer
            .create_payment_header(&requirements, X402Version::V1)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::UnsupportedScheme { .. }));
    }

    #[tokio::test]
    async fn rejects_malformed_recipient() {
        let signer = Eip3009Signer::new(PrivateKeySigner::random());
        let mut requirements = requirements();
        requirements.pay_to = "not-an-address".to_string();
        let err = signer
            .create_payment_header(&requirements, X402Version::V1)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidAddress(a) if a == "not-an-address"));
    }

    #[test]
    fn missing_extra_yields_empty_domain() {
        let mut requirements = requirements();
        requirements.extra = None;
        assert_eq!(token_domain(&requirements), (String::new(), String::new()));
    }
}
