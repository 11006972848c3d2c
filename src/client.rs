//! The payer's identity and policy.
//!
//! [`X402Client`] bundles what the interceptor needs to answer a challenge:
//! a [`PaymentSigner`], a [`PaymentSelector`], and the [`SelectionFilter`]
//! (spend ceiling, network and scheme filters). It is fixed for the lifetime
//! of the HTTP client it is installed into.

use alloy_primitives::U256;
use std::sync::Arc;

use crate::proto::{PaymentRequirements, X402Version};
use crate::selector::{DefaultSelector, PaymentSelector, SelectionError, SelectionFilter};
use crate::signer::{Eip3009Signer, PaymentSigner, SignerLike, SigningError};

/// Selects and signs payments on behalf of one account.
///
/// ```rust,no_run
/// use alloy_primitives::U256;
/// use alloy_signer_local::PrivateKeySigner;
/// use x402_interceptor::X402Client;
///
/// let wallet: PrivateKeySigner = "0x...".parse().unwrap();
/// let client = X402Client::from_wallet(wallet)
///     .with_max_value(U256::from(1_000_000u64))
///     .with_network("base");
/// ```
#[derive(Clone)]
pub struct X402Client {
    signer: Arc<dyn PaymentSigner>,
    selector: Arc<dyn PaymentSelector>,
    filter: SelectionFilter,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl X402Client {
    /// Uses `signer` for credentials and [`DefaultSelector`] for selection.
    pub fn new<S: PaymentSigner + 'static>(signer: S) -> Self {
        Self {
            signer: Arc::new(signer),
            selector: Arc::new(DefaultSelector),
            filter: SelectionFilter::default(),
        }
    }

    /// Pays with an EVM wallet through [`Eip3009Signer`].
    pub fn from_wallet<W: SignerLike + 'static>(wallet: W) -> Self {
        Self::new(Eip3009Signer::new(wallet))
    }

    /// Caps the amount, in base units, this client pays for one request.
    pub fn with_max_value(mut self, max_value: U256) -> Self {
        self.filter.max_value = Some(max_value);
        self
    }

    /// Only pays on `network`.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.filter.network = Some(network.into());
        self
    }

    /// Only pays with `scheme`.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.filter.scheme = Some(scheme.into());
        self
    }

    /// Replaces the selection strategy.
    pub fn with_selector<P: PaymentSelector + 'static>(mut self, selector: P) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    /// Replaces the selection strategy with one shared with other clients.
    pub fn with_shared_selector(mut self, selector: Arc<dyn PaymentSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn filter(&self) -> &SelectionFilter {
        &self.filter
    }

    /// Picks the requirement to pay among those offered by a challenge.
    pub fn select_payment_requirements(
        &self,
        accepts: &[PaymentRequirements],
    ) -> Result<PaymentRequirements, SelectionError> {
        self.selector.select(accepts, &self.filter)
    }

    /// Signs a fresh credential for `requirements`.
    pub async fn create_payment_header(
        &self,
        requirements: &PaymentRequirements,
        x402_version: X402Version,
    ) -> Result<String, SigningError> {
        self.signer
            .create_payment_header(requirements, x402_version)
            .await
    }
}
