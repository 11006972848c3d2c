//! Payment hooks for an existing `reqwest-middleware` stack.
//!
//! [`PaymentHooks`] adapts [`PaymentChallengeInterceptor`] to
//! [`rqm::Middleware`]: install it with [`rqm::ClientBuilder::with`] and every
//! request sent through the resulting client is covered.

use alloy_primitives::U256;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;

use crate::client::X402Client;
use crate::interceptor::{PaymentChallengeInterceptor, RetryTransport};
use crate::selector::PaymentSelector;
use crate::signer::PaymentSigner;

#[cfg(feature = "telemetry")]
use tracing::instrument;

/// Request and response hooks that answer `402` challenges.
///
/// Cloning is cheap; clones share one interceptor and its retry state.
#[derive(Debug, Clone)]
pub struct PaymentHooks {
    interceptor: Arc<PaymentChallengeInterceptor>,
}

impl PaymentHooks {
    /// Hooks that resend paid requests through a throwaway client.
    ///
    /// The resend bypasses any other middleware. Prefer
    /// [`PaymentHooks::with_client`] or [`crate::X402HttpClient`].
    pub fn new(client: X402Client) -> Self {
        Self::from_interceptor(PaymentChallengeInterceptor::new(client, RetryTransport::Detached))
    }

    /// Hooks that resend paid requests through `transport_client`.
    pub fn with_client(client: X402Client, transport_client: rqm::ClientWithMiddleware) -> Self {
        Self::from_interceptor(PaymentChallengeInterceptor::new(
            client,
            RetryTransport::Client(transport_client),
        ))
    }

    pub fn from_interceptor(interceptor: PaymentChallengeInterceptor) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn interceptor(&self) -> &PaymentChallengeInterceptor {
        &self.interceptor
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for PaymentHooks {
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.hooks.handle", skip_all, err, fields(method = %req.method(), url = %req.url()))
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let req = self.interceptor.on_request(req, extensions);
        let origin = req.try_clone();
        let res = next.run(req, extensions).await?;
        self.interceptor
            .on_response(res, origin, extensions)
            .await
            .map_err(Into::into)
    }
}

/// Builds [`PaymentHooks`] from loose parts.
///
/// `max_value` caps the amount paid per request, `selector` replaces the
/// default selection, and `client` is used to resend paid requests. Without a
/// client the resend goes through a throwaway one and a warning is logged.
pub fn payment_hooks<S>(
    signer: S,
    max_value: Option<U256>,
    selector: Option<Arc<dyn PaymentSelector>>,
    client: Option<rqm::ClientWithMiddleware>,
) -> PaymentHooks
where
    S: PaymentSigner + 'static,
{
    let mut x402_client = X402Client::new(signer);
    if let Some(max_value) = max_value {
        x402_client = x402_client.with_max_value(max_value);
    }
    if let Some(selector) = selector {
        x402_client = x402_client.with_shared_selector(selector);
    }
    match client {
        Some(client) => PaymentHooks::with_client(x402_client, client),
        None => PaymentHooks::new(x402_client),
    }
}
