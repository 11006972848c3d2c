//! The `402` challenge state machine.
//!
//! [`PaymentChallengeInterceptor`] sits around every request sent by a client
//! it is installed in. For each response it decides between three outcomes:
//!
//! - not a `402`: hand the response back untouched;
//! - a `402` answering a request that was already paid for: hand it back
//!   untouched, because paying twice for the same request is never right;
//! - any other `402`: parse the challenge, select a requirement, sign a
//!   credential, and resend the request once with `X-Payment` attached. The
//!   caller receives the response to that resend.
//!
//! "Already paid for" is tracked per request. [`on_request`] tags the request's
//! [`Extensions`] with a [`RequestId`] and the [`RetryGuard`] remembers which
//! ids have a paid resend in flight, so concurrent requests through one
//! interceptor never see each other's state. The paid resend also carries a
//! [`PaidRetry`] marker in its extensions, so any other interceptor it passes
//! through (a retry client with its own payment hooks) leaves it alone too.
//!
//! [`on_request`]: PaymentChallengeInterceptor::on_request

use dashmap::DashSet;
use http::{Extensions, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::fmt;
use std::sync::Weak;
use uuid::Uuid;

use crate::client::X402Client;
use crate::error::X402Error;
use crate::proto::{ACCESS_CONTROL_EXPOSE_HEADERS, PaymentRequired, X_PAYMENT, X_PAYMENT_RESPONSE};

#[cfg(feature = "telemetry")]
use tracing::instrument;

/// Correlates a response, and any paid resend, with the request that started
/// the exchange. Stored in the request's [`Extensions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Marks the extensions of a resend that already carries a payment.
///
/// Set right before the resend and removed once it returns. A `402` seen while
/// the marker is present is returned as is by every interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaidRetry(pub RequestId);

/// Requests whose paid resend is in flight.
///
/// An id is armed right before the resend and disarmed by the first response
/// observed for it afterwards, or when the payment attempt fails.
#[derive(Debug, Default)]
pub struct RetryGuard(DashSet<RequestId>);

impl RetryGuard {
    pub fn arm(&self, id: RequestId) {
        self.0.insert(id);
    }

    /// Returns whether `id` was armed.
    pub fn disarm(&self, id: RequestId) -> bool {
        self.0.remove(&id).is_some()
    }

    pub fn is_armed(&self, id: RequestId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where the paid request is resent.
#[derive(Clone, Default)]
pub enum RetryTransport {
    /// The hooked client that owns the interceptor. The resent request goes
    /// through the interceptor again, which closes the cycle. Resending after
    /// the owner is dropped is a configuration error.
    Owner(Weak<rqm::ClientWithMiddleware>),
    /// A caller-supplied client, sharing its connection pool.
    Client(rqm::ClientWithMiddleware),
    /// A new `reqwest::Client` per resend, with no hooks and no pool reuse.
    ///
    /// Kept for callers that register hooks without handing over a client.
    /// Deprecation candidate: prefer [`crate::X402HttpClient`].
    #[default]
    Detached,
}

impl fmt::Debug for RetryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryTransport::Owner(_) => f.write_str("RetryTransport::Owner"),
            RetryTransport::Client(_) => f.write_str("RetryTransport::Client"),
            RetryTransport::Detached => f.write_str("RetryTransport::Detached"),
        }
    }
}

impl From<reqwest::Client> for RetryTransport {
    fn from(client: reqwest::Client) -> Self {
        RetryTransport::Client(rqm::ClientBuilder::new(client).build())
    }
}

impl From<rqm::ClientWithMiddleware> for RetryTransport {
    fn from(client: rqm::ClientWithMiddleware) -> Self {
        RetryTransport::Client(client)
    }
}

impl RetryTransport {
    async fn send(
        &self,
        request: Request,
        extensions: &mut Extensions,
    ) -> Result<Response, X402Error> {
        let result = match self {
            RetryTransport::Owner(owner) => {
                let client = owner.upgrade().ok_or(X402Error::MissingRequestConfig(
                    "owning client dropped before resend",
                ))?;
                client.execute_with_extensions(request, extensions).await
            }
            RetryTransport::Client(client) => {
                client.execute_with_extensions(request, extensions).await
            }
            RetryTransport::Detached => Self::send_detached(request).await,
        };
        result.map_err(X402Error::TransportFailed)
    }

    async fn send_detached(request: Request) -> rqm::Result<Response> {
        tracing::warn!(
            url = %request.url(),
            "Resending paid request through a throwaway client, hooks do not apply"
        );
        reqwest::Client::new()
            .execute(request)
            .await
            .map_err(rqm::Error::Reqwest)
    }
}

/// Answers `402` challenges with a single paid resend.
#[derive(Debug)]
pub struct PaymentChallengeInterceptor {
    client: X402Client,
    transport: RetryTransport,
    guard: RetryGuard,
}

impl PaymentChallengeInterceptor {
    pub fn new(client: X402Client, transport: RetryTransport) -> Self {
        Self {
            client,
            transport,
            guard: RetryGuard::default(),
        }
    }

    pub fn client(&self) -> &X402Client {
        &self.client
    }

    pub fn transport(&self) -> &RetryTransport {
        &self.transport
    }

    pub fn guard(&self) -> &RetryGuard {
        &self.guard
    }

    /// Runs before the request is sent. Tags the exchange with a [`RequestId`]
    /// unless it already carries one (a resend keeps its original id).
    pub fn on_request(&self, request: Request, extensions: &mut Extensions) -> Request {
        if extensions.get::<RequestId>().is_none() {
            extensions.insert(RequestId::new());
        }
        request
    }

    /// Runs after a response arrives.
    ///
    /// `origin` is a copy of the request that produced `response`; it is the
    /// request resent with payment. On success the returned response replaces
    /// `response`: callers must use it rather than anything they kept from the
    /// first attempt.
    #[cfg_attr(feature = "telemetry", instrument(name = "x402.on_response", skip_all, err, fields(status = %response.status())))]
    pub async fn on_response(
        &self,
        response: Response,
        origin: Option<Request>,
        extensions: &mut Extensions,
    ) -> Result<Response, X402Error> {
        let id = extensions.get::<RequestId>().copied();

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            if let Some(id) = id {
                self.guard.disarm(id);
            }
            tracing::trace!(status = %response.status(), "No payment required");
            return Ok(response);
        }

        let armed = id.is_some_and(|id| self.guard.disarm(id));
        if armed || extensions.get::<PaidRetry>().is_some() {
            tracing::info!(url = %response.url(), "Payment rejected on retry, returning 402");
            return Ok(response);
        }

        tracing::info!(url = %response.url(), "Received 402 Payment Required, processing payment");
        let result = self.pay_and_resend(id, response, origin, extensions).await;
        // A resend through the owning client has already disarmed the guard.
        // Other transports never report back, and failures must not leave it armed.
        if let Some(id) = id {
            self.guard.disarm(id);
        }
        extensions.remove::<PaidRetry>();
        result
    }

    async fn pay_and_resend(
        &self,
        id: Option<RequestId>,
        response: Response,
        origin: Option<Request>,
        extensions: &mut Extensions,
    ) -> Result<Response, X402Error> {
        let id = id.ok_or(X402Error::MissingRequestConfig(
            "response is not tagged with a request id; on_request was not called",
        ))?;
        let mut request = origin.ok_or(X402Error::MissingRequestConfig(
            "originating request is unavailable; streaming bodies cannot be resent",
        ))?;

        let body = response.bytes().await.map_err(X402Error::BodyUnreadable)?;
        let challenge =
            PaymentRequired::from_slice(&body).map_err(X402Error::DeserializationFailed)?;

        let selected = self.client.select_payment_requirements(&challenge.accepts)?;
        tracing::debug!(
            scheme = %selected.scheme,
            network = %selected.network,
            amount = %selected.max_amount_required,
            "Selected payment requirements"
        );

        let credential = self
            .client
            .create_payment_header(&selected, challenge.x402_version)
            .await?;
        let credential = HeaderValue::from_str(&credential).map_err(X402Error::InvalidHeader)?;

        self.guard.arm(id);
        let headers = request.headers_mut();
        headers.insert(X_PAYMENT, credential);
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(X_PAYMENT_RESPONSE),
        );

        tracing::debug!(request_id = %id, url = %request.url(), "Resending request with payment");
        extensions.insert(PaidRetry(id));
        self.transport.send(request, extensions).await
    }
}
