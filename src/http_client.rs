//! A ready-made client with payments wired in.

use reqwest::{IntoUrl, Method, Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;

use crate::client::X402Client;
use crate::hooks::PaymentHooks;
use crate::interceptor::{PaymentChallengeInterceptor, RetryTransport};

/// An HTTP client that pays for `402` responses on its own.
///
/// Paid resends go back through this same client, so other middleware added
/// through [`X402HttpClient::from_builder`] also sees them.
///
/// ```rust,no_run
/// use alloy_signer_local::PrivateKeySigner;
/// use x402_interceptor::{X402Client, X402HttpClient};
///
/// # async fn run() -> Result<(), reqwest_middleware::Error> {
/// let wallet: PrivateKeySigner = "0x...".parse().unwrap();
/// let http = X402HttpClient::new(X402Client::from_wallet(wallet));
/// let body = http.get("https://api.example.com/paid").send().await?.text().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct X402HttpClient {
    inner: Arc<rqm::ClientWithMiddleware>,
}

impl X402HttpClient {
    pub fn new(client: X402Client) -> Self {
        Self::with_client(reqwest::Client::new(), client)
    }

    /// Wraps an existing `reqwest` client, reusing its connection pool and settings.
    pub fn with_client(http: reqwest::Client, client: X402Client) -> Self {
        Self::from_builder(rqm::ClientBuilder::new(http), client)
    }

    /// Adds payment hooks as the innermost layer of `builder`, after any
    /// middleware it already holds. Paid resends re-enter the whole stack.
    pub fn from_builder(builder: rqm::ClientBuilder, client: X402Client) -> Self {
        let inner = Arc::new_cyclic(|owner| {
            let interceptor =
                PaymentChallengeInterceptor::new(client, RetryTransport::Owner(owner.clone()));
            builder
                .with(PaymentHooks::from_interceptor(interceptor))
                .build()
        });
        Self { inner }
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> rqm::RequestBuilder {
        self.inner.get(url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> rqm::RequestBuilder {
        self.inner.post(url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> rqm::RequestBuilder {
        self.inner.put(url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> rqm::RequestBuilder {
        self.inner.delete(url)
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> rqm::RequestBuilder {
        self.inner.request(method, url)
    }

    pub async fn execute(&self, request: Request) -> rqm::Result<Response> {
        self.inner.execute(request).await
    }

    /// The underlying middleware client.
    pub fn as_client(&self) -> &rqm::ClientWithMiddleware {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, X402Error, as_x402_error};
    use crate::proto::{PaymentRequirements, X402Version};
    use crate::signer::{PaymentSigner, SigningError};
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct DescriptionSigner;

    #[async_trait]
    impl PaymentSigner for DescriptionSigner {
        async fn create_payment_header(
            &self,
            requirements: &PaymentRequirements,
            _x402_version: X402Version,
        ) -> Result<String, SigningError> {
            Ok(format!("sig-{}", requirements.description))
        }
    }

    #[derive(Clone, Default)]
    struct CountingSigner(Arc<AtomicUsize>);

    #[async_trait]
    impl PaymentSigner for CountingSigner {
        async fn create_payment_header(
            &self,
            requirements: &PaymentRequirements,
            _x402_version: X402Version,
        ) -> Result<String, SigningError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("sig-{}", requirements.description))
        }
    }

    fn challenge(server: &MockServer) -> serde_json::Value {
        json!({
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [{
                "scheme": "exact",
                "network": "base",
                "maxAmountRequired": "5",
                "resource": format!("{}/paid", server.uri()),
                "description": "B",
                "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                "maxTimeoutSeconds": 60,
                "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            }]
        })
    }

    #[tokio::test]
    async fn resend_goes_through_the_same_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/paid"))
            .and(header("X-Payment", "sig-B"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(&server)))
            .expect(1)
            .mount(&server)
            .await;

        let http = X402HttpClient::new(
            X402Client::new(DescriptionSigner).with_max_value(U256::from(7)),
        );
        let response = http
            .post(format!("{}/paid", server.uri()))
            .body("payload")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[1].body, b"payload");
    }

    #[tokio::test]
    async fn rejected_payment_is_not_retried_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(&server)))
            .expect(2)
            .mount(&server)
            .await;

        let http = X402HttpClient::new(X402Client::new(DescriptionSigner));
        let response = http
            .get(format!("{}/paid", server.uri()))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 402);
    }

    #[tokio::test]
    async fn payment_errors_can_be_recovered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(&server)))
            .expect(1)
            .mount(&server)
            .await;

        let http = X402HttpClient::new(
            X402Client::new(DescriptionSigner).with_max_value(U256::from(1)),
        );
        let err = http
            .get(format!("{}/paid", server.uri()))
            .send()
            .await
            .unwrap_err();

        assert!(matches!(
            as_x402_error(&err),
            Some(X402Error::SelectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn dropped_owner_is_a_configuration_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .and(header_exists("X-Payment"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(&server)))
            .expect(1)
            .mount(&server)
            .await;

        let http = X402HttpClient::new(X402Client::new(DescriptionSigner));
        let inner = http.as_client().clone();
        drop(http);
        let err = inner
            .get(format!("{}/paid", server.uri()))
            .send()
            .await
            .unwrap_err();

        let err = as_x402_error(&err).unwrap();
        assert!(matches!(err, X402Error::MissingRequestConfig(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn concurrent_requests_are_paid_independently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(challenge(&server)))
            .expect(4)
            .mount(&server)
            .await;

        let signer = CountingSigner::default();
        let http = X402HttpClient::new(X402Client::new(signer.clone()));
        let (first, second) = tokio::join!(
            http.get(format!("{}/first", server.uri())).send(),
            http.get(format!("{}/second", server.uri())).send(),
        );

        assert_eq!(first.unwrap().status(), 402);
        assert_eq!(second.unwrap().status(), 402);
        assert_eq!(signer.0.load(Ordering::SeqCst), 2);
        let requests = server.received_requests().await.unwrap();
        for target in ["/first", "/second"] {
            let paid: Vec<bool> = requests
                .iter()
                .filter(|r| r.url.path() == target)
                .map(|r| r.headers.contains_key("x-payment"))
                .collect();
            assert_eq!(paid.len(), 2);
            assert_eq!(paid.iter().filter(|p| **p).count(), 1);
        }
    }
}
