//! `with_payments` extension for plain `reqwest` clients and builders.
//!
//! ```rust,no_run
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_interceptor::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//!
//! let wallet: PrivateKeySigner = "0x...".parse().unwrap();
//! let http = reqwest::Client::new()
//!     .with_payments(X402Client::from_wallet(wallet))
//!     .build();
//! ```

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::X402Client;
use crate::hooks::PaymentHooks;
use crate::http_client::X402HttpClient;

pub trait ReqwestWithPayments<A> {
    fn with_payments(self, x402_client: X402Client) -> ReqwestWithPaymentsBuilder<A>;
}

impl ReqwestWithPayments<Client> for Client {
    fn with_payments(self, x402_client: X402Client) -> ReqwestWithPaymentsBuilder<Client> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

impl ReqwestWithPayments<ClientBuilder> for ClientBuilder {
    fn with_payments(self, x402_client: X402Client) -> ReqwestWithPaymentsBuilder<ClientBuilder> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

pub struct ReqwestWithPaymentsBuilder<A> {
    inner: A,
    x402_client: X402Client,
}

pub trait ReqwestWithPaymentsBuild {
    type BuildResult;
    type BuilderResult;

    /// A finished client whose paid resends go back through itself.
    fn build(self) -> Self::BuildResult;
    /// A middleware builder with payment hooks installed, open for more
    /// middleware. Paid resends go through the bare `reqwest` client.
    fn builder(self) -> Self::BuilderResult;
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client> {
    type BuildResult = X402HttpClient;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        X402HttpClient::with_client(self.inner, self.x402_client)
    }

    fn builder(self) -> Self::BuilderResult {
        let transport = rqm::ClientBuilder::new(self.inner.clone()).build();
        rqm::ClientBuilder::new(self.inner)
            .with(PaymentHooks::with_client(self.x402_client, transport))
    }
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder> {
    type BuildResult = Result<X402HttpClient, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let client = self.inner.build()?;
        Ok(client.with_payments(self.x402_client).build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(client.with_payments(self.x402_client).builder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{PaymentRequirements, X402Version};
    use crate::signer::{PaymentSigner, SigningError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticSigner;

    #[async_trait]
    impl PaymentSigner for StaticSigner {
        async fn create_payment_header(
            &self,
            _requirements: &PaymentRequirements,
            _x402_version: X402Version,
        ) -> Result<String, SigningError> {
            Ok("credential".to_string())
        }
    }

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("X-Payment"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "x402Version": 1,
                "accepts": [{
                    "scheme": "exact",
                    "network": "base",
                    "maxAmountRequired": "5",
                    "resource": server.uri(),
                    "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                    "maxTimeoutSeconds": 60,
                    "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
                }]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn client_builder_with_payments_builds() {
        let server = server().await;
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(5))
            .with_payments(X402Client::new(StaticSigner))
            .build()
            .unwrap();
        let response = http.get(server.uri()).send().await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn builder_stays_open_for_more_middleware() {
        let server = server().await;
        let http = Client::new()
            .with_payments(X402Client::new(StaticSigner))
            .builder()
            .build();
        let response = http.get(server.uri()).send().await.unwrap();
        assert_eq!(response.status(), 200);
    }
}
