//! Failures of the payment flow.
//!
//! Every way answering a `402` can go wrong is a distinct [`X402Error`]
//! variant carrying its cause. [`X402Error::kind`] folds them into the two
//! categories callers usually branch on: the client was wired up wrong
//! ([`ErrorKind::Configuration`]), or the payment attempt failed
//! ([`ErrorKind::Payment`]).

use reqwest_middleware as rqm;

use crate::selector::SelectionError;
use crate::signer::SigningError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Integration misuse. Fix the wiring; retrying will not help.
    Configuration,
    /// The payment round-trip failed.
    Payment,
}

#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    /// The `402` response could not be traced back to the request that caused
    /// it, so there is nothing to retry. Happens when the request body is a
    /// stream and cannot be cloned, or when `on_response` runs without
    /// `on_request`.
    #[error("Missing request configuration: {0}")]
    MissingRequestConfig(&'static str),
    /// No offered requirement is acceptable.
    #[error("Failed to select payment requirements: {0}")]
    SelectionFailed(#[source] SelectionError),
    /// The signer refused or failed to produce a credential.
    #[error("Failed to create payment header: {0}")]
    SigningFailed(#[source] SigningError),
    /// The `402` body could not be read.
    #[error("Failed to read 402 response body: {0}")]
    BodyUnreadable(#[source] reqwest::Error),
    /// The `402` body is not a valid challenge.
    #[error("Failed to parse 402 response body: {0}")]
    DeserializationFailed(#[source] serde_json::Error),
    /// The credential is not a valid header value.
    #[error("Failed to encode payment credential as HTTP header: {0}")]
    InvalidHeader(#[source] http::header::InvalidHeaderValue),
    /// Resending the paid request failed.
    #[error("Failed to resend request with payment: {0}")]
    TransportFailed(#[source] rqm::Error),
}

impl X402Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            X402Error::MissingRequestConfig(_) => ErrorKind::Configuration,
            _ => ErrorKind::Payment,
        }
    }
}

impl From<SelectionError> for X402Error {
    fn from(error: SelectionError) -> Self {
        X402Error::SelectionFailed(error)
    }
}

impl From<SigningError> for X402Error {
    fn from(error: SigningError) -> Self {
        X402Error::SigningFailed(error)
    }
}

impl From<X402Error> for rqm::Error {
    fn from(error: X402Error) -> Self {
        rqm::Error::Middleware(error.into())
    }
}

/// Recovers the [`X402Error`] from an error returned by a middleware client.
/// `None` means the failure happened outside the payment flow.
pub fn as_x402_error(error: &rqm::Error) -> Option<&X402Error> {
    match error {
        rqm::Error::Middleware(inner) => inner.downcast_ref::<X402Error>(),
        rqm::Error::Reqwest(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn missing_request_is_a_configuration_error() {
        let error = X402Error::MissingRequestConfig("request body is not cloneable");
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(
            error.to_string(),
            "Missing request configuration: request body is not cloneable"
        );
    }

    #[test]
    fn payment_failures_keep_their_cause() {
        let error: X402Error = SigningError::Custom("insufficient funds".to_string()).into();
        assert_eq!(error.kind(), ErrorKind::Payment);
        assert_eq!(error.source().unwrap().to_string(), "insufficient funds");
        assert_eq!(
            error.to_string(),
            "Failed to create payment header: insufficient funds"
        );
    }

    #[test]
    fn round_trips_through_middleware_error() {
        let error: rqm::Error = X402Error::MissingRequestConfig("no request").into();
        assert_eq!(
            error.to_string(),
            "Missing request configuration: no request"
        );
        let recovered = as_x402_error(&error).unwrap();
        assert!(matches!(recovered, X402Error::MissingRequestConfig("no request")));
    }
}
