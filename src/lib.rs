//! Transparent [x402](https://www.x402.org) payments for `reqwest`.
//!
//! When a server answers `402 Payment Required` with an x402 challenge, the
//! client installed by this crate selects one of the offered payment
//! requirements, signs a credential for it, and resends the request once with
//! an `X-Payment` header. The caller sees the response to that resend, or the
//! original `402` when the server rejects the payment. A request is never paid
//! for twice.
//!
//! # Getting a client
//!
//! - [`X402HttpClient`]: a ready-to-use client. Paid resends go back through it.
//! - [`ReqwestWithPayments`]: `.with_payments(..)` on an existing
//!   `reqwest::Client` or `reqwest::ClientBuilder`.
//! - [`PaymentHooks`] / [`payment_hooks`]: a `reqwest-middleware` layer for an
//!   existing middleware stack.
//!
//! ```rust,no_run
//! use alloy_primitives::U256;
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_interceptor::{PaymentResponse, ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let wallet: PrivateKeySigner = std::env::var("PRIVATE_KEY")?.parse()?;
//! let http = reqwest::Client::new()
//!     .with_payments(X402Client::from_wallet(wallet).with_max_value(U256::from(10_000u64)))
//!     .build();
//!
//! let response = http.get("https://api.example.com/weather").send().await?;
//! if let Some(settlement) = PaymentResponse::from_headers(response.headers())? {
//!     println!("{settlement:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`interceptor`]: the `402` state machine and its per-request retry guard.
//! - [`selector`]: choosing among offered payment requirements.
//! - [`signer`]: producing `X-Payment` credentials (EIP-3009 on EVM networks).
//! - [`proto`]: x402 V1 wire types.
//! - [`config`]: loading an [`X402Client`] from a JSON file.
//!
//! # Features
//!
//! - `telemetry`: `tracing` spans around the payment path. Events are emitted
//!   regardless.

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod http_client;
pub mod interceptor;
pub mod networks;
pub mod proto;
pub mod selector;
pub mod signer;
pub mod timestamp;
pub mod util;

pub use builder::*;
pub use client::X402Client;
pub use config::{ConfigError, X402ClientConfig};
pub use error::{ErrorKind, X402Error, as_x402_error};
pub use hooks::{PaymentHooks, payment_hooks};
pub use http_client::X402HttpClient;
pub use interceptor::PaymentChallengeInterceptor;
pub use proto::{PaymentRequired, PaymentRequirements, PaymentResponse, X402Version};
pub use selector::{DefaultSelector, PaymentSelector, SelectionError, SelectionFilter};
pub use signer::{Eip3009Signer, PaymentSigner, SignerLike, SigningError};
