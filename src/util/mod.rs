//! Helper types shared by the payment path.
//!
//! - [`b64`] - Base64 encoding/decoding of header payloads

pub mod b64;

pub use b64::*;
